//! Error taxonomy for convergence operations
//!
//! Four failure kinds, surfaced explicitly and never silently suppressed:
//! validation (single-attribute rules), configuration (cross-attribute
//! rules), probe (current-state inspection), execution (side effects).

use std::path::PathBuf;
use thiserror::Error;

/// Descriptor construction violated a type/constraint/required-field rule.
///
/// Raised before any probe or handler runs, so invalid configurations
/// never reach a side effect.
#[derive(Error, Debug)]
#[error("validation failed for `{attribute}`: {reason}")]
pub struct ValidationError {
    pub attribute: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(attribute: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            reason: reason.into(),
        }
    }
}

/// Current-state inspection failed.
///
/// Distinct from "not satisfied": a probe that cannot answer blocks the
/// convergence call instead of guessing.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// IO error while inspecting an artifact
    #[error("IO error while probing `{context}`: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A probe command could not be run
    #[error("probe command `{command}` failed: {reason}")]
    Command { command: String, reason: String },

    /// An existing artifact could not be parsed
    #[error("could not parse existing artifact `{context}`: {reason}")]
    Parse { context: String, reason: String },
}

impl ProbeError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// A handler side effect failed.
///
/// Carries the underlying command/operation context. No implicit rollback
/// happens; each atomic operation either fully succeeds or leaves prior
/// state unchanged.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// External command exited non-zero or could not be spawned
    #[error("command `{command}` failed: {detail}")]
    Command { command: String, detail: String },

    /// File could not be written
    #[error("failed to write `{}`: {source}", .path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Registry operation failed
    #[error("registry operation on `{key}` failed: {source}")]
    Registry {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Cryptography provider failed
    #[error("crypto provider failed: {0}")]
    Crypto(String),

    /// Anything else
    #[error("{0}")]
    Other(String),
}

/// The descriptor requests an action/attribute combination that is
/// logically invalid given other attributes.
///
/// Depends on cross-attribute relationships rather than single-field
/// typing, and is detected before any side effect is attempted.
#[derive(Error, Debug)]
#[error("invalid configuration: {reason}")]
pub struct ConfigurationError {
    pub reason: String,
}

impl ConfigurationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Any failure a convergence call can surface
#[derive(Error, Debug)]
pub enum ConvergeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}
