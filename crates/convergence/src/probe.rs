//! Probe contract - side-effect-free current-state inspection
//!
//! A probe answers "does current system state already satisfy this
//! descriptor's desired end-state for this action?". It is produced fresh
//! on every convergence attempt and never cached: state can change between
//! calls due to concurrent external actors.

use serde::{Deserialize, Serialize};

use crate::descriptor::Descriptor;
use crate::error::ProbeError;

/// Snapshot of the current state relevant to a descriptor
///
/// `Present` means the end-state artifact exists *and* is valid; an
/// existing-but-invalid artifact (e.g. a corrupt dhparam file) probes
/// `Absent` so a create-style action regenerates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeResult {
    Present { details: Option<String> },
    Absent,
}

impl ProbeResult {
    pub fn present() -> Self {
        Self::Present { details: None }
    }

    pub fn present_with(details: impl Into<String>) -> Self {
        Self::Present {
            details: Some(details.into()),
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present { .. })
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

/// Pluggable current-state inspection strategy, supplied per resource
/// domain
///
/// Must be side-effect-free and safe to call repeatedly. Inspection
/// failures (IO errors, unparseable artifacts, subprocess failures)
/// surface as [`ProbeError`], which is distinct from "not satisfied".
pub trait Probe: Send + Sync {
    fn probe(&self, descriptor: &Descriptor) -> Result<ProbeResult, ProbeError>;
}

impl<F> Probe for F
where
    F: Fn(&Descriptor) -> Result<ProbeResult, ProbeError> + Send + Sync,
{
    fn probe(&self, descriptor: &Descriptor) -> Result<ProbeResult, ProbeError> {
        self(descriptor)
    }
}
