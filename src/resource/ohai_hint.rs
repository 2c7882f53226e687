//! Ohai hint resource - JSON hint files consumed by Ohai plugins
//!
//! A hint is `<hints_dir>/<name>.json` containing a pretty-printed JSON
//! object, or an empty file when no content is given. An existing hint
//! that cannot be parsed is treated as an empty hint, not as a probe
//! failure - that is the one sanctioned suppression in this domain.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use convergence::{
    Action, ActionHandler, Applied, AttrMap, ConfigurationError, Constraint, Descriptor,
    ExecutionError, HandlerSet, Probe, ProbeError, ProbeResult, Schema, ValidationError,
};

use super::ResourceDomain;
use crate::config::OhaiConfig;
use crate::fs_writer::{FileSpec, FileWriter};

pub fn schema() -> Schema {
    // content is a JSON object, carried as text; parseability is checked
    // in preflight before any side effect
    Schema::new().attr("content", Constraint::string())
}

pub fn descriptor(
    name: impl Into<String>,
    action: Action,
    attributes: AttrMap,
) -> Result<Descriptor, ValidationError> {
    Descriptor::build(name, action, attributes, &schema())
}

pub fn domain(config: OhaiConfig, writer: Arc<dyn FileWriter>) -> ResourceDomain {
    ResourceDomain::new(
        "ohai_hint",
        Box::new(HintProbe {
            config: config.clone(),
        }),
        HandlerSet::new()
            .on(
                Action::Create,
                CreateHint {
                    config: config.clone(),
                    writer: Arc::clone(&writer),
                },
            )
            .on(Action::Delete, DeleteHint { config, writer }),
    )
}

/// Hint file path, ".json" appended unless already present
fn hint_path(config: &OhaiConfig, name: &str) -> PathBuf {
    if name.ends_with(".json") {
        config.hints_dir.join(name)
    } else {
        config.hints_dir.join(format!("{name}.json"))
    }
}

/// Pretty-print the desired content, or empty for a bare hint
fn format_content(content: Option<&str>) -> Result<String, ConfigurationError> {
    let Some(raw) = content else {
        return Ok(String::new());
    };
    if raw.trim().is_empty() {
        return Ok(String::new());
    }
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| ConfigurationError::new(format!("hint content is not valid JSON: {e}")))?;
    serde_json::to_string_pretty(&value)
        .map_err(|e| ConfigurationError::new(format!("hint content cannot be serialized: {e}")))
}

/// Read an existing hint, normalized through the JSON parser.
/// Unparseable content reads as an empty hint.
fn read_hint(path: &PathBuf) -> Result<Option<String>, ProbeError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ProbeError::io(path.display().to_string(), e)),
    };

    if raw.trim().is_empty() {
        return Ok(Some(String::new()));
    }

    match serde_json::from_str::<serde_json::Value>(&raw) {
        Ok(value) => Ok(Some(
            serde_json::to_string_pretty(&value).unwrap_or_default(),
        )),
        Err(e) => {
            log::debug!(
                "could not parse hint at {}: {e} - treating as empty hint",
                path.display()
            );
            Ok(Some(String::new()))
        }
    }
}

#[derive(Debug)]
struct HintProbe {
    config: OhaiConfig,
}

impl Probe for HintProbe {
    fn probe(&self, descriptor: &Descriptor) -> Result<ProbeResult, ProbeError> {
        let path = hint_path(&self.config, descriptor.name());
        let current = read_hint(&path)?;

        match descriptor.action() {
            // Present means the file exists with the desired content
            Action::Create => {
                let desired = format_content(descriptor.str("content"))
                    .map_err(|e| ProbeError::Parse {
                        context: path.display().to_string(),
                        reason: e.to_string(),
                    })?;
                match current {
                    Some(existing) if existing == desired => {
                        Ok(ProbeResult::present_with(path.display().to_string()))
                    }
                    _ => Ok(ProbeResult::Absent),
                }
            }
            // For delete, only existence matters
            _ => match current {
                Some(_) => Ok(ProbeResult::present_with(path.display().to_string())),
                None => Ok(ProbeResult::Absent),
            },
        }
    }
}

#[derive(Debug)]
struct CreateHint {
    config: OhaiConfig,
    writer: Arc<dyn FileWriter>,
}

impl ActionHandler for CreateHint {
    fn preflight(&self, descriptor: &Descriptor) -> Result<(), ConfigurationError> {
        format_content(descriptor.str("content")).map(|_| ())
    }

    fn execute(&self, descriptor: &Descriptor) -> Result<Applied, ExecutionError> {
        let path = hint_path(&self.config, descriptor.name());
        let content = format_content(descriptor.str("content"))
            .map_err(|e| ExecutionError::Other(e.to_string()))?;
        self.writer
            .write(&FileSpec::new(path), content.as_bytes())?;
        Ok(Applied::Changed)
    }
}

#[derive(Debug)]
struct DeleteHint {
    config: OhaiConfig,
    writer: Arc<dyn FileWriter>,
}

impl ActionHandler for DeleteHint {
    fn execute(&self, descriptor: &Descriptor) -> Result<Applied, ExecutionError> {
        let path = hint_path(&self.config, descriptor.name());
        if self.writer.delete(&path)? {
            Ok(Applied::Changed)
        } else {
            Ok(Applied::Unchanged)
        }
    }
}
