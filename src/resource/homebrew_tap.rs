//! Homebrew tap resource - third-party formula repositories
//!
//! `user/repo` taps live on disk as `Taps/user/homebrew-repo`; presence of
//! that directory is the probe. Tapping and untapping shell out to brew.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use convergence::{
    Action, ActionHandler, Applied, AttrMap, Constraint, Descriptor, ExecutionError, HandlerSet,
    Probe, ProbeError, ProbeResult, Schema, ValidationError,
};

use super::ResourceDomain;
use crate::config::HomebrewConfig;
use crate::exec::{run_checked, Invocation, ProcessRunner};

pub fn schema() -> Schema {
    Schema::new()
        .name_pattern(r"^[\w-]+(?:/[\w-]+)+$")
        .attr("url", Constraint::string())
        .attr("full", Constraint::boolean().default(false))
}

/// Validate and build a tap descriptor
pub fn descriptor(
    name: impl Into<String>,
    action: Action,
    attributes: AttrMap,
) -> Result<Descriptor, ValidationError> {
    Descriptor::build(name, action, attributes, &schema())
}

pub fn domain(config: HomebrewConfig, runner: Arc<dyn ProcessRunner>) -> ResourceDomain {
    ResourceDomain::new(
        "homebrew_tap",
        Box::new(TapProbe {
            config: config.clone(),
        }),
        HandlerSet::new()
            .on(
                Action::Tap,
                TapHandler {
                    config: config.clone(),
                    runner: Arc::clone(&runner),
                },
            )
            .on(Action::Untap, UntapHandler { config, runner }),
    )
}

/// Directory a tap occupies under the taps root
fn tap_dir(config: &HomebrewConfig, name: &str) -> PathBuf {
    config.taps_dir.join(name.replace('/', "/homebrew-"))
}

#[derive(Debug)]
struct TapProbe {
    config: HomebrewConfig,
}

impl Probe for TapProbe {
    fn probe(&self, descriptor: &Descriptor) -> Result<ProbeResult, ProbeError> {
        let dir = tap_dir(&self.config, descriptor.name());
        match fs::metadata(&dir) {
            Ok(meta) if meta.is_dir() => {
                Ok(ProbeResult::present_with(dir.display().to_string()))
            }
            Ok(_) => Ok(ProbeResult::Absent),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ProbeResult::Absent),
            Err(e) => Err(ProbeError::io(dir.display().to_string(), e)),
        }
    }
}

#[derive(Debug)]
struct TapHandler {
    config: HomebrewConfig,
    runner: Arc<dyn ProcessRunner>,
}

impl ActionHandler for TapHandler {
    fn execute(&self, descriptor: &Descriptor) -> Result<Applied, ExecutionError> {
        let mut inv = Invocation::new(self.config.brew_path.display().to_string()).arg("tap");
        if descriptor.bool_or("full", false) {
            inv = inv.arg("--full");
        }
        inv = inv.arg(descriptor.name());
        if let Some(url) = descriptor.str("url") {
            inv = inv.arg(url);
        }
        run_checked(self.runner.as_ref(), &inv)?;
        Ok(Applied::Changed)
    }
}

#[derive(Debug)]
struct UntapHandler {
    config: HomebrewConfig,
    runner: Arc<dyn ProcessRunner>,
}

impl ActionHandler for UntapHandler {
    fn execute(&self, descriptor: &Descriptor) -> Result<Applied, ExecutionError> {
        let inv = Invocation::new(self.config.brew_path.display().to_string())
            .args(["untap", descriptor.name()]);
        run_checked(self.runner.as_ref(), &inv)?;
        Ok(Applied::Changed)
    }
}
