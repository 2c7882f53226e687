//! RHSM errata level resource
//!
//! Installs every package update associated with errata at a given
//! security severity. There is no cheap way to ask whether such updates
//! are pending, so the probe never reports the state as satisfied and the
//! update command is simply re-run; yum itself applies nothing when the
//! host is current.

use std::sync::Arc;

use convergence::{
    Action, ActionHandler, Applied, AttrMap, Descriptor, ExecutionError, HandlerSet, Probe,
    ProbeResult, Schema, ValidationError,
};

use super::ResourceDomain;
use crate::config::RhsmConfig;
use crate::exec::{run_checked, Invocation, ProcessRunner};

pub fn schema() -> Schema {
    Schema::new().name_pattern(r"(?i)^(critical|moderate|important|low)$")
}

pub fn descriptor(
    errata_level: impl Into<String>,
    action: Action,
    attributes: AttrMap,
) -> Result<Descriptor, ValidationError> {
    Descriptor::build(errata_level, action, attributes, &schema())
}

pub fn domain(config: RhsmConfig, runner: Arc<dyn ProcessRunner>) -> ResourceDomain {
    ResourceDomain::new(
        "rhsm_errata_level",
        Box::new(AlwaysPending),
        HandlerSet::new().on(Action::Install, InstallErrata { config, runner }),
    )
}

/// Severity as yum expects it: "Critical", "Moderate", ...
fn capitalize(level: &str) -> String {
    let mut chars = level.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

#[derive(Debug)]
struct AlwaysPending;

impl Probe for AlwaysPending {
    fn probe(&self, _descriptor: &Descriptor) -> Result<ProbeResult, convergence::ProbeError> {
        Ok(ProbeResult::Absent)
    }
}

#[derive(Debug)]
struct InstallErrata {
    config: RhsmConfig,
    runner: Arc<dyn ProcessRunner>,
}

impl ActionHandler for InstallErrata {
    fn execute(&self, descriptor: &Descriptor) -> Result<Applied, ExecutionError> {
        // EL6 ships severity filtering as a separate yum plugin
        if self.config.platform_major == Some(6) {
            run_checked(
                self.runner.as_ref(),
                &Invocation::new("yum").args(["install", "-y", "yum-plugin-security"]),
            )?;
        }

        run_checked(
            self.runner.as_ref(),
            &Invocation::new("yum").args([
                "update".to_string(),
                format!("--sec-severity={}", capitalize(descriptor.name())),
                "-y".to_string(),
            ]),
        )?;

        Ok(Applied::Changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::ScriptedRunner;
    use crate::exec::CommandOutput;
    use convergence::Outcome;

    #[test]
    fn level_names_are_validated_case_insensitively() {
        assert!(descriptor("critical", Action::Install, AttrMap::new()).is_ok());
        assert!(descriptor("Important", Action::Install, AttrMap::new()).is_ok());
        assert!(descriptor("LOW", Action::Install, AttrMap::new()).is_ok());
        assert!(descriptor("severe", Action::Install, AttrMap::new()).is_err());
    }

    #[test]
    fn severity_flag_is_capitalized() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.push(CommandOutput::ok(""));

        let domain = domain(RhsmConfig::default(), runner.clone());
        let d = descriptor("critical", Action::Install, AttrMap::new())
            .expect("valid descriptor");

        assert!(matches!(domain.converge(&d), Outcome::Changed));
        assert_eq!(
            runner.recorded()[0],
            "yum update --sec-severity=Critical -y"
        );
    }

    #[test]
    fn el6_installs_the_security_plugin_first() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.push(CommandOutput::ok(""));
        runner.push(CommandOutput::ok(""));

        let config = RhsmConfig {
            platform_major: Some(6),
            ..RhsmConfig::default()
        };
        let domain = domain(config, runner.clone());
        let d = descriptor("moderate", Action::Install, AttrMap::new())
            .expect("valid descriptor");

        assert!(matches!(domain.converge(&d), Outcome::Changed));
        let recorded = runner.recorded();
        assert_eq!(recorded[0], "yum install -y yum-plugin-security");
        assert_eq!(recorded[1], "yum update --sec-severity=Moderate -y");
    }

    #[test]
    fn update_is_rerun_every_converge() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.push(CommandOutput::ok(""));
        runner.push(CommandOutput::ok(""));

        let domain = domain(RhsmConfig::default(), runner.clone());
        let d = descriptor("low", Action::Install, AttrMap::new()).expect("valid descriptor");

        assert!(matches!(domain.converge(&d), Outcome::Changed));
        assert!(matches!(domain.converge(&d), Outcome::Changed));
        assert_eq!(runner.call_count(), 2);
    }
}
