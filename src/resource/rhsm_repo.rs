//! RHSM repository resource
//!
//! Enables and disables repositories made available by attached
//! subscriptions.

use std::sync::Arc;

use convergence::{
    Action, ActionHandler, Applied, AttrMap, Descriptor, ExecutionError, HandlerSet, Probe,
    ProbeError, ProbeResult, Schema, ValidationError,
};

use super::ResourceDomain;
use crate::config::RhsmConfig;
use crate::exec::{run_checked, run_for_probe, Invocation, ProcessRunner};

pub fn schema() -> Schema {
    // The repo id is the name; no further attributes
    Schema::new()
}

pub fn descriptor(
    repo_id: impl Into<String>,
    action: Action,
    attributes: AttrMap,
) -> Result<Descriptor, ValidationError> {
    Descriptor::build(repo_id, action, attributes, &schema())
}

pub fn domain(config: RhsmConfig, runner: Arc<dyn ProcessRunner>) -> ResourceDomain {
    ResourceDomain::new(
        "rhsm_repo",
        Box::new(RepoProbe {
            config,
            runner: Arc::clone(&runner),
        }),
        HandlerSet::new()
            .on(
                Action::Enable,
                ToggleRepo {
                    runner: Arc::clone(&runner),
                    flag: "--enable",
                },
            )
            .on(
                Action::Disable,
                ToggleRepo {
                    runner,
                    flag: "--disable",
                },
            ),
    )
}

/// Does `subscription-manager repos --list-enabled` show this repo id?
fn repo_enabled(listing: &str, repo_id: &str) -> bool {
    listing.lines().any(|line| {
        line.trim()
            .strip_prefix("Repo ID:")
            .is_some_and(|value| value.trim() == repo_id)
    })
}

#[derive(Debug)]
struct RepoProbe {
    config: RhsmConfig,
    runner: Arc<dyn ProcessRunner>,
}

impl Probe for RepoProbe {
    fn probe(&self, descriptor: &Descriptor) -> Result<ProbeResult, ProbeError> {
        let invocation = Invocation::new("subscription-manager")
            .args(["repos", "--list-enabled"])
            .env("LANG", &self.config.lang);
        let output = run_for_probe(self.runner.as_ref(), &invocation)?;
        if repo_enabled(&output.stdout_str(), descriptor.name()) {
            Ok(ProbeResult::present())
        } else {
            Ok(ProbeResult::Absent)
        }
    }
}

#[derive(Debug)]
struct ToggleRepo {
    runner: Arc<dyn ProcessRunner>,
    flag: &'static str,
}

impl ActionHandler for ToggleRepo {
    fn execute(&self, descriptor: &Descriptor) -> Result<Applied, ExecutionError> {
        run_checked(
            self.runner.as_ref(),
            &Invocation::new("subscription-manager")
                .arg("repos")
                .arg(format!("{}={}", self.flag, descriptor.name())),
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

    const ENABLED: &str = "\
+----------------------------------------------------------+
    Available Repositories in /etc/yum.repos.d/redhat.repo
+----------------------------------------------------------+
Repo ID:   rhel-7-server-rpms
Repo Name: Red Hat Enterprise Linux 7 Server (RPMs)
Enabled:   1
";

    #[test]
    fn repo_ids_match_whole_lines() {
        assert!(repo_enabled(ENABLED, "rhel-7-server-rpms"));
        assert!(!repo_enabled(ENABLED, "rhel-7-server"));
        assert!(!repo_enabled(ENABLED, "rhel-7-server-extras-rpms"));
    }

    #[test]
    fn enable_runs_when_repo_is_disabled() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.push(CommandOutput::ok(ENABLED)); // probe
        runner.push(CommandOutput::ok("")); // enable

        let domain = domain(RhsmConfig::default(), runner.clone());
        let d = descriptor("rhel-7-server-extras-rpms", Action::Enable, AttrMap::new())
            .expect("valid descriptor");

        assert!(matches!(domain.converge(&d), Outcome::Changed));
        assert_eq!(
            runner.recorded()[1],
            "subscription-manager repos --enable=rhel-7-server-extras-rpms"
        );
    }

    #[test]
    fn enabled_repo_converges() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.push(CommandOutput::ok(ENABLED));

        let domain = domain(RhsmConfig::default(), runner.clone());
        let d = descriptor("rhel-7-server-rpms", Action::Enable, AttrMap::new())
            .expect("valid descriptor");

        assert!(matches!(domain.converge(&d), Outcome::Unchanged));
        assert_eq!(runner.call_count(), 1);
    }

    #[test]
    fn disable_runs_only_when_enabled() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.push(CommandOutput::ok(ENABLED)); // probe
        runner.push(CommandOutput::ok("")); // disable

        let domain = domain(RhsmConfig::default(), runner.clone());
        let d = descriptor("rhel-7-server-rpms", Action::Disable, AttrMap::new())
            .expect("valid descriptor");
        assert!(matches!(domain.converge(&d), Outcome::Changed));

        runner.push(CommandOutput::ok(""));
        let absent = descriptor("rhel-6-server-rpms", Action::Disable, AttrMap::new())
            .expect("valid descriptor");
        assert!(matches!(domain.converge(&absent), Outcome::Unchanged));
    }
}
