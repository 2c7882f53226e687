//! RHSM host registration resource
//!
//! Registers a host with Red Hat Subscription Manager or a local
//! Satellite server. Registration is a sequence of independently guarded
//! steps; a partial failure leaves completed steps in place and the whole
//! resource is safe to re-run.

use std::sync::Arc;

use convergence::{
    Action, ActionHandler, Applied, AttrMap, ConfigurationError, Constraint, Descriptor,
    ExecutionError, HandlerSet, Probe, ProbeError, ProbeResult, Schema, ValidationError,
};

use super::ResourceDomain;
use crate::config::RhsmConfig;
use crate::exec::{run_checked, run_for_probe, Invocation, ProcessRunner};

const UNKNOWN_STATUS: &str = "Overall Status: Unknown";
const CA_CONSUMER_PACKAGE: &str = "katello-ca-consumer";
const AGENT_PACKAGE: &str = "katello-agent";

pub fn schema() -> Schema {
    Schema::new()
        .attr("activation_keys", Constraint::list().default(Vec::new()))
        .attr("organization", Constraint::string())
        .attr("satellite_host", Constraint::string())
        .attr("environment", Constraint::string())
        .attr("username", Constraint::string())
        .attr("password", Constraint::string())
        .attr("auto_attach", Constraint::boolean().default(false))
        .attr("install_katello_agent", Constraint::boolean().default(true))
        .attr("force", Constraint::boolean().default(false))
}

pub fn descriptor(
    name: impl Into<String>,
    action: Action,
    attributes: AttrMap,
) -> Result<Descriptor, ValidationError> {
    Descriptor::build(name, action, attributes, &schema())
}

pub fn domain(config: RhsmConfig, runner: Arc<dyn ProcessRunner>) -> ResourceDomain {
    ResourceDomain::new(
        "rhsm_register",
        Box::new(RegistrationProbe {
            config: config.clone(),
            runner: Arc::clone(&runner),
        }),
        HandlerSet::new()
            .on(
                Action::Register,
                RegisterHost {
                    config,
                    runner: Arc::clone(&runner),
                },
            )
            .on(Action::Unregister, UnregisterHost { runner }),
    )
}

fn status_invocation(config: &RhsmConfig) -> Invocation {
    // LANG pinned so the status match is locale-stable
    Invocation::new("subscription-manager")
        .arg("status")
        .env("LANG", &config.lang)
}

fn registered(output_stdout: &str) -> bool {
    !output_stdout.contains(UNKNOWN_STATUS)
}

/// Build the register command line. Cross-attribute rules live here so
/// both preflight and execution share one source of truth.
fn register_invocation(descriptor: &Descriptor) -> Result<Invocation, ConfigurationError> {
    let keys = descriptor.list("activation_keys");
    let mut inv = Invocation::new("subscription-manager").arg("register");

    if !keys.is_empty() {
        let Some(org) = descriptor.str("organization") else {
            return Err(ConfigurationError::new(
                "organization is required when registering with activation keys",
            ));
        };
        for key in keys {
            inv = inv.arg(format!("--activationkey={key}"));
        }
        inv = inv.arg(format!("--org={org}"));
        if descriptor.force() {
            inv = inv.arg("--force");
        }
        return Ok(inv.sensitive());
    }

    if let Some(username) = descriptor.str("username")
        && let Some(password) = descriptor.str("password")
    {
        let satellite = descriptor.str("satellite_host");
        let environment = descriptor.str("environment");
        if satellite.is_some() && environment.is_none() {
            return Err(ConfigurationError::new(
                "environment is required when registering against a satellite host with username/password",
            ));
        }
        inv = inv
            .arg(format!("--username={username}"))
            .arg(format!("--password={password}"));
        if satellite.is_some()
            && let Some(environment) = environment
        {
            inv = inv.arg(format!("--environment={environment}"));
        }
        if descriptor.bool_or("auto_attach", false) {
            inv = inv.arg("--auto-attach");
        }
        if descriptor.force() {
            inv = inv.arg("--force");
        }
        return Ok(inv.sensitive());
    }

    Err(ConfigurationError::new(
        "either activation_keys or username and password must be given",
    ))
}

#[derive(Debug)]
struct RegistrationProbe {
    config: RhsmConfig,
    runner: Arc<dyn ProcessRunner>,
}

impl Probe for RegistrationProbe {
    fn probe(&self, _descriptor: &Descriptor) -> Result<ProbeResult, ProbeError> {
        // Exit status is ignored on purpose: an unregistered host exits
        // non-zero but still prints the overall status
        let output = run_for_probe(self.runner.as_ref(), &status_invocation(&self.config))?;
        if registered(&output.stdout_str()) {
            Ok(ProbeResult::present())
        } else {
            Ok(ProbeResult::Absent)
        }
    }
}

#[derive(Debug)]
struct RegisterHost {
    config: RhsmConfig,
    runner: Arc<dyn ProcessRunner>,
}

impl RegisterHost {
    fn package_installed(&self, package: &str) -> Result<bool, ExecutionError> {
        let output = run_checked(
            self.runner.as_ref(),
            &Invocation::new("rpm").arg("-qa").arg(format!("{package}*")),
        )?;
        Ok(output.stdout_str().contains(package))
    }

    fn currently_registered(&self) -> Result<bool, ExecutionError> {
        let output = self
            .runner
            .run(&status_invocation(&self.config))
            .map_err(|e| ExecutionError::Command {
                command: "subscription-manager status".to_string(),
                detail: e.to_string(),
            })?;
        Ok(registered(&output.stdout_str()))
    }
}

impl ActionHandler for RegisterHost {
    fn preflight(&self, descriptor: &Descriptor) -> Result<(), ConfigurationError> {
        register_invocation(descriptor).map(|_| ())
    }

    fn execute(&self, descriptor: &Descriptor) -> Result<Applied, ExecutionError> {
        let mut changed = false;

        // Satellite registration trusts the server's CA consumer cert;
        // install it straight from the satellite when missing
        if let Some(satellite) = descriptor.str("satellite_host")
            && !self.package_installed(CA_CONSUMER_PACKAGE)?
        {
            run_checked(
                self.runner.as_ref(),
                &Invocation::new("yum").args([
                    "install",
                    "-y",
                    "--nogpgcheck",
                    &format!("http://{satellite}/pub/{CA_CONSUMER_PACKAGE}-latest.noarch.rpm"),
                ]),
            )?;
            changed = true;
        }

        if descriptor.force() || !self.currently_registered()? {
            let invocation =
                register_invocation(descriptor).map_err(|e| ExecutionError::Other(e.to_string()))?;
            run_checked(self.runner.as_ref(), &invocation)?;
            changed = true;
        }

        // Satellite hosts also get the katello agent, once registration
        // makes its repo reachable
        if descriptor.bool_or("install_katello_agent", true)
            && descriptor.str("satellite_host").is_some()
            && !self.package_installed(AGENT_PACKAGE)?
        {
            run_checked(
                self.runner.as_ref(),
                &Invocation::new("yum").args(["install", "-y", AGENT_PACKAGE]),
            )?;
            changed = true;
        }

        Ok(if changed {
            Applied::Changed
        } else {
            Applied::Unchanged
        })
    }
}

#[derive(Debug)]
struct UnregisterHost {
    runner: Arc<dyn ProcessRunner>,
}

impl ActionHandler for UnregisterHost {
    fn execute(&self, _descriptor: &Descriptor) -> Result<Applied, ExecutionError> {
        run_checked(
            self.runner.as_ref(),
            &Invocation::new("subscription-manager").arg("unregister"),
        )?;
        run_checked(
            self.runner.as_ref(),
            &Invocation::new("subscription-manager").arg("clean"),
        )?;
        Ok(Applied::Changed)
    }
}
