//! RHSM subscription pool resource
//!
//! Attaches and removes subscription pools beyond whatever an activation
//! key already granted. Removal works on serial numbers, so the handler
//! first resolves the pool's serial from the consumed listing.

use std::collections::BTreeMap;
use std::sync::Arc;

use convergence::{
    Action, ActionHandler, Applied, AttrMap, Descriptor, ExecutionError, HandlerSet, Probe,
    ProbeError, ProbeResult, Schema, ValidationError,
};

use super::ResourceDomain;
use crate::config::RhsmConfig;
use crate::exec::{run_checked, run_for_probe, Invocation, ProcessRunner};

pub fn schema() -> Schema {
    // The pool id is the name; no further attributes
    Schema::new()
}

pub fn descriptor(
    pool_id: impl Into<String>,
    action: Action,
    attributes: AttrMap,
) -> Result<Descriptor, ValidationError> {
    Descriptor::build(pool_id, action, attributes, &schema())
}

pub fn domain(config: RhsmConfig, runner: Arc<dyn ProcessRunner>) -> ResourceDomain {
    ResourceDomain::new(
        "rhsm_subscription",
        Box::new(SubscriptionProbe {
            config: config.clone(),
            runner: Arc::clone(&runner),
        }),
        HandlerSet::new()
            .on(
                Action::Attach,
                AttachPool {
                    runner: Arc::clone(&runner),
                },
            )
            .on(Action::Remove, RemovePool { config, runner }),
    )
}

fn consumed_invocation(config: &RhsmConfig) -> Invocation {
    Invocation::new("subscription-manager")
        .args(["list", "--consumed"])
        .env("LANG", &config.lang)
}

/// Parse `subscription-manager list --consumed` into pool id -> serial.
/// The listing interleaves `Pool ID:` and `Serial:` lines per entitlement.
fn serials_by_pool(listing: &str) -> BTreeMap<String, String> {
    let mut serials = BTreeMap::new();
    let mut pool: Option<String> = None;
    let mut serial: Option<String> = None;

    for line in listing.lines() {
        let Some((key, value)) = line.trim().split_once(':') else {
            continue;
        };
        match key.trim() {
            "Pool ID" => pool = Some(value.trim().to_string()),
            "Serial" => serial = Some(value.trim().to_string()),
            _ => continue,
        }
        if let (Some(p), Some(s)) = (&pool, &serial) {
            serials.insert(p.clone(), s.clone());
            pool = None;
            serial = None;
        }
    }

    serials
}

#[derive(Debug)]
struct SubscriptionProbe {
    config: RhsmConfig,
    runner: Arc<dyn ProcessRunner>,
}

impl Probe for SubscriptionProbe {
    fn probe(&self, descriptor: &Descriptor) -> Result<ProbeResult, ProbeError> {
        let output = run_for_probe(self.runner.as_ref(), &consumed_invocation(&self.config))?;
        let serials = serials_by_pool(&output.stdout_str());
        match serials.get(descriptor.name()) {
            Some(serial) => Ok(ProbeResult::present_with(format!("serial {serial}"))),
            None => Ok(ProbeResult::Absent),
        }
    }
}

#[derive(Debug)]
struct AttachPool {
    runner: Arc<dyn ProcessRunner>,
}

impl ActionHandler for AttachPool {
    fn execute(&self, descriptor: &Descriptor) -> Result<Applied, ExecutionError> {
        run_checked(
            self.runner.as_ref(),
            &Invocation::new("subscription-manager")
                .arg("attach")
                .arg(format!("--pool={}", descriptor.name())),
        )?;
        Ok(Applied::Changed)
    }
}

#[derive(Debug)]
struct RemovePool {
    config: RhsmConfig,
    runner: Arc<dyn ProcessRunner>,
}

impl ActionHandler for RemovePool {
    fn execute(&self, descriptor: &Descriptor) -> Result<Applied, ExecutionError> {
        let output = self
            .runner
            .run(&consumed_invocation(&self.config))
            .map_err(|e| ExecutionError::Command {
                command: "subscription-manager list --consumed".to_string(),
                detail: e.to_string(),
            })?;

        let serials = serials_by_pool(&output.stdout_str());
        let Some(serial) = serials.get(descriptor.name()) else {
            // Pool vanished between probe and removal
            return Ok(Applied::Unchanged);
        };

        run_checked(
            self.runner.as_ref(),
            &Invocation::new("subscription-manager")
                .arg("remove")
                .arg(format!("--serial={serial}")),
        )?;
        Ok(Applied::Changed)
    }
}
