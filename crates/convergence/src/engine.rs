//! Convergence engine - probe, decide, apply at most one action
//!
//! One reconciliation call is one probe plus at most one handler
//! invocation, executed sequentially. The engine retains nothing between
//! calls; side-effect state lives entirely in the external system.

use crate::descriptor::{ActionFamily, Descriptor};
use crate::error::{ConfigurationError, ConvergeError};
use crate::handler::{Applied, HandlerSet};
use crate::probe::Probe;

/// Terminal classification of one convergence attempt
#[derive(Debug)]
pub enum Outcome {
    /// The probe already satisfied the desired state; no handler ran
    Unchanged,
    /// A handler executed and mutated state
    Changed,
    /// The probe or handler failed; no retry is attempted
    Failed { error: ConvergeError },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    pub fn is_change(&self) -> bool {
        matches!(self, Self::Changed)
    }
}

/// Reconcile one descriptor against live system state.
///
/// Decision table: the probe reports whether the action's end state
/// already holds. Ensure-family actions short-circuit on `Present`,
/// revoke-family actions on `Absent`; otherwise the handler bound to the
/// requested action runs exactly once. A `force` flag on the descriptor
/// skips the short-circuit entirely.
///
/// Probe failure blocks: the engine does not guess whether state is
/// satisfied when probing fails, and the handler is never invoked.
pub fn converge(descriptor: &Descriptor, probe: &dyn Probe, handlers: &HandlerSet) -> Outcome {
    match run(descriptor, probe, handlers) {
        Ok(Applied::Changed) => Outcome::Changed,
        Ok(Applied::Unchanged) => Outcome::Unchanged,
        Err(error) => {
            log::debug!("convergence of {descriptor} failed: {error}");
            Outcome::Failed { error }
        }
    }
}

fn run(
    descriptor: &Descriptor,
    probe: &dyn Probe,
    handlers: &HandlerSet,
) -> Result<Applied, ConvergeError> {
    let action = descriptor.action();
    let handler = handlers.get(action).ok_or_else(|| {
        ConfigurationError::new(format!(
            "action `{action}` is not supported for `{}`",
            descriptor.name()
        ))
    })?;

    handler.preflight(descriptor)?;

    if descriptor.force() {
        log::debug!("forcing {descriptor}");
        return Ok(handler.execute(descriptor)?);
    }

    let current = probe.probe(descriptor)?;
    let satisfied = match action.family() {
        ActionFamily::Ensure => current.is_present(),
        ActionFamily::Revoke => current.is_absent(),
    };

    if satisfied {
        log::debug!("{descriptor} already satisfied - nothing to do");
        return Ok(Applied::Unchanged);
    }

    Ok(handler.execute(descriptor)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Action, AttrMap, AttributeValue};
    use crate::error::{ExecutionError, ProbeError};
    use crate::probe::ProbeResult;
    use crate::schema::{Constraint, Schema};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Probe returning a scripted result, counting invocations
    struct ScriptedProbe {
        result: ProbeResult,
        calls: Arc<AtomicUsize>,
    }

    impl Probe for ScriptedProbe {
        fn probe(&self, _d: &Descriptor) -> Result<ProbeResult, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.result.clone())
        }
    }

    struct FailingProbe;

    impl Probe for FailingProbe {
        fn probe(&self, _d: &Descriptor) -> Result<ProbeResult, ProbeError> {
            Err(ProbeError::Command {
                command: "subscription-manager status".into(),
                reason: "simulated subprocess failure".into(),
            })
        }
    }

    /// Handler counting invocations
    struct CountingHandler {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl crate::handler::ActionHandler for CountingHandler {
        fn execute(&self, _d: &Descriptor) -> Result<Applied, ExecutionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ExecutionError::Other("simulated handler failure".into()))
            } else {
                Ok(Applied::Changed)
            }
        }
    }

    fn descriptor(action: Action, force: bool) -> Descriptor {
        let schema = Schema::new().attr("force", Constraint::boolean().default(false));
        let mut attrs = AttrMap::new();
        if force {
            attrs.insert("force".into(), AttributeValue::Bool(true));
        }
        Descriptor::build("res", action, attrs, &schema).expect("valid descriptor")
    }

    fn harness(
        result: ProbeResult,
        fail: bool,
    ) -> (ScriptedProbe, HandlerSet, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let probe_calls = Arc::new(AtomicUsize::new(0));
        let handler_calls = Arc::new(AtomicUsize::new(0));
        let probe = ScriptedProbe {
            result,
            calls: Arc::clone(&probe_calls),
        };
        let handlers = HandlerSet::new()
            .on(
                Action::Create,
                CountingHandler {
                    calls: Arc::clone(&handler_calls),
                    fail,
                },
            )
            .on(
                Action::Untap,
                CountingHandler {
                    calls: Arc::clone(&handler_calls),
                    fail,
                },
            );
        (probe, handlers, probe_calls, handler_calls)
    }

    #[test]
    fn satisfied_create_is_unchanged_and_handler_never_runs() {
        let (probe, handlers, probe_calls, handler_calls) =
            harness(ProbeResult::present(), false);
        let outcome = converge(&descriptor(Action::Create, false), &probe, &handlers);
        assert!(matches!(outcome, Outcome::Unchanged));
        assert_eq!(probe_calls.load(Ordering::SeqCst), 1);
        assert_eq!(handler_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsatisfied_create_runs_handler_exactly_once() {
        let (probe, handlers, _probe_calls, handler_calls) =
            harness(ProbeResult::Absent, false);
        let outcome = converge(&descriptor(Action::Create, false), &probe, &handlers);
        assert!(matches!(outcome, Outcome::Changed));
        assert_eq!(handler_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn revoke_action_short_circuits_on_absent() {
        // untap when not tapped: nothing to do
        let (probe, handlers, _probe_calls, handler_calls) =
            harness(ProbeResult::Absent, false);
        let outcome = converge(&descriptor(Action::Untap, false), &probe, &handlers);
        assert!(matches!(outcome, Outcome::Unchanged));
        assert_eq!(handler_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn revoke_action_runs_handler_when_present() {
        let (probe, handlers, _probe_calls, handler_calls) =
            harness(ProbeResult::present(), false);
        let outcome = converge(&descriptor(Action::Untap, false), &probe, &handlers);
        assert!(matches!(outcome, Outcome::Changed));
        assert_eq!(handler_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn force_skips_probe_and_runs_handler() {
        let (probe, handlers, probe_calls, handler_calls) =
            harness(ProbeResult::present(), false);
        let outcome = converge(&descriptor(Action::Create, true), &probe, &handlers);
        assert!(matches!(outcome, Outcome::Changed));
        assert_eq!(probe_calls.load(Ordering::SeqCst), 0);
        assert_eq!(handler_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn probe_failure_blocks_handler() {
        let handler_calls = Arc::new(AtomicUsize::new(0));
        let handlers = HandlerSet::new().on(
            Action::Create,
            CountingHandler {
                calls: Arc::clone(&handler_calls),
                fail: false,
            },
        );
        let outcome = converge(&descriptor(Action::Create, false), &FailingProbe, &handlers);
        match outcome {
            Outcome::Failed { error } => {
                assert!(matches!(error, ConvergeError::Probe(_)));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(handler_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handler_failure_surfaces_as_execution_error() {
        let (probe, handlers, _probe_calls, handler_calls) =
            harness(ProbeResult::Absent, true);
        let outcome = converge(&descriptor(Action::Create, false), &probe, &handlers);
        match outcome {
            Outcome::Failed { error } => {
                assert!(matches!(error, ConvergeError::Execution(_)));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(handler_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsupported_action_is_a_configuration_error() {
        let (probe, handlers, probe_calls, _handler_calls) =
            harness(ProbeResult::Absent, false);
        let outcome = converge(&descriptor(Action::Delete, false), &probe, &handlers);
        match outcome {
            Outcome::Failed { error } => {
                assert!(matches!(error, ConvergeError::Configuration(_)));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(probe_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn changed_then_unchanged_with_no_external_interference() {
        // Shared cell stands in for external system state
        let state = Arc::new(Mutex::new(false));

        let probe_state = Arc::clone(&state);
        let probe = move |_d: &Descriptor| {
            if *probe_state.lock().expect("probe lock") {
                Ok(ProbeResult::present())
            } else {
                Ok(ProbeResult::Absent)
            }
        };

        let handler_state = Arc::clone(&state);
        let handlers = HandlerSet::new().on(Action::Create, move |_d: &Descriptor| {
            *handler_state.lock().expect("handler lock") = true;
            Ok(Applied::Changed)
        });

        let d = descriptor(Action::Create, false);
        assert!(matches!(converge(&d, &probe, &handlers), Outcome::Changed));
        assert!(matches!(converge(&d, &probe, &handlers), Outcome::Unchanged));
    }
}
