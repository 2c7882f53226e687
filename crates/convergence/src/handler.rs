//! Action handlers - idempotent executors keyed by action
//!
//! A handler performs the minimal side effect needed to bring the system
//! to the desired state for one action. Composite effects are expressed as
//! an ordered sequence of independently guarded steps inside one handler,
//! never as partial multi-resource transactions.

use std::collections::BTreeMap;

use crate::descriptor::{Action, Descriptor};
use crate::error::{ConfigurationError, ExecutionError};

/// Whether a handler invocation mutated system state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Changed,
    Unchanged,
}

/// Side-effecting executor for exactly one action
///
/// Must be idempotent: invoking it when the end state already holds is a
/// no-op or safely repeatable. Sensitive payloads (private keys,
/// passwords) are marked for redaction at the execution boundary and must
/// never be logged.
pub trait ActionHandler: Send + Sync {
    /// Cross-attribute checks, run before the probe and before any side
    /// effect
    fn preflight(&self, _descriptor: &Descriptor) -> Result<(), ConfigurationError> {
        Ok(())
    }

    /// Perform the side effect
    fn execute(&self, descriptor: &Descriptor) -> Result<Applied, ExecutionError>;
}

impl<F> ActionHandler for F
where
    F: Fn(&Descriptor) -> Result<Applied, ExecutionError> + Send + Sync,
{
    fn execute(&self, descriptor: &Descriptor) -> Result<Applied, ExecutionError> {
        self(descriptor)
    }
}

/// Mapping from action to handler for one resource domain
#[derive(Default)]
pub struct HandlerSet {
    handlers: BTreeMap<Action, Box<dyn ActionHandler>>,
}

impl HandlerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handler to an action
    pub fn on(mut self, action: Action, handler: impl ActionHandler + 'static) -> Self {
        self.handlers.insert(action, Box::new(handler));
        self
    }

    pub fn get(&self, action: Action) -> Option<&dyn ActionHandler> {
        self.handlers.get(&action).map(Box::as_ref)
    }

    pub fn supports(&self, action: Action) -> bool {
        self.handlers.contains_key(&action)
    }

    /// Actions this set can execute
    pub fn actions(&self) -> impl Iterator<Item = Action> + '_ {
        self.handlers.keys().copied()
    }
}

impl std::fmt::Debug for HandlerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerSet")
            .field("actions", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_handlers() {
        let set = HandlerSet::new().on(Action::Create, |_d: &Descriptor| Ok(Applied::Changed));
        assert!(set.supports(Action::Create));
        assert!(!set.supports(Action::Delete));
        assert_eq!(set.actions().collect::<Vec<_>>(), vec![Action::Create]);
    }
}
