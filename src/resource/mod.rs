//! Resource domains - probes and handler sets per managed thing
//!
//! Each domain supplies three pieces the convergence kernel stays ignorant
//! of: an attribute schema, a probe for current state, and idempotent
//! handlers for its actions. Collaborators (process runner, file writer,
//! registry, crypto) are injected at construction.

use std::sync::Arc;

use convergence::{converge, Descriptor, HandlerSet, Outcome, Probe};

/// One resource domain: a probe plus its handler table
pub struct ResourceDomain {
    resource_type: &'static str,
    probe: Box<dyn Probe>,
    handlers: HandlerSet,
}

impl ResourceDomain {
    pub fn new(
        resource_type: &'static str,
        probe: Box<dyn Probe>,
        handlers: HandlerSet,
    ) -> Self {
        Self {
            resource_type,
            probe,
            handlers,
        }
    }

    /// Domain category (e.g. "homebrew_tap", "rhsm_repo")
    pub fn resource_type(&self) -> &'static str {
        self.resource_type
    }

    /// Reconcile one descriptor against live state
    pub fn converge(&self, descriptor: &Descriptor) -> Outcome {
        log::debug!("converging {} {descriptor}", self.resource_type);
        converge(descriptor, self.probe.as_ref(), &self.handlers)
    }
}

impl std::fmt::Debug for ResourceDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceDomain")
            .field("resource_type", &self.resource_type)
            .field("handlers", &self.handlers)
            .finish()
    }
}

/// Shared handle to a domain, reused across many descriptors
pub type DomainHandle = Arc<ResourceDomain>;

pub mod homebrew_tap;
pub mod ohai_hint;
pub mod openssl_dhparam;
pub mod openssl_rsa_key;
pub mod openssl_x509;
pub mod rhsm_errata_level;
pub mod rhsm_register;
pub mod rhsm_repo;
pub mod rhsm_subscription;
pub mod windows_printer;
