//! # Convergence
//!
//! An idempotent state-reconciliation kernel.
//!
//! Given an immutable, typed descriptor of desired state, a *probe* that
//! reads current state, and a set of idempotent *action handlers*, the
//! engine decides whether the system already satisfies the descriptor and,
//! if not, invokes exactly one handler, then reports the outcome.
//!
//! ## Core Concepts
//!
//! - **Descriptor**: desired-state attributes plus a chosen action,
//!   validated against a static [`Schema`] at construction
//! - **Probe**: side-effect-free inspection of current state
//! - **ActionHandler**: idempotent executor for exactly one action
//! - **Outcome**: `Unchanged` / `Changed` / `Failed` per convergence call
//!
//! ## Example
//!
//! ```ignore
//! use convergence::{
//!     converge, Action, ActionHandler, Applied, AttrMap, Constraint,
//!     Descriptor, HandlerSet, ProbeResult, Schema,
//! };
//!
//! let schema = Schema::new()
//!     .attr("key_length", Constraint::integer()
//!         .one_of([1024_i64, 2048, 4096, 8192])
//!         .default(2048_i64));
//!
//! let descriptor = Descriptor::build(
//!     "/etc/ssl/dhparam.pem", Action::Create, AttrMap::new(), &schema)?;
//!
//! let probe = |d: &Descriptor| {
//!     if std::path::Path::new(d.name()).exists() {
//!         Ok(ProbeResult::present())
//!     } else {
//!         Ok(ProbeResult::Absent)
//!     }
//! };
//!
//! let handlers = HandlerSet::new().on(Action::Create, |d: &Descriptor| {
//!     // generate and write the artifact
//!     Ok(Applied::Changed)
//! });
//!
//! let outcome = converge(&descriptor, &probe, &handlers);
//! ```
//!
//! ## Guarantees
//!
//! - At most one handler invocation per convergence call
//! - Probe failure blocks: the handler never runs when inspection fails
//! - Validation failures surface before any probe or side effect
//! - Nothing is cached or retained between calls; each call is a fresh
//!   `Validated → Probed → {Unchanged | Changed | Failed}` state machine
//!
//! Concurrency is the caller's concern: the kernel is synchronous, and the
//! probe-then-act sequence is non-atomic with respect to external state,
//! so handlers must be safe to re-run if the precondition changed
//! underneath them.

pub mod descriptor;
pub mod engine;
pub mod error;
pub mod handler;
pub mod probe;
pub mod schema;

// Re-export main types at crate root
pub use descriptor::{Action, ActionFamily, AttrMap, AttributeValue, Descriptor};
pub use engine::{converge, Outcome};
pub use error::{
    ConfigurationError, ConvergeError, ExecutionError, ProbeError, ValidationError,
};
pub use handler::{ActionHandler, Applied, HandlerSet};
pub use probe::{Probe, ProbeResult};
pub use schema::{AttributeKind, Constraint, Schema};
