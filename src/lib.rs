//! tend - idempotent system resources
//!
//! Each resource domain (a Homebrew tap, an Ohai hint file, an OpenSSL
//! artifact, an RHSM registration, a Windows printer) pairs a probe of
//! current state with idempotent action handlers. The [`convergence`]
//! kernel decides whether anything needs to run; modules here supply the
//! domain knowledge and the collaborators that touch the host.
//!
//! ```ignore
//! use std::sync::Arc;
//! use tend::config::HomebrewConfig;
//! use tend::exec::SystemRunner;
//! use tend::resource::homebrew_tap;
//! use convergence::{Action, AttrMap};
//!
//! let domain = homebrew_tap::domain(HomebrewConfig::default(), Arc::new(SystemRunner));
//! let tap = homebrew_tap::descriptor("homebrew/science", Action::Tap, AttrMap::new())?;
//! let outcome = domain.converge(&tap);
//! ```

pub mod config;
pub mod crypto;
pub mod exec;
pub mod fs_writer;
pub mod registry;
pub mod resource;
pub mod runner;

pub use resource::{DomainHandle, ResourceDomain};
pub use runner::{apply_batch, ApplyOptions, ApplySummary, WorkItem};
