//! Batch reconciliation - applies many descriptors with bounded parallelism
//!
//! Descriptors in a batch are assumed independent; each one's
//! probe-then-act sequence stays on a single thread, and only distinct
//! descriptors run concurrently. A failure in one descriptor never stops
//! the others.

use crate::resource::DomainHandle;
use anyhow::Result;
use convergence::{Descriptor, Outcome};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// Options for a batch apply
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Worker threads; 1 means fully sequential
    pub jobs: usize,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self { jobs: 4 }
    }
}

/// Aggregated results of a batch apply
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplySummary {
    pub changed: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl ApplySummary {
    /// Check whether the batch applied without failures
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of descriptors processed
    pub fn total(&self) -> usize {
        self.changed + self.unchanged + self.failed
    }

    /// Fold another summary into this one
    pub fn merge(&mut self, other: &ApplySummary) {
        self.changed += other.changed;
        self.unchanged += other.unchanged;
        self.failed += other.failed;
    }

    /// Count one outcome
    pub fn add_outcome(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Changed => self.changed += 1,
            Outcome::Unchanged => self.unchanged += 1,
            Outcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// One descriptor bound to the domain that reconciles it
pub struct WorkItem {
    pub descriptor: Descriptor,
    pub domain: DomainHandle,
}

impl WorkItem {
    pub fn new(descriptor: Descriptor, domain: DomainHandle) -> Self {
        Self { descriptor, domain }
    }
}

/// Apply a batch and aggregate outcomes
pub fn apply_batch(items: &[WorkItem], opts: &ApplyOptions) -> Result<ApplySummary> {
    let outcomes = if opts.jobs <= 1 || items.len() <= 1 {
        items.iter().map(apply_item).collect()
    } else {
        apply_parallel(items, opts.jobs)?
    };

    let mut summary = ApplySummary::default();
    for outcome in &outcomes {
        summary.add_outcome(outcome);
    }
    Ok(summary)
}

fn apply_item(item: &WorkItem) -> Outcome {
    let outcome = item.domain.converge(&item.descriptor);
    match &outcome {
        Outcome::Failed { error } => {
            log::error!(
                "{} `{}` failed: {error}",
                item.domain.resource_type(),
                item.descriptor.name()
            );
        }
        _ => {
            log::info!(
                "{} `{}`: {outcome:?}",
                item.domain.resource_type(),
                item.descriptor.name()
            );
        }
    }
    outcome
}

fn apply_parallel(items: &[WorkItem], jobs: usize) -> Result<Vec<Outcome>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to create thread pool: {e}"))?;

    let outcomes: Arc<Mutex<Vec<Outcome>>> =
        Arc::new(Mutex::new(Vec::with_capacity(items.len())));

    pool.install(|| {
        items.par_iter().for_each(|item| {
            let outcome = apply_item(item);
            // A poisoned lock means a worker panicked; propagate rather
            // than undercount the batch
            outcomes.lock().expect("batch results lock").push(outcome);
        });
    });

    let outcomes = Arc::try_unwrap(outcomes)
        .map_err(|_| anyhow::anyhow!("outstanding references to batch results"))?
        .into_inner()
        .map_err(|_| anyhow::anyhow!("batch results lock poisoned"))?;

    Ok(outcomes)
}
