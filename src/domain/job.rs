//! Job and cycle records
//!
//! A job is one scheduled execution of one operation kind against one
//! target: a thread count, a spread of those threads across workers, and
//! absolute start/end timestamps. Once dispatched a job is immutable except
//! for its `finished` flag; completion is detected by its process handles
//! vanishing from the environment's live list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::OpKind;
use crate::error::{ReaprError, Result};
use crate::id::generate_job_id;

/// One scheduled execution of one operation against one target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier for this job
    pub id: String,

    /// The batch this job belongs to
    pub batch_id: String,

    /// The cycle this job belongs to, if it is part of an attack cycle
    pub cycle_id: Option<String>,

    /// Host of the target this job runs against
    pub target: String,

    /// Operation kind
    pub kind: OpKind,

    /// Total thread count, partitioned by `spread`
    pub threads: u32,

    /// Worker name to thread count; keys iterate in a stable order
    pub spread: BTreeMap<String, u32>,

    /// Absolute start timestamp (Unix ms)
    pub start: i64,

    /// Absolute end timestamp (Unix ms)
    pub end: i64,

    /// Whether this job is part of a prep sequence rather than a cycle
    pub is_prep: bool,

    /// Process handles assigned by the dispatcher at launch
    pub pids: Vec<u32>,

    /// Whether this job has been observed to finish
    pub finished: bool,
}

impl Job {
    /// Create a job; fails on an empty thread count or an inconsistent spread
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        batch_id: &str,
        cycle_id: Option<&str>,
        target: &str,
        kind: OpKind,
        spread: BTreeMap<String, u32>,
        start: i64,
        end: i64,
        is_prep: bool,
    ) -> Result<Self> {
        let threads: u32 = spread.values().sum();
        if threads == 0 {
            return Err(ReaprError::InvalidJob(format!(
                "cannot create a {} job with no threads",
                kind
            )));
        }
        if spread.values().any(|&t| t == 0) {
            return Err(ReaprError::InvalidJob(format!(
                "{} job spread contains a zero-thread worker",
                kind
            )));
        }
        if end < start {
            return Err(ReaprError::InvalidJob(format!(
                "{} job ends at {} before it starts at {}",
                kind, end, start
            )));
        }

        Ok(Self {
            id: generate_job_id(batch_id),
            batch_id: batch_id.to_string(),
            cycle_id: cycle_id.map(|c| c.to_string()),
            target: target.to_string(),
            kind,
            threads,
            spread,
            start,
            end,
            is_prep,
            pids: Vec::new(),
            finished: false,
        })
    }

    /// Capacity units this job reserves on one worker
    pub fn cost_on(&self, worker: &str) -> f64 {
        self.spread
            .get(worker)
            .map(|&threads| threads as f64 * self.kind.unit_cost())
            .unwrap_or(0.0)
    }

    /// Whether the dispatcher has recorded process handles for this job
    pub fn is_dispatched(&self) -> bool {
        !self.pids.is_empty()
    }

    /// Mark the job finished
    pub fn mark_finished(&mut self) {
        self.finished = true;
    }
}

/// Exactly four jobs in fixed landing order, sharing a cycle identity.
///
/// The extract lands first, its compensating soften second, the replenish
/// third, and the soften compensating the replenish last.
#[derive(Debug, Clone)]
pub struct Cycle {
    pub cycle_id: String,
    pub extract: Job,
    pub soften1: Job,
    pub replenish: Job,
    pub soften2: Job,
}

impl Cycle {
    /// The four jobs in landing order
    pub fn into_jobs(self) -> Vec<Job> {
        vec![self.extract, self.soften1, self.replenish, self.soften2]
    }

    /// End of the last job; the anchor for pipelining the next cycle
    pub fn tail_end(&self) -> i64 {
        self.soften2.end
    }
}
