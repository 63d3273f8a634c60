//! Batch records
//!
//! A batch groups the jobs of one prep sequence or one run of chained
//! attack cycles against a single target. It is the unit the dispatcher
//! launches and the unit cancellation operates on; the target's status is
//! driven off its batch's lifecycle.

use serde::{Deserialize, Serialize};

use crate::domain::Job;
use crate::error::{ReaprError, Result};

/// One or more jobs sharing a batch identity and a target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    /// Unique identifier for this batch
    pub batch_id: String,

    /// Host of the target every job in this batch runs against
    pub target: String,

    /// Jobs ordered by end timestamp
    pub jobs: Vec<Job>,

    /// Earliest job start (Unix ms)
    pub start: i64,

    /// Latest job end (Unix ms)
    pub end: i64,
}

impl Batch {
    /// Package jobs into a batch; fails on an empty job list
    pub fn new(batch_id: &str, target: &str, mut jobs: Vec<Job>) -> Result<Self> {
        if jobs.is_empty() {
            return Err(ReaprError::InvalidState(format!(
                "batch {} for {} has no jobs",
                batch_id, target
            )));
        }
        jobs.sort_by_key(|job| job.end);

        let start = jobs.iter().map(|job| job.start).min().unwrap_or(0);
        let end = jobs.iter().map(|job| job.end).max().unwrap_or(0);

        Ok(Self {
            batch_id: batch_id.to_string(),
            target: target.to_string(),
            jobs,
            start,
            end,
        })
    }

    /// Whether every job in the batch has finished
    pub fn is_finished(&self) -> bool {
        self.jobs.iter().all(|job| job.finished)
    }

    /// Whether the batch is a prep batch (every job carries the prep flag)
    pub fn is_prep(&self) -> bool {
        self.jobs.iter().all(|job| job.is_prep)
    }

    /// Number of distinct cycles in this batch; zero for prep batches
    pub fn cycle_count(&self) -> usize {
        let mut ids: Vec<&str> = self
            .jobs
            .iter()
            .filter_map(|job| job.cycle_id.as_deref())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }
}
