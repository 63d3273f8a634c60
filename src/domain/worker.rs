//! Worker records
//!
//! A worker is an execution node with finite capacity. Total and used
//! capacity are reported by the environment; the scheduler's own
//! reserved-but-not-yet-running capacity lives in the capacity ledger, not
//! here, so a registry snapshot stays read-only.

use serde::{Deserialize, Serialize};

/// What a worker's capacity is earmarked for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum WorkerPurpose {
    /// Runs prep batches (soften/replenish)
    Prep,
    /// Runs attack cycles
    Extract,
}

/// An execution node with finite, fluctuating capacity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    /// Worker name, its identity
    pub name: String,

    /// Total execution capacity
    pub total_capacity: f64,

    /// Capacity the environment reports as running right now
    pub used_capacity: f64,

    /// Core count; extra cores beyond the first boost soften potency
    pub cores: u32,

    /// Which pool this worker serves
    pub purpose: WorkerPurpose,
}

impl Worker {
    /// Create a single-core worker
    pub fn new(name: &str, total_capacity: f64, purpose: WorkerPurpose) -> Self {
        Self {
            name: name.to_string(),
            total_capacity,
            used_capacity: 0.0,
            cores: 1,
            purpose,
        }
    }

    /// Capacity not reported as running, before reservations
    pub fn free_capacity(&self) -> f64 {
        (self.total_capacity - self.used_capacity).max(0.0)
    }

    /// Soften potency multiplier: diminishing return on cores beyond the first
    pub fn core_bonus(&self) -> f64 {
        1.0 + (self.cores.saturating_sub(1) as f64) / 16.0
    }
}
