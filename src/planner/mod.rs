//! Planning layer
//!
//! Pure scheduling machinery, split the way the work divides:
//! - threads: thread-count math per operation, including the fixed-point
//!   inversion of the environment's growth formula
//! - capacity: the reservation ledger and the greedy thread spreader
//! - timing: absolute start/end layout for cold-start and pipelined cycles
//! - assembler: combines the three into prep batches and attack batches
//! - tuning: extract-fraction grid search for profit per second

pub mod assembler;
pub mod capacity;
pub mod threads;
pub mod timing;
pub mod tuning;

pub use assembler::{
    CycleThreads, assemble_attack_batch, assemble_prep_batch, compute_cycles, cycle_cost,
    cycle_threads,
};
pub use capacity::CapacityLedger;
pub use timing::TimingConfig;
pub use tuning::{TuningConfig, optimal_extract_fraction, total_batch_time};

/// Knobs the assembler needs beyond the timing layout
#[derive(Debug, Clone)]
pub struct PlanConfig {
    /// Timing layout configuration
    pub timing: TimingConfig,
    /// Global cap on cycles in flight per attack batch
    pub max_cycles_per_batch: u32,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            timing: TimingConfig::default(),
            max_cycles_per_batch: 50,
        }
    }
}
