//! Extract-fraction tuning
//!
//! The fraction a cycle extracts trades per-cycle profit against cycle
//! cost: a fatter fraction needs more threads, so fewer cycles fit the
//! pool. The driver re-tunes an optimal target before attacking by
//! sampling a grid of candidate fractions and keeping the one with the
//! best profit per second.

use serde::{Deserialize, Serialize};

use crate::domain::{OpDurations, Target, Worker};
use crate::env::EffectModel;
use crate::planner::capacity::CapacityLedger;
use crate::planner::{PlanConfig, TimingConfig, assembler};

/// Grid of candidate extraction fractions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningConfig {
    pub min_fraction: f64,
    pub max_fraction: f64,
    pub fraction_step: f64,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            min_fraction: 0.01,
            max_fraction: 0.95,
            fraction_step: 0.01,
        }
    }
}

/// Wall-clock span of a batch of `cycles` chained cycles, in milliseconds.
///
/// The first cycle takes a full soften plus the three landing gaps behind
/// it; every further cycle only adds its spacing and gaps because it
/// overlaps the ones already in flight.
pub fn total_batch_time(durations: &OpDurations, timing: &TimingConfig, cycles: u32) -> i64 {
    if cycles == 0 {
        return 0;
    }
    let first = durations.soften_ms + 3 * timing.job_delay_ms;
    let sequential = timing.cycle_spacing_ms + 3 * timing.job_delay_ms;
    first + (cycles as i64 - 1) * sequential
}

/// Sweep the fraction grid and return the fraction with the highest
/// profit per second for this target against this pool.
///
/// Planning-only: nothing is reserved, the ledger is read for
/// availability. The sweep recomputes the full cycle cost per candidate,
/// which is the expensive part.
pub fn optimal_extract_fraction(
    model: &dyn EffectModel,
    target: &Target,
    workers: &[Worker],
    ledger: &CapacityLedger,
    plan: &PlanConfig,
    tuning: &TuningConfig,
) -> f64 {
    let mut candidate = target.clone();
    let mut best_fraction = tuning.min_fraction;
    let mut best_rate = -1.0_f64;

    let steps = ((tuning.max_fraction - tuning.min_fraction) / tuning.fraction_step).round() as u32;
    for step in 0..=steps {
        let fraction = tuning.min_fraction + step as f64 * tuning.fraction_step;
        candidate.extract_fraction = fraction;

        let cycles =
            assembler::compute_cycles(model, &candidate, workers, ledger, plan.max_cycles_per_batch);
        if cycles == 0 {
            continue;
        }

        let profit = candidate.resource_ceiling * fraction * cycles as f64;
        let span_ms = total_batch_time(&model.durations(&candidate), &plan.timing, cycles);
        if span_ms <= 0 {
            continue;
        }
        let rate = profit / span_ms as f64;
        if rate > best_rate {
            best_rate = rate;
            best_fraction = fraction;
        }
    }

    best_fraction
}
