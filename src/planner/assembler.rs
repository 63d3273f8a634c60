//! Cycle/batch assembler
//!
//! Combines the thread math, the capacity ledger and the timing engine
//! into dispatchable batches: a prep batch that drives a target to its
//! optimal state, or a run of chained attack cycles for steady-state
//! extraction. Insufficient capacity is never an error here - the
//! assembler builds a smaller batch or none at all and the driver simply
//! retries next tick.

use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::{Batch, Cycle, Job, OpKind, Target, Worker};
use crate::env::EffectModel;
use crate::error::{ReaprError, Result};
use crate::id::{generate_batch_id, generate_cycle_id};
use crate::planner::capacity::CapacityLedger;
use crate::planner::timing::{self, CycleTimings};
use crate::planner::{PlanConfig, threads};

/// Thread counts for the four jobs of one attack cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleThreads {
    pub extract: u32,
    pub soften1: u32,
    pub replenish: u32,
    pub soften2: u32,
}

impl CycleThreads {
    /// Threads across all four jobs
    pub fn total(&self) -> u32 {
        self.extract + self.soften1 + self.replenish + self.soften2
    }
}

/// Per-cycle thread counts for a target at its current extract fraction.
///
/// Each compensating job exactly cancels what the job before it does to
/// the defense or resource level, so a full cycle is level-neutral.
pub fn cycle_threads(model: &dyn EffectModel, target: &Target) -> CycleThreads {
    let extract = threads::extract_threads_for(model, target);
    let soften1 = threads::compensation_soften_threads(OpKind::Extract, extract);
    let replenish = threads::compensation_replenish_threads(model, target, extract);
    let soften2 = threads::compensation_soften_threads(OpKind::Replenish, replenish);
    CycleThreads { extract, soften1, replenish, soften2 }
}

/// Capacity units one whole cycle occupies
pub fn cycle_cost(counts: &CycleThreads) -> f64 {
    counts.extract as f64 * OpKind::Extract.unit_cost()
        + (counts.soften1 + counts.soften2) as f64 * OpKind::Soften.unit_cost()
        + counts.replenish as f64 * OpKind::Replenish.unit_cost()
}

/// How many whole cycles the pool affords right now, capped
pub fn compute_cycles(
    model: &dyn EffectModel,
    target: &Target,
    workers: &[Worker],
    ledger: &CapacityLedger,
    max_cycles: u32,
) -> u32 {
    let counts = cycle_threads(model, target);
    if counts.extract == 0 {
        return 0;
    }
    let cost = cycle_cost(&counts);
    let afforded: u32 = workers
        .iter()
        .map(|worker| (ledger.available(worker) / cost).floor() as u32)
        .sum();
    afforded.min(max_cycles)
}

/// Assemble a prep batch bringing the target toward floor defense and
/// ceiling resource.
///
/// Returns `Ok(None)` when the target is already optimal or nothing can be
/// scheduled with the capacity at hand. Every job built here reserves its
/// capacity in the ledger before the function returns.
pub fn assemble_prep_batch(
    model: &dyn EffectModel,
    target: &Target,
    workers: &[Worker],
    ledger: &mut CapacityLedger,
    cfg: &PlanConfig,
    now: i64,
) -> Result<Option<Batch>> {
    if target.is_optimal() {
        return Ok(None);
    }
    if ledger.max_threads(workers, OpKind::Soften.unit_cost()) == 0 {
        debug!(target = %target.host, "skipped a prep, no capacity available");
        return Ok(None);
    }

    let durations = model.durations(target);
    let batch_id = generate_batch_id();
    let delay = cfg.timing.job_delay_ms;

    let mut jobs: Vec<Job> = Vec::new();
    let mut window_start: Option<i64> = None;
    let mut window_end: Option<i64> = None;
    let mut initial_soften_end: Option<i64> = None;

    if target.needs_soften() {
        let spread = allocate_soften_spread(target, workers, ledger);
        if !spread.is_empty() {
            let start = now + cfg.timing.initial_delay_ms;
            let end = start + durations.soften_ms;
            let job = Job::new(&batch_id, None, &target.host, OpKind::Soften, spread, start, end, true)?;
            ledger.reserve_job(&job);
            initial_soften_end = Some(job.end);
            window_start = Some(job.start);
            window_end = Some(job.end);
            jobs.push(job);
        }
    }

    if target.needs_replenish() {
        let needed_replenish =
            threads::replenish_threads_for(model, target, target.resource, target.resource_ceiling);
        if needed_replenish > 0 {
            let needed_soften =
                threads::compensation_soften_threads(OpKind::Replenish, needed_replenish);

            // Thread-denominated budget, floors applied per worker so the
            // spread below is guaranteed to fit what we admit here
            let budget = ledger.max_threads(workers, OpKind::Soften.unit_cost());
            let wanted = needed_replenish + needed_soften;

            let (replenish_count, soften_count) = if wanted <= budget {
                (needed_replenish, needed_soften)
            } else {
                // Scale both down together; shrinking only one side would
                // end the prep with a harder target than it started with
                let scale = budget as f64 / wanted as f64;
                (
                    (needed_replenish as f64 * scale).floor() as u32,
                    (needed_soften as f64 * scale).floor() as u32,
                )
            };

            if replenish_count > 0 && soften_count > 0 {
                let first_start = initial_soften_end
                    .map(|end| end + delay)
                    .unwrap_or(now + cfg.timing.initial_delay_ms);
                let (replenish_window, soften_window) =
                    timing::prep_timings(&durations, first_start, &cfg.timing)?;

                let replenish_spread =
                    ledger.spread_threads(workers, OpKind::Replenish.unit_cost(), replenish_count)?;
                let replenish_job = Job::new(
                    &batch_id,
                    None,
                    &target.host,
                    OpKind::Replenish,
                    replenish_spread,
                    replenish_window.start,
                    replenish_window.end,
                    true,
                )?;
                ledger.reserve_job(&replenish_job);
                jobs.push(replenish_job);

                let soften_spread =
                    ledger.spread_threads(workers, OpKind::Soften.unit_cost(), soften_count)?;
                let soften_job = Job::new(
                    &batch_id,
                    None,
                    &target.host,
                    OpKind::Soften,
                    soften_spread,
                    soften_window.start,
                    soften_window.end,
                    true,
                )?;
                ledger.reserve_job(&soften_job);
                jobs.push(soften_job);

                window_start = Some(window_start.unwrap_or(first_start).min(replenish_window.start));
                window_end = Some(soften_window.end.max(replenish_window.end));
            }
        }
    }

    if jobs.is_empty() {
        return Ok(None);
    }
    if window_start.is_none() || window_end.is_none() {
        // Jobs without a window means the assembler itself is broken, not
        // the environment
        return Err(ReaprError::MissingTimings(format!(
            "prep batch {} for {} built {} jobs without a window",
            batch_id,
            target.host,
            jobs.len()
        )));
    }

    let batch = Batch::new(&batch_id, &target.host, jobs)?;
    Ok(Some(batch))
}

/// Greedy per-worker soften allocation: walk the pool from the most
/// available worker down, taking what fits until the estimated defense
/// reaches the floor or the pool is dry.
fn allocate_soften_spread(
    target: &Target,
    workers: &[Worker],
    ledger: &CapacityLedger,
) -> BTreeMap<String, u32> {
    let mut spread: BTreeMap<String, u32> = BTreeMap::new();
    let mut remaining = target.defense - target.defense_floor;

    for worker in ledger.by_available(workers) {
        if remaining <= 0.0 {
            break;
        }
        let fit = (ledger.available(worker) / OpKind::Soften.unit_cost()).floor() as u32;
        if fit == 0 {
            continue;
        }
        let needed =
            threads::soften_threads_for(target.defense_floor + remaining, target.defense_floor, worker);
        let take = fit.min(needed);
        if take == 0 {
            continue;
        }
        remaining -= take as f64 * threads::soften_potency(worker);
        spread.insert(worker.name.clone(), take);
    }
    spread
}

/// Assemble a batch of chained attack cycles.
///
/// Each cycle's four jobs stay on a single worker when that worker fits a
/// whole cycle, so reservations do not fragment; only when no worker fits
/// one cycle does a single cycle fall back to a multi-worker spread.
/// Returns `Ok(None)` when not even that fits.
pub fn assemble_attack_batch(
    model: &dyn EffectModel,
    target: &Target,
    workers: &[Worker],
    ledger: &mut CapacityLedger,
    cfg: &PlanConfig,
    now: i64,
) -> Result<Option<Batch>> {
    let counts = cycle_threads(model, target);
    if counts.extract == 0 {
        debug!(target = %target.host, "skipped an attack, nothing extractable");
        return Ok(None);
    }
    let cost = cycle_cost(&counts);
    let durations = model.durations(target);
    let batch_id = generate_batch_id();

    // Whole cycles per worker, biggest pool first, under the global cap
    let mut allocations: Vec<(String, u32)> = Vec::new();
    let mut total = 0u32;
    for worker in ledger.by_available(workers) {
        if total >= cfg.max_cycles_per_batch {
            break;
        }
        let fit = (ledger.available(worker) / cost).floor() as u32;
        if fit == 0 {
            continue;
        }
        let n = fit.min(cfg.max_cycles_per_batch - total);
        allocations.push((worker.name.clone(), n));
        total += n;
    }

    let mut cycles: Vec<Cycle> = Vec::new();
    let mut tail: Option<i64> = None;

    if total == 0 {
        match spread_single_cycle(target, workers, ledger, &counts, &durations, &batch_id, now, cfg)? {
            Some(cycle) => cycles.push(cycle),
            None => {
                debug!(target = %target.host, "skipped an attack, no capacity for one cycle");
                return Ok(None);
            }
        }
    } else {
        for (worker, n) in allocations {
            for _ in 0..n {
                let timings = timing::cycle_timings(&durations, now, tail, &cfg.timing)?;
                let cycle = build_pinned_cycle(target, &batch_id, &worker, &counts, &timings)?;
                for job in [&cycle.extract, &cycle.soften1, &cycle.replenish, &cycle.soften2] {
                    ledger.reserve_job(job);
                }
                tail = Some(cycle.tail_end());
                cycles.push(cycle);
            }
        }
    }

    let jobs: Vec<Job> = cycles.into_iter().flat_map(Cycle::into_jobs).collect();
    let batch = Batch::new(&batch_id, &target.host, jobs)?;
    Ok(Some(batch))
}

/// Build one cycle with all four jobs on a single worker
fn build_pinned_cycle(
    target: &Target,
    batch_id: &str,
    worker: &str,
    counts: &CycleThreads,
    timings: &CycleTimings,
) -> Result<Cycle> {
    let cycle_id = generate_cycle_id();
    let pin = |threads: u32| -> BTreeMap<String, u32> {
        [(worker.to_string(), threads)].into_iter().collect()
    };

    Ok(Cycle {
        extract: Job::new(
            batch_id,
            Some(&cycle_id),
            &target.host,
            OpKind::Extract,
            pin(counts.extract),
            timings.extract.start,
            timings.extract.end,
            false,
        )?,
        soften1: Job::new(
            batch_id,
            Some(&cycle_id),
            &target.host,
            OpKind::Soften,
            pin(counts.soften1),
            timings.soften1.start,
            timings.soften1.end,
            false,
        )?,
        replenish: Job::new(
            batch_id,
            Some(&cycle_id),
            &target.host,
            OpKind::Replenish,
            pin(counts.replenish),
            timings.replenish.start,
            timings.replenish.end,
            false,
        )?,
        soften2: Job::new(
            batch_id,
            Some(&cycle_id),
            &target.host,
            OpKind::Soften,
            pin(counts.soften2),
            timings.soften2.start,
            timings.soften2.end,
            false,
        )?,
        cycle_id,
    })
}

/// Fallback when no worker fits a whole cycle: one cycle with each job
/// spread across the pool. Rolls its reservations back and reports `None`
/// when even the spread does not fit.
#[allow(clippy::too_many_arguments)]
fn spread_single_cycle(
    target: &Target,
    workers: &[Worker],
    ledger: &mut CapacityLedger,
    counts: &CycleThreads,
    durations: &crate::domain::OpDurations,
    batch_id: &str,
    now: i64,
    cfg: &PlanConfig,
) -> Result<Option<Cycle>> {
    let timings = timing::cycle_timings(durations, now, None, &cfg.timing)?;
    let cycle_id = generate_cycle_id();

    let plan = [
        (OpKind::Extract, counts.extract, timings.extract),
        (OpKind::Soften, counts.soften1, timings.soften1),
        (OpKind::Replenish, counts.replenish, timings.replenish),
        (OpKind::Soften, counts.soften2, timings.soften2),
    ];

    let mut jobs: Vec<Job> = Vec::new();
    for (kind, threads, window) in plan {
        let spread = match ledger.spread_threads(workers, kind.unit_cost(), threads) {
            Ok(spread) => spread,
            Err(ReaprError::InsufficientCapacity { .. }) => {
                for job in &jobs {
                    ledger.release_job(job)?;
                }
                return Ok(None);
            }
            Err(err) => {
                for job in &jobs {
                    ledger.release_job(job)?;
                }
                return Err(err);
            }
        };
        let job = Job::new(
            batch_id,
            Some(&cycle_id),
            &target.host,
            kind,
            spread,
            window.start,
            window.end,
            false,
        )?;
        ledger.reserve_job(&job);
        jobs.push(job);
    }

    let mut jobs = jobs.into_iter();
    let (extract, soften1, replenish, soften2) = match
        (jobs.next(), jobs.next(), jobs.next(), jobs.next())
    {
        (Some(a), Some(b), Some(c), Some(d)) => (a, b, c, d),
        _ => {
            return Err(ReaprError::MissingTimings(format!(
                "spread cycle {} lost jobs during assembly",
                cycle_id
            )));
        }
    };

    Ok(Some(Cycle { cycle_id, extract, soften1, replenish, soften2 }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OpDurations, TargetStatus, WorkerPurpose};
    use crate::planner::TimingConfig;

    /// Flat test model: every extract thread drains 0.2% of the ceiling,
    /// replenish needs one thread per percent of growth
    struct FlatModel;

    impl EffectModel for FlatModel {
        fn replenish_threads_for_ratio(&self, _target: &Target, ratio: f64) -> f64 {
            (ratio - 1.0) * 100.0
        }

        fn extract_fraction_per_thread(&self, _target: &Target) -> f64 {
            0.002
        }

        fn durations(&self, _target: &Target) -> OpDurations {
            OpDurations { extract_ms: 1000, soften_ms: 4000, replenish_ms: 3200 }
        }
    }

    fn optimal_target() -> Target {
        let mut t = Target::new("node-1", 5.0, 1000.0);
        t.resource = 1000.0;
        t.defense = 5.0;
        t.extract_fraction = 0.1;
        t
    }

    fn prep_workers(capacity: f64, count: usize) -> Vec<Worker> {
        (0..count)
            .map(|i| Worker::new(&format!("prep-{i}"), capacity, WorkerPurpose::Prep))
            .collect()
    }

    fn plan_config() -> PlanConfig {
        PlanConfig { timing: TimingConfig::default(), max_cycles_per_batch: 50 }
    }

    #[test]
    fn test_cycle_threads_all_positive_for_optimal_target() {
        let counts = cycle_threads(&FlatModel, &optimal_target());
        assert_eq!(counts.extract, 50); // 0.1 / 0.002
        assert!(counts.soften1 >= 1);
        assert!(counts.replenish >= 1);
        assert!(counts.soften2 >= 1);
    }

    #[test]
    fn test_cycle_cost_matches_thread_counts() {
        let counts = CycleThreads { extract: 10, soften1: 2, replenish: 8, soften2: 1 };
        let expected = 10.0 * OpKind::Extract.unit_cost()
            + 3.0 * OpKind::Soften.unit_cost()
            + 8.0 * OpKind::Replenish.unit_cost();
        assert_eq!(cycle_cost(&counts), expected);
    }

    #[test]
    fn test_compute_cycles_sums_worker_floors() {
        let ledger = CapacityLedger::new();
        let target = optimal_target();
        let counts = cycle_threads(&FlatModel, &target);
        let cost = cycle_cost(&counts);

        // Two workers each fitting exactly two cycles
        let workers = vec![
            Worker::new("a", cost * 2.0 + 1.0, WorkerPurpose::Extract),
            Worker::new("b", cost * 2.0 + 1.0, WorkerPurpose::Extract),
        ];
        assert_eq!(compute_cycles(&FlatModel, &target, &workers, &ledger, 50), 4);
        assert_eq!(compute_cycles(&FlatModel, &target, &workers, &ledger, 3), 3);
    }

    #[test]
    fn test_prep_batch_noop_for_optimal_target() {
        let mut ledger = CapacityLedger::new();
        let workers = prep_workers(1024.0, 1);
        let batch =
            assemble_prep_batch(&FlatModel, &optimal_target(), &workers, &mut ledger, &plan_config(), 0)
                .expect("assemble");
        assert!(batch.is_none());
    }

    #[test]
    fn test_prep_batch_noop_without_capacity() {
        let mut ledger = CapacityLedger::new();
        let mut target = optimal_target();
        target.defense = 10.0;
        let workers = prep_workers(1.0, 1); // Below one soften thread
        let batch =
            assemble_prep_batch(&FlatModel, &target, &workers, &mut ledger, &plan_config(), 0)
                .expect("assemble");
        assert!(batch.is_none());
    }

    #[test]
    fn test_prep_batch_soften_only_reaches_floor() {
        let mut ledger = CapacityLedger::new();
        let mut target = optimal_target();
        target.defense = 7.5; // 2.5 over the floor: 50 threads at 0.05
        let workers = prep_workers(1024.0, 1);

        let batch =
            assemble_prep_batch(&FlatModel, &target, &workers, &mut ledger, &plan_config(), 0)
                .expect("assemble")
                .expect("batch");

        assert_eq!(batch.jobs.len(), 1);
        let job = &batch.jobs[0];
        assert_eq!(job.kind, OpKind::Soften);
        assert!(job.is_prep);

        // Within one thread-potency of the floor, no overshoot beyond one
        // thread's effect
        let applied = job.threads as f64 * 0.05;
        let over = target.defense - target.defense_floor;
        assert!(applied >= over);
        assert!(applied - over < 0.05 + 1e-9);
        assert_eq!(ledger.reserved("prep-0"), job.threads as f64 * OpKind::Soften.unit_cost());
    }

    #[test]
    fn test_prep_batch_soften_spreads_across_workers() {
        let mut ledger = CapacityLedger::new();
        let mut target = optimal_target();
        target.defense = 15.0; // 200 threads needed
        // Each worker fits 40 threads at 1.75
        let workers = prep_workers(70.0, 3);

        let batch =
            assemble_prep_batch(&FlatModel, &target, &workers, &mut ledger, &plan_config(), 0)
                .expect("assemble")
                .expect("batch");

        let job = &batch.jobs[0];
        assert_eq!(job.spread.len(), 3);
        assert_eq!(job.threads, 120); // Pool-limited, below the 200 needed
        for (name, threads) in &job.spread {
            assert!(*threads as f64 * OpKind::Soften.unit_cost() <= 70.0, "{name} overcommitted");
        }
    }

    #[test]
    fn test_prep_batch_replenish_carries_compensation() {
        let mut ledger = CapacityLedger::new();
        let mut target = optimal_target();
        target.resource = 400.0; // Needs growth, defense already at floor
        let workers = prep_workers(2048.0, 1);

        let batch =
            assemble_prep_batch(&FlatModel, &target, &workers, &mut ledger, &plan_config(), 0)
                .expect("assemble")
                .expect("batch");

        assert_eq!(batch.jobs.len(), 2);
        let replenish = batch.jobs.iter().find(|j| j.kind == OpKind::Replenish).expect("replenish");
        let soften = batch.jobs.iter().find(|j| j.kind == OpKind::Soften).expect("soften");

        // The soften exactly cancels the replenish hardening
        let expected = threads::compensation_soften_threads(OpKind::Replenish, replenish.threads);
        assert_eq!(soften.threads, expected);
        // Replenish lands one delay before the compensating soften
        assert_eq!(soften.end - replenish.end, 1000);
    }

    #[test]
    fn test_prep_batch_scales_both_jobs_together() {
        let mut ledger = CapacityLedger::new();
        let mut target = optimal_target();
        target.resource = 100.0; // Far from the ceiling

        let needed =
            threads::replenish_threads_for(&FlatModel, &target, target.resource, target.resource_ceiling);
        let needed_comp = threads::compensation_soften_threads(OpKind::Replenish, needed);

        // Capacity for roughly half of what the full prep wants
        let budget_threads = (needed + needed_comp) / 2;
        let workers = prep_workers(budget_threads as f64 * OpKind::Soften.unit_cost(), 1);

        let batch =
            assemble_prep_batch(&FlatModel, &target, &workers, &mut ledger, &plan_config(), 0)
                .expect("assemble")
                .expect("batch");

        let replenish = batch.jobs.iter().find(|j| j.kind == OpKind::Replenish).expect("replenish");
        let soften = batch.jobs.iter().find(|j| j.kind == OpKind::Soften).expect("soften");

        // Both shrank, in the same proportion (floor rounding aside), and
        // the pair still fits the pool
        assert!(replenish.threads < needed);
        assert!(soften.threads < needed_comp);
        assert!(replenish.threads + soften.threads <= budget_threads);
        let want_ratio = needed as f64 / needed_comp as f64;
        let got_ratio = replenish.threads as f64 / soften.threads as f64;
        assert!((want_ratio - got_ratio).abs() / want_ratio < 0.25);
    }

    #[test]
    fn test_attack_batch_noop_with_no_capacity() {
        let mut ledger = CapacityLedger::new();
        let target = optimal_target();
        let workers = vec![Worker::new("tiny", 1.0, WorkerPurpose::Extract)];
        let batch =
            assemble_attack_batch(&FlatModel, &target, &workers, &mut ledger, &plan_config(), 0)
                .expect("assemble");
        assert!(batch.is_none());
    }

    #[test]
    fn test_attack_batch_single_cycle_pinned_to_one_worker() {
        let mut ledger = CapacityLedger::new();
        let target = optimal_target();
        let counts = cycle_threads(&FlatModel, &target);
        let cost = cycle_cost(&counts);
        let workers = vec![Worker::new("solo", cost + 0.5, WorkerPurpose::Extract)];

        let batch =
            assemble_attack_batch(&FlatModel, &target, &workers, &mut ledger, &plan_config(), 0)
                .expect("assemble")
                .expect("batch");

        assert_eq!(batch.cycle_count(), 1);
        assert_eq!(batch.jobs.len(), 4);
        for job in &batch.jobs {
            assert_eq!(job.spread.len(), 1);
            assert!(job.spread.contains_key("solo"));
            assert!(!job.is_prep);
        }
    }

    #[test]
    fn test_attack_batch_respects_global_cycle_cap() {
        let mut ledger = CapacityLedger::new();
        let target = optimal_target();
        let counts = cycle_threads(&FlatModel, &target);
        let cost = cycle_cost(&counts);
        let workers = vec![Worker::new("big", cost * 100.0, WorkerPurpose::Extract)];

        let mut cfg = plan_config();
        cfg.max_cycles_per_batch = 3;

        let batch = assemble_attack_batch(&FlatModel, &target, &workers, &mut ledger, &cfg, 0)
            .expect("assemble")
            .expect("batch");
        assert_eq!(batch.cycle_count(), 3);
        assert_eq!(batch.jobs.len(), 12);
    }

    #[test]
    fn test_attack_batch_landing_order_within_each_cycle() {
        let mut ledger = CapacityLedger::new();
        let target = optimal_target();
        let counts = cycle_threads(&FlatModel, &target);
        let workers = vec![Worker::new("big", cycle_cost(&counts) * 4.0, WorkerPurpose::Extract)];

        let batch =
            assemble_attack_batch(&FlatModel, &target, &workers, &mut ledger, &plan_config(), 0)
                .expect("assemble")
                .expect("batch");

        let mut by_cycle: std::collections::HashMap<&str, Vec<&Job>> = Default::default();
        for job in &batch.jobs {
            by_cycle.entry(job.cycle_id.as_deref().expect("cycle id")).or_default().push(job);
        }
        for jobs in by_cycle.values() {
            let mut ends: Vec<i64> = jobs.iter().map(|j| j.end).collect();
            ends.sort_unstable();
            assert_eq!(ends[1] - ends[0], 1000);
            assert_eq!(ends[2] - ends[1], 1000);
            assert_eq!(ends[3] - ends[2], 1000);
        }
    }

    #[test]
    fn test_attack_batch_pipelines_chained_cycles() {
        let mut ledger = CapacityLedger::new();
        let target = optimal_target();
        let counts = cycle_threads(&FlatModel, &target);
        let workers = vec![Worker::new("big", cycle_cost(&counts) * 2.5, WorkerPurpose::Extract)];
        let cfg = plan_config();

        let batch = assemble_attack_batch(&FlatModel, &target, &workers, &mut ledger, &cfg, 0)
            .expect("assemble")
            .expect("batch");
        assert_eq!(batch.cycle_count(), 2);

        // Last landing of cycle one, first landing of cycle two
        let mut ends: Vec<i64> = batch.jobs.iter().map(|j| j.end).collect();
        ends.sort_unstable();
        let cycle1_tail = ends[3];
        let cycle2_extract =
            batch.jobs.iter().filter(|j| j.kind == OpKind::Extract).map(|j| j.end).max().expect("extract");
        assert_eq!(
            cycle2_extract,
            cycle1_tail + cfg.timing.job_delay_ms + cfg.timing.cycle_spacing_ms
        );
    }

    #[test]
    fn test_attack_batch_falls_back_to_spread_cycle() {
        let mut ledger = CapacityLedger::new();
        let target = optimal_target();
        let counts = cycle_threads(&FlatModel, &target);
        let cost = cycle_cost(&counts);

        // Neither worker fits a whole cycle; together they do
        let workers = vec![
            Worker::new("half-a", cost * 0.6, WorkerPurpose::Extract),
            Worker::new("half-b", cost * 0.6, WorkerPurpose::Extract),
        ];

        let batch =
            assemble_attack_batch(&FlatModel, &target, &workers, &mut ledger, &plan_config(), 0)
                .expect("assemble")
                .expect("batch");

        assert_eq!(batch.cycle_count(), 1);
        let spread_over: std::collections::BTreeSet<&String> =
            batch.jobs.iter().flat_map(|j| j.spread.keys()).collect();
        assert!(spread_over.len() > 1, "expected the cycle to span workers");
    }

    #[test]
    fn test_attack_batch_spread_fallback_rolls_back_on_failure() {
        let mut ledger = CapacityLedger::new();
        let target = optimal_target();
        let counts = cycle_threads(&FlatModel, &target);
        let cost = cycle_cost(&counts);

        // Not even the pooled capacity fits one cycle
        let workers = vec![
            Worker::new("half-a", cost * 0.3, WorkerPurpose::Extract),
            Worker::new("half-b", cost * 0.3, WorkerPurpose::Extract),
        ];

        let batch =
            assemble_attack_batch(&FlatModel, &target, &workers, &mut ledger, &plan_config(), 0)
                .expect("assemble");
        assert!(batch.is_none());
        assert_eq!(ledger.reserved("half-a"), 0.0);
        assert_eq!(ledger.reserved("half-b"), 0.0);
    }

    #[test]
    fn test_attack_batch_reserves_every_cycle() {
        let mut ledger = CapacityLedger::new();
        let target = optimal_target();
        let counts = cycle_threads(&FlatModel, &target);
        let cost = cycle_cost(&counts);
        let workers = vec![Worker::new("big", cost * 3.5, WorkerPurpose::Extract)];

        let batch =
            assemble_attack_batch(&FlatModel, &target, &workers, &mut ledger, &plan_config(), 0)
                .expect("assemble")
                .expect("batch");
        assert_eq!(batch.cycle_count(), 3);

        let reserved = ledger.reserved("big");
        let expected: f64 = batch.jobs.iter().map(|j| j.cost_on("big")).sum();
        assert!((reserved - expected).abs() < 0.05);
    }

    #[test]
    fn test_statuses_do_not_leak_into_assembly() {
        // The assembler plans purely from levels; the driver owns status
        let mut ledger = CapacityLedger::new();
        let mut target = optimal_target();
        target.status = TargetStatus::Targeting;
        let workers = prep_workers(1024.0, 1);
        let batch =
            assemble_prep_batch(&FlatModel, &target, &workers, &mut ledger, &plan_config(), 0)
                .expect("assemble");
        assert!(batch.is_none());
    }
}
