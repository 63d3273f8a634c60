//! Scheduling driver
//!
//! The per-target decision loop. Each tick reconciles in-flight jobs
//! against the environment's live process list, then plans targets one at
//! a time: a non-optimal idle target gets a prep batch, an optimal idle
//! target gets its extract fraction re-tuned and a run of attack cycles.
//! Planning is strictly sequential within a tick because every planning
//! call mutates the shared capacity ledger; two targets must never read
//! the same uncommitted availability.

pub mod tick;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::domain::{Batch, Target, TargetStatus, WorkerPurpose};
use crate::env::{Dispatcher, EffectModel, Pid, ProcessRegistry, TargetRegistry, WorkerRegistry};
use crate::error::{ReaprError, Result};
use crate::id::now_ms;
use crate::planner::{self, CapacityLedger, PlanConfig, TuningConfig};
use crate::storage::BatchLog;

pub use tick::TickStats;

/// Outcome of cancelling one batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CancelReport {
    /// Jobs newly marked finished by the cancellation
    pub jobs_cancelled: usize,
    /// Kills attempted against handles still alive at cancel time
    pub kills_attempted: usize,
    /// Kills the environment reported as failed
    pub kills_failed: usize,
}

/// The scheduling driver; owns the ledger and the live batch set
pub struct Daemon {
    targets: Arc<dyn TargetRegistry + Send + Sync>,
    workers: Arc<dyn WorkerRegistry + Send + Sync>,
    dispatcher: Arc<dyn Dispatcher + Send + Sync>,
    processes: Arc<dyn ProcessRegistry + Send + Sync>,
    model: Arc<dyn EffectModel + Send + Sync>,
    config: Config,
    plan_cfg: PlanConfig,
    tuning_cfg: TuningConfig,
    ledger: CapacityLedger,
    batches: BatchLog,
    stats: TickStats,
}

impl Daemon {
    /// Build a driver around explicit collaborators.
    ///
    /// Reservations are derived state: they are rebuilt here from the
    /// unfinished jobs of any batches a previous run left in the log, and
    /// target statuses are resynced to match.
    pub fn new(
        targets: Arc<dyn TargetRegistry + Send + Sync>,
        workers: Arc<dyn WorkerRegistry + Send + Sync>,
        dispatcher: Arc<dyn Dispatcher + Send + Sync>,
        processes: Arc<dyn ProcessRegistry + Send + Sync>,
        model: Arc<dyn EffectModel + Send + Sync>,
        config: Config,
        batches: BatchLog,
    ) -> Self {
        let mut ledger = CapacityLedger::new();
        for batch in batches.iter() {
            for job in batch.jobs.iter().filter(|job| !job.finished) {
                ledger.reserve_job(job);
            }
            let status = if batch.is_prep() {
                TargetStatus::Prepping
            } else {
                TargetStatus::Targeting
            };
            if let Err(err) = targets.set_status(&batch.target, status) {
                warn!(target = %batch.target, error = %err, "could not resync status for reloaded batch");
            }
        }

        let plan_cfg = config.plan_config();
        let tuning_cfg = config.tuning_config();
        Self {
            targets,
            workers,
            dispatcher,
            processes,
            model,
            config,
            plan_cfg,
            tuning_cfg,
            ledger,
            batches,
            stats: TickStats::new(),
        }
    }

    /// Build a driver around one object implementing every collaborator
    /// trait, e.g. the simulation environment
    pub fn with_environment<E>(env: Arc<E>, config: Config, batches: BatchLog) -> Self
    where
        E: TargetRegistry
            + WorkerRegistry
            + Dispatcher
            + ProcessRegistry
            + EffectModel
            + Send
            + Sync
            + 'static,
    {
        Self::new(
            env.clone(),
            env.clone(),
            env.clone(),
            env.clone(),
            env,
            config,
            batches,
        )
    }

    /// Session counters
    pub fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// The shadow reservation ledger
    pub fn ledger(&self) -> &CapacityLedger {
        &self.ledger
    }

    /// The live batch set
    pub fn batches(&self) -> &BatchLog {
        &self.batches
    }

    /// Ask the run loop to exit at the next tick boundary
    pub fn request_shutdown(&mut self) {
        self.stats.request_shutdown();
    }

    /// Run the driver loop until shutdown (or for `max_ticks` ticks).
    ///
    /// A failing tick is logged and the loop carries on; each tick is
    /// isolated.
    pub async fn run(&mut self, max_ticks: Option<u64>) -> Result<()> {
        let interval = Duration::from_millis(self.config.scheduler.tick_interval_ms);
        info!(interval_ms = self.config.scheduler.tick_interval_ms, "driver loop starting");

        loop {
            if self.stats.shutdown_requested {
                break;
            }
            if let Some(limit) = max_ticks
                && self.stats.tick_count >= limit
            {
                break;
            }
            if let Err(err) = self.tick(now_ms()) {
                error!(error = %err, "tick failed");
            }
            tokio::time::sleep(interval).await;
        }

        info!(ticks = self.stats.tick_count, "driver loop stopped");
        Ok(())
    }

    /// One scheduling tick: reconcile completions first so the capacity
    /// they release is plannable, then plan each idle target in turn
    pub fn tick(&mut self, now: i64) -> Result<()> {
        self.stats.tick();
        self.reconcile()?;
        self.plan(now);
        Ok(())
    }

    /// Reconcile in-flight jobs against the live process list. A job is
    /// finished iff every one of its recorded handles has vanished; a job
    /// that was never dispatched keeps its batch alive until someone
    /// force-cancels it.
    fn reconcile(&mut self) -> Result<()> {
        if self.batches.is_empty() {
            return Ok(());
        }
        let running: HashSet<Pid> = self.processes.running_processes().into_iter().collect();

        let mut finished_count = 0usize;
        for batch in self.batches.iter_mut() {
            for job in batch.jobs.iter_mut() {
                if job.finished || !job.is_dispatched() {
                    continue;
                }
                if job.pids.iter().any(|pid| running.contains(pid)) {
                    continue;
                }
                job.mark_finished();
                if let Err(err) = self.ledger.release_job(job) {
                    warn!(job = %job.id, error = %err, "reservation release mismatch");
                }
                debug!(job = %job.id, target = %job.target, kind = %job.kind, "job finished");
                finished_count += 1;
            }
        }

        if finished_count > 0 {
            self.stats.finished_jobs(finished_count);
            self.batches.save()?;
        }

        let retired = self.batches.take_finished()?;
        if !retired.is_empty() {
            self.stats.retired(retired.len());
            for batch in retired {
                if let Err(err) = self.targets.set_status(&batch.target, TargetStatus::Idle) {
                    warn!(target = %batch.target, error = %err, "could not release retired target");
                }
                info!(batch = %batch.batch_id, target = %batch.target, "batch complete");
            }
        }
        Ok(())
    }

    /// Visit targets in descending score order and plan the idle ones,
    /// bounded by the global busy-target cap. One target's planning
    /// failure never blocks the others.
    fn plan(&mut self, now: i64) {
        let mut targets = self.targets.targets();
        targets.sort_by(|a, b| {
            b.score()
                .total_cmp(&a.score())
                .then_with(|| a.host.cmp(&b.host))
        });

        let mut busy = targets.iter().filter(|t| t.status.is_busy()).count();
        for target in &targets {
            if busy >= self.config.scheduler.max_busy_targets {
                break;
            }
            if target.status.is_busy() || self.batches.batch_for_target(&target.host).is_some() {
                continue;
            }
            match self.plan_target(target, now) {
                Ok(true) => busy += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(target = %target.host, error = %err, "planning failed, retrying next tick");
                }
            }
        }
    }

    /// Plan one idle target; true when a batch was dispatched
    fn plan_target(&mut self, target: &Target, now: i64) -> Result<bool> {
        if !target.is_optimal() {
            let workers = self.workers.workers(Some(WorkerPurpose::Prep));
            let Some(batch) = planner::assemble_prep_batch(
                self.model.as_ref(),
                target,
                &workers,
                &mut self.ledger,
                &self.plan_cfg,
                now,
            )?
            else {
                return Ok(false);
            };
            self.register(batch, TargetStatus::Prepping)?;
            return Ok(true);
        }

        let workers = self.workers.workers(Some(WorkerPurpose::Extract));

        let mut tuned = target.clone();
        let best = planner::optimal_extract_fraction(
            self.model.as_ref(),
            target,
            &workers,
            &self.ledger,
            &self.plan_cfg,
            &self.tuning_cfg,
        );
        if (best - target.extract_fraction).abs() > f64::EPSILON {
            self.targets.set_extract_fraction(&target.host, best)?;
            info!(target = %target.host, fraction = best, "re-tuned extract fraction");
        }
        tuned.extract_fraction = best;

        let Some(batch) = planner::assemble_attack_batch(
            self.model.as_ref(),
            &tuned,
            &workers,
            &mut self.ledger,
            &self.plan_cfg,
            now,
        )?
        else {
            return Ok(false);
        };
        self.register(batch, TargetStatus::Targeting)?;
        Ok(true)
    }

    /// Dispatch a batch, flip the target's status, and record the batch
    /// in the live set
    fn register(&mut self, mut batch: Batch, status: TargetStatus) -> Result<()> {
        self.dispatcher.launch(&mut batch)?;
        self.targets.set_status(&batch.target, status)?;
        info!(
            batch = %batch.batch_id,
            target = %batch.target,
            jobs = batch.jobs.len(),
            status = ?status,
            "batch dispatched"
        );
        self.batches.add(batch)?;
        self.stats.started();
        Ok(())
    }

    /// Force-cancel one live batch: kill every handle still alive, mark
    /// every job finished, report per-kill outcomes. Kill failures are
    /// logged, not escalated - a stray operation may keep running.
    ///
    /// Reservations are deliberately not rolled back here; the shadow
    /// capacity stays claimed until the next restart rebuilds the ledger.
    pub fn cancel_batch(&mut self, batch_id: &str) -> Result<CancelReport> {
        let running: HashSet<Pid> = self.processes.running_processes().into_iter().collect();
        let mut report = CancelReport::default();

        {
            let Some(batch) = self.batches.get_mut(batch_id) else {
                return Err(ReaprError::InvalidState(format!("no live batch {batch_id}")));
            };
            for job in batch.jobs.iter_mut() {
                if job.finished {
                    continue;
                }
                for pid in &job.pids {
                    if !running.contains(pid) {
                        continue;
                    }
                    report.kills_attempted += 1;
                    if !self.dispatcher.kill(*pid) {
                        report.kills_failed += 1;
                    }
                }
                job.mark_finished();
                report.jobs_cancelled += 1;
            }
        }

        if report.kills_failed > 0 {
            warn!(
                batch = %batch_id,
                failed = report.kills_failed,
                "some kills failed, stray operations may keep running"
            );
        }
        self.batches.save()?;
        info!(batch = %batch_id, jobs = report.jobs_cancelled, "batch cancelled");
        Ok(report)
    }

    /// Cancel every live batch
    pub fn cancel_all(&mut self) -> Result<Vec<CancelReport>> {
        let ids: Vec<String> = self.batches.iter().map(|b| b.batch_id.clone()).collect();
        ids.iter().map(|id| self.cancel_batch(id)).collect()
    }
}
