//! In-memory simulation of the execution environment
//!
//! Implements every collaborator trait against shared in-memory state: a
//! target map, a worker map, and a live process table. The daemon's demo
//! mode runs against it, and the integration tests drive completion by
//! retiring pids by hand.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use crate::domain::{Batch, OpDurations, Target, TargetStatus, Worker, WorkerPurpose};
use crate::env::{Dispatcher, EffectModel, Pid, ProcessRegistry, TargetRegistry, WorkerRegistry};
use crate::error::{ReaprError, Result};

#[derive(Debug, Default)]
struct SimState {
    targets: BTreeMap<String, Target>,
    workers: BTreeMap<String, Worker>,
    running: BTreeSet<Pid>,
    next_pid: Pid,
}

/// Shared in-memory environment implementing all collaborator traits
#[derive(Debug, Default)]
pub struct SimEnvironment {
    state: Mutex<SimState>,
}

impl SimEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a target
    pub fn add_target(&self, target: Target) {
        let mut state = self.state.lock().expect("sim state poisoned");
        state.targets.insert(target.host.clone(), target);
    }

    /// Register a worker
    pub fn add_worker(&self, worker: Worker) {
        let mut state = self.state.lock().expect("sim state poisoned");
        state.workers.insert(worker.name.clone(), worker);
    }

    /// Current copy of one target, if known
    pub fn target(&self, host: &str) -> Option<Target> {
        let state = self.state.lock().expect("sim state poisoned");
        state.targets.get(host).cloned()
    }

    /// Overwrite a target's sampled levels
    pub fn set_levels(&self, host: &str, resource: f64, defense: f64) -> Result<()> {
        let mut state = self.state.lock().expect("sim state poisoned");
        let target = state
            .targets
            .get_mut(host)
            .ok_or_else(|| ReaprError::TargetNotFound(host.to_string()))?;
        target.resource = resource;
        target.defense = defense;
        Ok(())
    }

    /// Retire one process handle, as if the operation finished
    pub fn finish_pid(&self, pid: Pid) {
        let mut state = self.state.lock().expect("sim state poisoned");
        state.running.remove(&pid);
    }

    /// Retire every live process handle
    pub fn finish_all(&self) {
        let mut state = self.state.lock().expect("sim state poisoned");
        state.running.clear();
    }

    /// Number of live process handles
    pub fn running_count(&self) -> usize {
        let state = self.state.lock().expect("sim state poisoned");
        state.running.len()
    }
}

impl TargetRegistry for SimEnvironment {
    fn targets(&self) -> Vec<Target> {
        let state = self.state.lock().expect("sim state poisoned");
        state.targets.values().cloned().collect()
    }

    fn set_status(&self, host: &str, status: TargetStatus) -> Result<()> {
        let mut state = self.state.lock().expect("sim state poisoned");
        let target = state
            .targets
            .get_mut(host)
            .ok_or_else(|| ReaprError::TargetNotFound(host.to_string()))?;
        target.status = status;
        Ok(())
    }

    fn set_extract_fraction(&self, host: &str, fraction: f64) -> Result<()> {
        let mut state = self.state.lock().expect("sim state poisoned");
        let target = state
            .targets
            .get_mut(host)
            .ok_or_else(|| ReaprError::TargetNotFound(host.to_string()))?;
        target.extract_fraction = fraction;
        Ok(())
    }
}

impl WorkerRegistry for SimEnvironment {
    fn workers(&self, purpose: Option<WorkerPurpose>) -> Vec<Worker> {
        let state = self.state.lock().expect("sim state poisoned");
        state
            .workers
            .values()
            .filter(|worker| purpose.is_none_or(|p| worker.purpose == p))
            .cloned()
            .collect()
    }
}

impl Dispatcher for SimEnvironment {
    fn launch(&self, batch: &mut Batch) -> Result<()> {
        let mut state = self.state.lock().expect("sim state poisoned");
        for job in &mut batch.jobs {
            for worker in job.spread.keys() {
                if !state.workers.contains_key(worker) {
                    return Err(ReaprError::WorkerNotFound(worker.clone()));
                }
                state.next_pid += 1;
                let pid = state.next_pid;
                state.running.insert(pid);
                job.pids.push(pid);
            }
        }
        Ok(())
    }

    fn kill(&self, pid: Pid) -> bool {
        let mut state = self.state.lock().expect("sim state poisoned");
        state.running.remove(&pid)
    }
}

impl ProcessRegistry for SimEnvironment {
    fn running_processes(&self) -> Vec<Pid> {
        let state = self.state.lock().expect("sim state poisoned");
        state.running.iter().copied().collect()
    }
}

impl EffectModel for SimEnvironment {
    fn replenish_threads_for_ratio(&self, target: &Target, ratio: f64) -> f64 {
        // Logarithmic growth inversion: harder and more defended targets
        // grow slower per thread
        let base = 1.0 + 0.03 / target.base_difficulty.max(1.0);
        let penalty = 1.0 + target.defense * 0.01;
        (ratio.max(1.0).ln() / base.ln()) * penalty
    }

    fn extract_fraction_per_thread(&self, target: &Target) -> f64 {
        let defended = ((100.0 - target.defense) / 100.0).max(0.0);
        (defended / (target.base_difficulty.max(1.0) * 24.0)).clamp(0.0, 1.0)
    }

    fn durations(&self, target: &Target) -> OpDurations {
        let soften_ms = (2000.0 + target.defense * 80.0) as i64;
        OpDurations {
            extract_ms: soften_ms / 4,
            soften_ms,
            replenish_ms: soften_ms * 4 / 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OpKind;
    use std::collections::BTreeMap;

    fn sim_with_target() -> SimEnvironment {
        let sim = SimEnvironment::new();
        sim.add_target(Target::new("node-1", 5.0, 1000.0));
        sim.add_worker(Worker::new("w1", 64.0, WorkerPurpose::Prep));
        sim
    }

    #[test]
    fn test_registry_snapshot() {
        let sim = sim_with_target();
        let targets = sim.targets();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].host, "node-1");
    }

    #[test]
    fn test_set_status_roundtrip() {
        let sim = sim_with_target();
        sim.set_status("node-1", TargetStatus::Prepping).expect("status");
        assert_eq!(sim.target("node-1").expect("target").status, TargetStatus::Prepping);
    }

    #[test]
    fn test_set_status_unknown_target() {
        let sim = sim_with_target();
        let err = sim.set_status("nope", TargetStatus::Idle).unwrap_err();
        assert!(matches!(err, ReaprError::TargetNotFound(_)));
    }

    #[test]
    fn test_worker_purpose_filter() {
        let sim = sim_with_target();
        sim.add_worker(Worker::new("w2", 32.0, WorkerPurpose::Extract));
        assert_eq!(sim.workers(None).len(), 2);
        assert_eq!(sim.workers(Some(WorkerPurpose::Prep)).len(), 1);
        assert_eq!(sim.workers(Some(WorkerPurpose::Extract)).len(), 1);
    }

    #[test]
    fn test_launch_assigns_pids_per_spread_entry() {
        let sim = sim_with_target();
        sim.add_worker(Worker::new("w2", 32.0, WorkerPurpose::Prep));

        let spread: BTreeMap<String, u32> =
            [("w1".to_string(), 2), ("w2".to_string(), 3)].into_iter().collect();
        let job = crate::domain::Job::new(
            "batch-1", None, "node-1", OpKind::Soften, spread, 0, 100, true,
        )
        .expect("job");
        let mut batch = Batch::new("batch-1", "node-1", vec![job]).expect("batch");

        sim.launch(&mut batch).expect("launch");
        assert_eq!(batch.jobs[0].pids.len(), 2);
        assert_eq!(sim.running_count(), 2);
    }

    #[test]
    fn test_launch_unknown_worker_fails() {
        let sim = sim_with_target();
        let spread: BTreeMap<String, u32> = [("ghost".to_string(), 1)].into_iter().collect();
        let job = crate::domain::Job::new(
            "batch-1", None, "node-1", OpKind::Soften, spread, 0, 100, true,
        )
        .expect("job");
        let mut batch = Batch::new("batch-1", "node-1", vec![job]).expect("batch");
        assert!(sim.launch(&mut batch).is_err());
    }

    #[test]
    fn test_kill_reports_liveness() {
        let sim = sim_with_target();
        let spread: BTreeMap<String, u32> = [("w1".to_string(), 1)].into_iter().collect();
        let job = crate::domain::Job::new(
            "batch-1", None, "node-1", OpKind::Soften, spread, 0, 100, true,
        )
        .expect("job");
        let mut batch = Batch::new("batch-1", "node-1", vec![job]).expect("batch");
        sim.launch(&mut batch).expect("launch");

        let pid = batch.jobs[0].pids[0];
        assert!(sim.kill(pid));
        // Second kill finds nothing to terminate
        assert!(!sim.kill(pid));
    }

    #[test]
    fn test_finish_pid_removes_from_running() {
        let sim = sim_with_target();
        let spread: BTreeMap<String, u32> = [("w1".to_string(), 1)].into_iter().collect();
        let job = crate::domain::Job::new(
            "batch-1", None, "node-1", OpKind::Soften, spread, 0, 100, true,
        )
        .expect("job");
        let mut batch = Batch::new("batch-1", "node-1", vec![job]).expect("batch");
        sim.launch(&mut batch).expect("launch");

        sim.finish_pid(batch.jobs[0].pids[0]);
        assert_eq!(sim.running_count(), 0);
        assert!(sim.running_processes().is_empty());
    }

    #[test]
    fn test_model_durations_keep_soften_slowest() {
        let sim = sim_with_target();
        let target = sim.target("node-1").expect("target");
        let durations = sim.durations(&target);
        assert!(durations.soften_is_slowest());
    }

    #[test]
    fn test_model_extract_fraction_clamped() {
        let sim = sim_with_target();
        let mut target = sim.target("node-1").expect("target");
        target.defense = 250.0; // Hypothetical over-hardened node
        let fraction = sim.extract_fraction_per_thread(&target);
        assert!((0.0..=1.0).contains(&fraction));
    }

    #[test]
    fn test_model_replenish_threads_monotonic_in_ratio() {
        let sim = sim_with_target();
        let target = sim.target("node-1").expect("target");
        let low = sim.replenish_threads_for_ratio(&target, 1.5);
        let high = sim.replenish_threads_for_ratio(&target, 3.0);
        assert!(high > low);
    }
}
