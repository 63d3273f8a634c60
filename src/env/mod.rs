//! External collaborator contracts
//!
//! The scheduler plans against snapshots and hands finished plans to an
//! external executor; these traits are that boundary. Registry snapshots
//! may be stale relative to the live environment and are treated as
//! advisory. Everything is injected into the driver explicitly - there are
//! no global accessors.

pub mod sim;

use crate::domain::{Batch, OpDurations, Target, TargetStatus, Worker, WorkerPurpose};
use crate::error::Result;

pub use sim::SimEnvironment;

/// Externally-assigned process handle for one launched slice of a job
pub type Pid = u32;

/// Read/write access to the target registry
pub trait TargetRegistry {
    /// Snapshot of every known target
    fn targets(&self) -> Vec<Target>;

    /// Drive the target's scheduling state machine
    fn set_status(&self, host: &str, status: TargetStatus) -> Result<()>;

    /// Persist a tuned extraction fraction
    fn set_extract_fraction(&self, host: &str, fraction: f64) -> Result<()>;
}

/// Read access to the worker registry
pub trait WorkerRegistry {
    /// Snapshot of workers, optionally filtered by purpose
    fn workers(&self, purpose: Option<WorkerPurpose>) -> Vec<Worker>;
}

/// Hands fully-timed batches to the execution environment
pub trait Dispatcher {
    /// Launch every job in the batch on its assigned workers at/after its
    /// start time, recording process handles back onto the jobs
    fn launch(&self, batch: &mut Batch) -> Result<()>;

    /// Force-terminate one process handle; false when the kill failed
    fn kill(&self, pid: Pid) -> bool;
}

/// The completion tracker's one primitive: a job is finished iff none of
/// its recorded handles appear in this list
pub trait ProcessRegistry {
    fn running_processes(&self) -> Vec<Pid>;
}

/// The environment's opaque level-change formulas.
///
/// The scheduler never models how operation counts convert to level deltas
/// beyond the linear soften potency; these come from the host.
pub trait EffectModel {
    /// Threads needed to multiply a target's resource by `ratio`; non-linear
    /// and capped in the host, so only usable through fixed-point iteration
    fn replenish_threads_for_ratio(&self, target: &Target, ratio: f64) -> f64;

    /// Fraction of the resource ceiling one extract thread drains, clamped
    /// to [0, 1]; a function of defense, difficulty and skill
    fn extract_fraction_per_thread(&self, target: &Target) -> f64;

    /// Current per-operation durations against this target
    fn durations(&self, target: &Target) -> OpDurations;
}
