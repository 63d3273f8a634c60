//! Domain types for Reapr
//!
//! This module contains all core domain types:
//! - Target: a remote node with a resource level and a defense level
//! - Worker: an execution node with finite capacity
//! - OpKind: the three operation types and their per-thread constants
//! - Job: one scheduled execution of one operation against one target
//! - Cycle: the four-job extract/soften/replenish/soften pattern
//! - Batch: the unit of registration and cancellation

pub mod batch;
pub mod job;
pub mod operation;
pub mod target;
pub mod worker;

pub use batch::Batch;
pub use job::{Cycle, Job};
pub use operation::{OpDurations, OpKind};
pub use target::{Target, TargetStatus};
pub use worker::{Worker, WorkerPurpose};
