//! Reapr - a batch extraction scheduler for remote resource nodes
//!
//! Reapr drives a fleet of capacity-constrained workers against remote
//! targets: soften a target's defenses, replenish its resource pool, then
//! run pipelined extraction cycles whose jobs land in a strict order.

pub mod config;
pub mod daemon;
pub mod domain;
pub mod env;
pub mod error;
pub mod id;
pub mod planner;
pub mod storage;

pub use error::{ReaprError, Result};
