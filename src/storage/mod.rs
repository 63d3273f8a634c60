//! Persistence for the live batch set
//!
//! The in-flight batches (and through them the in-flight jobs) are the
//! only scheduler state that must survive a restart; registries belong to
//! the environment and everything else is derived.

pub mod batch_log;

pub use batch_log::BatchLog;
