//! Error types for Reapr
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in Reapr
#[derive(Debug, Error)]
pub enum ReaprError {
    /// Target not found in the registry
    #[error("Target not found: {0}")]
    TargetNotFound(String),

    /// Worker not found in the registry
    #[error("Worker not found: {0}")]
    WorkerNotFound(String),

    /// Invalid state transition or operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A job was constructed with no threads or no spread
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    /// The soften operation must be the slowest; scheduling on broken
    /// durations would land jobs out of order
    #[error("Misordered durations: {0}")]
    MisorderedDurations(String),

    /// The assembler reached packaging without start/end anchors
    #[error("Missing timing anchor: {0}")]
    MissingTimings(String),

    /// The worker pool cannot fit the requested thread count
    #[error("Insufficient capacity: requested {requested:.2} units, available {available:.2}")]
    InsufficientCapacity { requested: f64, available: f64 },

    /// Reservation bookkeeping error
    #[error("Reservation error: {0}")]
    Reservation(String),

    /// Storage/persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Reapr operations
pub type Result<T> = std::result::Result<T, ReaprError>;
