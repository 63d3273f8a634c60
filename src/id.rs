//! ID generation utilities for Reapr
//!
//! Provides the epoch-millisecond clock and unique identifiers for batches,
//! cycles, and jobs. All scheduling arithmetic runs on integer milliseconds.

use rand::Rng;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Generate a unique batch ID
///
/// Format: `batch-{timestamp_ms}-{random_hex}`
pub fn generate_batch_id() -> String {
    let timestamp = now_ms();
    let random: u16 = rand::rng().random();
    format!("batch-{}-{:04x}", timestamp, random)
}

/// Generate a unique cycle ID
///
/// Format: `cycle-{timestamp_ms}-{random_hex}`
pub fn generate_cycle_id() -> String {
    let timestamp = now_ms();
    let random: u16 = rand::rng().random();
    format!("cycle-{}-{:04x}", timestamp, random)
}

/// Generate a job ID scoped to its batch
///
/// Format: `job-{batch_suffix}-{random_hex}`
pub fn generate_job_id(batch_id: &str) -> String {
    let batch_suffix = batch_id.split('-').next_back().unwrap_or(batch_id);
    let random: u16 = rand::rng().random();
    format!("job-{}-{:04x}", batch_suffix, random)
}
