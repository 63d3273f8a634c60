//! Timing engine
//!
//! Lays out absolute start/end timestamps for a group of operations so
//! their completions land in the required order with a fixed inter-job
//! delay. End times are the policy anchors; start times always follow by
//! subtracting the exogenous duration, never the other way around.

use serde::{Deserialize, Serialize};

use crate::domain::OpDurations;
use crate::error::{ReaprError, Result};

/// Delays shaping every timing layout, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Head start before the first job of a cold-started group may begin
    pub initial_delay_ms: i64,
    /// Gap between adjacent landings within a group
    pub job_delay_ms: i64,
    /// Extra gap between chained cycles
    pub cycle_spacing_ms: i64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 3000,
            job_delay_ms: 1000,
            cycle_spacing_ms: 3000,
        }
    }
}

/// One job's absolute schedule window (Unix ms)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: i64,
    pub end: i64,
}

impl Window {
    /// Anchor the end, derive the start from the duration
    fn ending_at(end: i64, duration_ms: i64) -> Self {
        Self { start: end - duration_ms, end }
    }

    /// Anchor the start, derive the end from the duration
    fn starting_at(start: i64, duration_ms: i64) -> Self {
        Self { start, end: start + duration_ms }
    }
}

/// Windows for the four jobs of one attack cycle, in landing order
#[derive(Debug, Clone, Copy)]
pub struct CycleTimings {
    pub extract: Window,
    pub soften1: Window,
    pub replenish: Window,
    pub soften2: Window,
}

fn check_soften_slowest(durations: &OpDurations) -> Result<()> {
    if !durations.soften_is_slowest() {
        return Err(ReaprError::MisorderedDurations(format!(
            "extract {}ms / replenish {}ms exceed soften {}ms",
            durations.extract_ms, durations.replenish_ms, durations.soften_ms
        )));
    }
    Ok(())
}

/// Lay out one cycle's windows.
///
/// Cold start (no previous cycle): the first soften anchors the group at
/// `now + initial_delay + soften_ms`; the extract lands one delay before
/// it, the replenish one delay after, the second soften two delays after.
///
/// Pipelined: the next extract lands one delay plus the cycle spacing
/// after the previous cycle's last soften, and the same relative offsets
/// follow. Many cycles interleave in flight without any cycle's own
/// landing order breaking.
pub fn cycle_timings(
    durations: &OpDurations,
    now: i64,
    previous_tail: Option<i64>,
    cfg: &TimingConfig,
) -> Result<CycleTimings> {
    check_soften_slowest(durations)?;
    let delay = cfg.job_delay_ms;

    let (extract, soften1) = match previous_tail {
        Some(tail) => {
            let extract = Window::ending_at(tail + delay + cfg.cycle_spacing_ms, durations.extract_ms);
            let soften1 = Window::ending_at(extract.end + delay, durations.soften_ms);
            (extract, soften1)
        }
        None => {
            let soften1 =
                Window::starting_at(now + cfg.initial_delay_ms, durations.soften_ms);
            let extract = Window::ending_at(soften1.end - delay, durations.extract_ms);
            (extract, soften1)
        }
    };

    let replenish = Window::ending_at(soften1.end + delay, durations.replenish_ms);
    let soften2 = Window::ending_at(soften1.end + 2 * delay, durations.soften_ms);

    Ok(CycleTimings { extract, soften1, replenish, soften2 })
}

/// Lay out a prep batch's replenish and compensating soften so the
/// replenish lands one delay before the soften that cancels its hardening.
///
/// Which of the two anchors the pair depends on whether the replenish (plus
/// the landing gap) outlasts the soften; anchoring the wrong one would push
/// a start before `first_start`.
pub fn prep_timings(
    durations: &OpDurations,
    first_start: i64,
    cfg: &TimingConfig,
) -> Result<(Window, Window)> {
    check_soften_slowest(durations)?;
    let delay = cfg.job_delay_ms;

    if durations.replenish_ms + delay > durations.soften_ms {
        let replenish = Window::starting_at(first_start, durations.replenish_ms);
        let soften = Window::ending_at(replenish.end + delay, durations.soften_ms);
        Ok((replenish, soften))
    } else {
        let soften = Window::starting_at(first_start, durations.soften_ms);
        let replenish = Window::ending_at(soften.end - delay, durations.replenish_ms);
        Ok((replenish, soften))
    }
}
