//! Operation kinds and their per-thread constants
//!
//! Three operations move a target's levels: extract drains the resource,
//! soften lowers the defense, replenish raises the resource. Extract and
//! replenish both harden the defense as a side effect; soften is the only
//! way back down.

use serde::{Deserialize, Serialize};

/// Base defense reduction of one soften thread, before the worker core bonus
pub const BASE_SOFTEN_POTENCY: f64 = 0.05;

/// Defense added per extract thread
pub const EXTRACT_HARDENING: f64 = 0.002;

/// Defense added per replenish thread
pub const REPLENISH_HARDENING: f64 = 0.004;

/// The three operation kinds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    /// Drain a fraction of the target's resource
    Extract,
    /// Lower the target's defense level
    Soften,
    /// Raise the target's resource level
    Replenish,
}

impl OpKind {
    /// Capacity units consumed by a single thread of this operation
    pub fn unit_cost(&self) -> f64 {
        match self {
            OpKind::Extract => 1.7,
            OpKind::Soften => 1.75,
            OpKind::Replenish => 1.75,
        }
    }

    /// Defense added per thread as a side effect of running this operation
    pub fn hardening(&self) -> f64 {
        match self {
            OpKind::Extract => EXTRACT_HARDENING,
            OpKind::Replenish => REPLENISH_HARDENING,
            OpKind::Soften => 0.0,
        }
    }

    /// Human-readable operation name
    pub fn name(&self) -> &'static str {
        match self {
            OpKind::Extract => "extract",
            OpKind::Soften => "soften",
            OpKind::Replenish => "replenish",
        }
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Durations of the three operations against one target, in milliseconds.
///
/// Durations depend on the target's current difficulty, not on thread
/// counts; the scheduler treats them as exogenous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpDurations {
    pub extract_ms: i64,
    pub soften_ms: i64,
    pub replenish_ms: i64,
}

impl OpDurations {
    /// Duration of one operation kind
    pub fn for_kind(&self, kind: OpKind) -> i64 {
        match kind {
            OpKind::Extract => self.extract_ms,
            OpKind::Soften => self.soften_ms,
            OpKind::Replenish => self.replenish_ms,
        }
    }

    /// Whether soften is the slowest operation, the precondition for every
    /// timing layout
    pub fn soften_is_slowest(&self) -> bool {
        self.extract_ms <= self.soften_ms && self.replenish_ms <= self.soften_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_cost_positive() {
        assert!(OpKind::Extract.unit_cost() > 0.0);
        assert!(OpKind::Soften.unit_cost() > 0.0);
        assert!(OpKind::Replenish.unit_cost() > 0.0);
    }

    #[test]
    fn test_soften_does_not_harden() {
        assert_eq!(OpKind::Soften.hardening(), 0.0);
        assert!(OpKind::Extract.hardening() > 0.0);
        assert!(OpKind::Replenish.hardening() > 0.0);
    }

    #[test]
    fn test_replenish_hardens_more_than_extract() {
        assert!(OpKind::Replenish.hardening() > OpKind::Extract.hardening());
    }

    #[test]
    fn test_display_names() {
        assert_eq!(OpKind::Extract.to_string(), "extract");
        assert_eq!(OpKind::Soften.to_string(), "soften");
        assert_eq!(OpKind::Replenish.to_string(), "replenish");
    }

    #[test]
    fn test_durations_for_kind() {
        let d = OpDurations {
            extract_ms: 1000,
            soften_ms: 4000,
            replenish_ms: 3200,
        };
        assert_eq!(d.for_kind(OpKind::Extract), 1000);
        assert_eq!(d.for_kind(OpKind::Soften), 4000);
        assert_eq!(d.for_kind(OpKind::Replenish), 3200);
    }

    #[test]
    fn test_soften_is_slowest() {
        let ok = OpDurations {
            extract_ms: 1000,
            soften_ms: 4000,
            replenish_ms: 3200,
        };
        assert!(ok.soften_is_slowest());

        let broken = OpDurations {
            extract_ms: 5000,
            soften_ms: 4000,
            replenish_ms: 3200,
        };
        assert!(!broken.soften_is_slowest());
    }

    #[test]
    fn test_op_kind_serialization() {
        let json = serde_json::to_string(&OpKind::Replenish).expect("serialize");
        assert_eq!(json, "\"replenish\"");
        let back: OpKind = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, OpKind::Replenish);
    }
}
