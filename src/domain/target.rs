//! Target records
//!
//! A target is a remote node the scheduler extracts from. Static properties
//! never change at runtime; the resource and defense levels drift in the
//! host environment and are resampled from the registry before every
//! planning decision.

use serde::{Deserialize, Serialize};

/// Scheduling state of a target.
///
/// A target owns at most one active batch; the status tracks which kind.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    /// No batch in flight
    #[default]
    Idle,
    /// A prep batch is driving the target toward its optimal state
    Prepping,
    /// Attack cycles are extracting from the target
    Targeting,
}

impl TargetStatus {
    /// Whether the target currently has a batch in flight
    pub fn is_busy(&self) -> bool {
        !matches!(self, TargetStatus::Idle)
    }
}

/// A remote node with a depletable resource level and a hardening defense level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    /// Host name, the target's identity
    pub host: String,

    /// Defense cannot be softened below this floor
    pub defense_floor: f64,

    /// Resource cannot be replenished above this ceiling
    pub resource_ceiling: f64,

    /// Number of access gates on the node
    pub gates: u32,

    /// Static discovery difficulty, feeds the effect model
    pub base_difficulty: f64,

    /// Current resource level (sampled)
    pub resource: f64,

    /// Current defense level (sampled)
    pub defense: f64,

    /// Scheduling state machine
    pub status: TargetStatus,

    /// Fraction of the resource ceiling one attack cycle extracts; tuned by
    /// the driver for profit per second
    pub extract_fraction: f64,
}

impl Target {
    /// Create a target at its worst state: empty resource, hardened defense
    pub fn new(host: &str, defense_floor: f64, resource_ceiling: f64) -> Self {
        Self {
            host: host.to_string(),
            defense_floor,
            resource_ceiling,
            gates: 0,
            base_difficulty: defense_floor,
            resource: 0.0,
            defense: defense_floor,
            status: TargetStatus::Idle,
            extract_fraction: 0.1,
        }
    }

    /// Whether defense still sits above the floor
    pub fn needs_soften(&self) -> bool {
        self.defense > self.defense_floor
    }

    /// Whether the resource pool still sits below the ceiling
    pub fn needs_replenish(&self) -> bool {
        self.resource < self.resource_ceiling
    }

    /// A target is optimal when defense rests on the floor and the resource
    /// pool is full; only then are attack cycles worthwhile
    pub fn is_optimal(&self) -> bool {
        !self.needs_soften() && !self.needs_replenish()
    }

    /// Planning priority: richer and easier targets first
    pub fn score(&self) -> f64 {
        if self.base_difficulty <= 0.0 {
            return self.resource_ceiling;
        }
        self.resource_ceiling / self.base_difficulty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_default_is_idle() {
        assert_eq!(TargetStatus::default(), TargetStatus::Idle);
        assert!(!TargetStatus::Idle.is_busy());
        assert!(TargetStatus::Prepping.is_busy());
        assert!(TargetStatus::Targeting.is_busy());
    }

    #[test]
    fn test_new_target_is_not_optimal() {
        let target = Target::new("node-1", 5.0, 1000.0);
        assert!(!target.is_optimal());
        assert!(target.needs_replenish());
        assert!(!target.needs_soften());
    }

    #[test]
    fn test_optimal_at_floor_and_ceiling() {
        let mut target = Target::new("node-1", 5.0, 1000.0);
        target.resource = 1000.0;
        target.defense = 5.0;
        assert!(target.is_optimal());
    }

    #[test]
    fn test_needs_soften_above_floor() {
        let mut target = Target::new("node-1", 5.0, 1000.0);
        target.defense = 7.5;
        assert!(target.needs_soften());
    }

    #[test]
    fn test_score_prefers_rich_easy_targets() {
        let mut rich = Target::new("rich", 5.0, 10_000.0);
        rich.base_difficulty = 10.0;
        let mut poor = Target::new("poor", 5.0, 1_000.0);
        poor.base_difficulty = 10.0;
        assert!(rich.score() > poor.score());

        let mut hard = Target::new("hard", 5.0, 10_000.0);
        hard.base_difficulty = 100.0;
        assert!(rich.score() > hard.score());
    }

    #[test]
    fn test_target_serialization_roundtrip() {
        let mut target = Target::new("node-1", 5.0, 1000.0);
        target.status = TargetStatus::Prepping;
        let json = serde_json::to_string(&target).expect("serialize");
        let back: Target = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.host, "node-1");
        assert_eq!(back.status, TargetStatus::Prepping);
    }
}
