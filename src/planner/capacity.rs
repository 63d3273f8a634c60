//! Capacity ledger
//!
//! The ledger shadows each worker's reserved-but-not-yet-finished capacity
//! so planning can run ahead of actual launches. It is the one piece of
//! shared mutable state in the scheduler; every mutation must land before
//! the next target's planning call reads availability, which is why the
//! driver plans targets strictly sequentially.

use std::collections::{BTreeMap, HashMap};

use crate::domain::{Job, Worker};
use crate::error::{ReaprError, Result};

/// Round a capacity amount to two decimals.
///
/// Reservations accumulate across thousands of increase/decrease pairs;
/// without a fixed precision the float drift eventually blocks legitimate
/// reservations.
pub fn round_capacity(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Shadow reservations per worker, keyed by worker name
#[derive(Debug, Clone, Default)]
pub struct CapacityLedger {
    reserved: HashMap<String, f64>,
}

impl CapacityLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capacity currently reserved on one worker
    pub fn reserved(&self, worker: &str) -> f64 {
        self.reserved.get(worker).copied().unwrap_or(0.0)
    }

    /// Capacity a worker can still take: total minus used minus reserved
    pub fn available(&self, worker: &Worker) -> f64 {
        (worker.free_capacity() - self.reserved(&worker.name)).max(0.0)
    }

    /// Reserve capacity on a worker
    pub fn increase_reservation(&mut self, worker: &str, amount: f64) {
        let amount = round_capacity(amount);
        let entry = self.reserved.entry(worker.to_string()).or_insert(0.0);
        *entry = round_capacity(*entry + amount);
    }

    /// Release previously reserved capacity; fails when more is released
    /// than was reserved
    pub fn decrease_reservation(&mut self, worker: &str, amount: f64) -> Result<()> {
        let amount = round_capacity(amount);
        let current = round_capacity(self.reserved(worker));
        if amount > current {
            return Err(ReaprError::Reservation(format!(
                "cannot release {:.2} on {}, only {:.2} reserved",
                amount, worker, current
            )));
        }
        self.reserved.insert(worker.to_string(), round_capacity(current - amount));
        Ok(())
    }

    /// Reserve the capacity a job's spread occupies on each worker
    pub fn reserve_job(&mut self, job: &Job) {
        for (worker, threads) in &job.spread {
            self.increase_reservation(worker, *threads as f64 * job.kind.unit_cost());
        }
    }

    /// Release the capacity a job's spread occupied on each worker
    pub fn release_job(&mut self, job: &Job) -> Result<()> {
        for (worker, threads) in &job.spread {
            self.decrease_reservation(worker, *threads as f64 * job.kind.unit_cost())?;
        }
        Ok(())
    }

    /// Workers ordered by descending availability, name-tiebroken so that
    /// identical snapshots always produce identical orderings
    pub fn by_available<'a>(&self, workers: &'a [Worker]) -> Vec<&'a Worker> {
        let mut sorted: Vec<&Worker> = workers.iter().collect();
        sorted.sort_by(|a, b| {
            self.available(b)
                .total_cmp(&self.available(a))
                .then_with(|| a.name.cmp(&b.name))
        });
        sorted
    }

    /// Greedily partition `total` threads across the pool, filling the most
    /// available worker first. Deterministic for a given snapshot. Fails
    /// with the aggregate shortfall when the pool cannot fit the request.
    pub fn spread_threads(
        &self,
        workers: &[Worker],
        per_thread_cost: f64,
        total: u32,
    ) -> Result<BTreeMap<String, u32>> {
        let mut spread: BTreeMap<String, u32> = BTreeMap::new();
        let mut left = total;

        for worker in self.by_available(workers) {
            if left == 0 {
                break;
            }
            let fit = (self.available(worker) / per_thread_cost).floor() as u32;
            if fit == 0 {
                continue;
            }
            let take = fit.min(left);
            spread.insert(worker.name.clone(), take);
            left -= take;
        }

        if left > 0 {
            let available: f64 = workers.iter().map(|w| self.available(w)).sum();
            return Err(ReaprError::InsufficientCapacity {
                requested: total as f64 * per_thread_cost,
                available,
            });
        }
        Ok(spread)
    }

    /// How many threads of the given cost the whole pool can still take
    pub fn max_threads(&self, workers: &[Worker], per_thread_cost: f64) -> u32 {
        workers
            .iter()
            .map(|worker| (self.available(worker) / per_thread_cost).floor() as u32)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OpKind, WorkerPurpose};

    fn worker(name: &str, total: f64) -> Worker {
        Worker::new(name, total, WorkerPurpose::Prep)
    }

    #[test]
    fn test_round_capacity() {
        assert_eq!(round_capacity(1.005), 1.0); // representation of 1.005 sits just below
        assert_eq!(round_capacity(1.006), 1.01);
        assert_eq!(round_capacity(3.399999999), 3.4);
    }

    #[test]
    fn test_reservation_roundtrip() {
        let mut ledger = CapacityLedger::new();
        ledger.increase_reservation("w1", 4.5);
        assert_eq!(ledger.reserved("w1"), 4.5);
        ledger.decrease_reservation("w1", 4.5).expect("release");
        assert_eq!(ledger.reserved("w1"), 0.0);
    }

    #[test]
    fn test_reservation_rounding_absorbs_drift() {
        let mut ledger = CapacityLedger::new();
        // Thousands of tiny increments that are not exactly representable
        for _ in 0..1000 {
            ledger.increase_reservation("w1", 0.01);
        }
        assert_eq!(ledger.reserved("w1"), 10.0);
        for _ in 0..1000 {
            ledger.decrease_reservation("w1", 0.01).expect("release");
        }
        assert_eq!(ledger.reserved("w1"), 0.0);
    }

    #[test]
    fn test_decrease_below_zero_fails() {
        let mut ledger = CapacityLedger::new();
        ledger.increase_reservation("w1", 2.0);
        let err = ledger.decrease_reservation("w1", 3.0).unwrap_err();
        assert!(matches!(err, ReaprError::Reservation(_)));
    }

    #[test]
    fn test_available_subtracts_reservation() {
        let mut ledger = CapacityLedger::new();
        let w = worker("w1", 16.0);
        assert_eq!(ledger.available(&w), 16.0);
        ledger.increase_reservation("w1", 10.0);
        assert_eq!(ledger.available(&w), 6.0);
        ledger.increase_reservation("w1", 10.0);
        assert_eq!(ledger.available(&w), 0.0);
    }

    #[test]
    fn test_spread_threads_fills_biggest_first() {
        let ledger = CapacityLedger::new();
        let workers = vec![worker("small", 4.0), worker("big", 16.0)];

        let spread = ledger.spread_threads(&workers, 2.0, 9).expect("spread");
        assert_eq!(spread.get("big"), Some(&8));
        assert_eq!(spread.get("small"), Some(&1));
    }

    #[test]
    fn test_spread_threads_deterministic_on_ties() {
        let ledger = CapacityLedger::new();
        let workers = vec![worker("b", 8.0), worker("a", 8.0), worker("c", 8.0)];

        let first = ledger.spread_threads(&workers, 2.0, 4).expect("spread");
        let second = ledger.spread_threads(&workers, 2.0, 4).expect("spread");
        assert_eq!(first, second);
        // Name breaks the tie: "a" fills before "b" and "c"
        assert_eq!(first.get("a"), Some(&4));
    }

    #[test]
    fn test_spread_threads_never_overcommits() {
        let mut ledger = CapacityLedger::new();
        let workers = vec![worker("w1", 10.0), worker("w2", 6.0)];
        ledger.increase_reservation("w1", 3.0);

        let spread = ledger.spread_threads(&workers, 2.0, 6).expect("spread");
        for (name, threads) in &spread {
            let w = workers.iter().find(|w| &w.name == name).expect("worker");
            assert!(*threads as f64 * 2.0 <= ledger.available(w));
        }
    }

    #[test]
    fn test_spread_threads_insufficient_capacity() {
        let ledger = CapacityLedger::new();
        let workers = vec![worker("w1", 4.0)];
        let err = ledger.spread_threads(&workers, 2.0, 5).unwrap_err();
        match err {
            ReaprError::InsufficientCapacity { requested, available } => {
                assert_eq!(requested, 10.0);
                assert_eq!(available, 4.0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_max_threads_floors_per_worker() {
        let ledger = CapacityLedger::new();
        let workers = vec![worker("w1", 5.0), worker("w2", 5.0)];
        // 2.0 per thread: each worker fits 2, the pool 4 - the two leftover
        // halves never combine
        assert_eq!(ledger.max_threads(&workers, 2.0), 4);
    }

    #[test]
    fn test_reserve_and_release_job() {
        use std::collections::BTreeMap;

        let mut ledger = CapacityLedger::new();
        let spread: BTreeMap<String, u32> =
            [("w1".to_string(), 2), ("w2".to_string(), 4)].into_iter().collect();
        let job = Job::new("batch-1", None, "node-1", OpKind::Soften, spread, 0, 100, true)
            .expect("job");

        ledger.reserve_job(&job);
        assert_eq!(ledger.reserved("w1"), round_capacity(2.0 * OpKind::Soften.unit_cost()));
        assert_eq!(ledger.reserved("w2"), round_capacity(4.0 * OpKind::Soften.unit_cost()));

        ledger.release_job(&job).expect("release");
        assert_eq!(ledger.reserved("w1"), 0.0);
        assert_eq!(ledger.reserved("w2"), 0.0);
    }
}
