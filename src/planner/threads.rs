//! Thread-count math
//!
//! Pure functions computing how many execution threads of each operation
//! move a target by a given delta. Soften is linear and has a closed form;
//! extract is a ratio of fractions; replenish has no closed form because
//! the environment's growth is multiplicative and capped, so it is solved
//! by fixed-point iteration with oscillation and non-termination guards.

use crate::domain::operation::BASE_SOFTEN_POTENCY;
use crate::domain::{OpKind, Target, Worker};
use crate::env::EffectModel;

/// Iteration cap for the replenish fixed-point solver
pub const MAX_REPLENISH_ITERATIONS: usize = 20;

/// Defense one soften thread removes when run on this worker
pub fn soften_potency(worker: &Worker) -> f64 {
    BASE_SOFTEN_POTENCY * worker.core_bonus()
}

/// Threads needed to soften a target from `start_defense` to `goal_defense`
/// on one worker. Closed form; zero when already at or below the goal.
pub fn soften_threads_for(start_defense: f64, goal_defense: f64, worker: &Worker) -> u32 {
    if start_defense <= goal_defense {
        return 0;
    }
    ((start_defense - goal_defense) / soften_potency(worker)).ceil() as u32
}

/// Threads needed to replenish a target from `start` to `goal`.
///
/// The environment's growth function is non-linear in the *ratio*
/// goal/(start + threads), and the threads we add change that ratio, so the
/// inversion is iterated to a fixed point. Two failure modes are guarded:
/// the iteration oscillating between two guesses (take the larger, the
/// smaller is provably insufficient) and failing to settle within the
/// iteration cap (take the max of the last three guesses).
pub fn replenish_threads_for(
    model: &dyn EffectModel,
    target: &Target,
    start: f64,
    goal: f64,
) -> u32 {
    let start = start.max(0.0);
    if start >= goal {
        return 0;
    }

    let mut guess: u64 = 1;
    let mut previous: u64 = 0;
    let mut previous2: u64 = 0;
    let mut iterations = 0;

    while guess != previous && iterations < MAX_REPLENISH_ITERATIONS {
        previous = guess;
        let ratio = goal / (start + guess as f64);
        guess = if ratio > 1.0 {
            model
                .replenish_threads_for_ratio(target, ratio)
                .ceil()
                .max(1.0) as u64
        } else {
            // Adding the current guess alone already covers the gap
            1
        };
        if guess == previous2 {
            return guess.max(previous) as u32;
        }
        previous2 = previous;
        iterations += 1;
    }

    if iterations >= MAX_REPLENISH_ITERATIONS {
        return guess.max(previous).max(previous2) as u32;
    }
    guess as u32
}

/// Threads for one extract job: the target's desired extraction fraction
/// over the per-thread fraction. At least one thread whenever extraction is
/// possible at all; zero when the model says a thread extracts nothing.
pub fn extract_threads_for(model: &dyn EffectModel, target: &Target) -> u32 {
    let per_thread = model.extract_fraction_per_thread(target);
    if per_thread <= 0.0 {
        return 0;
    }
    ((target.extract_fraction / per_thread).floor() as u32).max(1)
}

/// Soften threads that exactly cancel the hardening caused by `threads`
/// of `kind`
pub fn compensation_soften_threads(kind: OpKind, threads: u32) -> u32 {
    (threads as f64 * kind.hardening() / BASE_SOFTEN_POTENCY).ceil() as u32
}

/// Replenish threads that regrow what `extract_threads` will drain
pub fn compensation_replenish_threads(
    model: &dyn EffectModel,
    target: &Target,
    extract_threads: u32,
) -> u32 {
    let drained =
        extract_threads as f64 * model.extract_fraction_per_thread(target) * target.resource_ceiling;
    let start = target.resource - drained;
    replenish_threads_for(model, target, start, target.resource_ceiling)
}
