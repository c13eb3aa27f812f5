//! Simulation output types.

use crate::colony::Stats;
use crate::grid::Position;
use serde::{Deserialize, Serialize};

/// Record of the colony at the end of one iteration.
///
/// Ant counts describe the iteration that just closed; pheromone levels and
/// the best path include its reinforcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Index of the closed iteration.
    pub iteration: usize,

    /// Ants that reached the end cell.
    pub n_ants_at_goal: usize,
    /// Ants in the colony.
    pub n_ants: usize,

    /// Best path cost so far, if any path was found.
    pub best_cost: Option<f64>,
    /// Number of cells on the best path (zero when there is none).
    pub best_path_len: usize,

    /// Largest pheromone level on the grid.
    pub max_pheromone: f64,
    /// Mean pheromone level on the grid.
    pub mean_pheromone: f64,

    /// Consecutive iterations without improvement.
    pub stagnation: usize,
    /// The colony converged at this iteration.
    pub converged: bool,
}

impl Record {
    /// Combine the stats taken right before and right after reinforcement.
    pub fn new(closed: &Stats, reinforced: &Stats) -> Self {
        Self {
            iteration: closed.iteration,
            n_ants_at_goal: closed.n_ants_at_goal,
            n_ants: closed.n_ants,
            best_cost: reinforced.best_cost,
            best_path_len: reinforced.best_path_len,
            max_pheromone: reinforced.max_pheromone,
            mean_pheromone: reinforced.mean_pheromone,
            stagnation: reinforced.stagnation,
            converged: reinforced.converged,
        }
    }

    /// Fraction of ants that reached the end cell, `None` for an empty colony.
    pub fn goal_ratio(&self) -> Option<f64> {
        (self.n_ants > 0).then(|| self.n_ants_at_goal as f64 / self.n_ants as f64)
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Seed of the run, if it was not seeded from the OS.
    pub seed: Option<u64>,
    /// The colony converged before the iteration limit.
    pub converged: bool,
    /// Number of completed iterations.
    pub n_iterations: usize,
    /// Cost of the best path found.
    pub best_cost: Option<f64>,
    /// Best path found, from start to end.
    pub best_path: Option<Vec<Position>>,
}
