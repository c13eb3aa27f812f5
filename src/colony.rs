use crate::ant::{Ant, Outcome};
use crate::grid::{Grid, Neighbor, Position};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use serde::{Deserialize, Serialize};

/// Offset added to the heuristic distance so the end cell stays finite.
const HEURISTIC_OFFSET: f64 = 0.1;

/// Colony parameters.
///
/// Every field has a default, so a partial `[colony]` table is valid.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColonyParams {
    /// Number of ants.
    pub n_ants: usize,
    /// Pheromone influence exponent.
    pub alpha: f64,
    /// Heuristic influence exponent.
    pub beta: f64,
    /// Fraction of pheromone lost per iteration, in `[0, 1)`.
    pub evaporation_rate: f64,
    /// Deposit constant; a successful ant lays `deposit / path_cost` per cell.
    pub deposit: f64,
    /// Pheromone level of every cell after a reset.
    pub initial_pheromone: f64,
    /// Iterations without improvement before the colony converges.
    pub convergence_threshold: usize,
}

impl Default for ColonyParams {
    fn default() -> Self {
        Self {
            n_ants: 30,
            alpha: 1.0,
            beta: 2.0,
            evaporation_rate: 0.1,
            deposit: 100.0,
            initial_pheromone: 0.1,
            convergence_threshold: 15,
        }
    }
}

/// Result of a single [`Colony::advance`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Advance {
    Moving,
    NewIteration,
    Converged,
}

/// Aggregate view of the colony at a given moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub iteration: usize,
    pub best_cost: Option<f64>,
    pub best_path_len: usize,
    pub n_ants_at_goal: usize,
    pub n_ants: usize,
    pub max_pheromone: f64,
    pub mean_pheromone: f64,
    pub stagnation: usize,
    pub converged: bool,
}

/// Ant colony bound to one grid.
///
/// Holds the grid, the ants, the best path found so far and the random
/// number generator driving the transition rule. The colony only moves
/// forward through [`Colony::advance`]; callers choose the pace.
pub struct Colony<R = ChaCha12Rng> {
    grid: Grid,
    params: ColonyParams,
    staged: ColonyParams,
    ants: Vec<Ant>,
    rng: R,

    iteration: usize,
    best_path: Option<Vec<Position>>,
    best_cost: Option<f64>,
    stagnation: usize,
    converged: bool,

    candidates: Vec<Neighbor>,
    weights: Vec<f64>,
}

impl<R: Rng> Colony<R> {
    /// Create a colony on `grid` and reset the grid's pheromone field.
    pub fn new(grid: Grid, params: ColonyParams, rng: R) -> Self {
        let mut colony = Self {
            grid,
            staged: params.clone(),
            params,
            ants: Vec::new(),
            rng,
            iteration: 0,
            best_path: None,
            best_cost: None,
            stagnation: 0,
            converged: false,
            candidates: Vec::with_capacity(8),
            weights: Vec::with_capacity(8),
        };
        colony.reset();
        colony
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Mutable access for obstacle and endpoint edits between advances.
    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    /// Parameters currently driving the colony.
    pub fn params(&self) -> &ColonyParams {
        &self.params
    }

    pub fn ants(&self) -> &[Ant] {
        &self.ants
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn best_path(&self) -> Option<&[Position]> {
        self.best_path.as_deref()
    }

    pub fn best_cost(&self) -> Option<f64> {
        self.best_cost
    }

    pub fn stagnation(&self) -> usize {
        self.stagnation
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    /// The next [`Colony::advance`] will run the reinforcement phase.
    pub fn iteration_finished(&self) -> bool {
        !self.converged && !self.ants.iter().any(Ant::is_exploring)
    }

    pub fn stats(&self) -> Stats {
        Stats {
            iteration: self.iteration,
            best_cost: self.best_cost,
            best_path_len: self.best_path.as_ref().map_or(0, Vec::len),
            n_ants_at_goal: self
                .ants
                .iter()
                .filter(|ant| ant.outcome() == Outcome::ReachedGoal)
                .count(),
            n_ants: self.ants.len(),
            max_pheromone: self.grid.max_pheromone(),
            mean_pheromone: self.grid.mean_pheromone(),
            stagnation: self.stagnation,
            converged: self.converged,
        }
    }

    pub fn set_alpha(&mut self, alpha: f64) {
        if alpha.is_finite() && alpha >= 0.0 {
            self.staged.alpha = alpha;
        }
    }

    pub fn set_beta(&mut self, beta: f64) {
        if beta.is_finite() && beta >= 0.0 {
            self.staged.beta = beta;
        }
    }

    /// Staged like the other setters, but rate, deposit and threshold are
    /// picked up by the very next reinforcement, while α, β and the population
    /// wait for the next iteration.
    pub fn set_evaporation_rate(&mut self, rate: f64) {
        if (0.0..1.0).contains(&rate) {
            self.staged.evaporation_rate = rate;
        }
    }

    pub fn set_deposit(&mut self, deposit: f64) {
        if deposit.is_finite() && deposit >= 0.0 {
            self.staged.deposit = deposit;
        }
    }

    pub fn set_n_ants(&mut self, n_ants: usize) {
        self.staged.n_ants = n_ants;
    }

    pub fn set_initial_pheromone(&mut self, initial: f64) {
        if initial.is_finite() && initial >= 0.0 {
            self.staged.initial_pheromone = initial;
        }
    }

    pub fn set_convergence_threshold(&mut self, threshold: usize) {
        if threshold > 0 {
            self.staged.convergence_threshold = threshold;
        }
    }

    /// Restart the search from scratch with the staged parameters.
    pub fn reset(&mut self) {
        self.params = self.staged.clone();
        self.grid.reset_pheromones(self.params.initial_pheromone);
        self.ants = (0..self.params.n_ants)
            .map(|_| Ant::new(&self.grid))
            .collect();
        self.iteration = 0;
        self.best_path = None;
        self.best_cost = None;
        self.stagnation = 0;
        self.converged = false;
    }

    /// Move every exploring ant by one cell, or close the iteration once all
    /// of them have finished.
    pub fn advance(&mut self) -> Advance {
        if self.converged {
            return Advance::Converged;
        }
        if self.ants.iter().any(Ant::is_exploring) {
            self.move_ants();
            return Advance::Moving;
        }
        self.reinforce()
    }

    fn move_ants(&mut self) {
        let end = self.grid.end();
        for ant in self.ants.iter_mut().filter(|ant| ant.is_exploring()) {
            self.candidates.clear();
            self.candidates.extend(
                self.grid
                    .neighbors(ant.pos())
                    .filter(|nbr| !ant.has_visited(nbr.pos)),
            );
            if self.candidates.is_empty() {
                ant.mark_stuck();
                continue;
            }

            self.weights.clear();
            self.weights.extend(self.candidates.iter().map(|nbr| {
                let pheromone = self.grid.pheromone(nbr.pos);
                let heuristic = 1.0 / (self.grid.heuristic(nbr.pos) + HEURISTIC_OFFSET);
                pheromone.powf(self.params.alpha) * heuristic.powf(self.params.beta)
            }));

            let i_next = select_candidate(&self.weights, &mut self.rng);
            let next = self.candidates[i_next];
            ant.move_to(next.pos, next.cost, end);
        }
    }

    fn reinforce(&mut self) -> Advance {
        // Reinforcement constants take effect on the iteration being closed.
        self.params.evaporation_rate = self.staged.evaporation_rate;
        self.params.deposit = self.staged.deposit;
        self.params.convergence_threshold = self.staged.convergence_threshold;

        self.grid.evaporate(self.params.evaporation_rate);

        let mut improved = false;
        for ant in self.ants.iter() {
            if ant.outcome() != Outcome::ReachedGoal {
                continue;
            }
            let cost = ant.path_cost();
            let amount = self.params.deposit / cost;
            for &pos in ant.path() {
                self.grid.deposit(pos, amount);
            }
            if self.best_cost.is_none_or(|best| cost < best) {
                self.best_cost = Some(cost);
                self.best_path = Some(ant.path().to_vec());
                improved = true;
            }
        }

        if improved {
            self.stagnation = 0;
            log::debug!(
                "iteration {}: best cost improved to {:.3}",
                self.iteration,
                self.best_cost.unwrap_or(f64::NAN)
            );
        } else {
            self.stagnation += 1;
        }

        if self.stagnation >= self.params.convergence_threshold && self.best_path.is_some() {
            self.converged = true;
            log::debug!("converged after {} iterations", self.iteration + 1);
            return Advance::Converged;
        }

        self.start_iteration();
        Advance::NewIteration
    }

    fn start_iteration(&mut self) {
        let n_ants = self.staged.n_ants;
        self.params = ColonyParams {
            initial_pheromone: self.params.initial_pheromone,
            ..self.staged.clone()
        };
        if self.ants.len() != n_ants {
            self.ants = (0..n_ants).map(|_| Ant::new(&self.grid)).collect();
        }
        let start = self.grid.start();
        for ant in &mut self.ants {
            ant.reset(start);
        }
        self.iteration += 1;
    }
}

/// Roulette-wheel choice over `weights` using one uniform draw.
///
/// Candidates are scanned in order and the first non-zero one whose
/// cumulative share reaches the draw wins. An all-zero wheel falls back to a
/// uniform pick.
fn select_candidate<R: Rng>(weights: &[f64], rng: &mut R) -> usize {
    let total: f64 = weights.iter().sum();
    if total == 0.0 {
        return rng.random_range(0..weights.len());
    }

    let draw: f64 = rng.random();
    let mut cumulative = 0.0;
    for (i, &weight) in weights.iter().enumerate() {
        cumulative += weight / total;
        if weight > 0.0 && draw <= cumulative {
            return i;
        }
    }
    weights.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::PHEROMONE_FLOOR;
    use rand::RngCore;
    use std::f64::consts::SQRT_2;

    /// Random source whose every draw is zero.
    struct ZeroRng;

    impl RngCore for ZeroRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            dst.fill(0);
        }
    }

    /// Random source alternating zero draws and maximal draws.
    struct SeesawRng(bool);

    impl RngCore for SeesawRng {
        fn next_u32(&mut self) -> u32 {
            self.0 = !self.0;
            if self.0 { 0 } else { u32::MAX }
        }

        fn next_u64(&mut self) -> u64 {
            self.0 = !self.0;
            if self.0 { 0 } else { u64::MAX }
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            dst.fill(0);
        }
    }

    /// 3x3 grid with two mirror-image routes of equal cost from (0, 1) to
    /// (2, 1), around a blocked centre.
    fn twin_routes_grid() -> Grid {
        let mut grid = open_grid(3, Position::new(0, 1), Position::new(2, 1));
        for (row, col) in [(0, 0), (0, 2), (1, 1), (2, 0), (2, 2)] {
            grid.add_obstacle(Position::new(row, col));
        }
        grid
    }

    fn open_grid(size: usize, start: Position, end: Position) -> Grid {
        let mut grid = Grid::new(size, size, 0.1);
        grid.set_end(end);
        grid.set_start(start);
        grid
    }

    fn params(n_ants: usize) -> ColonyParams {
        ColonyParams {
            n_ants,
            alpha: 1.0,
            beta: 2.0,
            evaporation_rate: 0.1,
            deposit: 100.0,
            ..ColonyParams::default()
        }
    }

    fn seeded(grid: Grid, params: ColonyParams, seed: u64) -> Colony {
        Colony::new(grid, params, ChaCha12Rng::seed_from_u64(seed))
    }

    /// Drive the colony until the current iteration closes.
    fn finish_iteration<R: Rng>(colony: &mut Colony<R>) -> Advance {
        loop {
            match colony.advance() {
                Advance::Moving => continue,
                other => return other,
            }
        }
    }

    #[test]
    fn open_grid_converges_on_short_path() {
        let start = Position::new(0, 0);
        let end = Position::new(4, 4);
        let mut colony = seeded(open_grid(5, start, end), params(10), 7);

        let mut n_iterations = 0;
        while finish_iteration(&mut colony) == Advance::NewIteration {
            n_iterations += 1;
            assert!(n_iterations <= 30, "no convergence within 30 iterations");
        }

        assert!(colony.converged());
        let path = colony.best_path().expect("best path after convergence");
        assert_eq!(path.first(), Some(&start));
        assert_eq!(path.last(), Some(&end));
        assert!((5..=9).contains(&path.len()), "path length {}", path.len());
        assert_eq!(colony.advance(), Advance::Converged);
        assert_eq!(colony.advance(), Advance::Converged);
    }

    #[test]
    fn walled_off_goal_never_converges() {
        let mut grid = open_grid(5, Position::new(0, 0), Position::new(4, 4));
        grid.add_obstacle_line(Position::new(0, 2), Position::new(4, 2));
        let mut colony = seeded(grid, params(10), 3);

        for _ in 0..50 {
            while colony.advance() == Advance::Moving {
                if colony.iteration_finished() {
                    assert!(
                        colony
                            .ants()
                            .iter()
                            .all(|ant| ant.outcome() == Outcome::Stuck)
                    );
                }
            }
            assert!(!colony.converged());
            assert!(colony.best_path().is_none());
            assert!(colony.best_cost().is_none());
        }
        assert_eq!(colony.iteration(), 50);
    }

    #[test]
    fn zero_draw_picks_first_enumerated_candidate() {
        let grid = open_grid(5, Position::new(0, 0), Position::new(4, 4));
        let mut colony = Colony::new(grid, params(1), ZeroRng);

        while colony.ants()[0].is_exploring() {
            let ant = &colony.ants()[0];
            let expected = colony
                .grid()
                .neighbors(ant.pos())
                .find(|nbr| !ant.has_visited(nbr.pos));
            let before = ant.pos();

            assert_eq!(colony.advance(), Advance::Moving);

            let ant = &colony.ants()[0];
            match expected {
                Some(nbr) => assert_eq!(ant.pos(), nbr.pos),
                None => {
                    assert_eq!(ant.pos(), before);
                    assert_eq!(ant.outcome(), Outcome::Stuck);
                }
            }
        }
        assert_eq!(colony.ants()[0].path()[1], Position::new(0, 1));
    }

    #[test]
    fn paths_stay_simple_and_start_at_start() {
        let mut grid = open_grid(8, Position::new(1, 1), Position::new(6, 6));
        grid.add_obstacle_rect(Position::new(2, 3), Position::new(5, 4));
        let start = grid.start();
        let mut colony = seeded(grid, params(12), 11);

        for _ in 0..5 {
            while colony.advance() == Advance::Moving {
                for ant in colony.ants() {
                    let path = ant.path();
                    assert_eq!(path[0], start);
                    let mut cells = path.to_vec();
                    cells.sort_by_key(|pos| (pos.row, pos.col));
                    cells.dedup();
                    assert_eq!(cells.len(), path.len());
                }
            }
        }
    }

    #[test]
    fn best_cost_never_increases() {
        let mut grid = open_grid(10, Position::new(0, 0), Position::new(9, 7));
        grid.add_obstacle_line(Position::new(0, 4), Position::new(7, 4));
        let mut colony = seeded(grid, params(15), 5);

        let mut prev_best: Option<f64> = None;
        for _ in 0..40 {
            let outcome = finish_iteration(&mut colony);
            let best = colony.best_cost();
            if let Some(prev) = prev_best {
                let best = best.expect("best cost cannot disappear");
                assert!(best <= prev);
            }
            prev_best = best;
            assert!(
                colony
                    .grid()
                    .pheromones()
                    .iter()
                    .all(|&val| val >= PHEROMONE_FLOOR)
            );
            if outcome == Advance::Converged {
                break;
            }
        }
        assert!(prev_best.is_some());
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut colony = seeded(
            open_grid(5, Position::new(0, 0), Position::new(4, 4)),
            params(6),
            1,
        );
        for _ in 0..3 {
            finish_iteration(&mut colony);
        }
        assert!(colony.best_path().is_some());

        colony.set_initial_pheromone(0.3);
        colony.reset();

        let stats = colony.stats();
        assert_eq!(stats.iteration, 0);
        assert_eq!(stats.best_cost, None);
        assert_eq!(stats.best_path_len, 0);
        assert_eq!(stats.stagnation, 0);
        assert!(!stats.converged);
        assert!(colony.grid().pheromones().iter().all(|&val| val == 0.3));
        assert!(colony.ants().iter().all(Ant::is_exploring));
    }

    #[test]
    fn staged_parameters_apply_at_iteration_boundary() {
        let mut colony = seeded(
            open_grid(5, Position::new(0, 0), Position::new(4, 4)),
            params(4),
            9,
        );
        assert_eq!(colony.advance(), Advance::Moving);

        colony.set_n_ants(7);
        colony.set_alpha(2.5);
        colony.set_evaporation_rate(1.5);
        assert_eq!(colony.ants().len(), 4);
        assert_eq!(colony.params().alpha, 1.0);

        assert_eq!(finish_iteration(&mut colony), Advance::NewIteration);
        assert_eq!(colony.ants().len(), 7);
        assert_eq!(colony.params().alpha, 2.5);
        assert_eq!(colony.params().evaporation_rate, 0.1);
        assert!(colony.ants().iter().all(Ant::is_exploring));
    }

    #[test]
    fn evaporation_rate_change_applies_to_closing_reinforcement() {
        let mut grid = open_grid(6, Position::new(0, 0), Position::new(5, 5));
        grid.add_obstacle_line(Position::new(0, 2), Position::new(5, 2));
        let params = ColonyParams {
            initial_pheromone: 1.0,
            ..params(4)
        };
        let mut colony = seeded(grid, params, 6);
        assert_eq!(colony.advance(), Advance::Moving);

        colony.set_evaporation_rate(0.5);
        assert_eq!(colony.params().evaporation_rate, 0.1);

        assert_eq!(finish_iteration(&mut colony), Advance::NewIteration);
        assert_eq!(colony.params().evaporation_rate, 0.5);
        assert_eq!(colony.grid().pheromone(Position::new(5, 5)), 0.5);
    }

    #[test]
    fn equal_cost_keeps_first_best_path_and_counts_stagnation() {
        let mut colony = Colony::new(twin_routes_grid(), params(2), SeesawRng(false));
        let left = vec![
            Position::new(0, 1),
            Position::new(1, 0),
            Position::new(2, 1),
        ];

        assert_eq!(colony.advance(), Advance::Moving);
        assert_eq!(colony.ants()[0].pos(), Position::new(1, 0));
        assert_eq!(colony.ants()[1].pos(), Position::new(1, 2));

        assert_eq!(finish_iteration(&mut colony), Advance::NewIteration);
        assert_eq!(colony.best_path(), Some(left.as_slice()));
        assert_eq!(colony.best_cost(), Some(2.0 * SQRT_2));
        assert_eq!(colony.stagnation(), 0);

        assert_eq!(finish_iteration(&mut colony), Advance::NewIteration);
        assert_eq!(colony.best_path(), Some(left.as_slice()));
        assert_eq!(colony.stagnation(), 1);
        assert!(!colony.converged());
    }

    #[test]
    fn converges_once_stagnation_reaches_threshold() {
        let mut colony = Colony::new(twin_routes_grid(), params(1), ZeroRng);
        colony.set_convergence_threshold(2);

        assert_eq!(finish_iteration(&mut colony), Advance::NewIteration);
        assert_eq!(colony.stagnation(), 0);
        assert!(!colony.converged());

        assert_eq!(finish_iteration(&mut colony), Advance::NewIteration);
        assert_eq!(colony.stagnation(), 1);
        assert!(!colony.converged());

        assert_eq!(finish_iteration(&mut colony), Advance::Converged);
        assert_eq!(colony.stagnation(), 2);
        assert!(colony.converged());
        assert_eq!(colony.iteration(), 2);
        assert_eq!(colony.advance(), Advance::Converged);
    }

    #[test]
    fn empty_colony_iterates_without_converging() {
        let mut colony = seeded(
            open_grid(4, Position::new(0, 0), Position::new(3, 3)),
            params(0),
            2,
        );
        for i in 1..=40 {
            assert_eq!(colony.advance(), Advance::NewIteration);
            assert_eq!(colony.stagnation(), i);
        }
        assert!(!colony.converged());
        assert_eq!(colony.stats().n_ants, 0);
    }

    #[test]
    fn roulette_wheel_respects_cumulative_order() {
        let mut rng = ZeroRng;
        assert_eq!(select_candidate(&[0.0, 2.0, 1.0], &mut rng), 1);
        assert_eq!(select_candidate(&[3.0, 2.0, 1.0], &mut rng), 0);

        let mut rng = ChaCha12Rng::seed_from_u64(4);
        let mut hits = [0; 3];
        for _ in 0..200 {
            assert_eq!(select_candidate(&[0.0, 0.0, 1.0], &mut rng), 2);
            hits[select_candidate(&[0.0, 0.0, 0.0], &mut rng)] += 1;
        }
        assert!(hits.iter().all(|&n| n > 0), "uniform fallback hits {hits:?}");
    }
}
