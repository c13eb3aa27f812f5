use crate::grid::{Grid, Position};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Exploring,
    ReachedGoal,
    Stuck,
}

/// Single explorer of the colony.
///
/// The path is simple within an iteration: cells already visited are tracked
/// in a bitset sized to the grid and never entered twice.
#[derive(Debug, Clone)]
pub struct Ant {
    pos: Position,
    path: Vec<Position>,
    path_cost: f64,
    visited: Vec<bool>,
    cols: usize,
    outcome: Outcome,
}

impl Ant {
    pub fn new(grid: &Grid) -> Self {
        let mut ant = Self {
            pos: grid.start(),
            path: Vec::new(),
            path_cost: 0.0,
            visited: vec![false; grid.n_cells()],
            cols: grid.cols(),
            outcome: Outcome::Exploring,
        };
        ant.reset(grid.start());
        ant
    }

    pub fn pos(&self) -> Position {
        self.pos
    }

    pub fn path(&self) -> &[Position] {
        &self.path
    }

    pub fn path_cost(&self) -> f64 {
        self.path_cost
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn is_exploring(&self) -> bool {
        self.outcome == Outcome::Exploring
    }

    pub fn has_visited(&self, pos: Position) -> bool {
        self.visited
            .get(pos.row * self.cols + pos.col)
            .copied()
            .unwrap_or(false)
    }

    /// Step onto `pos`; the move only happens while exploring.
    pub fn move_to(&mut self, pos: Position, cost: f64, end: Position) {
        if !self.is_exploring() {
            return;
        }
        self.pos = pos;
        self.path.push(pos);
        self.path_cost += cost;
        self.mark_visited(pos);
        if pos == end {
            self.outcome = Outcome::ReachedGoal;
        }
    }

    pub fn mark_stuck(&mut self) {
        if self.is_exploring() {
            self.outcome = Outcome::Stuck;
        }
    }

    pub fn reset(&mut self, start: Position) {
        self.pos = start;
        self.path.clear();
        self.path.push(start);
        self.path_cost = 0.0;
        self.visited.fill(false);
        self.mark_visited(start);
        self.outcome = Outcome::Exploring;
    }

    fn mark_visited(&mut self, pos: Position) {
        if let Some(flag) = self.visited.get_mut(pos.row * self.cols + pos.col) {
            *flag = true;
        }
    }
}
