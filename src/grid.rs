//! Grid environment: obstacle mask, pheromone field and endpoints.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Lowest value any pheromone cell can hold after evaporation.
pub const PHEROMONE_FLOOR: f64 = 0.01;

/// Cost of an orthogonal move.
pub const COST_STRAIGHT: f64 = 1.0;
/// Cost of a diagonal move.
pub const COST_DIAGONAL: f64 = std::f64::consts::SQRT_2;

/// Compass offsets in enumeration order (row-major, skipping the centre).
const OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Cell coordinates on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    fn offset(self, d_row: isize, d_col: isize) -> Option<Self> {
        Some(Self {
            row: self.row.checked_add_signed(d_row)?,
            col: self.col.checked_add_signed(d_col)?,
        })
    }
}

/// Passable cell adjacent to another one, with the cost of moving there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub pos: Position,
    pub cost: f64,
}

/// Rectangular grid the colony explores.
///
/// Invalid edits (out-of-bounds cells, obstructing an endpoint, moving an
/// endpoint onto an obstacle) are ignored rather than reported.
#[derive(Debug, Clone)]
pub struct Grid {
    rows: usize,
    cols: usize,
    obstacles: Vec<bool>,
    pheromones: Vec<f64>,
    start: Position,
    end: Position,
}

impl Grid {
    /// Create an obstacle-free grid with a uniform pheromone field.
    ///
    /// The start is placed at the top-left corner and the end at the
    /// bottom-right one; use [`Grid::set_start`] and [`Grid::set_end`] to
    /// move them. On a single-cell grid both endpoints share the one cell and
    /// no path can join them.
    pub fn new(rows: usize, cols: usize, initial_pheromone: f64) -> Self {
        let n_cells = rows * cols;
        Self {
            rows,
            cols,
            obstacles: vec![false; n_cells],
            pheromones: vec![initial_pheromone; n_cells],
            start: Position::new(0, 0),
            end: Position::new(rows.saturating_sub(1), cols.saturating_sub(1)),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn n_cells(&self) -> usize {
        self.rows * self.cols
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn end(&self) -> Position {
        self.end
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.row < self.rows && pos.col < self.cols
    }

    /// Flat index of an in-bounds position.
    pub fn index(&self, pos: Position) -> usize {
        pos.row * self.cols + pos.col
    }

    pub fn is_obstacle(&self, pos: Position) -> bool {
        self.in_bounds(pos) && self.obstacles[self.index(pos)]
    }

    pub fn is_passable(&self, pos: Position) -> bool {
        self.in_bounds(pos) && !self.obstacles[self.index(pos)]
    }

    /// Obstacle mask in row-major order.
    pub fn obstacles(&self) -> &[bool] {
        &self.obstacles
    }

    /// Pheromone field in row-major order.
    pub fn pheromones(&self) -> &[f64] {
        &self.pheromones
    }

    /// Pheromone level at `pos`, zero outside the grid.
    pub fn pheromone(&self, pos: Position) -> f64 {
        if self.in_bounds(pos) {
            self.pheromones[self.index(pos)]
        } else {
            0.0
        }
    }

    pub fn set_start(&mut self, pos: Position) {
        if self.is_passable(pos) && pos != self.end {
            self.start = pos;
        }
    }

    pub fn set_end(&mut self, pos: Position) {
        if self.is_passable(pos) && pos != self.start {
            self.end = pos;
        }
    }

    /// Move both endpoints at once, e.g. to swap them.
    pub fn set_endpoints(&mut self, start: Position, end: Position) {
        if self.is_passable(start) && self.is_passable(end) && start != end {
            self.start = start;
            self.end = end;
        }
    }

    pub fn add_obstacle(&mut self, pos: Position) {
        if self.in_bounds(pos) && pos != self.start && pos != self.end {
            let idx = self.index(pos);
            self.obstacles[idx] = true;
        }
    }

    pub fn remove_obstacle(&mut self, pos: Position) {
        if self.in_bounds(pos) {
            let idx = self.index(pos);
            self.obstacles[idx] = false;
        }
    }

    pub fn clear_obstacles(&mut self) {
        self.obstacles.fill(false);
    }

    /// Obstruct the rectangle spanned by two corners, both inclusive.
    pub fn add_obstacle_rect(&mut self, a: Position, b: Position) {
        for row in a.row.min(b.row)..=a.row.max(b.row) {
            for col in a.col.min(b.col)..=a.col.max(b.col) {
                self.add_obstacle(Position::new(row, col));
            }
        }
    }

    /// Obstruct the Bresenham line between two cells, both inclusive.
    pub fn add_obstacle_line(&mut self, a: Position, b: Position) {
        let (mut row, mut col) = (a.row as isize, a.col as isize);
        let (row_b, col_b) = (b.row as isize, b.col as isize);
        let d_row = (row_b - row).abs();
        let d_col = -(col_b - col).abs();
        let s_row = if row < row_b { 1 } else { -1 };
        let s_col = if col < col_b { 1 } else { -1 };
        let mut err = d_row + d_col;

        loop {
            self.add_obstacle(Position::new(row as usize, col as usize));
            if row == row_b && col == col_b {
                break;
            }
            let err_2 = 2 * err;
            if err_2 >= d_col {
                err += d_col;
                row += s_row;
            }
            if err_2 <= d_row {
                err += d_row;
                col += s_col;
            }
        }
    }

    /// Passable cells around `pos` in fixed compass order.
    ///
    /// Diagonal moves only require the destination to be passable; the two
    /// flanking orthogonal cells are not checked.
    pub fn neighbors(&self, pos: Position) -> impl Iterator<Item = Neighbor> + '_ {
        OFFSETS.iter().filter_map(move |&(d_row, d_col)| {
            let next = pos.offset(d_row, d_col)?;
            if !self.is_passable(next) {
                return None;
            }
            let cost = if d_row != 0 && d_col != 0 {
                COST_DIAGONAL
            } else {
                COST_STRAIGHT
            };
            Some(Neighbor { pos: next, cost })
        })
    }

    /// Euclidean distance from `pos` to the end cell.
    pub fn heuristic(&self, pos: Position) -> f64 {
        let d_row = pos.row as f64 - self.end.row as f64;
        let d_col = pos.col as f64 - self.end.col as f64;
        d_row.hypot(d_col)
    }

    pub fn reset_pheromones(&mut self, initial: f64) {
        self.pheromones = vec![initial; self.n_cells()];
    }

    pub fn evaporate(&mut self, rate: f64) {
        for val in &mut self.pheromones {
            *val = (*val * (1.0 - rate)).max(PHEROMONE_FLOOR);
        }
    }

    pub fn deposit(&mut self, pos: Position, amount: f64) {
        if self.in_bounds(pos) && amount > 0.0 {
            let idx = self.index(pos);
            self.pheromones[idx] += amount;
        }
    }

    pub fn max_pheromone(&self) -> f64 {
        self.pheromones.iter().copied().fold(0.0, f64::max)
    }

    pub fn mean_pheromone(&self) -> f64 {
        if self.pheromones.is_empty() {
            return 0.0;
        }
        self.pheromones.iter().sum::<f64>() / self.pheromones.len() as f64
    }

    /// Check whether the end is reachable from the start under the move rule.
    ///
    /// A path needs at least one move, so coinciding endpoints never count as
    /// connected.
    pub fn path_exists(&self) -> bool {
        if self.start == self.end || !self.in_bounds(self.start) {
            return false;
        }

        let mut seen = vec![false; self.n_cells()];
        let mut queue = VecDeque::from([self.start]);
        seen[self.index(self.start)] = true;

        while let Some(pos) = queue.pop_front() {
            if pos == self.end {
                return true;
            }
            for nbr in self.neighbors(pos) {
                let idx = self.index(nbr.pos);
                if !seen[idx] {
                    seen[idx] = true;
                    queue.push_back(nbr.pos);
                }
            }
        }
        false
    }
}
