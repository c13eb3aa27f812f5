use crate::colony::ColonyParams;
use crate::grid::{Grid, Position};
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rand_distr::Bernoulli;
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Cells closer than this (Manhattan distance) to an endpoint are never
/// filled by random obstacles.
const ENDPOINT_CLEARANCE: usize = 4;

/// Simulation configuration.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Grid layout.
    pub grid: GridConfig,
    /// Colony parameters.
    #[serde(default)]
    pub colony: ColonyParams,
    /// Run control.
    #[serde(default)]
    pub run: RunConfig,
}

/// Two cells spanning a rectangle or a line.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub from: Position,
    pub to: Position,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,

    /// Start cell (nest).
    pub start: Position,
    /// End cell (food).
    pub end: Position,

    /// Single obstacle cells.
    #[serde(default)]
    pub obstacles: Vec<Position>,
    /// Filled obstacle rectangles.
    #[serde(default)]
    pub blocks: Vec<Segment>,
    /// Obstacle lines.
    #[serde(default)]
    pub walls: Vec<Segment>,

    /// Probability of a random obstacle in each cell away from the endpoints.
    #[serde(default)]
    pub obstacle_density: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Base seed; run `i` uses `seed + i`. Seeded from the OS when absent.
    pub seed: Option<u64>,
    /// Maximum number of iterations per run.
    pub max_iterations: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: None,
            max_iterations: 500,
        }
    }
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a [`Config`] from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let grid = &self.grid;
        check_num(grid.rows, 2..=1000).context("invalid number of rows")?;
        check_num(grid.cols, 2..=1000).context("invalid number of columns")?;
        check_pos(grid.start, grid.rows, grid.cols).context("invalid start")?;
        check_pos(grid.end, grid.rows, grid.cols).context("invalid end")?;
        if grid.start == grid.end {
            bail!("start and end must differ, but both are {:?}", grid.start);
        }
        check_num(grid.obstacle_density, 0.0..1.0).context("invalid obstacle density")?;

        let colony = &self.colony;
        check_num(colony.n_ants, 0..=100_000).context("invalid number of ants")?;
        check_num(colony.alpha, 0.0..=100.0).context("invalid pheromone exponent")?;
        check_num(colony.beta, 0.0..=100.0).context("invalid heuristic exponent")?;
        check_num(colony.evaporation_rate, 0.0..1.0).context("invalid evaporation rate")?;
        check_num(colony.deposit, 0.0..=1e9).context("invalid deposit constant")?;
        check_num(colony.initial_pheromone, 0.0..=1e9).context("invalid initial pheromone")?;
        check_num(colony.convergence_threshold, 1..=100_000)
            .context("invalid convergence threshold")?;

        check_num(self.run.max_iterations, 1..=10_000_000)
            .context("invalid maximum number of iterations")?;

        Ok(())
    }
}

impl GridConfig {
    /// Build the grid described by this layout.
    ///
    /// Random obstacles are drawn from `rng`; explicit obstacles, blocks and
    /// walls are added afterwards. Endpoints are never obstructed.
    pub fn build<R: Rng>(&self, initial_pheromone: f64, rng: &mut R) -> Result<Grid> {
        let mut grid = Grid::new(self.rows, self.cols, initial_pheromone);
        grid.set_endpoints(self.start, self.end);

        if self.obstacle_density > 0.0 {
            let obstacle_dist = Bernoulli::new(self.obstacle_density)?;
            for row in 0..self.rows {
                for col in 0..self.cols {
                    let pos = Position::new(row, col);
                    if manhattan(pos, self.start) <= ENDPOINT_CLEARANCE
                        || manhattan(pos, self.end) <= ENDPOINT_CLEARANCE
                    {
                        continue;
                    }
                    if obstacle_dist.sample(rng) {
                        grid.add_obstacle(pos);
                    }
                }
            }
        }

        for &pos in &self.obstacles {
            grid.add_obstacle(pos);
        }
        for block in &self.blocks {
            grid.add_obstacle_rect(block.from, block.to);
        }
        for wall in &self.walls {
            grid.add_obstacle_line(wall.from, wall.to);
        }

        Ok(grid)
    }
}

fn manhattan(a: Position, b: Position) -> usize {
    a.row.abs_diff(b.row) + a.col.abs_diff(b.col)
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_pos(pos: Position, rows: usize, cols: usize) -> Result<()> {
    check_num(pos.row, 0..rows).context("invalid row")?;
    check_num(pos.col, 0..cols).context("invalid column")?;
    Ok(())
}
