use crate::colony::{Advance, Colony};
use crate::config::Config;
use crate::types::{Record, Summary};
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rmp_serde::encode;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// Number of progress messages logged over a run.
const N_PROGRESS_LOGS: usize = 10;

/// Simulation engine.
///
/// Holds the configuration and the colony, and drives one run from a fresh
/// pheromone field until convergence or the iteration limit.
pub struct Engine {
    cfg: Config,
    seed: Option<u64>,
    colony: Colony,
}

impl Engine {
    /// Create a new `Engine` from the given configuration.
    ///
    /// Without a seed the random number generator is seeded from the OS.
    pub fn new(cfg: Config, seed: Option<u64>) -> Result<Self> {
        let mut rng = match seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::try_from_os_rng()?,
        };

        let grid = cfg
            .grid
            .build(cfg.colony.initial_pheromone, &mut rng)
            .context("failed to build grid")?;
        if !grid.path_exists() {
            log::warn!(
                "end {:?} is unreachable from start {:?}",
                grid.end(),
                grid.start()
            );
        }

        let colony = Colony::new(grid, cfg.colony.clone(), rng);

        Ok(Self { cfg, seed, colony })
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    pub fn colony(&self) -> &Colony {
        &self.colony
    }

    /// Run the colony and write one [`Record`] per iteration to a binary file.
    pub fn run<P: AsRef<Path>>(&mut self, file: P) -> Result<Summary> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        let max_iterations = self.cfg.run.max_iterations;
        let log_every = (max_iterations / N_PROGRESS_LOGS).max(1);
        let mut n_iterations = 0;

        while n_iterations < max_iterations {
            if !self.colony.iteration_finished() {
                if self.colony.advance() == Advance::Converged {
                    break;
                }
                continue;
            }

            let closed = self.colony.stats();
            let outcome = self.colony.advance();
            let record = Record::new(&closed, &self.colony.stats());
            encode::write(&mut writer, &record).context("failed to serialize record")?;
            n_iterations += 1;

            if n_iterations % log_every == 0 || outcome == Advance::Converged {
                log::info!(
                    "iteration {n_iterations:>6}: {}/{} ants at goal, best cost {:?}",
                    record.n_ants_at_goal,
                    record.n_ants,
                    record.best_cost
                );
            }
            if outcome == Advance::Converged {
                break;
            }
        }

        writer.flush().context("failed to flush writer stream")?;

        if self.colony.converged() {
            log::info!("converged after {n_iterations} iterations");
        } else {
            log::info!("stopped after {n_iterations} iterations without converging");
        }

        Ok(Summary {
            seed: self.seed,
            converged: self.colony.converged(),
            n_iterations,
            best_cost: self.colony.best_cost(),
            best_path: self.colony.best_path().map(<[_]>::to_vec),
        })
    }
}
