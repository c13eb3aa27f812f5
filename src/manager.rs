use crate::analysis::Analyzer;
use crate::config::Config;
use crate::engine::Engine;
use anyhow::{Context, Result};
use glob::glob;
use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
};

/// Simulation directory holding `config.toml` and one directory per run.
pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg = Config::from_file(sim_dir.join("config.toml")).context("failed to load cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    /// Run the colony once in a new run directory.
    pub fn create_run(&self) -> Result<()> {
        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;

        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let seed = self.cfg.run.seed.map(|seed| seed.wrapping_add(run_idx as u64));
        let mut engine =
            Engine::new(self.cfg.clone(), seed).context("failed to construct engine")?;

        let summary = engine
            .run(self.records_file(run_idx))
            .context("failed to run colony")?;

        let summary_file = self.summary_file(run_idx);
        let file = File::create(&summary_file)
            .with_context(|| format!("failed to create {summary_file:?}"))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &summary)
            .context("failed to serialize summary")?;
        log::info!("saved {summary_file:?}");

        Ok(())
    }

    /// Aggregate the records of every run into a results file.
    pub fn analyze_sim(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;

        let mut analyzer = Analyzer::new();
        for run_idx in 0..n_runs {
            analyzer
                .add_file(run_idx, self.records_file(run_idx))
                .with_context(|| format!("failed to analyze run {run_idx}"))?;
        }

        let results_file = self.results_file();
        analyzer
            .save_results(&results_file)
            .context("failed to save results")?;
        log::info!("saved {results_file:?}");

        Ok(())
    }

    /// Remove every run directory and the results file.
    pub fn clean_sim(&self) -> Result<()> {
        for run_dir in self.run_dirs()? {
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }

        let results_file = self.results_file();
        if results_file.exists() {
            fs::remove_file(&results_file)
                .with_context(|| format!("failed to remove {results_file:?}"))?;
        }

        Ok(())
    }

    fn run_dirs(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let run_dirs = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .collect();
        Ok(run_dirs)
    }

    fn count_run_dirs(&self) -> Result<usize> {
        Ok(self.run_dirs()?.len())
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn records_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("records.msgpack")
    }

    fn summary_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("summary.json")
    }

    fn results_file(&self) -> PathBuf {
        self.sim_dir.join("results.json")
    }
}
