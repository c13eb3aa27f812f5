use crate::stats::{Accumulator, AccumulatorReport};
use crate::types::Record;
use anyhow::{Context, Result};
use rmp_serde::decode;
use serde::Serialize;
use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter},
    path::Path,
};

/// Summary of a single run, rebuilt from its record stream.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub run_idx: usize,
    pub n_iterations: usize,
    pub converged: bool,
    pub best_cost: Option<f64>,
    pub best_path_len: usize,
    /// Iteration at which the final best cost was first reached.
    pub best_found_at: Option<usize>,
    pub goal_ratio: AccumulatorReport,
}

#[derive(Debug, Serialize)]
struct Results {
    n_runs: usize,
    n_converged: usize,
    best_cost: AccumulatorReport,
    n_iterations: AccumulatorReport,
    goal_ratio: AccumulatorReport,
    runs: Vec<RunReport>,
}

/// Aggregates record streams of several runs.
pub struct Analyzer {
    runs: Vec<RunReport>,
    best_cost: Accumulator,
    n_iterations: Accumulator,
    goal_ratio: Accumulator,
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            runs: Vec::new(),
            best_cost: Accumulator::new(),
            n_iterations: Accumulator::new(),
            goal_ratio: Accumulator::new(),
        }
    }

    /// Read every record of a run and add the run to the aggregate.
    pub fn add_file<P: AsRef<Path>>(&mut self, run_idx: usize, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);

        let mut run_goal_ratio = Accumulator::new();
        let mut last: Option<Record> = None;
        let mut best_found_at = None;

        while !reader.fill_buf().context("failed to read records")?.is_empty() {
            let record: Record = decode::from_read(&mut reader).context("failed to read record")?;

            if let Some(ratio) = record.goal_ratio() {
                run_goal_ratio.add(ratio);
            }
            let prev_best = last.as_ref().and_then(|rec| rec.best_cost);
            if record.best_cost.is_some() && record.best_cost != prev_best {
                best_found_at = Some(record.iteration);
            }
            last = Some(record);
        }

        let report = RunReport {
            run_idx,
            n_iterations: last.as_ref().map_or(0, |rec| rec.iteration + 1),
            converged: last.as_ref().is_some_and(|rec| rec.converged),
            best_cost: last.as_ref().and_then(|rec| rec.best_cost),
            best_path_len: last.as_ref().map_or(0, |rec| rec.best_path_len),
            best_found_at,
            goal_ratio: run_goal_ratio.report(),
        };

        if let Some(cost) = report.best_cost {
            self.best_cost.add(cost);
        }
        self.n_iterations.add(report.n_iterations as f64);
        if run_goal_ratio.n_vals() > 0 {
            self.goal_ratio.add(report.goal_ratio.mean);
        }
        self.runs.push(report);

        Ok(())
    }

    pub fn runs(&self) -> &[RunReport] {
        &self.runs
    }

    pub fn save_results<P: AsRef<Path>>(self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let writer = BufWriter::new(file);

        let results = Results {
            n_runs: self.runs.len(),
            n_converged: self.runs.iter().filter(|run| run.converged).count(),
            best_cost: self.best_cost.report(),
            n_iterations: self.n_iterations.report(),
            goal_ratio: self.goal_ratio.report(),
            runs: self.runs,
        };
        serde_json::to_writer_pretty(writer, &results).context("failed to serialize results")?;
        Ok(())
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}
