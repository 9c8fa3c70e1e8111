//! External merge sort of posting files by `(term_id, doc_id)`.
//!
//! Memory is bounded by the two tunables of [`SortConfig`]: `block_size` bytes
//! per in-memory block and `n_blocks` blocks in total. Pass 1 cuts the input into
//! blocks of `block_size / 12` records, sorts each in memory and writes it as a
//! run. Pass 2 merges up to `n_blocks` runs at a time until a single run is left,
//! which is written directly to the output path.
//!
//! Every buffer the sorter holds counts against the budget, read and write buffers
//! alike, measured in 12-byte records. Pass 1 holds a raw block and its decoded
//! copy, two blocks in all. During a merge the budget is split evenly between the
//! raw blocks of the participating inputs and the output buffer. Either way the
//! resident records never exceed `n_blocks * records_per_block`.
//!
//! Runs live in a scratch directory that is removed when the sort ends. The inputs
//! of a round are only deleted after the whole round has succeeded, which makes
//! each round retryable from its boundary.

mod merge;
mod run;

use std::{
    path::{Path, PathBuf},
    time::Instant,
};

use sift_common::{Result, error::Error};

use crate::posting::RECORD_SIZE;

pub use run::RunReader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortConfig {
    /// Bytes per in-memory block.
    pub block_size: usize,
    /// Number of blocks that may be resident at once; also the merge fan-in.
    pub n_blocks: usize,
    /// Parent of the scratch directory. `None` uses the system temp directory.
    pub temp_dir: Option<PathBuf>,
    /// How many times a failed pass is retried before the error is returned.
    pub max_round_retries: u32,
}

impl SortConfig {
    pub fn new(block_size: usize, n_blocks: usize) -> SortConfig {
        SortConfig {
            block_size,
            n_blocks,
            temp_dir: None,
            max_round_retries: 2,
        }
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> SortConfig {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn with_max_round_retries(mut self, retries: u32) -> SortConfig {
        self.max_round_retries = retries;
        self
    }

    pub fn records_per_block(&self) -> usize {
        self.block_size / RECORD_SIZE
    }

    /// Upper bound on the buffer memory of the sorter, in records.
    pub fn resident_budget(&self) -> usize {
        self.records_per_block() * self.n_blocks
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_blocks < 2 {
            return Err(Error::invalid_config(
                "n_blocks",
                format!("{} is below the minimum merge fan-in of 2", self.n_blocks),
            ));
        }
        // A merge of `n_blocks` inputs needs one more buffer than there are blocks,
        // so each block must be divisible between at least two streams.
        if self.records_per_block() < 2 {
            return Err(Error::invalid_config(
                "block_size",
                format!(
                    "{} bytes cannot hold two {RECORD_SIZE}-byte records",
                    self.block_size
                ),
            ));
        }
        Ok(())
    }
}

/// Counters reported by [`ExternalSorter::sort`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortStats {
    pub records: u64,
    /// Runs written by pass 1.
    pub initial_runs: usize,
    /// Merge rounds of pass 2, including the final one.
    pub rounds: usize,
    /// Largest buffer memory held at once, in records, counting read and write
    /// buffers. Never above [`SortConfig::resident_budget`].
    pub peak_resident_records: usize,
    /// Passes that failed and were run again.
    pub retries: u32,
}

/// Sorts posting files larger than memory within the budget of a [`SortConfig`].
pub struct ExternalSorter {
    config: SortConfig,
    #[cfg(test)]
    injected_failures: std::cell::Cell<u32>,
}

impl ExternalSorter {
    pub fn new(config: SortConfig) -> Result<ExternalSorter> {
        config.validate()?;
        Ok(ExternalSorter {
            config,
            #[cfg(test)]
            injected_failures: Default::default(),
        })
    }

    pub fn config(&self) -> &SortConfig {
        &self.config
    }

    /// Sorts the posting file at `input` into a new sealed file at `output`.
    pub fn sort(&self, input: &Path, output: &Path) -> Result<SortStats> {
        let start = Instant::now();
        let scratch = self.scratch_dir()?;
        let rpb = self.config.records_per_block();
        let mut stats = SortStats::default();

        let initial = self.with_retries(&mut stats, "run generation", || {
            run::write_initial_runs(input, scratch.path(), rpb)
        })?;
        let records = initial.records;
        let mut runs = initial.runs;
        stats.records = records;
        stats.initial_runs = runs.len();
        stats.peak_resident_records = initial.peak_resident_records;
        log::debug!(
            "pass 1: {} records into {} runs of at most {rpb} records",
            records,
            runs.len()
        );

        let fan_in = self.config.n_blocks;
        while runs.len() > fan_in {
            let round = stats.rounds + 1;
            let (next_runs, peak) = self.with_retries(&mut stats, "merge round", || {
                self.merge_round(&runs, round, scratch.path())
            })?;
            stats.peak_resident_records = stats.peak_resident_records.max(peak);
            stats.rounds = round;
            remove_runs(&runs);
            log::debug!(
                "merge round {round}: {} runs into {}",
                runs.len(),
                next_runs.len()
            );
            runs = next_runs;
        }

        let peak = self.with_retries(&mut stats, "final merge", || {
            self.inject_failure()?;
            let buffer = self.buffer_records(runs.len());
            let outcome = merge::merge_runs(&runs, output, buffer)?;
            verify_record_count(outcome.records, records)?;
            Ok(outcome.peak_resident_records)
        })?;
        stats.peak_resident_records = stats.peak_resident_records.max(peak);
        stats.rounds += 1;
        remove_runs(&runs);

        log::info!(
            "sorted {} records ({} initial runs, {} merge rounds) in {:.2}s",
            stats.records,
            stats.initial_runs,
            stats.rounds,
            start.elapsed().as_secs_f64()
        );
        Ok(stats)
    }

    /// Merges consecutive groups of `fan_in` runs into intermediate runs.
    ///
    /// Outputs written before a failure are removed so a retry starts clean.
    fn merge_round(
        &self,
        runs: &[PathBuf],
        round: usize,
        dir: &Path,
    ) -> Result<(Vec<PathBuf>, usize)> {
        let mut outputs = Vec::new();
        let mut peak = 0;
        for group in runs.chunks(self.config.n_blocks) {
            let path = dir.join(format!("run-{round}-{}.bin", outputs.len()));
            let buffer = self.buffer_records(group.len());
            let merged = self
                .inject_failure()
                .and_then(|_| merge::merge_runs(group, &path, buffer));
            match merged {
                Ok(outcome) => {
                    peak = peak.max(outcome.peak_resident_records);
                    outputs.push(path);
                }
                Err(e) => {
                    remove_runs(&outputs);
                    return Err(e);
                }
            }
        }
        Ok((outputs, peak))
    }

    /// Per-stream buffer when `inputs` runs and one output share the budget.
    fn buffer_records(&self, inputs: usize) -> usize {
        (self.config.resident_budget() / (inputs + 1)).max(1)
    }

    fn with_retries<T>(
        &self,
        stats: &mut SortStats,
        what: &str,
        mut f: impl FnMut() -> Result<T>,
    ) -> Result<T> {
        let mut attempt = 0;
        loop {
            match f() {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.config.max_round_retries => {
                    attempt += 1;
                    stats.retries += 1;
                    log::warn!(
                        "{what} failed (attempt {attempt} of {}): {e}; retrying",
                        self.config.max_round_retries + 1
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn scratch_dir(&self) -> Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("sift-sort-");
        let dir = match &self.config.temp_dir {
            Some(parent) => {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::io(format!("create {}", parent.display()), e))?;
                builder.tempdir_in(parent)
            }
            None => builder.tempdir(),
        };
        dir.map_err(|e| Error::io("create sort scratch directory", e))
    }

    #[cfg(test)]
    fn inject_failure(&self) -> Result<()> {
        let remaining = self.injected_failures.get();
        if remaining > 0 {
            self.injected_failures.set(remaining - 1);
            return Err(Error::io(
                "injected",
                std::io::Error::other("injected merge failure"),
            ));
        }
        Ok(())
    }

    #[cfg(not(test))]
    #[inline]
    fn inject_failure(&self) -> Result<()> {
        Ok(())
    }
}

fn verify_record_count(written: u64, expected: u64) -> Result<()> {
    if written != expected {
        return Err(Error::consistency(format!(
            "sort wrote {written} records, expected {expected}"
        )));
    }
    Ok(())
}

fn remove_runs(runs: &[PathBuf]) {
    for run in runs {
        if let Err(e) = std::fs::remove_file(run) {
            log::warn!("failed to remove sort run {}: {e}", run.display());
        }
    }
}
