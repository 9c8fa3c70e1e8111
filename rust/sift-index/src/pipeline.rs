//! The resumable build driver: tokenize, sort, build.
//!
//! The next stage to run is derived from which sealed artifacts exist, never from
//! any state kept between runs. Every stage commits its outputs atomically and
//! seals its completion marker last, so an interrupted build resumes at the stage
//! that was cut short and a finished build is left untouched.

use std::{fmt, time::Instant};

use sift_common::{Result, error::Error};
use sift_io::artifact_exists;

use crate::{
    builder::{BuildStats, IndexBuilder},
    config::PipelineConfig,
    posting::PostingReader,
    sort::{ExternalSorter, SortStats},
    string_table::count_entries,
    tokenize::{TokenizeStats, tokenize_corpus},
    tokenizers::Analyzer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Tokenize,
    Sort,
    Build,
    Done,
}

impl Stage {
    /// The first stage whose outputs are missing.
    ///
    /// The posting-list file marks a complete index, the sorted file a complete
    /// sort, and the tokenized file (sealed after the term-ids and titles files) a
    /// complete tokenization.
    pub fn detect(config: &PipelineConfig) -> Stage {
        if artifact_exists(&config.posting_list_file) {
            Stage::Done
        } else if artifact_exists(&config.sorted_file) {
            Stage::Build
        } else if artifact_exists(&config.tokenized_file)
            && artifact_exists(&config.term_ids_file)
            && artifact_exists(&config.titles_file)
        {
            Stage::Sort
        } else {
            Stage::Tokenize
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Tokenize => "tokenize",
            Stage::Sort => "sort",
            Stage::Build => "build",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a [`Pipeline::run`] call did. Stages skipped because their outputs
/// already existed have no stats.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub executed: Vec<Stage>,
    pub tokenize: Option<TokenizeStats>,
    pub sort: Option<SortStats>,
    pub build: Option<BuildStats>,
}

impl BuildReport {
    /// `true` when the index was already complete.
    pub fn is_noop(&self) -> bool {
        self.executed.is_empty()
    }
}

/// Drives the build stages for one configuration.
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Pipeline {
        Pipeline { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stage(&self) -> Stage {
        Stage::detect(&self.config)
    }

    /// Runs the missing stages in order until the index is complete.
    pub fn run(&self) -> Result<BuildReport> {
        self.config.validate()?;
        let start = Instant::now();
        let mut report = BuildReport::default();

        let mut stage = self.stage();
        if stage == Stage::Done {
            log::info!("index is complete, nothing to do");
            return Ok(report);
        }
        log::info!("resuming build at stage {stage}");

        while stage != Stage::Done {
            self.run_stage(stage, &mut report)?;
            report.executed.push(stage);
            let next = self.stage();
            if next <= stage {
                return Err(Error::consistency(format!(
                    "stage {stage} completed without producing its outputs"
                )));
            }
            stage = next;
        }

        log::info!(
            "build finished ({}) in {:.2}s",
            report
                .executed
                .iter()
                .map(Stage::name)
                .collect::<Vec<_>>()
                .join(", "),
            start.elapsed().as_secs_f64()
        );
        Ok(report)
    }

    fn run_stage(&self, stage: Stage, report: &mut BuildReport) -> Result<()> {
        let config = &self.config;
        match stage {
            Stage::Tokenize => {
                let analyzer = Analyzer::from_name(&config.tokenizer)?;
                let stats =
                    tokenize_corpus(&config.data_dir, &analyzer, &config.tokenize_outputs())?;
                report.tokenize = Some(stats);
            }
            Stage::Sort => {
                let sorter = ExternalSorter::new(config.sort_config())?;
                let stats = sorter.sort(&config.tokenized_file, &config.sorted_file)?;
                report.sort = Some(stats);
            }
            Stage::Build => {
                let doc_count = count_entries(&config.titles_file)?;
                let mut sorted = PostingReader::open(&config.sorted_file)?;
                let stats = IndexBuilder::new(config.block_size).build(
                    &mut sorted,
                    &config.index_paths(),
                    doc_count,
                )?;
                report.build = Some(stats);
            }
            Stage::Done => {}
        }
        Ok(())
    }
}
