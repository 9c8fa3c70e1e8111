//! Command implementations for sift

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Args;
use sift_index::{IndexReader, PipelineConfig, QueryMode, QueryProcessor, ScoredDoc, SearchOptions};

pub mod build;
pub mod inspect;
pub mod query;
pub mod serve;

/// Options locating the index, shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct IndexArgs {
    /// JSON pipeline configuration; built-in defaults when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory relative paths are resolved against (defaults to the directory
    /// of the config file, or the current directory)
    #[arg(long)]
    pub base_dir: Option<PathBuf>,

    /// Overrides the configured block size in bytes
    #[arg(long)]
    pub block_size: Option<usize>,

    /// Overrides the configured number of resident blocks
    #[arg(long)]
    pub n_blocks: Option<usize>,
}

impl IndexArgs {
    pub fn load_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        if let Some(block_size) = self.block_size {
            config.block_size = block_size;
        }
        if let Some(n_blocks) = self.n_blocks {
            config.n_blocks = n_blocks;
        }

        let base = match (&self.base_dir, &self.config) {
            (Some(dir), _) => dir.clone(),
            (None, Some(path)) => path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            (None, None) => {
                std::env::current_dir().with_context(|| "Failed to get current directory")?
            }
        };
        let config = config.with_base_dir(&base);
        config.validate().with_context(|| "Invalid configuration")?;
        Ok(config)
    }
}

pub fn open_processor(config: &PipelineConfig) -> Result<QueryProcessor> {
    let reader = IndexReader::open(config).with_context(|| {
        format!(
            "Failed to open index {} (run `sift build` first)",
            config.tree_meta_file.display()
        )
    })?;
    Ok(QueryProcessor::new(Arc::new(reader)))
}

pub fn search_options(or: bool, limit: Option<usize>) -> SearchOptions {
    let mode = if or { QueryMode::Or } else { QueryMode::And };
    SearchOptions { mode, limit }
}

/// One result line: `doc_id score title`.
pub fn format_result(reader: &IndexReader, doc: &ScoredDoc) -> String {
    format!(
        "{}\t{:.6}\t{}",
        doc.doc_id,
        doc.score,
        reader.title(doc.doc_id).unwrap_or("")
    )
}

/// Process exit code: 2 for configuration errors, 1 for everything else.
pub fn exit_code(e: &anyhow::Error) -> i32 {
    let config_error = e.chain().any(|cause| {
        cause
            .downcast_ref::<sift_common::error::Error>()
            .is_some_and(|e| e.is_config_error())
    });
    if config_error { 2 } else { 1 }
}

#[cfg(test)]
pub(crate) mod test_util {
    use std::path::Path;

    use sift_index::{Pipeline, PipelineConfig};

    /// Builds the two-document example index under `dir` and returns its config.
    pub fn build_cat_dog(dir: &Path) -> PipelineConfig {
        let config = PipelineConfig {
            block_size: 64,
            n_blocks: 2,
            ..Default::default()
        }
        .with_base_dir(dir);
        std::fs::create_dir_all(&config.data_dir).unwrap();
        std::fs::write(config.data_dir.join("d1.txt"), "the cat sat").unwrap();
        std::fs::write(config.data_dir.join("d2.txt"), "the dog sat near the cat").unwrap();
        Pipeline::new(config.clone()).run().unwrap();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sift.json");
        std::fs::write(&path, r#"{ "block_size": 512, "data_dir": "docs" }"#).unwrap();
        let args = IndexArgs {
            config: Some(path),
            n_blocks: Some(8),
            ..Default::default()
        };
        let config = args.load_config().unwrap();
        assert_eq!(config.block_size, 512);
        assert_eq!(config.n_blocks, 8);
        assert_eq!(config.data_dir, dir.path().join("docs"));

        let args = IndexArgs {
            base_dir: Some(dir.path().to_path_buf()),
            n_blocks: Some(1),
            ..Default::default()
        };
        let err = args.load_config().unwrap_err();
        assert_eq!(exit_code(&err), 2);
    }
}
