//! Pipeline configuration.
//!
//! Loaded from JSON; every field has a default, so a config file only needs to
//! name what differs. Relative paths are resolved against a base directory with
//! [`PipelineConfig::with_base_dir`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sift_common::{Result, error::Error};

use crate::{
    btree::PageLayout,
    builder::IndexPaths,
    sort::SortConfig,
    tokenize::TokenizeOutputs,
    tokenizers::TokenizerKind,
};

/// Smallest accepted block size in bytes.
pub const MIN_BLOCK_SIZE: usize = 64;

pub const DEFAULT_BLOCK_SIZE: usize = 4096;
pub const DEFAULT_N_BLOCKS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Directory holding the input documents.
    pub data_dir: PathBuf,
    /// Parent directory for sort runs; the system temp directory when unset.
    pub temp_dir: Option<PathBuf>,
    pub tokenized_file: PathBuf,
    pub term_ids_file: PathBuf,
    pub titles_file: PathBuf,
    pub sorted_file: PathBuf,
    pub posting_list_file: PathBuf,
    pub tree_meta_file: PathBuf,
    pub tree_file: PathBuf,
    /// Bytes per in-memory block and per tree page.
    pub block_size: usize,
    /// Blocks resident at once: sort memory budget, merge fan-in and page buffer size.
    pub n_blocks: usize,
    pub tokenizer: String,
    pub max_round_retries: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            data_dir: "data".into(),
            temp_dir: None,
            tokenized_file: "tokenized.bin".into(),
            term_ids_file: "term_ids.bin".into(),
            titles_file: "titles.bin".into(),
            sorted_file: "sorted.bin".into(),
            posting_list_file: "postings.bin".into(),
            tree_meta_file: "tree.meta".into(),
            tree_file: "tree.bin".into(),
            block_size: DEFAULT_BLOCK_SIZE,
            n_blocks: DEFAULT_N_BLOCKS,
            tokenizer: TokenizerKind::UnicodeWord.name().to_string(),
            max_round_retries: 2,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<PipelineConfig> {
        serde_json::from_str(json).map_err(|e| Error::invalid_config("json", e.to_string()))
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::io(format!("read {}", path.display()), e))?;
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::other("serialize config", e))
    }

    /// Resolves every relative path against `base`.
    pub fn with_base_dir(mut self, base: &Path) -> PipelineConfig {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.data_dir);
        if let Some(temp) = self.temp_dir.as_mut() {
            resolve(temp);
        }
        for path in self.artifact_paths_mut() {
            resolve(path);
        }
        self
    }

    /// Checks the tunables. Called before any stage runs.
    pub fn validate(&self) -> Result<()> {
        if self.n_blocks < 2 {
            return Err(Error::invalid_config(
                "n_blocks",
                format!("must be at least 2, got {}", self.n_blocks),
            ));
        }
        if self.block_size < MIN_BLOCK_SIZE {
            return Err(Error::invalid_config(
                "block_size",
                format!("must be at least {MIN_BLOCK_SIZE} bytes, got {}", self.block_size),
            ));
        }
        if self.block_size % 4 != 0 {
            return Err(Error::invalid_config(
                "block_size",
                format!("must be a multiple of 4, got {}", self.block_size),
            ));
        }
        PageLayout::new(self.block_size)?;
        TokenizerKind::try_from(self.tokenizer.as_str())?;
        self.sort_config().validate()?;

        let artifacts = self.artifact_paths();
        for (i, a) in artifacts.iter().enumerate() {
            if artifacts[i + 1..].contains(a) {
                return Err(Error::invalid_config(
                    "paths",
                    format!("{} is used for two artifacts", a.display()),
                ));
            }
        }
        Ok(())
    }

    pub fn sort_config(&self) -> SortConfig {
        let config = SortConfig::new(self.block_size, self.n_blocks)
            .with_max_round_retries(self.max_round_retries);
        match &self.temp_dir {
            Some(dir) => config.with_temp_dir(dir),
            None => config,
        }
    }

    pub fn tokenize_outputs(&self) -> TokenizeOutputs {
        TokenizeOutputs {
            tokenized: self.tokenized_file.clone(),
            term_ids: self.term_ids_file.clone(),
            titles: self.titles_file.clone(),
        }
    }

    pub fn index_paths(&self) -> IndexPaths {
        IndexPaths {
            tree_meta: self.tree_meta_file.clone(),
            tree: self.tree_file.clone(),
            posting_lists: self.posting_list_file.clone(),
        }
    }

    fn artifact_paths(&self) -> [&PathBuf; 7] {
        [
            &self.tokenized_file,
            &self.term_ids_file,
            &self.titles_file,
            &self.sorted_file,
            &self.posting_list_file,
            &self.tree_meta_file,
            &self.tree_file,
        ]
    }

    fn artifact_paths_mut(&mut self) -> [&mut PathBuf; 7] {
        [
            &mut self.tokenized_file,
            &mut self.term_ids_file,
            &mut self.titles_file,
            &mut self.sorted_file,
            &mut self.posting_list_file,
            &mut self.tree_meta_file,
            &mut self.tree_file,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = PipelineConfig::from_json_str(
            r#"{ "data_dir": "/corpus", "block_size": 512, "n_blocks": 8 }"#,
        )
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/corpus"));
        assert_eq!(config.block_size, 512);
        assert_eq!(config.tokenizer, "unicode-word");
        assert_eq!(config.tree_file, PathBuf::from("tree.bin"));
        config.validate().unwrap();

        assert!(PipelineConfig::from_json_str(r#"{ "blocksize": 512 }"#).is_err());
        assert!(PipelineConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_with_base_dir() {
        let config = PipelineConfig {
            data_dir: "/abs/data".into(),
            temp_dir: Some("tmp".into()),
            ..Default::default()
        }
        .with_base_dir(Path::new("/work"));
        assert_eq!(config.data_dir, PathBuf::from("/abs/data"));
        assert_eq!(config.temp_dir, Some(PathBuf::from("/work/tmp")));
        assert_eq!(config.sorted_file, PathBuf::from("/work/sorted.bin"));
        assert_eq!(
            config.index_paths().tree_meta,
            PathBuf::from("/work/tree.meta")
        );
    }

    #[test]
    fn test_validation_errors() {
        let check = |f: fn(&mut PipelineConfig)| {
            let mut config = PipelineConfig::default();
            f(&mut config);
            config.validate().err().map(|e| e.is_config_error())
        };
        assert_eq!(check(|_| {}), None);
        assert_eq!(check(|c| c.n_blocks = 1), Some(true));
        assert_eq!(check(|c| c.block_size = 32), Some(true));
        assert_eq!(check(|c| c.block_size = 130), Some(true));
        assert_eq!(check(|c| c.tokenizer = "ngram".into()), Some(true));
        assert_eq!(check(|c| c.sorted_file = "tokenized.bin".into()), Some(true));
    }

    #[test]
    fn test_json_round_trip_of_defaults() {
        let json = PipelineConfig::default().to_json().unwrap();
        assert_eq!(
            PipelineConfig::from_json_str(&json).unwrap(),
            PipelineConfig::default()
        );
    }
}
