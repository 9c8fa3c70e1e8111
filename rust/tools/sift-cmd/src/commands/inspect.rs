//! Inspect command implementation

use anyhow::{Context, Result};
use serde::Serialize;
use sift_index::{IndexReader, PipelineConfig, Stage};

use super::IndexArgs;

#[derive(Serialize)]
struct InspectSummary {
    stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    index: Option<IndexInfo>,
}

#[derive(Serialize)]
struct IndexInfo {
    documents: u64,
    terms: usize,
    tree: TreeInfo,
    buffer: BufferInfo,
}

#[derive(Serialize)]
struct TreeInfo {
    block_size: u32,
    page_count: u32,
    leaf_pages: u32,
    internal_pages: u32,
    root_page: u32,
    height: u32,
    fanout: u32,
    leaf_capacity: u32,
    keys: u64,
    min_leaf_entries: usize,
    max_leaf_entries: usize,
}

#[derive(Serialize)]
struct BufferInfo {
    capacity: usize,
    resident: usize,
    hits: u64,
    misses: u64,
}

pub fn run(args: IndexArgs) -> Result<()> {
    let config = args.load_config()?;
    let summary = summarize(&config)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn summarize(config: &PipelineConfig) -> Result<InspectSummary> {
    let stage = Stage::detect(config);
    if stage != Stage::Done {
        return Ok(InspectSummary {
            stage: stage.to_string(),
            index: None,
        });
    }

    let reader = IndexReader::open(config).with_context(|| "Failed to open index")?;
    let meta = *reader.tree().meta();
    let stats = reader
        .tree()
        .validate()
        .with_context(|| format!("Tree {} is damaged", config.tree_file.display()))?;
    let buffer = reader.buffer_stats();
    Ok(InspectSummary {
        stage: stage.to_string(),
        index: Some(IndexInfo {
            documents: reader.doc_count(),
            terms: reader.term_count(),
            tree: TreeInfo {
                block_size: meta.block_size,
                page_count: meta.page_count,
                leaf_pages: stats.leaf_pages,
                internal_pages: stats.internal_pages,
                root_page: meta.root_page,
                height: meta.height,
                fanout: meta.fanout,
                leaf_capacity: meta.leaf_capacity,
                keys: stats.keys,
                min_leaf_entries: stats.min_leaf_entries,
                max_leaf_entries: stats.max_leaf_entries,
            },
            buffer: BufferInfo {
                capacity: buffer.capacity,
                resident: buffer.resident,
                hits: buffer.hits,
                misses: buffer.misses,
            },
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_util::build_cat_dog;

    #[test]
    fn test_summary_of_built_index() {
        let dir = tempfile::tempdir().unwrap();
        let config = build_cat_dog(dir.path());
        let summary = summarize(&config).unwrap();
        assert_eq!(summary.stage, "done");
        let index = summary.index.unwrap();
        assert_eq!(index.documents, 2);
        assert_eq!(index.terms, 5);
        assert_eq!(index.tree.keys, 5);
        assert_eq!(index.tree.block_size, 64);
    }

    #[test]
    fn test_summary_before_build() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::default().with_base_dir(dir.path());
        let summary = summarize(&config).unwrap();
        assert_eq!(summary.stage, "tokenize");
        assert!(summary.index.is_none());
    }
}
