//! Disk-resident inverted index.
//!
//! The index is built offline by a three-stage pipeline and then served read-only:
//!
//! 1. **Tokenize** ([`tokenize`]): documents are split into terms by a pluggable
//!    [`Tokenizer`], terms and documents get dense ids, and one
//!    `(term_id, doc_id, freq)` posting is written per term and document.
//! 2. **Sort** ([`sort`]): an external merge sort orders the postings by
//!    `(term_id, doc_id)` within a fixed memory budget of `n_blocks * block_size`
//!    bytes.
//! 3. **Build** ([`builder`]): one sequential pass writes a delta-encoded posting
//!    list per term and bulk-loads a paged B+Tree ([`btree`]) mapping term ids to
//!    list locations.
//!
//! [`Pipeline`] sequences the stages from artifact presence, so an interrupted build
//! resumes where it stopped and a complete one is never redone. At serving time an
//! [`IndexReader`] is opened once and shared by [`QueryProcessor`] handles, which
//! tokenize queries with the same analyzer, intersect or unite the posting lists and
//! rank documents by TF-IDF.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use sift_index::{IndexReader, Pipeline, PipelineConfig, QueryProcessor, SearchOptions};
//!
//! let config = PipelineConfig::from_json_file("sift.json")?;
//! Pipeline::new(config.clone()).run()?;
//!
//! let reader = Arc::new(IndexReader::open(&config)?);
//! let processor = QueryProcessor::new(reader);
//! for doc in processor.search("cat sat", &SearchOptions::default())? {
//!     println!("{} {:.4}", doc.doc_id, doc.score);
//! }
//! # Ok::<(), sift_common::error::Error>(())
//! ```

pub mod btree;
pub mod builder;
pub mod config;
pub mod dictionary;
pub mod pipeline;
pub mod posting;
pub mod posting_list;
pub mod query;
pub mod sort;
pub mod string_table;
pub mod tokenize;
pub mod tokenizers;
mod varint;

pub use btree::{BTree, BTreeBuilder, PostingLocation, TreeMeta, TreeStats};
pub use builder::{BuildStats, IndexBuilder, IndexPaths};
pub use config::PipelineConfig;
pub use pipeline::{BuildReport, Pipeline, Stage};
pub use posting::Posting;
pub use query::{IndexReader, QueryMode, QueryProcessor, ScoredDoc, SearchOptions};
pub use sort::{ExternalSorter, SortConfig, SortStats};
pub use tokenizers::{Analyzer, Tokenizer, create_tokenizer};
