//! Query evaluation over a built index.
//!
//! An [`IndexReader`] is opened once per serving process and shared behind an
//! `Arc`; [`QueryProcessor`] handles are cheap to clone and may run on any number
//! of threads at once.

use std::sync::Arc;

use rayon::prelude::*;
use sift_common::Result;

use crate::{
    btree::{BTree, BufferStats, PostingLocation},
    config::PipelineConfig,
    posting_list::{DocPosting, PostingListReader},
    string_table::{TermLookup, TitleLookup},
    tokenizers::Analyzer,
};

pub mod combine;
pub mod scorer;

pub use scorer::{Scorer, TermStats, TfIdfScorer};

/// How the posting lists of the query terms are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryMode {
    /// Documents containing every query term.
    #[default]
    And,
    /// Documents containing at least one query term.
    Or,
}

/// A matching document and its relevance score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredDoc {
    pub doc_id: u32,
    pub score: f64,
}

/// Per-query settings: how terms are combined and how many results to return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub mode: QueryMode,
    /// Maximum number of results; all of them when `None`.
    pub limit: Option<usize>,
}

impl SearchOptions {
    pub fn new(mode: QueryMode) -> SearchOptions {
        SearchOptions { mode, limit: None }
    }

    pub fn with_limit(mut self, limit: usize) -> SearchOptions {
        self.limit = Some(limit);
        self
    }
}

/// Read-only view of the index artifacts.
pub struct IndexReader {
    tree: BTree,
    lists: PostingListReader,
    terms: TermLookup,
    titles: TitleLookup,
    analyzer: Analyzer,
}

impl IndexReader {
    /// Opens the tree, posting lists and lookup tables named by `config`.
    pub fn open(config: &PipelineConfig) -> Result<IndexReader> {
        config.validate()?;
        let tree = BTree::open(
            &config.tree_meta_file,
            &config.tree_file,
            config.block_size,
            config.n_blocks,
        )?;
        let lists = PostingListReader::open(&config.posting_list_file)?;
        let terms = TermLookup::open(&config.term_ids_file)?;
        let titles = TitleLookup::open(&config.titles_file)?;
        let analyzer = Analyzer::from_name(&config.tokenizer)?;
        let reader = IndexReader::from_parts(tree, lists, terms, titles, analyzer);
        log::info!(
            "opened index: {} terms, {} documents, tree height {}",
            reader.term_count(),
            reader.doc_count(),
            reader.tree.meta().height
        );
        Ok(reader)
    }

    pub fn from_parts(
        tree: BTree,
        lists: PostingListReader,
        terms: TermLookup,
        titles: TitleLookup,
        analyzer: Analyzer,
    ) -> IndexReader {
        IndexReader {
            tree,
            lists,
            terms,
            titles,
            analyzer,
        }
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    pub fn tree(&self) -> &BTree {
        &self.tree
    }

    pub fn doc_count(&self) -> u64 {
        self.lists.doc_count()
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    pub fn term_id(&self, term: &str) -> Option<u32> {
        self.terms.term_id(term)
    }

    pub fn term(&self, term_id: u32) -> Option<&str> {
        self.terms.term(term_id)
    }

    pub fn title(&self, doc_id: u32) -> Option<&str> {
        self.titles.title(doc_id)
    }

    pub fn buffer_stats(&self) -> BufferStats {
        self.tree.buffer_stats()
    }

    /// Location of the posting list of `term_id`, `None` for an unindexed term.
    pub fn locate(&self, term_id: u32) -> Result<Option<PostingLocation>> {
        self.tree.lookup(term_id)
    }

    /// Posting list of `term_id`; empty for an unindexed term.
    pub fn postings(&self, term_id: u32) -> Result<Vec<DocPosting>> {
        match self.tree.lookup(term_id)? {
            Some(location) => self.lists.read(&location),
            None => Ok(Vec::new()),
        }
    }
}

/// Tokenizes, retrieves, combines and ranks.
///
/// Scores are the sum of the per-term [`Scorer`] contributions of the matched
/// terms, added in ascending term id order. Results are ordered by descending
/// score, then ascending document id, so identical queries against an unchanged
/// index produce identical output.
#[derive(Clone)]
pub struct QueryProcessor {
    reader: Arc<IndexReader>,
    scorer: Arc<dyn Scorer>,
}

impl QueryProcessor {
    pub fn new(reader: Arc<IndexReader>) -> QueryProcessor {
        Self::with_scorer(reader, Arc::new(TfIdfScorer))
    }

    pub fn with_scorer(reader: Arc<IndexReader>, scorer: Arc<dyn Scorer>) -> QueryProcessor {
        QueryProcessor { reader, scorer }
    }

    pub fn reader(&self) -> &Arc<IndexReader> {
        &self.reader
    }

    pub fn scorer(&self) -> &dyn Scorer {
        self.scorer.as_ref()
    }

    /// Distinct term ids of `query`, ascending. The second value is `true` when
    /// some query term is absent from the dictionary.
    pub fn query_terms(&self, query: &str) -> (Vec<u32>, bool) {
        let mut missing = false;
        let mut ids = Vec::new();
        for term in self.reader.analyzer.terms(query) {
            match self.reader.term_id(&term) {
                Some(id) => ids.push(id),
                None => missing = true,
            }
        }
        ids.sort_unstable();
        ids.dedup();
        (ids, missing)
    }

    pub fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<ScoredDoc>> {
        let (term_ids, missing) = self.query_terms(query);
        if term_ids.is_empty() || (missing && options.mode == QueryMode::And) {
            return Ok(Vec::new());
        }

        let mut lists = Vec::with_capacity(term_ids.len());
        let mut doc_freqs = Vec::with_capacity(term_ids.len());
        for &term_id in &term_ids {
            let Some(location) = self.reader.locate(term_id)? else {
                if options.mode == QueryMode::And {
                    return Ok(Vec::new());
                }
                continue;
            };
            lists.push(self.reader.lists.read(&location)?);
            doc_freqs.push(location.doc_freq);
        }

        let doc_count = self.reader.doc_count();
        let score = |list: usize, posting: &DocPosting| {
            self.scorer.score(&TermStats {
                term_freq: posting.freq,
                doc_freq: doc_freqs[list],
                doc_count,
            })
        };
        let matches = match options.mode {
            QueryMode::And => combine::intersect(&lists, score),
            QueryMode::Or => combine::union(&lists, score),
        };
        log::debug!(
            "query {query:?}: {} terms, {} matches",
            lists.len(),
            matches.len()
        );
        Ok(rank(matches, options.limit))
    }

    /// Like [`search`](Self::search), but a failed query yields no results.
    pub fn search_or_empty(&self, query: &str, options: &SearchOptions) -> Vec<ScoredDoc> {
        self.search(query, options).unwrap_or_else(|e| {
            log::warn!("query {query:?} failed: {e}");
            Vec::new()
        })
    }

    /// Evaluates independent queries in parallel. Results are in input order.
    pub fn search_batch<S>(&self, queries: &[S], options: &SearchOptions) -> Vec<Result<Vec<ScoredDoc>>>
    where
        S: AsRef<str> + Sync,
    {
        queries
            .par_iter()
            .map(|q| self.search(q.as_ref(), options))
            .collect()
    }
}

/// Orders by descending score, then ascending document id, and applies `limit`.
pub fn rank(mut docs: Vec<ScoredDoc>, limit: Option<usize>) -> Vec<ScoredDoc> {
    docs.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.doc_id.cmp(&b.doc_id))
    });
    if let Some(limit) = limit {
        docs.truncate(limit);
    }
    docs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(doc_id: u32, score: f64) -> ScoredDoc {
        ScoredDoc { doc_id, score }
    }

    #[test]
    fn test_rank_order_and_limit() {
        let docs = vec![doc(4, 1.0), doc(2, 3.0), doc(1, 1.0), doc(9, 0.0), doc(3, 3.0)];
        let ranked: Vec<u32> = rank(docs.clone(), None).iter().map(|d| d.doc_id).collect();
        assert_eq!(ranked, vec![2, 3, 1, 4, 9]);
        let top: Vec<u32> = rank(docs, Some(2)).iter().map(|d| d.doc_id).collect();
        assert_eq!(top, vec![2, 3]);
        assert!(rank(Vec::new(), Some(3)).is_empty());
    }
}
