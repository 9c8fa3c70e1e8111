//! Index construction from the sorted postings file.

use std::{path::PathBuf, time::Instant};

use sift_common::{Result, error::Error};

use crate::{
    btree::{BTreeBuilder, PostingLocation, TreeMeta},
    posting::{Posting, PostingReader},
    posting_list::PostingListWriter,
};

/// Output locations of the index build.
#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub tree_meta: PathBuf,
    pub tree: PathBuf,
    pub posting_lists: PathBuf,
}

/// Counters reported by [`IndexBuilder::build`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildStats {
    /// Posting lists written, one per distinct term.
    pub terms: u64,
    pub postings: u64,
    /// Size of the posting-list file, header included.
    pub posting_bytes: u64,
    pub tree_pages: u32,
    pub tree_height: u32,
}

/// Turns a sorted posting stream into posting lists and a bulk-loaded tree in a
/// single sequential pass.
///
/// Every run of postings sharing a term id becomes one list; its location is
/// handed to the tree builder. The input must be strictly increasing in
/// `(term_id, doc_id)`: a duplicate or out-of-order pair, or a zero frequency,
/// aborts the build with a consistency error and nothing is committed.
pub struct IndexBuilder {
    block_size: usize,
}

impl IndexBuilder {
    pub fn new(block_size: usize) -> IndexBuilder {
        IndexBuilder { block_size }
    }

    pub fn build(&self, sorted: &mut PostingReader, paths: &IndexPaths, doc_count: u64) -> Result<BuildStats> {
        let start = Instant::now();
        let mut tree = BTreeBuilder::create(&paths.tree_meta, &paths.tree, self.block_size)?;
        let mut lists = PostingListWriter::create(&paths.posting_lists, doc_count)?;

        let mut prev: Option<Posting> = None;
        let mut postings = 0u64;
        while let Some(posting) = sorted.next_posting()? {
            check_posting(prev.as_ref(), &posting, doc_count)?;
            match prev {
                Some(p) if p.term_id == posting.term_id => {}
                Some(p) => {
                    let location = lists.end_list()?;
                    tree.push(p.term_id, location)?;
                    lists.begin_list()?;
                }
                None => lists.begin_list()?,
            }
            lists.push(posting.doc_id, posting.freq)?;
            postings += 1;
            prev = Some(posting);
        }
        if let Some(p) = prev {
            let location: PostingLocation = lists.end_list()?;
            tree.push(p.term_id, location)?;
        }

        // The posting-list file is the completion marker and is sealed last.
        let meta: TreeMeta = tree.finish()?;
        let posting_bytes = lists.bytes_written();
        let header = lists.finish()?;

        let stats = BuildStats {
            terms: header.term_count,
            postings,
            posting_bytes,
            tree_pages: meta.page_count,
            tree_height: meta.height,
        };
        log::info!(
            "built index: {} terms, {} postings, {} list bytes, tree of {} pages in {:.2}s",
            stats.terms,
            stats.postings,
            stats.posting_bytes,
            stats.tree_pages,
            start.elapsed().as_secs_f64()
        );
        Ok(stats)
    }
}

fn check_posting(prev: Option<&Posting>, posting: &Posting, doc_count: u64) -> Result<()> {
    if let Some(prev) = prev {
        if posting.key() <= prev.key() {
            let what = if posting.key() == prev.key() {
                "duplicate"
            } else {
                "out-of-order"
            };
            return Err(Error::consistency(format!(
                "{what} posting (term {}, doc {}) after (term {}, doc {})",
                posting.term_id, posting.doc_id, prev.term_id, prev.doc_id
            )));
        }
    }
    if posting.freq == 0 {
        return Err(Error::consistency(format!(
            "zero frequency for term {} in doc {}",
            posting.term_id, posting.doc_id
        )));
    }
    if posting.doc_id as u64 >= doc_count {
        return Err(Error::consistency(format!(
            "doc {} is outside the collection of {doc_count} documents",
            posting.doc_id
        )));
    }
    Ok(())
}
