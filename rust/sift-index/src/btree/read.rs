//! Read-only access to a built tree.

use std::{
    num::NonZeroUsize,
    ops::{Bound, RangeBounds},
    path::Path,
    sync::Arc,
};

use sift_common::{Result, error::Error, try_or_ret_some_err};
use sift_io::{FileReader, ReadAt};

use super::{BufferStats, Page, PageBuffer, PageLayout, PostingLocation, TreeMeta};

/// An opened tree.
///
/// `BTree` is immutable after `open` and is meant to be shared between query
/// threads through an `Arc`. Lookups only synchronize on the page buffer's LRU
/// bookkeeping; page reads are positional and run concurrently.
pub struct BTree {
    meta: TreeMeta,
    layout: PageLayout,
    reader: FileReader,
    buffer: PageBuffer,
}

/// Shape and fill statistics gathered by [`BTree::validate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub height: u32,
    pub pages: u32,
    pub leaf_pages: u32,
    pub internal_pages: u32,
    pub keys: u64,
    pub min_leaf_entries: usize,
    pub max_leaf_entries: usize,
}

impl BTree {
    /// Opens the tree described by `meta_path`, expecting pages of `block_size`
    /// bytes and buffering at most `n_blocks` decoded pages.
    pub fn open(
        meta_path: &Path,
        tree_path: &Path,
        block_size: usize,
        n_blocks: usize,
    ) -> Result<BTree> {
        let meta = TreeMeta::read(meta_path)?;
        if meta.block_size as usize != block_size {
            return Err(Error::invalid_format_msg(
                meta_path.display().to_string(),
                format!(
                    "tree was built with {}-byte pages, {block_size} requested",
                    meta.block_size
                ),
            ));
        }
        let layout = PageLayout::new(block_size)?;
        if meta.fanout as usize != layout.fanout
            || meta.leaf_capacity as usize != layout.leaf_capacity
        {
            return Err(Error::invalid_format_msg(
                meta_path.display().to_string(),
                "page geometry does not match the block size",
            ));
        }
        if meta.page_count == 0 || meta.root_page >= meta.page_count || meta.height == 0 {
            return Err(Error::invalid_format_msg(
                meta_path.display().to_string(),
                "root page out of range",
            ));
        }

        let reader = FileReader::open(tree_path)
            .map_err(|e| Error::io(format!("open {}", tree_path.display()), e))?;
        let actual = reader
            .size()
            .map_err(|e| Error::io(format!("stat {}", tree_path.display()), e))?;
        let expected = meta.tree_file_len();
        if actual != expected {
            let problem = if actual < expected {
                "truncated"
            } else {
                "has trailing bytes"
            };
            return Err(Error::invalid_format_msg(
                tree_path.display().to_string(),
                format!(
                    "page file {problem}: {actual} bytes, {} pages of {block_size} need {expected}",
                    meta.page_count
                ),
            ));
        }

        let capacity = NonZeroUsize::new(n_blocks)
            .ok_or_else(|| Error::invalid_config("n_blocks", "page buffer needs at least one page"))?;
        log::debug!(
            "opened tree {}: {} pages, height {}, {} keys",
            tree_path.display(),
            meta.page_count,
            meta.height,
            meta.key_count
        );
        Ok(BTree {
            meta,
            layout,
            reader,
            buffer: PageBuffer::new(capacity),
        })
    }

    pub fn meta(&self) -> &TreeMeta {
        &self.meta
    }

    pub fn len(&self) -> u64 {
        self.meta.key_count
    }

    pub fn is_empty(&self) -> bool {
        self.meta.key_count == 0
    }

    /// Finds the location stored for `term_id`.
    pub fn lookup(&self, term_id: u32) -> Result<Option<PostingLocation>> {
        match self.descend(term_id)?.as_ref() {
            Page::Leaf(leaf) => Ok(leaf.find(term_id)),
            Page::Internal(_) => Ok(None),
        }
    }

    /// Ordered scan over the entries whose keys fall in `range`, following the leaf
    /// sibling chain.
    pub fn range<R: RangeBounds<u32>>(&self, range: R) -> Result<LeafScan<'_>> {
        let start = match range.start_bound() {
            Bound::Included(&k) => Some(k),
            Bound::Excluded(&k) => k.checked_add(1),
            Bound::Unbounded => Some(0),
        };
        let end = range.end_bound().cloned();
        let Some(start) = start else {
            return Ok(LeafScan::empty(self));
        };
        let leaf = self.descend(start)?;
        let pos = match leaf.as_ref() {
            Page::Leaf(page) => page.lower_bound(start),
            Page::Internal(_) => 0,
        };
        Ok(LeafScan {
            tree: self,
            leaf: Some(leaf),
            pos,
            end,
        })
    }

    pub fn buffer_stats(&self) -> BufferStats {
        self.buffer.stats()
    }

    /// Releases the page buffer. The tree holds no dirty state.
    pub fn close(self) {
        self.buffer.clear();
        log::debug!("closed tree with {:?}", self.buffer.stats());
    }

    /// Walks every page and checks the structural invariants: uniform leaf depth,
    /// strictly increasing keys, child key ranges, occupancy bounds, sibling chain
    /// and the totals recorded in the metadata.
    pub fn validate(&self) -> Result<TreeStats> {
        let mut walk = Walk {
            stats: TreeStats {
                height: self.meta.height,
                min_leaf_entries: usize::MAX,
                ..Default::default()
            },
            leaf_order: Vec::new(),
        };
        self.validate_page(self.meta.root_page, self.meta.height - 1, None, None, true, &mut walk)?;

        for pair in walk.leaf_order.windows(2) {
            let (id, next) = (pair[0].0, pair[1].0);
            if pair[0].1 != Some(next) {
                return Err(Error::consistency(format!(
                    "leaf {id} links to {:?} instead of {next}",
                    pair[0].1
                )));
            }
        }
        if let Some(&(id, next)) = walk.leaf_order.last() {
            if next.is_some() {
                return Err(Error::consistency(format!("last leaf {id} has a sibling")));
            }
        }

        let stats = walk.stats;
        if stats.keys != self.meta.key_count || stats.pages != self.meta.page_count {
            return Err(Error::consistency(format!(
                "tree holds {} keys in {} pages, metadata says {} keys in {} pages",
                stats.keys, stats.pages, self.meta.key_count, self.meta.page_count
            )));
        }
        if stats.leaf_pages == 0 {
            return Err(Error::consistency("tree has no leaves"));
        }
        Ok(stats)
    }

    fn validate_page(
        &self,
        page_id: u32,
        level: u32,
        lo: Option<u32>,
        hi: Option<u32>,
        is_root: bool,
        walk: &mut Walk,
    ) -> Result<()> {
        let page = self.read_page(page_id)?;
        if page.level() as u32 != level {
            return Err(Error::consistency(format!(
                "page {page_id} is at level {}, expected {level}",
                page.level()
            )));
        }
        let keys: Vec<u32> = match &page {
            Page::Leaf(leaf) => leaf.entries.iter().map(|e| e.term_id).collect(),
            Page::Internal(node) => node.separators.clone(),
        };
        if !keys.windows(2).all(|w| w[0] < w[1]) {
            return Err(Error::consistency(format!("page {page_id} keys are not increasing")));
        }
        let in_range = |k: &u32| lo.is_none_or(|lo| *k >= lo) && hi.is_none_or(|hi| *k < hi);
        if !keys.iter().all(in_range) {
            return Err(Error::consistency(format!(
                "page {page_id} holds keys outside [{lo:?}, {hi:?})"
            )));
        }
        walk.stats.pages += 1;

        match &page {
            Page::Leaf(leaf) => {
                if !is_root && leaf.entries.len() < self.layout.min_leaf_entries() {
                    return Err(Error::consistency(format!("leaf {page_id} is underfull")));
                }
                walk.stats.leaf_pages += 1;
                walk.stats.keys += leaf.entries.len() as u64;
                walk.stats.min_leaf_entries = walk.stats.min_leaf_entries.min(leaf.entries.len());
                walk.stats.max_leaf_entries = walk.stats.max_leaf_entries.max(leaf.entries.len());
                walk.leaf_order.push((page_id, leaf.next_leaf));
            }
            Page::Internal(node) => {
                let min_children = if is_root { 2 } else { self.layout.min_children() };
                if node.children.len() < min_children {
                    return Err(Error::consistency(format!("internal page {page_id} is underfull")));
                }
                walk.stats.internal_pages += 1;
                for (i, &child) in node.children.iter().enumerate() {
                    let child_lo = if i == 0 { lo } else { Some(node.separators[i - 1]) };
                    let child_hi = node.separators.get(i).copied().or(hi);
                    self.validate_page(child, level - 1, child_lo, child_hi, false, walk)?;
                }
            }
        }
        Ok(())
    }

    /// Root-to-leaf descent towards `term_id`; always returns a leaf page.
    fn descend(&self, term_id: u32) -> Result<Arc<Page>> {
        let mut page_id = self.meta.root_page;
        for _ in 0..self.meta.height {
            let page = self.page(page_id)?;
            match page.as_ref() {
                Page::Internal(node) => page_id = node.child_for(term_id),
                Page::Leaf(_) => return Ok(page),
            }
        }
        Err(Error::consistency(format!(
            "no leaf reached after {} levels",
            self.meta.height
        )))
    }

    fn page(&self, page_id: u32) -> Result<Arc<Page>> {
        self.buffer.get_or_load(page_id, || self.read_page(page_id))
    }

    fn read_page(&self, page_id: u32) -> Result<Page> {
        if page_id >= self.meta.page_count {
            return Err(Error::consistency(format!(
                "page {page_id} is beyond the {} pages of the tree",
                self.meta.page_count
            )));
        }
        let bs = self.layout.block_size as u64;
        let start = page_id as u64 * bs;
        let buf = self
            .reader
            .read_at(start..start + bs)
            .map_err(|e| Error::io(format!("read tree page {page_id}"), e))?;
        Page::decode(&buf, page_id, &self.layout)
    }
}

struct Walk {
    stats: TreeStats,
    leaf_order: Vec<(u32, Option<u32>)>,
}

/// Iterator over `(term_id, location)` pairs of a key range.
pub struct LeafScan<'a> {
    tree: &'a BTree,
    leaf: Option<Arc<Page>>,
    pos: usize,
    end: Bound<u32>,
}

impl<'a> LeafScan<'a> {
    fn empty(tree: &'a BTree) -> LeafScan<'a> {
        LeafScan {
            tree,
            leaf: None,
            pos: 0,
            end: Bound::Unbounded,
        }
    }

    fn within_end(&self, term_id: u32) -> bool {
        match self.end {
            Bound::Included(end) => term_id <= end,
            Bound::Excluded(end) => term_id < end,
            Bound::Unbounded => true,
        }
    }
}

impl Iterator for LeafScan<'_> {
    type Item = Result<(u32, PostingLocation)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let page = self.leaf.clone()?;
            let Page::Leaf(leaf) = page.as_ref() else {
                self.leaf = None;
                return Some(Err(Error::consistency("leaf scan reached an internal page")));
            };
            if let Some(entry) = leaf.entries.get(self.pos) {
                if !self.within_end(entry.term_id) {
                    self.leaf = None;
                    return None;
                }
                self.pos += 1;
                return Some(Ok((entry.term_id, entry.location)));
            }
            self.leaf = None;
            self.pos = 0;
            if let Some(next) = leaf.next_leaf {
                self.leaf = Some(try_or_ret_some_err!(self.tree.page(next)));
            }
        }
    }
}
