//! Paged B+Tree mapping term ids to posting-list locations.
//!
//! The tree is stored as two files:
//! - the page file, a sequence of fixed-size pages (`block_size` bytes each);
//! - the metadata file ([`TreeMeta`]), which records the block size, page count,
//!   root page and shape so the tree can be reopened without a rebuild.
//!
//! Trees are bulk-loaded bottom-up from sorted keys by [`BTreeBuilder`] and opened
//! read-only by [`BTree`], which keeps decoded pages in a bounded LRU
//! [`PageBuffer`].
//!
//! Leaves are written first and in key order, so page `i + 1` is always the right
//! sibling of leaf page `i`. Internal levels follow, and the root is the last page.

mod buffer;
mod meta;
mod page;
mod read;
mod write;

pub use buffer::{BufferStats, PageBuffer};
pub use meta::TreeMeta;
pub use page::{InternalPage, LeafEntry, LeafPage, Page};
pub use read::{BTree, LeafScan, TreeStats};
pub use write::BTreeBuilder;

use sift_common::{Result, error::Error};

/// Size of the common page header.
pub const PAGE_HEADER_SIZE: usize = 12;

/// Encoded size of a leaf entry: `(term_id u32, offset u64, length u32, doc_freq u32)`.
pub const LEAF_ENTRY_SIZE: usize = 20;

/// Encoded size of an internal `(separator u32, child u32)` pair.
pub const INTERNAL_ENTRY_SIZE: usize = 8;

/// Sibling pointer value of the rightmost leaf.
pub const NO_PAGE: u32 = u32::MAX;

/// Where a term's posting list lives in the posting-list file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PostingLocation {
    /// Byte offset of the encoded list.
    pub offset: u64,
    /// Encoded length in bytes.
    pub length: u32,
    /// Number of documents in the list.
    pub doc_freq: u32,
}

/// Page geometry derived from the block size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLayout {
    pub block_size: usize,
    /// Maximum entries in a leaf page.
    pub leaf_capacity: usize,
    /// Maximum children of an internal page.
    pub fanout: usize,
}

impl PageLayout {
    pub fn new(block_size: usize) -> Result<PageLayout> {
        let body = block_size.saturating_sub(PAGE_HEADER_SIZE);
        let leaf_capacity = body / LEAF_ENTRY_SIZE;
        let fanout = if body >= 4 {
            (body - 4) / INTERNAL_ENTRY_SIZE + 1
        } else {
            0
        };
        if block_size % 4 != 0 || leaf_capacity < 2 || fanout < 3 {
            return Err(Error::invalid_config(
                "block_size",
                format!("{block_size} bytes is too small or misaligned for a tree page"),
            ));
        }
        if leaf_capacity > u16::MAX as usize || fanout > u16::MAX as usize {
            return Err(Error::invalid_config(
                "block_size",
                format!("{block_size} bytes exceeds the maximum tree page size"),
            ));
        }
        Ok(PageLayout {
            block_size,
            leaf_capacity,
            fanout,
        })
    }

    /// Smallest entry count of a non-root leaf.
    pub fn min_leaf_entries(&self) -> usize {
        self.leaf_capacity.div_ceil(2)
    }

    /// Smallest child count of a non-root internal page.
    pub fn min_children(&self) -> usize {
        self.fanout.div_ceil(2)
    }
}
