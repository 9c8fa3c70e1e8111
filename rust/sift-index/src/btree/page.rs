//! Fixed-size page codec.
//!
//! Header (12 bytes): `kind u8`, `level u8`, `key_count u16`, `next_leaf u32`,
//! `checksum u32`. The checksum is the low half of an xxh3 hash over the page with
//! the checksum field left out. Unused bytes after the body are zero.

use byteorder::{ByteOrder, LittleEndian};
use sift_common::{Result, error::Error};
use xxhash_rust::xxh3::Xxh3;

use super::{
    INTERNAL_ENTRY_SIZE, LEAF_ENTRY_SIZE, NO_PAGE, PAGE_HEADER_SIZE, PageLayout, PostingLocation,
};

const KIND_LEAF: u8 = 1;
const KIND_INTERNAL: u8 = 2;

/// One key of a leaf: a term id and where its posting list is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafEntry {
    pub term_id: u32,
    pub location: PostingLocation,
}

/// Leaf node. Entries are strictly increasing by term id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafPage {
    pub entries: Vec<LeafEntry>,
    /// Right sibling, `None` for the last leaf.
    pub next_leaf: Option<u32>,
}

impl LeafPage {
    pub fn find(&self, term_id: u32) -> Option<PostingLocation> {
        self.entries
            .binary_search_by_key(&term_id, |e| e.term_id)
            .ok()
            .map(|i| self.entries[i].location)
    }

    /// Index of the first entry with a key not less than `term_id`.
    pub fn lower_bound(&self, term_id: u32) -> usize {
        self.entries.partition_point(|e| e.term_id < term_id)
    }
}

/// Internal node: `children[i]` holds the keys in `[separators[i - 1], separators[i])`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalPage {
    pub level: u8,
    pub separators: Vec<u32>,
    pub children: Vec<u32>,
}

impl InternalPage {
    pub fn child_index(&self, term_id: u32) -> usize {
        self.separators.partition_point(|&sep| sep <= term_id)
    }

    pub fn child_for(&self, term_id: u32) -> u32 {
        self.children[self.child_index(term_id)]
    }
}

/// A decoded tree page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    Leaf(LeafPage),
    Internal(InternalPage),
}

impl Page {
    pub fn level(&self) -> u8 {
        match self {
            Page::Leaf(_) => 0,
            Page::Internal(page) => page.level,
        }
    }

    pub fn key_count(&self) -> usize {
        match self {
            Page::Leaf(page) => page.entries.len(),
            Page::Internal(page) => page.separators.len(),
        }
    }

    pub fn encode(&self, layout: &PageLayout) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; layout.block_size];
        match self {
            Page::Leaf(leaf) => {
                if leaf.entries.len() > layout.leaf_capacity {
                    return Err(Error::invalid_arg("leaf", "too many entries for the page"));
                }
                buf[0] = KIND_LEAF;
                LittleEndian::write_u32(&mut buf[4..8], leaf.next_leaf.unwrap_or(NO_PAGE));
                let mut pos = PAGE_HEADER_SIZE;
                for entry in &leaf.entries {
                    let slot = &mut buf[pos..pos + LEAF_ENTRY_SIZE];
                    LittleEndian::write_u32(&mut slot[0..4], entry.term_id);
                    LittleEndian::write_u64(&mut slot[4..12], entry.location.offset);
                    LittleEndian::write_u32(&mut slot[12..16], entry.location.length);
                    LittleEndian::write_u32(&mut slot[16..20], entry.location.doc_freq);
                    pos += LEAF_ENTRY_SIZE;
                }
            }
            Page::Internal(node) => {
                if node.children.len() != node.separators.len() + 1
                    || node.children.len() > layout.fanout
                    || node.level == 0
                {
                    return Err(Error::invalid_arg("internal page", "malformed node"));
                }
                buf[0] = KIND_INTERNAL;
                buf[1] = node.level;
                LittleEndian::write_u32(&mut buf[4..8], NO_PAGE);
                let mut pos = PAGE_HEADER_SIZE;
                LittleEndian::write_u32(&mut buf[pos..pos + 4], node.children[0]);
                pos += 4;
                for (sep, child) in node.separators.iter().zip(&node.children[1..]) {
                    LittleEndian::write_u32(&mut buf[pos..pos + 4], *sep);
                    LittleEndian::write_u32(&mut buf[pos + 4..pos + 8], *child);
                    pos += INTERNAL_ENTRY_SIZE;
                }
            }
        }
        LittleEndian::write_u16(&mut buf[2..4], self.key_count() as u16);
        let checksum = page_checksum(&buf);
        LittleEndian::write_u32(&mut buf[8..12], checksum);
        Ok(buf)
    }

    /// Decodes and verifies page `page_id`.
    pub fn decode(buf: &[u8], page_id: u32, layout: &PageLayout) -> Result<Page> {
        let element = || format!("tree page {page_id}");
        if buf.len() != layout.block_size {
            return Err(Error::invalid_format_msg(
                element(),
                format!("expected {} bytes, got {}", layout.block_size, buf.len()),
            ));
        }
        if LittleEndian::read_u32(&buf[8..12]) != page_checksum(buf) {
            return Err(Error::checksum_mismatch(element()));
        }
        let level = buf[1];
        let key_count = LittleEndian::read_u16(&buf[2..4]) as usize;
        let next = LittleEndian::read_u32(&buf[4..8]);
        match buf[0] {
            KIND_LEAF => {
                if level != 0 || key_count > layout.leaf_capacity {
                    return Err(Error::invalid_format_msg(element(), "bad leaf header"));
                }
                let entries = buf[PAGE_HEADER_SIZE..PAGE_HEADER_SIZE + key_count * LEAF_ENTRY_SIZE]
                    .chunks_exact(LEAF_ENTRY_SIZE)
                    .map(|slot| LeafEntry {
                        term_id: LittleEndian::read_u32(&slot[0..4]),
                        location: PostingLocation {
                            offset: LittleEndian::read_u64(&slot[4..12]),
                            length: LittleEndian::read_u32(&slot[12..16]),
                            doc_freq: LittleEndian::read_u32(&slot[16..20]),
                        },
                    })
                    .collect();
                Ok(Page::Leaf(LeafPage {
                    entries,
                    next_leaf: (next != NO_PAGE).then_some(next),
                }))
            }
            KIND_INTERNAL => {
                if level == 0 || key_count + 1 > layout.fanout {
                    return Err(Error::invalid_format_msg(element(), "bad internal header"));
                }
                let body = &buf[PAGE_HEADER_SIZE..];
                let mut children = Vec::with_capacity(key_count + 1);
                let mut separators = Vec::with_capacity(key_count);
                children.push(LittleEndian::read_u32(&body[0..4]));
                for pair in body[4..4 + key_count * INTERNAL_ENTRY_SIZE].chunks_exact(INTERNAL_ENTRY_SIZE) {
                    separators.push(LittleEndian::read_u32(&pair[0..4]));
                    children.push(LittleEndian::read_u32(&pair[4..8]));
                }
                Ok(Page::Internal(InternalPage {
                    level,
                    separators,
                    children,
                }))
            }
            kind => Err(Error::invalid_format_msg(
                element(),
                format!("unknown page kind {kind}"),
            )),
        }
    }
}

fn page_checksum(buf: &[u8]) -> u32 {
    let mut hasher = Xxh3::new();
    hasher.update(&buf[..8]);
    hasher.update(&buf[PAGE_HEADER_SIZE..]);
    hasher.digest() as u32
}
