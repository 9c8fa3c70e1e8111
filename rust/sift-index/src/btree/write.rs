//! Bottom-up bulk loading.

use std::path::{Path, PathBuf};

use sift_common::{Result, error::Error};
use sift_io::{ArtifactWriter, SealingWrite};

use super::{InternalPage, LeafEntry, LeafPage, Page, PageLayout, PostingLocation, TreeMeta};

/// Builds a tree from keys supplied in strictly increasing order.
///
/// The leaf level is streamed to disk as it fills. A full leaf is held back until
/// the next one is started, so that a short final leaf can be rebalanced with its
/// left neighbour and every leaf but a lone root keeps at least half of its
/// capacity. Internal levels are built once the leaf level is complete, from the
/// `(first key, page id)` list of the level below, spreading children evenly so
/// the same occupancy bound holds.
pub struct BTreeBuilder {
    layout: PageLayout,
    writer: ArtifactWriter,
    meta_path: PathBuf,
    current: Vec<LeafEntry>,
    held: Option<Vec<LeafEntry>>,
    /// `(first key, page id)` of every leaf written so far.
    leaves: Vec<(u32, u32)>,
    next_page: u32,
    last_key: Option<u32>,
    key_count: u64,
}

impl BTreeBuilder {
    pub fn create(meta_path: &Path, tree_path: &Path, block_size: usize) -> Result<BTreeBuilder> {
        let layout = PageLayout::new(block_size)?;
        let writer = ArtifactWriter::create(tree_path)
            .map_err(|e| Error::io(format!("create {}", tree_path.display()), e))?;
        Ok(BTreeBuilder {
            layout,
            writer,
            meta_path: meta_path.to_path_buf(),
            current: Vec::with_capacity(layout.leaf_capacity),
            held: None,
            leaves: Vec::new(),
            next_page: 0,
            last_key: None,
            key_count: 0,
        })
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    pub fn push(&mut self, term_id: u32, location: PostingLocation) -> Result<()> {
        if let Some(last) = self.last_key {
            if term_id <= last {
                return Err(Error::consistency(format!(
                    "tree keys out of order: {term_id} after {last}"
                )));
            }
        }
        self.last_key = Some(term_id);
        self.key_count += 1;
        self.current.push(LeafEntry { term_id, location });
        if self.current.len() == self.layout.leaf_capacity {
            if let Some(held) = self.held.take() {
                self.write_leaf(held, false)?;
            }
            let full = std::mem::replace(
                &mut self.current,
                Vec::with_capacity(self.layout.leaf_capacity),
            );
            self.held = Some(full);
        }
        Ok(())
    }

    /// Writes the remaining leaves and the internal levels, seals the page file and
    /// then writes the metadata file.
    pub fn finish(mut self) -> Result<TreeMeta> {
        let current = std::mem::take(&mut self.current);
        match self.held.take() {
            None => self.write_leaf(current, true)?,
            Some(held) if current.is_empty() => self.write_leaf(held, true)?,
            Some(held) if current.len() >= self.layout.min_leaf_entries() => {
                self.write_leaf(held, false)?;
                self.write_leaf(current, true)?;
            }
            Some(mut held) => {
                held.extend(current);
                let right = held.split_off(held.len().div_ceil(2));
                self.write_leaf(held, false)?;
                self.write_leaf(right, true)?;
            }
        }
        log::debug!("tree level 0: {} leaves", self.leaves.len());

        let mut level = std::mem::take(&mut self.leaves);
        let mut height = 1u32;
        while level.len() > 1 {
            level = self.write_internal_level(&level, height as u8)?;
            log::debug!("tree level {height}: {} pages", level.len());
            height += 1;
        }
        let root_page = level.first().map(|&(_, page)| page).unwrap_or(0);

        self.writer
            .seal()
            .map_err(|e| Error::io(format!("seal {}", self.writer.path().display()), e))?;

        let meta = TreeMeta {
            block_size: self.layout.block_size as u32,
            page_count: self.next_page,
            root_page,
            height,
            fanout: self.layout.fanout as u32,
            leaf_capacity: self.layout.leaf_capacity as u32,
            key_count: self.key_count,
        };
        meta.write(&self.meta_path)?;
        log::info!(
            "built tree: {} keys, {} pages, height {}",
            meta.key_count,
            meta.page_count,
            meta.height
        );
        Ok(meta)
    }

    fn write_leaf(&mut self, entries: Vec<LeafEntry>, last: bool) -> Result<()> {
        let page_id = self.next_page;
        let first_key = entries.first().map(|e| e.term_id).unwrap_or(0);
        let page = Page::Leaf(LeafPage {
            entries,
            next_leaf: (!last).then_some(page_id + 1),
        });
        self.write_page(&page)?;
        self.leaves.push((first_key, page_id));
        Ok(())
    }

    /// Groups `children` into as few pages as the fanout allows, with child counts
    /// differing by at most one.
    fn write_internal_level(&mut self, children: &[(u32, u32)], level: u8) -> Result<Vec<(u32, u32)>> {
        let pages = children.len().div_ceil(self.layout.fanout);
        let base = children.len() / pages;
        let extra = children.len() % pages;
        let mut parents = Vec::with_capacity(pages);
        let mut rest = children;
        for i in 0..pages {
            let take = base + usize::from(i < extra);
            let (group, tail) = rest.split_at(take);
            rest = tail;
            let page = Page::Internal(InternalPage {
                level,
                separators: group[1..].iter().map(|&(key, _)| key).collect(),
                children: group.iter().map(|&(_, page)| page).collect(),
            });
            parents.push((group[0].0, self.next_page));
            self.write_page(&page)?;
        }
        Ok(parents)
    }

    fn write_page(&mut self, page: &Page) -> Result<()> {
        let buf = page.encode(&self.layout)?;
        SealingWrite::write_all(&mut self.writer, &buf)
            .map_err(|e| Error::io(format!("write {}", self.writer.path().display()), e))?;
        self.next_page = self
            .next_page
            .checked_add(1)
            .ok_or_else(|| Error::invalid_operation("tree page id space exhausted"))?;
        Ok(())
    }
}
