//! The tree metadata file.

use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use sift_common::{Result, error::Error};
use sift_io::{ArtifactWriter, SealingWrite};

pub const META_MAGIC: &[u8; 8] = b"SIFTMETA";
pub const META_VERSION: u32 = 1;
pub const META_SIZE: usize = 64;

const CHECKSUM_OFFSET: usize = META_SIZE - 8;

/// Tree metadata, persisted next to the page file.
///
/// Layout (64 bytes, little-endian): magic, version, block size, page count, root
/// page, height, fanout, leaf capacity (`u32` each), key count (`u64`), 12 reserved
/// bytes and an xxh3-64 checksum of everything before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeMeta {
    pub block_size: u32,
    pub page_count: u32,
    pub root_page: u32,
    /// Number of levels, 1 for a tree that is a single leaf.
    pub height: u32,
    pub fanout: u32,
    pub leaf_capacity: u32,
    pub key_count: u64,
}

impl TreeMeta {
    pub fn encode(&self) -> [u8; META_SIZE] {
        let mut buf = [0u8; META_SIZE];
        buf[0..8].copy_from_slice(META_MAGIC);
        let fields = [
            META_VERSION,
            self.block_size,
            self.page_count,
            self.root_page,
            self.height,
            self.fanout,
            self.leaf_capacity,
        ];
        for (i, value) in fields.iter().enumerate() {
            LittleEndian::write_u32(&mut buf[8 + i * 4..12 + i * 4], *value);
        }
        LittleEndian::write_u64(&mut buf[36..44], self.key_count);
        let checksum = xxhash_rust::xxh3::xxh3_64(&buf[..CHECKSUM_OFFSET]);
        LittleEndian::write_u64(&mut buf[CHECKSUM_OFFSET..], checksum);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<TreeMeta> {
        if buf.len() != META_SIZE {
            return Err(Error::invalid_format_msg(
                "tree meta",
                format!("expected {META_SIZE} bytes, got {}", buf.len()),
            ));
        }
        if &buf[0..8] != META_MAGIC {
            return Err(Error::invalid_format_msg("tree meta", "bad magic"));
        }
        let stored = LittleEndian::read_u64(&buf[CHECKSUM_OFFSET..]);
        if stored != xxhash_rust::xxh3::xxh3_64(&buf[..CHECKSUM_OFFSET]) {
            return Err(Error::checksum_mismatch("tree meta"));
        }
        let field = |i: usize| LittleEndian::read_u32(&buf[8 + i * 4..12 + i * 4]);
        let version = field(0);
        if version != META_VERSION {
            return Err(Error::invalid_format_msg(
                "tree meta",
                format!("unsupported version {version}"),
            ));
        }
        Ok(TreeMeta {
            block_size: field(1),
            page_count: field(2),
            root_page: field(3),
            height: field(4),
            fanout: field(5),
            leaf_capacity: field(6),
            key_count: LittleEndian::read_u64(&buf[36..44]),
        })
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = ArtifactWriter::create(path)
            .map_err(|e| Error::io(format!("create {}", path.display()), e))?;
        SealingWrite::write_all(&mut writer, &self.encode())
            .and_then(|_| writer.seal())
            .map_err(|e| Error::io(format!("write {}", path.display()), e))
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<TreeMeta> {
        let path = path.as_ref();
        let buf =
            std::fs::read(path).map_err(|e| Error::io(format!("read {}", path.display()), e))?;
        TreeMeta::decode(&buf)
    }

    /// Expected length of the page file.
    pub fn tree_file_len(&self) -> u64 {
        self.page_count as u64 * self.block_size as u64
    }
}
