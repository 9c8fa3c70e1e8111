//! The posting-list file: one contiguous, delta-encoded list per term.
//!
//! Header (32 bytes): magic `SIFTPST1`, version `u32`, reserved `u32`,
//! `doc_count u64` (documents in the collection), `term_count u64` (lists in the
//! file). A list is a sequence of LEB128 `(doc_gap, freq)` pairs, the first gap
//! taken from document 0. Lists are addressed by [`PostingLocation`].

use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use sift_common::{Result, error::Error};
use sift_io::{ArtifactWriter, FileReader, ReadAt, SealingWrite};

use crate::{btree::PostingLocation, varint};

pub const POSTING_LIST_MAGIC: &[u8; 8] = b"SIFTPST1";
pub const POSTING_LIST_VERSION: u32 = 1;
pub const POSTING_LIST_HEADER_SIZE: usize = 32;

/// A `(document, term frequency)` entry of a posting list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocPosting {
    pub doc_id: u32,
    pub freq: u32,
}

/// Collection totals stored in the header of the posting-list file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingListHeader {
    pub doc_count: u64,
    pub term_count: u64,
}

impl PostingListHeader {
    fn encode(&self) -> [u8; POSTING_LIST_HEADER_SIZE] {
        let mut buf = [0u8; POSTING_LIST_HEADER_SIZE];
        buf[0..8].copy_from_slice(POSTING_LIST_MAGIC);
        LittleEndian::write_u32(&mut buf[8..12], POSTING_LIST_VERSION);
        LittleEndian::write_u64(&mut buf[16..24], self.doc_count);
        LittleEndian::write_u64(&mut buf[24..32], self.term_count);
        buf
    }

    fn decode(buf: &[u8]) -> Result<PostingListHeader> {
        if buf.len() < POSTING_LIST_HEADER_SIZE || &buf[0..8] != POSTING_LIST_MAGIC {
            return Err(Error::invalid_format_msg("posting lists", "bad header"));
        }
        let version = LittleEndian::read_u32(&buf[8..12]);
        if version != POSTING_LIST_VERSION {
            return Err(Error::invalid_format_msg(
                "posting lists",
                format!("unsupported version {version}"),
            ));
        }
        Ok(PostingListHeader {
            doc_count: LittleEndian::read_u64(&buf[16..24]),
            term_count: LittleEndian::read_u64(&buf[24..32]),
        })
    }
}

/// Streams posting lists into the posting-list file.
///
/// Each list is opened with [`begin_list`](Self::begin_list), filled with documents
/// in strictly increasing order and closed with [`end_list`](Self::end_list), which
/// returns its location.
pub struct PostingListWriter {
    writer: ArtifactWriter,
    header: PostingListHeader,
    list: Option<OpenList>,
    scratch: Vec<u8>,
}

struct OpenList {
    offset: u64,
    prev_doc: Option<u32>,
    doc_freq: u32,
}

impl PostingListWriter {
    pub fn create<P: AsRef<Path>>(path: P, doc_count: u64) -> Result<PostingListWriter> {
        let path = path.as_ref();
        let mut writer = ArtifactWriter::create(path)
            .map_err(|e| Error::io(format!("create {}", path.display()), e))?;
        let header = PostingListHeader {
            doc_count,
            term_count: 0,
        };
        SealingWrite::write_all(&mut writer, &header.encode())
            .map_err(|e| Error::io(format!("write {}", path.display()), e))?;
        Ok(PostingListWriter {
            writer,
            header,
            list: None,
            scratch: Vec::with_capacity(2 * varint::MAX_VARINT_LEN),
        })
    }

    pub fn begin_list(&mut self) -> Result<()> {
        if self.list.is_some() {
            return Err(Error::invalid_operation("begin_list: previous list still open"));
        }
        self.list = Some(OpenList {
            offset: SealingWrite::position(&self.writer),
            prev_doc: None,
            doc_freq: 0,
        });
        Ok(())
    }

    pub fn push(&mut self, doc_id: u32, freq: u32) -> Result<()> {
        let list = self
            .list
            .as_mut()
            .ok_or_else(|| Error::invalid_operation("push: no open list"))?;
        let gap = match list.prev_doc {
            None => doc_id,
            Some(prev) if doc_id > prev => doc_id - prev,
            Some(prev) => {
                return Err(Error::consistency(format!(
                    "document {doc_id} follows {prev} in a posting list"
                )));
            }
        };
        list.prev_doc = Some(doc_id);
        list.doc_freq += 1;
        self.scratch.clear();
        varint::write_u32(&mut self.scratch, gap);
        varint::write_u32(&mut self.scratch, freq);
        SealingWrite::write_all(&mut self.writer, &self.scratch)
            .map_err(|e| Error::io(format!("write {}", self.writer.path().display()), e))
    }

    pub fn end_list(&mut self) -> Result<PostingLocation> {
        let list = self
            .list
            .take()
            .ok_or_else(|| Error::invalid_operation("end_list: no open list"))?;
        let length = SealingWrite::position(&self.writer) - list.offset;
        let length = u32::try_from(length)
            .map_err(|_| Error::invalid_operation("posting list larger than 4 GiB"))?;
        self.header.term_count += 1;
        Ok(PostingLocation {
            offset: list.offset,
            length,
            doc_freq: list.doc_freq,
        })
    }

    /// Size of the file so far.
    pub fn bytes_written(&self) -> u64 {
        SealingWrite::position(&self.writer)
    }

    /// Finalizes the header and seals the file.
    pub fn finish(mut self) -> Result<PostingListHeader> {
        if self.list.is_some() {
            return Err(Error::invalid_operation("finish: list still open"));
        }
        let path = self.writer.path().display().to_string();
        self.writer
            .rewrite_at(0, &self.header.encode())
            .and_then(|_| self.writer.seal())
            .map_err(|e| Error::io(format!("seal {path}"), e))?;
        Ok(self.header)
    }
}

/// Random-access reader of posting lists.
///
/// Reads are positional, so one reader serves concurrent queries.
pub struct PostingListReader {
    reader: FileReader,
    header: PostingListHeader,
    file_len: u64,
}

impl PostingListReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<PostingListReader> {
        let path = path.as_ref();
        let io_err = |e| Error::io(format!("read {}", path.display()), e);
        let reader = FileReader::open(path).map_err(io_err)?;
        let file_len = reader.size().map_err(io_err)?;
        let bytes = reader
            .read_at(0..POSTING_LIST_HEADER_SIZE as u64)
            .map_err(io_err)?;
        let header = PostingListHeader::decode(&bytes)?;
        Ok(PostingListReader {
            reader,
            header,
            file_len,
        })
    }

    pub fn header(&self) -> &PostingListHeader {
        &self.header
    }

    /// Number of documents in the indexed collection.
    pub fn doc_count(&self) -> u64 {
        self.header.doc_count
    }

    pub fn read(&self, location: &PostingLocation) -> Result<Vec<DocPosting>> {
        let end = location.offset + location.length as u64;
        if location.offset < POSTING_LIST_HEADER_SIZE as u64 || end > self.file_len {
            return Err(Error::invalid_format_msg(
                "posting lists",
                format!(
                    "list at {}..{end} is outside the file ({} bytes)",
                    location.offset, self.file_len
                ),
            ));
        }
        let bytes = self
            .reader
            .read_at(location.offset..end)
            .map_err(|e| Error::io("read posting list", e))?;
        decode_list(&bytes, location.doc_freq)
    }
}

/// Decodes a list and checks it against the document count stored in the tree.
pub fn decode_list(bytes: &[u8], doc_freq: u32) -> Result<Vec<DocPosting>> {
    let mut out = Vec::with_capacity(doc_freq as usize);
    let mut pos = 0;
    let mut prev: Option<u32> = None;
    while pos < bytes.len() {
        let (gap, n) = varint::read_u32(&bytes[pos..])?;
        pos += n;
        let (freq, n) = varint::read_u32(&bytes[pos..])?;
        pos += n;
        let doc_id = match prev {
            None => gap,
            Some(_) if gap == 0 => {
                return Err(Error::invalid_format_msg("posting list", "repeated document"));
            }
            Some(prev) => prev
                .checked_add(gap)
                .ok_or_else(|| Error::invalid_format_msg("posting list", "document id overflow"))?,
        };
        out.push(DocPosting { doc_id, freq });
        prev = Some(doc_id);
    }
    if out.len() != doc_freq as usize {
        return Err(Error::invalid_format_msg(
            "posting list",
            format!("decoded {} documents, expected {doc_freq}", out.len()),
        ));
    }
    Ok(out)
}
