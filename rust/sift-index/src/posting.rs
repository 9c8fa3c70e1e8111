//! Fixed-width posting records and their sequential file codec.
//!
//! Both the tokenized postings file and the sorted postings file (and every
//! intermediate sort run) are plain sequences of 12-byte little-endian records
//! `(term_id u32, doc_id u32, freq u32)` with no header. The record count is
//! derived from the file length; a length that is not a multiple of the record
//! size means the file was truncated or is not a postings file.

use std::{
    cmp::Ordering,
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
};

use byteorder::{ByteOrder, LittleEndian};
use sift_common::{Result, error::Error, try_or_ret_some_err, verify_arg};
use sift_io::{ArtifactWriter, SealingWrite};

/// Size of a single encoded posting record in bytes.
pub const RECORD_SIZE: usize = 12;

const DEFAULT_READ_BUFFER: usize = 64 * 1024;

/// A record linking a term to a document in which it occurs, with its frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Posting {
    pub term_id: u32,
    pub doc_id: u32,
    pub freq: u32,
}

impl Posting {
    pub fn new(term_id: u32, doc_id: u32, freq: u32) -> Posting {
        Posting {
            term_id,
            doc_id,
            freq,
        }
    }

    /// The sort key of the posting: term first, then document.
    #[inline]
    pub fn key(&self) -> (u32, u32) {
        (self.term_id, self.doc_id)
    }

    /// Writes the record into the first [`RECORD_SIZE`] bytes of `buf`.
    #[inline]
    pub fn encode(&self, buf: &mut [u8]) {
        LittleEndian::write_u32(&mut buf[0..4], self.term_id);
        LittleEndian::write_u32(&mut buf[4..8], self.doc_id);
        LittleEndian::write_u32(&mut buf[8..12], self.freq);
    }

    /// Reads a record from the first [`RECORD_SIZE`] bytes of `buf`.
    #[inline]
    pub fn decode(buf: &[u8]) -> Posting {
        Posting {
            term_id: LittleEndian::read_u32(&buf[0..4]),
            doc_id: LittleEndian::read_u32(&buf[4..8]),
            freq: LittleEndian::read_u32(&buf[8..12]),
        }
    }
}

impl Ord for Posting {
    /// Orders by `(term_id, doc_id)`; the frequency only breaks ties so that the
    /// ordering stays consistent with `Eq`.
    fn cmp(&self, other: &Posting) -> Ordering {
        (self.term_id, self.doc_id, self.freq).cmp(&(other.term_id, other.doc_id, other.freq))
    }
}

impl PartialOrd for Posting {
    fn partial_cmp(&self, other: &Posting) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Appends posting records to a sealed artifact.
pub struct PostingWriter {
    writer: ArtifactWriter,
    count: u64,
}

impl PostingWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<PostingWriter> {
        let path = path.as_ref();
        let writer = ArtifactWriter::create(path)
            .map_err(|e| Error::io(format!("create {}", path.display()), e))?;
        Ok(PostingWriter { writer, count: 0 })
    }

    /// Creates a writer whose in-memory buffer holds `buffer_size` bytes.
    pub fn with_buffer<P: AsRef<Path>>(path: P, buffer_size: usize) -> Result<PostingWriter> {
        let path = path.as_ref();
        let writer = ArtifactWriter::with_capacity(path, buffer_size.max(RECORD_SIZE))
            .map_err(|e| Error::io(format!("create {}", path.display()), e))?;
        Ok(PostingWriter { writer, count: 0 })
    }

    #[inline]
    pub fn push(&mut self, posting: &Posting) -> Result<()> {
        let mut buf = [0u8; RECORD_SIZE];
        posting.encode(&mut buf);
        self.writer
            .write_all(&buf)
            .map_err(|e| Error::io(format!("write {}", self.writer.path().display()), e))?;
        self.count += 1;
        Ok(())
    }

    pub fn push_all<'a>(&mut self, postings: impl IntoIterator<Item = &'a Posting>) -> Result<()> {
        for posting in postings {
            self.push(posting)?;
        }
        Ok(())
    }

    /// Number of records written so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Seals the file under its final name and returns the record count.
    pub fn finish(mut self) -> Result<u64> {
        self.writer
            .seal()
            .map_err(|e| Error::io(format!("seal {}", self.writer.path().display()), e))?;
        Ok(self.count)
    }
}

/// Sequential reader over a file of posting records.
pub struct PostingReader {
    path: PathBuf,
    reader: BufReader<File>,
    total: u64,
    consumed: u64,
}

impl PostingReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<PostingReader> {
        Self::with_buffer(path, DEFAULT_READ_BUFFER)
    }

    /// Opens the file with an in-memory read buffer of `buffer_size` bytes.
    pub fn with_buffer<P: AsRef<Path>>(path: P, buffer_size: usize) -> Result<PostingReader> {
        let path = path.as_ref().to_path_buf();
        let (file, total) = open_records(&path)?;
        Ok(PostingReader {
            reader: BufReader::with_capacity(buffer_size.max(RECORD_SIZE), file),
            total,
            consumed: 0,
            path,
        })
    }

    /// Total number of records in the file.
    pub fn len(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Number of records not yet read.
    pub fn remaining(&self) -> u64 {
        self.total - self.consumed
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the next record, or `None` at the end of the file.
    pub fn next_posting(&mut self) -> Result<Option<Posting>> {
        if self.consumed == self.total {
            return Ok(None);
        }
        let mut buf = [0u8; RECORD_SIZE];
        self.reader
            .read_exact(&mut buf)
            .map_err(|e| Error::io(format!("read {}", self.path.display()), e))?;
        self.consumed += 1;
        Ok(Some(Posting::decode(&buf)))
    }

    /// Clears `block` and fills it with up to `max_records` records.
    ///
    /// Returns the number of records read; zero means the file is exhausted.
    pub fn read_block(&mut self, block: &mut Vec<Posting>, max_records: usize) -> Result<usize> {
        verify_arg!("max_records", max_records > 0);
        block.clear();
        while block.len() < max_records {
            match self.next_posting()? {
                Some(posting) => block.push(posting),
                None => break,
            }
        }
        Ok(block.len())
    }
}

impl Iterator for PostingReader {
    type Item = Result<Posting>;

    fn next(&mut self) -> Option<Self::Item> {
        try_or_ret_some_err!(self.next_posting()).map(Ok)
    }
}

/// Reads a postings file in raw blocks from an unbuffered handle.
///
/// The caller supplies the only buffer, so the memory held for the file is exactly
/// the block passed to [`read_block`](PostingBlockReader::read_block). Records are
/// decoded by the caller with [`Posting::decode`] as they are consumed.
pub struct PostingBlockReader {
    path: PathBuf,
    file: File,
    remaining: u64,
}

impl PostingBlockReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<PostingBlockReader> {
        let path = path.as_ref().to_path_buf();
        let (file, remaining) = open_records(&path)?;
        Ok(PostingBlockReader {
            path,
            file,
            remaining,
        })
    }

    /// Number of records not yet read.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Replaces the content of `block` with the encoded bytes of up to
    /// `max_records` records.
    ///
    /// Returns the number of records read; zero means the file is exhausted.
    pub fn read_block(&mut self, block: &mut Vec<u8>, max_records: usize) -> Result<usize> {
        verify_arg!("max_records", max_records > 0);
        let count = self.remaining.min(max_records as u64) as usize;
        block.clear();
        block.resize(count * RECORD_SIZE, 0);
        self.file
            .read_exact(block)
            .map_err(|e| Error::io(format!("read {}", self.path.display()), e))?;
        self.remaining -= count as u64;
        Ok(count)
    }
}

/// Opens a postings file and returns it with its record count.
fn open_records(path: &Path) -> Result<(File, u64)> {
    let file = File::open(path).map_err(|e| Error::io(format!("open {}", path.display()), e))?;
    let len = file
        .metadata()
        .map_err(|e| Error::io(format!("stat {}", path.display()), e))?
        .len();
    if len % RECORD_SIZE as u64 != 0 {
        return Err(Error::invalid_format_msg(
            path.display().to_string(),
            format!("length {len} is not a multiple of the {RECORD_SIZE}-byte record size"),
        ));
    }
    Ok((file, len / RECORD_SIZE as u64))
}

/// Reads every record of a postings file into memory. Intended for tests and tooling.
pub fn read_all_postings<P: AsRef<Path>>(path: P) -> Result<Vec<Posting>> {
    PostingReader::open(path)?.collect()
}
