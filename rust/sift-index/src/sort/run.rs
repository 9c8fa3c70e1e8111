//! Sorted runs: generation (pass 1) and block-buffered reading (pass 2).

use std::path::{Path, PathBuf};

use sift_common::{Result, error::Error};
use sift_io::{ArtifactWriter, SealingWrite};

use crate::posting::{Posting, PostingBlockReader, RECORD_SIZE};

/// Reads a sorted run through one raw block of at most `capacity` records.
///
/// Records are decoded from the block one at a time as the merge consumes them,
/// so the block is the only memory the reader holds. It is refilled from disk
/// when exhausted.
pub struct RunReader {
    source: PostingBlockReader,
    block: Vec<u8>,
    pos: usize,
    capacity: usize,
}

impl RunReader {
    pub fn open(path: &Path, capacity: usize) -> Result<RunReader> {
        let source = PostingBlockReader::open(path)?;
        let capacity = capacity.max(1);
        let allocated = (source.remaining() as usize).min(capacity);
        Ok(RunReader {
            source,
            block: Vec::with_capacity(allocated * RECORD_SIZE),
            pos: 0,
            capacity,
        })
    }

    /// The record at the head of the run, refilling the block if needed.
    ///
    /// Returns `None` once the run is exhausted.
    pub fn peek(&mut self) -> Result<Option<Posting>> {
        if self.pos == self.block.len() {
            if self.source.remaining() == 0 {
                return Ok(None);
            }
            self.source.read_block(&mut self.block, self.capacity)?;
            self.pos = 0;
        }
        Ok(self
            .block
            .get(self.pos..self.pos + RECORD_SIZE)
            .map(Posting::decode))
    }

    /// Consumes the head record. Must follow a `peek` that returned a record.
    pub fn advance(&mut self) {
        self.pos += RECORD_SIZE;
    }

    /// Buffer memory held by the reader, in records.
    pub fn resident(&self) -> usize {
        self.block.capacity() / RECORD_SIZE
    }
}

/// Outcome of pass 1.
pub(crate) struct InitialRuns {
    pub runs: Vec<PathBuf>,
    pub records: u64,
    /// Buffer memory held at once, in records: the raw block plus its decoded copy.
    pub peak_resident_records: usize,
}

/// Splits `input` into runs of at most `records_per_block` records, each sorted
/// by `(term_id, doc_id)` with a stable sort, and writes them into `dir`.
///
/// A block is read raw, decoded for sorting and encoded back into the same raw
/// buffer, which is then written unbuffered. Two blocks are resident at most.
pub(crate) fn write_initial_runs(
    input: &Path,
    dir: &Path,
    records_per_block: usize,
) -> Result<InitialRuns> {
    let mut source = PostingBlockReader::open(input)?;
    let block_records = (source.remaining() as usize).min(records_per_block);
    let mut raw = Vec::with_capacity(block_records * RECORD_SIZE);
    let mut block: Vec<Posting> = Vec::with_capacity(block_records);
    let mut runs = Vec::new();
    let mut records = 0u64;
    while source.read_block(&mut raw, records_per_block)? > 0 {
        block.clear();
        block.extend(raw.chunks_exact(RECORD_SIZE).map(Posting::decode));
        block.sort_by_key(Posting::key);
        for (chunk, posting) in raw.chunks_exact_mut(RECORD_SIZE).zip(&block) {
            posting.encode(chunk);
        }

        let path = dir.join(format!("run-0-{}.bin", runs.len()));
        write_run(&path, &raw)?;
        records += block.len() as u64;
        runs.push(path);
    }
    Ok(InitialRuns {
        runs,
        records,
        peak_resident_records: 2 * block_records,
    })
}

fn write_run(path: &Path, bytes: &[u8]) -> Result<()> {
    let io_err = |e: std::io::Error| Error::io(format!("write {}", path.display()), e);
    let mut writer = ArtifactWriter::with_capacity(path, 0).map_err(io_err)?;
    SealingWrite::write_all(&mut writer, bytes).map_err(io_err)?;
    writer.seal().map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posting::{PostingWriter, read_all_postings};

    #[test]
    fn test_initial_runs_are_sorted_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.bin");
        let mut writer = PostingWriter::create(&input).unwrap();
        for i in 0..10u32 {
            writer.push(&Posting::new(9 - i, i, 1)).unwrap();
        }
        writer.finish().unwrap();

        let initial = write_initial_runs(&input, dir.path(), 4).unwrap();
        let runs = initial.runs;
        assert_eq!(initial.records, 10);
        assert_eq!(initial.peak_resident_records, 8);
        assert_eq!(runs.len(), 3);
        let first = read_all_postings(&runs[0]).unwrap();
        let terms: Vec<u32> = first.iter().map(|p| p.term_id).collect();
        assert_eq!(terms, vec![6, 7, 8, 9]);
        assert_eq!(read_all_postings(&runs[2]).unwrap().len(), 2);
    }

    #[test]
    fn test_run_reader_refills() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.bin");
        let mut writer = PostingWriter::create(&path).unwrap();
        for i in 0..7u32 {
            writer.push(&Posting::new(1, i, 1)).unwrap();
        }
        writer.finish().unwrap();

        let mut reader = RunReader::open(&path, 3).unwrap();
        let mut docs = Vec::new();
        while let Some(p) = reader.peek().unwrap() {
            docs.push(p.doc_id);
            assert_eq!(reader.resident(), 3);
            reader.advance();
        }
        assert_eq!(docs, (0..7).collect::<Vec<_>>());
        assert!(reader.peek().unwrap().is_none());

        // a short run never allocates more than it holds
        let reader = RunReader::open(&path, 100).unwrap();
        assert_eq!(reader.resident(), 7);
    }
}
