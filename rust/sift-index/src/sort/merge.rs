//! K-way merge of sorted runs.

use std::{cmp::Ordering, collections::BinaryHeap, path::Path};

use sift_common::Result;

use super::run::RunReader;
use crate::posting::{PostingWriter, RECORD_SIZE};

/// Heap entry: the head key of one run.
///
/// The run ordinal takes part in the comparison, so equal keys leave the heap
/// in run order and the merge is stable.
#[derive(PartialEq, Eq)]
struct MergeCursor {
    key: (u32, u32),
    run: usize,
}

impl Ord for MergeCursor {
    fn cmp(&self, other: &MergeCursor) -> Ordering {
        // BinaryHeap is a max-heap; the smallest key must be on top.
        (self.key, self.run).cmp(&(other.key, other.run)).reverse()
    }
}

impl PartialOrd for MergeCursor {
    fn partial_cmp(&self, other: &MergeCursor) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Outcome of merging one group of runs.
pub(crate) struct MergeOutcome {
    pub records: u64,
    /// Buffer memory held at once, in records, by the input blocks and the output
    /// buffer together.
    pub peak_resident_records: usize,
}

/// Merges `runs` (each sorted by `(term_id, doc_id)`) into a new sealed file at
/// `output`.
///
/// Every input is read through a raw block of `buffer_records` records and the
/// output is written through a buffer of the same size, so at most
/// `(runs.len() + 1) * buffer_records` records are resident.
pub(crate) fn merge_runs<P: AsRef<Path>>(
    runs: &[P],
    output: &Path,
    buffer_records: usize,
) -> Result<MergeOutcome> {
    let mut readers = runs
        .iter()
        .map(|run| RunReader::open(run.as_ref(), buffer_records))
        .collect::<Result<Vec<_>>>()?;
    let mut writer = PostingWriter::with_buffer(output, buffer_records * RECORD_SIZE)?;

    let mut heap = BinaryHeap::with_capacity(readers.len());
    for (run, reader) in readers.iter_mut().enumerate() {
        if let Some(head) = reader.peek()? {
            heap.push(MergeCursor {
                key: head.key(),
                run,
            });
        }
    }
    // Run blocks are allocated once at open; the sum is constant for the merge.
    let peak_resident_records =
        readers.iter().map(RunReader::resident).sum::<usize>() + buffer_records;

    while let Some(cursor) = heap.pop() {
        let reader = &mut readers[cursor.run];
        if let Some(posting) = reader.peek()? {
            writer.push(&posting)?;
        }
        reader.advance();
        if let Some(next) = reader.peek()? {
            heap.push(MergeCursor {
                key: next.key(),
                run: cursor.run,
            });
        }
    }

    let records = writer.finish()?;
    Ok(MergeOutcome {
        records,
        peak_resident_records,
    })
}
