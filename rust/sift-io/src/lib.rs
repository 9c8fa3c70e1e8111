//! I/O abstractions shared by the index construction and serving code:
//! - `ReadAt`: positional reader able to fetch a byte range from a file without
//!   moving a shared cursor, so many threads can read the same file at once.
//! - `SealingWrite`: sequential writer with a `seal()` operation, committing the write
//!   activity.
//! - `ArtifactWriter`: the file-backed `SealingWrite` used for every build artifact. It
//!   writes to a `.partial` sibling and renames it into place on seal, so a canonical
//!   artifact path only ever holds complete content.

use std::ops::Range;

pub mod artifact;
pub mod file;

pub use artifact::{ArtifactWriter, artifact_exists, partial_path};
pub use file::FileReader;

/// Random-access byte source. Every read names its own offset.
pub trait ReadAt: Send + Sync + 'static {
    /// Total length in bytes.
    fn size(&self) -> std::io::Result<u64>;

    /// Fetches `range`. The result is shorter than requested only when the range
    /// runs past the end.
    fn read_at(&self, range: Range<u64>) -> std::io::Result<Vec<u8>>;

    /// Reads exactly `buf.len()` bytes starting at `pos`, failing with
    /// `UnexpectedEof` if the object is too short.
    fn read_exact_at(&self, pos: u64, buf: &mut [u8]) -> std::io::Result<()> {
        let bytes = self.read_at(pos..pos + buf.len() as u64)?;
        if bytes.len() != buf.len() {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        buf.copy_from_slice(&bytes);
        Ok(())
    }
}

/// Append-only sink whose content counts as written only after
/// [`seal`](SealingWrite::seal) succeeds. File-backed implementations publish the
/// content under its final name at that point and not before.
pub trait SealingWrite: Send {
    /// Appends all of `buf`.
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()>;

    /// Returns the number of bytes written so far.
    fn position(&self) -> u64;

    /// Flushes and commits. Later writes are rejected.
    fn seal(&mut self) -> std::io::Result<()>;
}

/// Returns `InvalidInput` from the enclosing `io::Result` function when the
/// condition does not hold.
#[macro_export]
macro_rules! verify {
    ($expr:expr) => {
        if !($expr) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                concat!("verify failed: ", stringify!($expr)),
            ));
        }
    };
}
