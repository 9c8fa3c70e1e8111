//! Positional reads of sealed artifact files.

use std::{fs::File, io, ops::Range, path::Path, sync::Arc};

use crate::{ReadAt, verify};

/// Positional reader over an immutable artifact file.
///
/// The length is taken once at open time; artifacts are never modified after they
/// are sealed. Cloning shares the handle, and reads never move a shared cursor, so
/// a single `FileReader` may serve any number of threads.
#[derive(Clone)]
pub struct FileReader {
    file: Arc<File>,
    len: u64,
}

impl FileReader {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<FileReader> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(FileReader {
            file: Arc::new(file),
            len,
        })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl ReadAt for FileReader {
    fn size(&self) -> io::Result<u64> {
        Ok(self.len)
    }

    /// Ranges are clipped to the file length; a range starting at or past the end
    /// yields no bytes.
    fn read_at(&self, range: Range<u64>) -> io::Result<Vec<u8>> {
        verify!(range.start <= range.end);
        let end = range.end.min(self.len);
        if range.start >= end {
            return Ok(Vec::new());
        }
        let mut buf = vec![0u8; (end - range.start) as usize];
        read_exact_at(&self.file, range.start, &mut buf)?;
        Ok(buf)
    }

    fn read_exact_at(&self, pos: u64, buf: &mut [u8]) -> io::Result<()> {
        read_exact_at(&self.file, pos, buf)
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, pos: u64, buf: &mut [u8]) -> io::Result<()> {
    std::os::unix::fs::FileExt::read_exact_at(file, buf, pos)
}

#[cfg(windows)]
fn read_exact_at(file: &File, pos: u64, buf: &mut [u8]) -> io::Result<()> {
    use std::os::windows::fs::FileExt;

    let mut done = 0;
    while done < buf.len() {
        let n = file.seek_read(&mut buf[done..], pos + done as u64)?;
        if n == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        done += n;
    }
    Ok(())
}
