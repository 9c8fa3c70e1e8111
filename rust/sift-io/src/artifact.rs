//! Sealing file writer used for every artifact produced by the build pipeline.

use std::{
    fs::File,
    io::{BufWriter, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use crate::SealingWrite;

const PARTIAL_SUFFIX: &str = "partial";

/// Default capacity of the write buffer.
const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Returns the temporary sibling path used while `path` is being written.
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    path.with_file_name(name)
}

/// Returns `true` if a sealed artifact exists at `path`.
///
/// A leftover `.partial` file from an interrupted run never counts.
pub fn artifact_exists(path: &Path) -> bool {
    path.is_file()
}

/// Sequential writer that commits its content atomically.
///
/// Bytes go to `<path>.partial`; [`seal`](SealingWrite::seal) flushes, syncs and
/// renames the file to `path`. A writer dropped without sealing removes the partial
/// file, so an aborted stage never leaves something that looks like a finished artifact.
pub struct ArtifactWriter {
    path: PathBuf,
    partial: PathBuf,
    writer: Option<BufWriter<File>>,
    position: u64,
}

impl ArtifactWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> std::io::Result<ArtifactWriter> {
        Self::with_capacity(path, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity<P: AsRef<Path>>(
        path: P,
        buffer_size: usize,
    ) -> std::io::Result<ArtifactWriter> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let partial = partial_path(&path);
        let file = File::create(&partial)?;
        Ok(ArtifactWriter {
            path,
            partial,
            writer: Some(BufWriter::with_capacity(buffer_size, file)),
            position: 0,
        })
    }

    /// Final path of the artifact.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrites already written bytes at `pos`, e.g. a header whose fields are only
    /// known at the end. Subsequent writes continue at the end of the content.
    pub fn rewrite_at(&mut self, pos: u64, buf: &[u8]) -> std::io::Result<()> {
        let end = self.position;
        crate::verify!(pos + buf.len() as u64 <= end);
        let writer = self.writer()?;
        writer.seek(SeekFrom::Start(pos))?;
        writer.write_all(buf)?;
        writer.seek(SeekFrom::Start(end))?;
        Ok(())
    }

    fn writer(&mut self) -> std::io::Result<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| std::io::Error::other("artifact writer is already sealed"))
    }
}

impl SealingWrite for ArtifactWriter {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.writer()?.write_all(buf)?;
        self.position += buf.len() as u64;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn seal(&mut self) -> std::io::Result<()> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| std::io::Error::other("artifact writer is already sealed"))?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&self.partial, &self.path)?;
        log::debug!(
            "sealed artifact {} ({} bytes)",
            self.path.display(),
            self.position
        );
        Ok(())
    }
}

impl Write for ArtifactWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.writer()?.write(buf)?;
        self.position += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer()?.flush()
    }
}

impl Drop for ArtifactWriter {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            drop(writer);
            if let Err(e) = std::fs::remove_file(&self.partial) {
                log::warn!(
                    "failed to discard partial artifact {}: {e}",
                    self.partial.display()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_renames_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("postings.bin");

        let mut writer = ArtifactWriter::create(&path).unwrap();
        SealingWrite::write_all(&mut writer, b"hello").unwrap();
        assert!(partial_path(&path).is_file());
        assert!(!artifact_exists(&path));

        writer.seal().unwrap();
        assert!(artifact_exists(&path));
        assert!(!partial_path(&path).exists());
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
        assert!(SealingWrite::write_all(&mut writer, b"more").is_err());
    }

    #[test]
    fn test_unsealed_writer_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sorted.bin");
        {
            let mut writer = ArtifactWriter::create(&path).unwrap();
            SealingWrite::write_all(&mut writer, b"incomplete").unwrap();
            assert_eq!(SealingWrite::position(&writer), 10);
        }
        assert!(!artifact_exists(&path));
        assert!(!partial_path(&path).exists());
    }

    #[test]
    fn test_rewrite_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lists.bin");
        let mut writer = ArtifactWriter::create(&path).unwrap();
        SealingWrite::write_all(&mut writer, b"0000body").unwrap();
        writer.rewrite_at(0, b"HEAD").unwrap();
        SealingWrite::write_all(&mut writer, b"!").unwrap();
        assert!(writer.rewrite_at(7, b"xyz").is_err());
        writer.seal().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"HEADbody!");
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/data/tree.meta")),
            PathBuf::from("/data/tree.meta.partial")
        );
    }
}
