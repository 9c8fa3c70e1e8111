//! Id-to-string tables: the term-ids file and the titles file.
//!
//! Layout: the 8-byte magic `SIFTSTR1`, then one `(len u32, utf8 bytes)` entry per
//! id. The id of an entry is its ordinal, so no explicit id is stored.

use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use sift_common::{Result, error::Error, verify_data};
use sift_io::{ArtifactWriter, SealingWrite};

use crate::dictionary::TermDictionary;

pub const STRING_TABLE_MAGIC: &[u8; 8] = b"SIFTSTR1";

/// Writes a string table, one entry per call to [`push`](StringTableWriter::push).
pub struct StringTableWriter {
    writer: ArtifactWriter,
    count: u64,
}

impl StringTableWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<StringTableWriter> {
        let path = path.as_ref();
        let mut writer = ArtifactWriter::create(path)
            .map_err(|e| Error::io(format!("create {}", path.display()), e))?;
        SealingWrite::write_all(&mut writer, STRING_TABLE_MAGIC)
            .map_err(|e| Error::io(format!("write {}", path.display()), e))?;
        Ok(StringTableWriter { writer, count: 0 })
    }

    pub fn push(&mut self, value: &str) -> Result<()> {
        let len = u32::try_from(value.len())
            .map_err(|_| Error::invalid_arg("value", "string longer than 4 GiB"))?;
        let mut prefix = [0u8; 4];
        LittleEndian::write_u32(&mut prefix, len);
        self.write(&prefix)?;
        self.write(value.as_bytes())?;
        self.count += 1;
        Ok(())
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn finish(mut self) -> Result<u64> {
        self.writer
            .seal()
            .map_err(|e| Error::io(format!("seal {}", self.writer.path().display()), e))?;
        Ok(self.count)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        SealingWrite::write_all(&mut self.writer, bytes)
            .map_err(|e| Error::io(format!("write {}", self.writer.path().display()), e))
    }
}

/// Writes every term of `dict` in id order.
pub fn write_term_table<P: AsRef<Path>>(path: P, dict: &TermDictionary) -> Result<u64> {
    let mut writer = StringTableWriter::create(path)?;
    for term in dict.iter() {
        writer.push(term)?;
    }
    writer.finish()
}

/// Loads a whole string table into memory, indexed by id.
pub fn read_string_table<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| Error::io(format!("read {}", path.display()), e))?;
    decode_string_table(&bytes).map_err(|e| match e.into_kind() {
        sift_common::error::ErrorKind::InvalidFormat { message, .. } => {
            Error::invalid_format_msg(path.display().to_string(), message)
        }
        kind => kind.into(),
    })
}

fn decode_string_table(bytes: &[u8]) -> Result<Vec<String>> {
    verify_data!("string table", bytes.len() >= STRING_TABLE_MAGIC.len());
    if &bytes[..STRING_TABLE_MAGIC.len()] != STRING_TABLE_MAGIC {
        return Err(Error::invalid_format_msg("string table", "bad magic"));
    }
    let mut values = Vec::new();
    let mut pos = STRING_TABLE_MAGIC.len();
    while pos < bytes.len() {
        verify_data!("string table entry", bytes.len() - pos >= 4);
        let len = LittleEndian::read_u32(&bytes[pos..pos + 4]) as usize;
        pos += 4;
        verify_data!("string table entry", bytes.len() - pos >= len);
        let value = std::str::from_utf8(&bytes[pos..pos + len])
            .map_err(|e| Error::invalid_format_msg("string table", e.to_string()))?;
        values.push(value.to_string());
        pos += len;
    }
    Ok(values)
}

/// Term string to term id, loaded from the term-ids file.
pub struct TermLookup {
    dict: TermDictionary,
}

impl TermLookup {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<TermLookup> {
        let dict = TermDictionary::from_terms(read_string_table(path)?)?;
        Ok(TermLookup { dict })
    }

    pub fn term_id(&self, term: &str) -> Option<u32> {
        self.dict.get(term)
    }

    pub fn term(&self, term_id: u32) -> Option<&str> {
        self.dict.term(term_id)
    }

    pub fn len(&self) -> usize {
        self.dict.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dict.is_empty()
    }
}

/// Document id to title, loaded from the titles file.
pub struct TitleLookup {
    titles: Vec<String>,
}

impl TitleLookup {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<TitleLookup> {
        Ok(TitleLookup {
            titles: read_string_table(path)?,
        })
    }

    pub fn title(&self, doc_id: u32) -> Option<&str> {
        self.titles.get(doc_id as usize).map(String::as_str)
    }

    /// Number of documents in the collection.
    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

/// Number of entries in a string table.
pub fn count_entries<P: AsRef<Path>>(path: P) -> Result<u64> {
    Ok(read_string_table(path)?.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("titles.bin");
        let mut writer = StringTableWriter::create(&path).unwrap();
        for title in ["Cats", "", "Dogs & Cats", "Ünïcödé"] {
            writer.push(title).unwrap();
        }
        assert_eq!(writer.finish().unwrap(), 4);

        let titles = TitleLookup::open(&path).unwrap();
        assert_eq!(titles.len(), 4);
        assert_eq!(titles.title(1), Some(""));
        assert_eq!(titles.title(3), Some("Ünïcödé"));
        assert_eq!(titles.title(4), None);
    }

    #[test]
    fn test_term_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("term_ids.bin");
        let mut dict = TermDictionary::new();
        for term in ["the", "cat", "sat"] {
            dict.map_term(term).unwrap();
        }
        write_term_table(&path, &dict).unwrap();

        let lookup = TermLookup::open(&path).unwrap();
        assert_eq!(lookup.term_id("cat"), Some(1));
        assert_eq!(lookup.term(2), Some("sat"));
        assert_eq!(lookup.term_id("dog"), None);
        assert_eq!(count_entries(&path).unwrap(), 3);
    }

    #[test]
    fn test_corrupt_tables() {
        assert!(decode_string_table(b"SIFT").is_err());
        assert!(decode_string_table(b"NOTMAGIC").is_err());
        let mut truncated = STRING_TABLE_MAGIC.to_vec();
        truncated.extend_from_slice(&[5, 0, 0, 0, b'a', b'b']);
        assert!(decode_string_table(&truncated).is_err());
        assert!(decode_string_table(STRING_TABLE_MAGIC).unwrap().is_empty());
    }
}
