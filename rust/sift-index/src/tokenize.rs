//! Corpus tokenization: the first pipeline stage.
//!
//! Reads every document of the input directory, assigns document and term ids, and
//! writes the unsorted postings file, the titles file and the term-ids file.
//!
//! Input files are visited in file-name order so that ids are reproducible:
//! - `*.tsv` / `*.csv`: one header line, then tab-separated rows with exactly four
//!   columns `(source, external id, title, content)`; other rows are skipped.
//!   Trailing empty columns are not counted, so a row with empty content is
//!   skipped too.
//! - `*.txt`: the whole file is a single document titled by the file stem.
//!
//! Everything else in the directory is ignored.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    time::Instant,
};

use sift_common::{Result, error::Error};

use crate::{
    dictionary::TermDictionary,
    posting::{Posting, PostingWriter},
    string_table::{StringTableWriter, write_term_table},
    tokenizers::Analyzer,
};

const TABULAR_COLUMNS: usize = 4;

/// Output locations of the tokenization stage.
#[derive(Debug, Clone)]
pub struct TokenizeOutputs {
    pub tokenized: PathBuf,
    pub term_ids: PathBuf,
    pub titles: PathBuf,
}

/// Counters reported by the tokenization stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenizeStats {
    pub documents: u64,
    pub postings: u64,
    /// Distinct terms, i.e. the size of the term dictionary.
    pub terms: u64,
    /// Rows and files that could not be read as documents.
    pub skipped_records: u64,
}

/// Streams documents into the tokenized postings file while growing the term
/// dictionary.
pub struct CorpusTokenizer<'a> {
    analyzer: &'a Analyzer,
    dict: TermDictionary,
    postings: PostingWriter,
    titles: StringTableWriter,
    term_ids_path: PathBuf,
    next_doc_id: u32,
    skipped: u64,
    term_ids: Vec<u32>,
}

impl<'a> CorpusTokenizer<'a> {
    pub fn create(analyzer: &'a Analyzer, outputs: &TokenizeOutputs) -> Result<CorpusTokenizer<'a>> {
        Ok(CorpusTokenizer {
            analyzer,
            dict: TermDictionary::new(),
            postings: PostingWriter::create(&outputs.tokenized)?,
            titles: StringTableWriter::create(&outputs.titles)?,
            term_ids_path: outputs.term_ids.clone(),
            next_doc_id: 0,
            skipped: 0,
            term_ids: Vec::new(),
        })
    }

    /// Adds one document and returns its id.
    ///
    /// One posting is emitted per distinct term, in term id order.
    pub fn add_document(&mut self, title: &str, text: &str) -> Result<u32> {
        let doc_id = self.next_doc_id;
        self.next_doc_id = doc_id
            .checked_add(1)
            .ok_or_else(|| Error::invalid_operation("document id space exhausted"))?;

        self.term_ids.clear();
        for term in self.analyzer.terms(text) {
            let term_id = self.dict.map_term(&term)?;
            self.term_ids.push(term_id);
        }
        self.term_ids.sort_unstable();

        let mut i = 0;
        while i < self.term_ids.len() {
            let term_id = self.term_ids[i];
            let run = self.term_ids[i..]
                .iter()
                .take_while(|&&id| id == term_id)
                .count();
            self.postings.push(&Posting::new(term_id, doc_id, run as u32))?;
            i += run;
        }
        self.titles.push(title)?;
        Ok(doc_id)
    }

    /// Records a malformed input record that was not indexed.
    pub fn skip_record(&mut self, location: &str, reason: &str) {
        self.skipped += 1;
        log::warn!("skipping record at {location}: {reason}");
    }

    pub fn add_file(&mut self, path: &Path) -> Result<()> {
        match file_kind(path) {
            Some(FileKind::Tabular) => self.add_tabular_file(path),
            Some(FileKind::Text) => self.add_text_file(path),
            None => {
                log::debug!("ignoring {}", path.display());
                Ok(())
            }
        }
    }

    fn add_tabular_file(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path).map_err(|e| Error::io(format!("open {}", path.display()), e))?;
        let mut reader = BufReader::new(file);
        let mut line = Vec::new();
        let mut line_no = 0u64;
        loop {
            line.clear();
            let n = reader
                .read_until(b'\n', &mut line)
                .map_err(|e| Error::io(format!("read {}", path.display()), e))?;
            if n == 0 {
                break;
            }
            line_no += 1;
            if line_no == 1 {
                continue;
            }
            let location = format!("{}:{line_no}", path.display());
            let Ok(row) = std::str::from_utf8(trim_line_end(&line)) else {
                self.skip_record(&location, "not valid UTF-8");
                continue;
            };
            if row.is_empty() {
                continue;
            }
            let mut columns: Vec<&str> = row.split('\t').collect();
            while columns.last().is_some_and(|c| c.is_empty()) {
                columns.pop();
            }
            if columns.len() != TABULAR_COLUMNS {
                self.skip_record(
                    &location,
                    &format!("expected {TABULAR_COLUMNS} columns, found {}", columns.len()),
                );
                continue;
            }
            self.add_document(columns[2], columns[3])?;
        }
        Ok(())
    }

    fn add_text_file(&mut self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path).map_err(|e| Error::io(format!("read {}", path.display()), e))?;
        let Ok(text) = std::str::from_utf8(&bytes) else {
            self.skip_record(&path.display().to_string(), "not valid UTF-8");
            return Ok(());
        };
        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.add_document(&title, text)?;
        Ok(())
    }

    pub fn stats(&self) -> TokenizeStats {
        TokenizeStats {
            documents: self.titles.count(),
            postings: self.postings.count(),
            terms: self.dict.len() as u64,
            skipped_records: self.skipped,
        }
    }

    /// Seals the titles and term-ids files, then the postings file.
    pub fn finish(self) -> Result<TokenizeStats> {
        let stats = self.stats();
        self.titles.finish()?;
        write_term_table(&self.term_ids_path, &self.dict)?;
        self.postings.finish()?;
        Ok(stats)
    }
}

enum FileKind {
    Tabular,
    Text,
}

fn file_kind(path: &Path) -> Option<FileKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "tsv" | "csv" => Some(FileKind::Tabular),
        "txt" => Some(FileKind::Text),
        _ => None,
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Regular files of `dir`, sorted by file name.
pub fn list_corpus_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        std::fs::read_dir(dir).map_err(|e| Error::io(format!("read dir {}", dir.display()), e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(format!("read dir {}", dir.display()), e))?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Runs the whole tokenization stage over `data_dir`.
pub fn tokenize_corpus(
    data_dir: &Path,
    analyzer: &Analyzer,
    outputs: &TokenizeOutputs,
) -> Result<TokenizeStats> {
    let start = Instant::now();
    let files = list_corpus_files(data_dir)?;
    log::info!(
        "tokenizing {} files from {} with {}",
        files.len(),
        data_dir.display(),
        crate::tokenizers::Tokenizer::name(analyzer.tokenizer())
    );

    let mut tokenizer = CorpusTokenizer::create(analyzer, outputs)?;
    for file in &files {
        tokenizer.add_file(file)?;
    }
    let stats = tokenizer.finish()?;

    log::info!(
        "tokenized {} documents into {} postings over {} terms ({} records skipped) in {:.2}s",
        stats.documents,
        stats.postings,
        stats.terms,
        stats.skipped_records,
        start.elapsed().as_secs_f64()
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{posting::read_all_postings, string_table::read_string_table};

    fn outputs(dir: &Path) -> TokenizeOutputs {
        TokenizeOutputs {
            tokenized: dir.join("tokenized.bin"),
            term_ids: dir.join("term_ids.bin"),
            titles: dir.join("titles.bin"),
        }
    }

    #[test]
    fn test_documents_to_postings() {
        let dir = tempfile::tempdir().unwrap();
        let outputs = outputs(dir.path());
        let analyzer = Analyzer::from_name("unicode-word").unwrap();

        let mut tokenizer = CorpusTokenizer::create(&analyzer, &outputs).unwrap();
        assert_eq!(tokenizer.add_document("D1", "the cat sat").unwrap(), 0);
        assert_eq!(
            tokenizer.add_document("D2", "The dog sat near the cat").unwrap(),
            1
        );
        let stats = tokenizer.finish().unwrap();
        assert_eq!(
            stats,
            TokenizeStats {
                documents: 2,
                postings: 8,
                terms: 5,
                skipped_records: 0
            }
        );

        // the=0 cat=1 sat=2 dog=3 near=4
        let postings = read_all_postings(&outputs.tokenized).unwrap();
        let triples: Vec<_> = postings
            .iter()
            .map(|p| (p.term_id, p.doc_id, p.freq))
            .collect();
        assert_eq!(
            triples,
            vec![
                (0, 0, 1),
                (1, 0, 1),
                (2, 0, 1),
                (0, 1, 2),
                (1, 1, 1),
                (2, 1, 1),
                (3, 1, 1),
                (4, 1, 1),
            ]
        );
        assert_eq!(
            read_string_table(&outputs.term_ids).unwrap(),
            vec!["the", "cat", "sat", "dog", "near"]
        );
        assert_eq!(read_string_table(&outputs.titles).unwrap(), vec!["D1", "D2"]);
    }

    #[test]
    fn test_corpus_directory() {
        let corpus = tempfile::tempdir().unwrap();
        std::fs::write(
            corpus.path().join("b.tsv"),
            "source\tid\ttitle\tcontent\n\
             web\t1\tCats\tcats purr\r\n\
             web\t2\tbroken row\n\
             \n\
             web\t4\tEmpty\t\n\
             web\t3\tDogs\tdogs bark\t\t\n",
        )
        .unwrap();
        std::fs::write(corpus.path().join("a.txt"), "Plain text document").unwrap();
        std::fs::write(corpus.path().join("c.bin"), [0xffu8, 0xfe]).unwrap();
        std::fs::write(corpus.path().join("d.txt"), [0xffu8, 0xfe]).unwrap();

        let out = tempfile::tempdir().unwrap();
        let outputs = outputs(out.path());
        let analyzer = Analyzer::from_name("unicode-word").unwrap();
        let stats = tokenize_corpus(corpus.path(), &analyzer, &outputs).unwrap();

        assert_eq!(stats.documents, 3);
        assert_eq!(stats.skipped_records, 3);
        assert_eq!(
            read_string_table(&outputs.titles).unwrap(),
            vec!["a", "Cats", "Dogs"]
        );
        let terms = read_string_table(&outputs.term_ids).unwrap();
        assert_eq!(terms[..3], ["plain", "text", "document"]);
        assert!(terms.contains(&"purr".to_string()));
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = Analyzer::from_name("unicode-word").unwrap();
        let result = tokenize_corpus(&dir.path().join("nope"), &analyzer, &outputs(dir.path()));
        assert!(result.is_err());
        assert!(!dir.path().join("tokenized.bin").exists());
    }
}
