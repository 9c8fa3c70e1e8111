//! Synthetic data generation for tests.

use std::{
    fmt::Write as _,
    path::{Path, PathBuf},
};

/// Shape of a generated corpus.
#[derive(Debug, Clone)]
pub struct CorpusSpec {
    pub files: usize,
    pub docs_per_file: usize,
    pub words_per_doc: usize,
    pub vocabulary: usize,
    /// Rows with the wrong column count appended to every file.
    pub malformed_rows_per_file: usize,
    pub seed: u64,
}

impl Default for CorpusSpec {
    fn default() -> Self {
        CorpusSpec {
            files: 3,
            docs_per_file: 50,
            words_per_doc: 20,
            vocabulary: 200,
            malformed_rows_per_file: 0,
            seed: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedDoc {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct GeneratedCorpus {
    /// Well-formed documents in the order an indexer assigns ids to them.
    pub docs: Vec<GeneratedDoc>,
    pub files: Vec<PathBuf>,
    pub malformed_rows: usize,
}

/// The `i`-th vocabulary word: distinct lowercase ASCII letters for every `i`.
pub fn word(i: usize) -> String {
    let mut s = String::new();
    let mut n = i;
    loop {
        s.push((b'a' + (n % 26) as u8) as char);
        n /= 26;
        if n == 0 {
            break;
        }
    }
    s
}

/// Writes `spec.files` tab-separated files `part-NNN.tsv` into `dir`.
///
/// Each file has a header line and rows `(source, external id, title, content)`.
/// Word choice is skewed towards low vocabulary indices so that some terms occur
/// in most documents and many in only a few.
pub fn write_tsv_corpus(dir: &Path, spec: &CorpusSpec) -> anyhow::Result<GeneratedCorpus> {
    std::fs::create_dir_all(dir)?;
    let mut rng = fastrand::Rng::with_seed(spec.seed);
    let mut docs = Vec::new();
    let mut files = Vec::new();
    for f in 0..spec.files {
        let mut text = String::from("source\tid\ttitle\tcontent\n");
        for d in 0..spec.docs_per_file {
            let doc = generate_doc(&mut rng, spec, format!("doc {f}-{d}"));
            writeln!(text, "gen\t{f}-{d}\t{}\t{}", doc.title, doc.content)?;
            docs.push(doc);
        }
        for m in 0..spec.malformed_rows_per_file {
            writeln!(text, "gen\tbad-{f}-{m}\tno content column")?;
        }
        let path = dir.join(format!("part-{f:03}.tsv"));
        std::fs::write(&path, text)?;
        files.push(path);
    }
    Ok(GeneratedCorpus {
        docs,
        files,
        malformed_rows: spec.files * spec.malformed_rows_per_file,
    })
}

fn generate_doc(rng: &mut fastrand::Rng, spec: &CorpusSpec, title: String) -> GeneratedDoc {
    let vocabulary = spec.vocabulary.max(1);
    let words: Vec<String> = (0..spec.words_per_doc)
        .map(|_| word(rng.usize(..vocabulary).min(rng.usize(..vocabulary))))
        .collect();
    GeneratedDoc {
        title,
        content: words.join(" "),
    }
}

/// Random `(term_id, doc_id, freq)` tuples with `freq` in `1..=5`.
///
/// Keys may repeat; the tuples model unsorted sorter input, not a valid index.
pub fn random_posting_tuples(
    seed: u64,
    count: usize,
    terms: u32,
    docs: u32,
) -> Vec<(u32, u32, u32)> {
    let mut rng = fastrand::Rng::with_seed(seed);
    (0..count)
        .map(|_| {
            (
                rng.u32(..terms.max(1)),
                rng.u32(..docs.max(1)),
                rng.u32(1..=5),
            )
        })
        .collect()
}

/// Strictly increasing keys `0, step, 2 * step, ...` for tree tests.
pub fn spaced_keys(count: usize, step: u32) -> Vec<u32> {
    (0..count as u32).map(|i| i * step.max(1)).collect()
}
