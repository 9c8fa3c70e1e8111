use std::{collections::BTreeMap, path::Path, sync::Arc};

use sift_index::{
    Analyzer, IndexReader, Pipeline, PipelineConfig, QueryMode, QueryProcessor, ScoredDoc,
    SearchOptions,
    query::{Scorer, TermStats},
};
use sift_testkit::data_gen::{CorpusSpec, word, write_tsv_corpus};

fn build(base: &Path, files: &[(&str, &str)], block_size: usize) -> PipelineConfig {
    let config = PipelineConfig {
        block_size,
        n_blocks: 3,
        ..Default::default()
    }
    .with_base_dir(base);
    std::fs::create_dir_all(&config.data_dir).unwrap();
    for (name, text) in files {
        std::fs::write(config.data_dir.join(name), text).unwrap();
    }
    Pipeline::new(config.clone()).run().unwrap();
    config
}

fn cat_dog_index(base: &Path) -> QueryProcessor {
    let config = build(
        base,
        &[("d1.txt", "the cat sat"), ("d2.txt", "the dog sat near the cat")],
        64,
    );
    QueryProcessor::new(Arc::new(IndexReader::open(&config).unwrap()))
}

fn ids(docs: &[ScoredDoc]) -> Vec<u32> {
    docs.iter().map(|d| d.doc_id).collect()
}

#[test]
fn test_cat_dog() {
    let dir = tempfile::tempdir().unwrap();
    let processor = cat_dog_index(dir.path());
    let reader = processor.reader();
    assert_eq!(reader.doc_count(), 2);
    assert_eq!(reader.title(0), Some("d1"));
    assert_eq!(reader.title(1), Some("d2"));

    let cat = reader.term_id("cat").unwrap();
    let postings: Vec<(u32, u32)> = reader
        .postings(cat)
        .unwrap()
        .iter()
        .map(|p| (p.doc_id, p.freq))
        .collect();
    assert_eq!(postings, vec![(0, 1), (1, 1)]);
    let the = reader.term_id("the").unwrap();
    assert_eq!(reader.postings(the).unwrap()[1].freq, 2);

    let and = SearchOptions::default();
    // both terms occur everywhere, so both documents tie at zero
    let result = processor.search("cat sat", &and).unwrap();
    assert_eq!(ids(&result), vec![0, 1]);
    assert!(result.iter().all(|d| d.score == 0.0));

    let result = processor.search("The DOG", &and).unwrap();
    assert_eq!(ids(&result), vec![1]);
    assert!((result[0].score - 2f64.ln()).abs() < 1e-12);

    let or = SearchOptions::new(QueryMode::Or);
    let result = processor.search("dog near cat", &or).unwrap();
    assert_eq!(ids(&result), vec![1, 0]);
    assert!((result[0].score - 2.0 * 2f64.ln()).abs() < 1e-12);
    assert_eq!(result[1].score, 0.0);

    let top = processor.search("dog near cat", &or.with_limit(1)).unwrap();
    assert_eq!(ids(&top), vec![1]);
}

#[test]
fn test_unknown_and_empty_queries() {
    let dir = tempfile::tempdir().unwrap();
    let processor = cat_dog_index(dir.path());
    let and = SearchOptions::default();
    let or = SearchOptions::new(QueryMode::Or);

    assert!(processor.search("zebra", &and).unwrap().is_empty());
    assert!(processor.search("cat zebra", &and).unwrap().is_empty());
    assert_eq!(ids(&processor.search("cat zebra", &or).unwrap()), vec![0, 1]);
    assert!(processor.search("", &and).unwrap().is_empty());
    assert!(processor.search(" ,.;! ", &or).unwrap().is_empty());
    // repeated terms count once
    assert_eq!(
        processor.search("dog dog dog", &and).unwrap(),
        processor.search("dog", &and).unwrap()
    );
}

#[test]
fn test_failed_query_degrades_to_empty() {
    let dir = tempfile::tempdir().unwrap();
    let processor = cat_dog_index(dir.path());
    let options = SearchOptions::default();
    assert_eq!(ids(&processor.search_or_empty("dog", &options)), vec![1]);

    // posting lists vanish under the open reader
    let postings = dir.path().join("postings.bin");
    let file = std::fs::OpenOptions::new().write(true).open(&postings).unwrap();
    file.set_len(32).unwrap();
    assert!(processor.search("dog", &options).is_err());
    assert!(processor.search_or_empty("dog", &options).is_empty());
    // unknown terms never touch the file
    assert!(processor.search_or_empty("zebra", &options).is_empty());
}

/// Exhaustive evaluation straight from the documents.
fn brute_force(docs: &[String], query: &str, mode: QueryMode) -> Vec<ScoredDoc> {
    let analyzer = Analyzer::from_name("unicode-word").unwrap();
    let counts: Vec<BTreeMap<String, u32>> = docs
        .iter()
        .map(|d| {
            let mut m = BTreeMap::new();
            for t in analyzer.terms(d) {
                *m.entry(t.into_owned()).or_insert(0) += 1;
            }
            m
        })
        .collect();
    let mut terms: Vec<String> = analyzer.terms(query).map(|t| t.into_owned()).collect();
    terms.sort();
    terms.dedup();

    let mut out = Vec::new();
    for (doc_id, doc) in counts.iter().enumerate() {
        let matched = terms.iter().filter(|t| doc.contains_key(*t)).count();
        let keep = match mode {
            QueryMode::And => matched == terms.len() && !terms.is_empty(),
            QueryMode::Or => matched > 0,
        };
        if !keep {
            continue;
        }
        let score = terms
            .iter()
            .filter_map(|t| doc.get(t).map(|&tf| (t, tf)))
            .map(|(t, tf)| {
                let df = counts.iter().filter(|c| c.contains_key(t)).count();
                tf as f64 * (docs.len() as f64 / df as f64).ln()
            })
            .sum::<f64>();
        out.push(ScoredDoc {
            doc_id: doc_id as u32,
            score,
        });
    }
    out
}

#[test]
fn test_matches_brute_force_on_generated_corpus() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        block_size: 128,
        n_blocks: 4,
        ..Default::default()
    }
    .with_base_dir(dir.path());
    let spec = CorpusSpec {
        files: 2,
        docs_per_file: 80,
        words_per_doc: 15,
        vocabulary: 120,
        malformed_rows_per_file: 1,
        seed: 9,
    };
    let corpus = write_tsv_corpus(&config.data_dir, &spec).unwrap();
    Pipeline::new(config.clone()).run().unwrap();
    let processor = QueryProcessor::new(Arc::new(IndexReader::open(&config).unwrap()));
    let docs: Vec<String> = corpus.docs.iter().map(|d| d.content.clone()).collect();

    let mut rng = fastrand::Rng::with_seed(1);
    for _ in 0..60 {
        let query = (0..rng.usize(1..4))
            .map(|_| word(rng.usize(..140)))
            .collect::<Vec<_>>()
            .join(" ");
        for mode in [QueryMode::And, QueryMode::Or] {
            let actual = processor.search(&query, &SearchOptions::new(mode)).unwrap();
            let mut expected = brute_force(&docs, &query, mode);
            expected.sort_by_key(|d| d.doc_id);
            let mut by_doc = actual.clone();
            by_doc.sort_by_key(|d| d.doc_id);
            assert_eq!(ids(&by_doc), ids(&expected), "{query:?} {mode:?}");
            for (a, e) in by_doc.iter().zip(&expected) {
                assert!((a.score - e.score).abs() < 1e-9, "{query:?}");
            }
            assert!(actual.windows(2).all(|w| {
                w[0].score > w[1].score || (w[0].score == w[1].score && w[0].doc_id < w[1].doc_id)
            }));
        }
    }
}

#[test]
fn test_parallel_batch_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        block_size: 64,
        n_blocks: 2,
        ..Default::default()
    }
    .with_base_dir(dir.path());
    write_tsv_corpus(&config.data_dir, &CorpusSpec::default()).unwrap();
    Pipeline::new(config.clone()).run().unwrap();
    let processor = QueryProcessor::new(Arc::new(IndexReader::open(&config).unwrap()));

    let queries: Vec<String> = (0..200)
        .map(|i| format!("{} {}", word(i % 30), word(i % 7)))
        .collect();
    let options = SearchOptions::new(QueryMode::Or).with_limit(10);
    let sequential: Vec<Vec<ScoredDoc>> = queries
        .iter()
        .map(|q| processor.search(q, &options).unwrap())
        .collect();
    for _ in 0..3 {
        let parallel: Vec<Vec<ScoredDoc>> = processor
            .search_batch(&queries, &options)
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(parallel, sequential);
    }
    assert!(processor.reader().buffer_stats().resident <= 2);
}

struct TermFrequencyScorer;

impl Scorer for TermFrequencyScorer {
    fn score(&self, stats: &TermStats) -> f64 {
        stats.term_freq as f64
    }

    fn name(&self) -> &'static str {
        "tf"
    }
}

#[test]
fn test_custom_scorer() {
    let dir = tempfile::tempdir().unwrap();
    let config = build(
        dir.path(),
        &[("a.txt", "red red blue"), ("b.txt", "red blue blue blue"), ("c.txt", "green")],
        64,
    );
    let reader = Arc::new(IndexReader::open(&config).unwrap());
    let processor = QueryProcessor::with_scorer(reader, Arc::new(TermFrequencyScorer));
    assert_eq!(processor.scorer().name(), "tf");

    let result = processor.search("red blue", &SearchOptions::default()).unwrap();
    assert_eq!(ids(&result), vec![1, 0]);
    assert_eq!(result[0].score, 4.0);
    assert_eq!(result[1].score, 3.0);
}
