/// Statistics available for scoring one term in one document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TermStats {
    /// Occurrences of the term in the document.
    pub term_freq: u32,
    /// Documents containing the term.
    pub doc_freq: u32,
    /// Documents in the collection.
    pub doc_count: u64,
}

/// Per-term relevance contribution. A document's score is the sum of the
/// contributions of the query terms it matches.
pub trait Scorer: Send + Sync {
    fn score(&self, stats: &TermStats) -> f64;

    fn name(&self) -> &'static str;
}

/// `term_freq * ln(doc_count / doc_freq)`.
///
/// A term present in every document contributes zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct TfIdfScorer;

impl Scorer for TfIdfScorer {
    fn score(&self, stats: &TermStats) -> f64 {
        if stats.doc_freq == 0 || stats.doc_count == 0 {
            return 0.0;
        }
        let idf = (stats.doc_count as f64 / stats.doc_freq as f64).ln();
        stats.term_freq as f64 * idf
    }

    fn name(&self) -> &'static str {
        "tf-idf"
    }
}
