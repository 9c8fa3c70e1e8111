//! Term extraction shared by corpus tokenization and query evaluation.
//!
//! The index is only usable when a query word and the indexed word it should match
//! come out of the same pipeline, so both sides go through [`Analyzer`]: a
//! [`Tokenizer`] splits the text into borrowed slices and [`normalize_term`] folds
//! each slice into the form stored in the term dictionary.

pub mod unicode_segment;
pub mod unicode_word;

use std::borrow::Cow;

use sift_common::{Result, error::Error};

pub use unicode_segment::UnicodeSegmentTokenizer;
pub use unicode_word::UnicodeWordTokenizer;

/// Terms longer than this (in bytes) are truncated at a char boundary.
pub const DEFAULT_MAX_TERM_LENGTH: usize = 128;

/// Terms shorter than this (in bytes) are dropped.
pub const DEFAULT_MIN_TERM_LENGTH: usize = 1;

/// Splits text into an ordered sequence of raw terms.
///
/// Implementations return slices of the input and never allocate per term.
pub trait Tokenizer: Send + Sync {
    type TokenIter<'a>: Iterator<Item = &'a str>
    where
        Self: 'a;

    fn tokenize<'a>(&'a self, input: &'a str) -> Self::TokenIter<'a>;

    fn kind(&self) -> TokenizerKind;

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    fn max_term_length(&self) -> usize;

    fn min_term_length(&self) -> usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizerKind {
    /// Maximal runs of alphanumeric characters.
    UnicodeWord,
    /// UAX #29 word boundaries, keeping only segments that contain an alphanumeric char.
    UnicodeSegment,
}

impl TokenizerKind {
    pub const fn name(&self) -> &'static str {
        match self {
            TokenizerKind::UnicodeWord => "unicode-word",
            TokenizerKind::UnicodeSegment => "unicode-segment",
        }
    }
}

impl TryFrom<&str> for TokenizerKind {
    type Error = Error;

    fn try_from(name: &str) -> Result<Self> {
        match name {
            "unicode-word" => Ok(TokenizerKind::UnicodeWord),
            "unicode-segment" => Ok(TokenizerKind::UnicodeSegment),
            _ => Err(Error::invalid_config(
                "tokenizer",
                format!("unrecognized tokenizer: {name}"),
            )),
        }
    }
}

/// Creates a tokenizer by its configuration name.
pub fn create_tokenizer(name: &str) -> Result<TokenizerType> {
    match TokenizerKind::try_from(name)? {
        TokenizerKind::UnicodeWord => Ok(TokenizerType::UnicodeWord(UnicodeWordTokenizer::new())),
        TokenizerKind::UnicodeSegment => Ok(TokenizerType::UnicodeSegment(
            UnicodeSegmentTokenizer::new(),
        )),
    }
}

/// Closed set of the available tokenizers, usable where the concrete type is
/// chosen at runtime.
pub enum TokenizerType {
    UnicodeWord(UnicodeWordTokenizer),
    UnicodeSegment(UnicodeSegmentTokenizer),
}

impl Tokenizer for TokenizerType {
    type TokenIter<'a> = Box<dyn Iterator<Item = &'a str> + 'a>;

    fn tokenize<'a>(&'a self, input: &'a str) -> Self::TokenIter<'a> {
        match self {
            TokenizerType::UnicodeWord(t) => Box::new(t.tokenize(input)),
            TokenizerType::UnicodeSegment(t) => Box::new(t.tokenize(input)),
        }
    }

    fn kind(&self) -> TokenizerKind {
        match self {
            TokenizerType::UnicodeWord(t) => t.kind(),
            TokenizerType::UnicodeSegment(t) => t.kind(),
        }
    }

    fn max_term_length(&self) -> usize {
        match self {
            TokenizerType::UnicodeWord(t) => t.max_term_length(),
            TokenizerType::UnicodeSegment(t) => t.max_term_length(),
        }
    }

    fn min_term_length(&self) -> usize {
        match self {
            TokenizerType::UnicodeWord(t) => t.min_term_length(),
            TokenizerType::UnicodeSegment(t) => t.min_term_length(),
        }
    }
}

/// Case-folds a raw term into its dictionary form.
///
/// Borrows the input when it has no uppercase characters. Lower-casing can grow
/// the byte length of a few scripts, so the result is truncated again to
/// `max_len` bytes.
pub fn normalize_term(term: &str, max_len: usize) -> Cow<'_, str> {
    if !term.chars().any(char::is_uppercase) {
        return Cow::Borrowed(term);
    }
    let mut lowered = term.to_lowercase();
    let keep = truncate_str(&lowered, max_len).len();
    lowered.truncate(keep);
    Cow::Owned(lowered)
}

/// Truncates `input` to at most `max_len` bytes without splitting a char.
pub(crate) fn truncate_str(input: &str, max_len: usize) -> &str {
    if input.len() <= max_len {
        return input;
    }
    let mut boundary = max_len;
    while boundary > 0 && !input.is_char_boundary(boundary) {
        boundary -= 1;
    }
    &input[..boundary]
}

/// A tokenizer paired with term normalization.
///
/// This is the single entry point through which documents and queries are
/// turned into dictionary terms.
pub struct Analyzer {
    tokenizer: TokenizerType,
}

impl Analyzer {
    pub fn new(tokenizer: TokenizerType) -> Analyzer {
        Analyzer { tokenizer }
    }

    pub fn from_name(name: &str) -> Result<Analyzer> {
        Ok(Analyzer::new(create_tokenizer(name)?))
    }

    pub fn tokenizer(&self) -> &TokenizerType {
        &self.tokenizer
    }

    /// Normalized terms of `text`, in order of occurrence.
    pub fn terms<'a>(&'a self, text: &'a str) -> impl Iterator<Item = Cow<'a, str>> + 'a {
        let max_len = self.tokenizer.max_term_length();
        self.tokenizer
            .tokenize(text)
            .map(move |term| normalize_term(term, max_len))
    }
}
