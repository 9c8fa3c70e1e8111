//! UAX #29 word segmentation.
//!
//! Unlike [`UnicodeWordTokenizer`](super::UnicodeWordTokenizer), contractions and
//! decimal numbers stay whole (`can't`, `3.14`).

use unicode_segmentation::{UnicodeSegmentation, UnicodeWords};

use super::{DEFAULT_MAX_TERM_LENGTH, DEFAULT_MIN_TERM_LENGTH, Tokenizer, TokenizerKind, truncate_str};

/// Tokenizer over the UAX #29 word boundaries of `unicode-segmentation`.
pub struct UnicodeSegmentTokenizer {
    max_term_length: usize,
    min_term_length: usize,
}

impl UnicodeSegmentTokenizer {
    pub fn new() -> Self {
        Self::with_lengths(DEFAULT_MAX_TERM_LENGTH, DEFAULT_MIN_TERM_LENGTH)
    }

    pub fn with_lengths(max_term_length: usize, min_term_length: usize) -> Self {
        Self {
            max_term_length,
            min_term_length,
        }
    }
}

impl Default for UnicodeSegmentTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SegmentIter<'a> {
    words: UnicodeWords<'a>,
    max_term_length: usize,
    min_term_length: usize,
}

impl<'a> Iterator for SegmentIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        self.words
            .by_ref()
            .find(|word| word.len() >= self.min_term_length)
            .map(|word| truncate_str(word, self.max_term_length))
    }
}

impl Tokenizer for UnicodeSegmentTokenizer {
    type TokenIter<'a> = SegmentIter<'a>;

    fn tokenize<'a>(&'a self, input: &'a str) -> SegmentIter<'a> {
        SegmentIter {
            words: input.unicode_words(),
            max_term_length: self.max_term_length,
            min_term_length: self.min_term_length,
        }
    }

    fn kind(&self) -> TokenizerKind {
        TokenizerKind::UnicodeSegment
    }

    fn max_term_length(&self) -> usize {
        self.max_term_length
    }

    fn min_term_length(&self) -> usize {
        self.min_term_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_boundaries() {
        let tokenizer = UnicodeSegmentTokenizer::new();
        let terms: Vec<&str> = tokenizer
            .tokenize("The cat can't sit; pi is 3.14!")
            .collect();
        assert_eq!(terms, vec!["The", "cat", "can't", "sit", "pi", "is", "3.14"]);
        assert_eq!(tokenizer.tokenize("... --- ").count(), 0);
    }

    #[test]
    fn test_min_length_filter() {
        let tokenizer = UnicodeSegmentTokenizer::with_lengths(128, 3);
        let terms: Vec<&str> = tokenizer.tokenize("a bb cat dogs").collect();
        assert_eq!(terms, vec!["cat", "dogs"]);
    }
}
