//! Splits text into maximal runs of alphanumeric characters.

use std::str::CharIndices;

use super::{DEFAULT_MAX_TERM_LENGTH, DEFAULT_MIN_TERM_LENGTH, Tokenizer, TokenizerKind, truncate_str};

/// Extracts the longest continuous sequences of alphanumeric characters.
///
/// Everything else (whitespace, punctuation, symbols, emoji) is a delimiter.
pub struct UnicodeWordTokenizer {
    max_term_length: usize,
    min_term_length: usize,
}

impl UnicodeWordTokenizer {
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

impl Default for UnicodeWordTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator returned by [`UnicodeWordTokenizer`].
pub struct WordIter<'a> {
    input: &'a str,
    chars: CharIndices<'a>,
    max_term_length: usize,
    min_term_length: usize,
}

impl<'a> WordIter<'a> {
    fn next_word(&mut self) -> Option<&'a str> {
        let mut start = None;
        for (pos, ch) in self.chars.by_ref() {
            match (ch.is_alphanumeric(), start) {
                (true, None) => start = Some(pos),
                (false, Some(s)) => return Some(&self.input[s..pos]),
                _ => {}
            }
        }
        start.map(|s| &self.input[s..])
    }
}

impl<'a> Iterator for WordIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        loop {
            let word = self.next_word()?;
            if word.len() >= self.min_term_length {
                return Some(truncate_str(word, self.max_term_length));
            }
        }
    }
}

impl Tokenizer for UnicodeWordTokenizer {
    type TokenIter<'a> = WordIter<'a>;

    fn tokenize<'a>(&'a self, input: &'a str) -> WordIter<'a> {
        WordIter {
            input,
            chars: input.char_indices(),
            max_term_length: self.max_term_length,
            min_term_length: self.min_term_length,
        }
    }

    fn kind(&self) -> TokenizerKind {
        TokenizerKind::UnicodeWord
    }

    fn max_term_length(&self) -> usize {
        self.max_term_length
    }

    fn min_term_length(&self) -> usize {
        self.min_term_length
    }
}
