//! Dense ids for normalized terms.

use std::sync::Arc;

use ahash::AHashMap;
use sift_common::{Result, error::Error};

/// A bidirectional mapping between normalized terms and dense term ids.
///
/// Ids are assigned in first-seen order starting at 0, so the same document
/// sequence always yields the same ids. Terms are never removed.
///
/// During tokenization the dictionary grows; at query time it is rebuilt once from
/// the term-ids file and only read.
#[derive(Default)]
pub struct TermDictionary {
    ids: AHashMap<Arc<str>, u32>,
    terms: Vec<Arc<str>>,
}

impl TermDictionary {
    pub fn new() -> TermDictionary {
        TermDictionary::default()
    }

    /// Rebuilds the dictionary from an id-ordered term list.
    ///
    /// Fails if a term appears twice, since that would make the mapping ambiguous.
    pub fn from_terms(terms: Vec<String>) -> Result<TermDictionary> {
        let mut dict = TermDictionary {
            ids: AHashMap::with_capacity(terms.len()),
            terms: Vec::with_capacity(terms.len()),
        };
        for term in terms {
            let expected = dict.terms.len() as u32;
            if dict.map_term(&term)? != expected {
                return Err(Error::invalid_format_msg(
                    "term dictionary",
                    format!("duplicate term '{term}'"),
                ));
            }
        }
        Ok(dict)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Returns the id of `term`, assigning the next free id if it is new.
    pub fn map_term(&mut self, term: &str) -> Result<u32> {
        if let Some(&id) = self.ids.get(term) {
            return Ok(id);
        }
        let id = u32::try_from(self.terms.len())
            .map_err(|_| Error::invalid_operation("term dictionary is full"))?;
        let term: Arc<str> = Arc::from(term);
        self.ids.insert(term.clone(), id);
        self.terms.push(term);
        Ok(id)
    }

    pub fn get(&self, term: &str) -> Option<u32> {
        self.ids.get(term).copied()
    }

    pub fn term(&self, id: u32) -> Option<&str> {
        self.terms.get(id as usize).map(|t| t.as_ref())
    }

    /// Terms in id order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(|t| t.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_seen_order() {
        let mut dict = TermDictionary::new();
        let ids: Vec<u32> = ["the", "cat", "sat", "the", "dog", "cat"]
            .iter()
            .map(|t| dict.map_term(t).unwrap())
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 0, 3, 1]);
        assert_eq!(dict.len(), 4);
        assert_eq!(dict.term(3), Some("dog"));
        assert_eq!(dict.term(4), None);
        assert_eq!(dict.get("sat"), Some(2));
        assert_eq!(dict.get("bird"), None);
        assert_eq!(dict.iter().collect::<Vec<_>>(), vec!["the", "cat", "sat", "dog"]);
    }

    #[test]
    fn test_from_terms() {
        let dict = TermDictionary::from_terms(vec!["a".into(), "b".into()]).unwrap();
        assert_eq!(dict.get("b"), Some(1));
        assert!(TermDictionary::from_terms(vec!["a".into(), "a".into()]).is_err());
    }
}
