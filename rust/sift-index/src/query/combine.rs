//! Merging of sorted posting lists.
//!
//! Lists are sorted by document id. `score(list, posting)` is the contribution of
//! list `list` to the document of `posting`; contributions are added in list order
//! so repeated evaluation yields bit-identical scores.

use std::{cmp::Reverse, collections::BinaryHeap};

use super::ScoredDoc;
use crate::posting_list::DocPosting;

/// Documents present in every list.
///
/// All cursors move forward only, so the cost is linear in the total list length.
pub fn intersect<F>(lists: &[Vec<DocPosting>], score: F) -> Vec<ScoredDoc>
where
    F: Fn(usize, &DocPosting) -> f64,
{
    if lists.is_empty() || lists.iter().any(Vec::is_empty) {
        return Vec::new();
    }
    let mut cursors = vec![0usize; lists.len()];
    let mut out = Vec::new();
    'outer: loop {
        let mut target = lists[0][cursors[0]].doc_id;
        let mut aligned = false;
        while !aligned {
            aligned = true;
            for (i, list) in lists.iter().enumerate() {
                let cursor = &mut cursors[i];
                while list[*cursor].doc_id < target {
                    *cursor += 1;
                    if *cursor == list.len() {
                        break 'outer;
                    }
                }
                if list[*cursor].doc_id > target {
                    target = list[*cursor].doc_id;
                    aligned = false;
                }
            }
        }
        let total = lists
            .iter()
            .zip(&cursors)
            .enumerate()
            .map(|(i, (list, &c))| score(i, &list[c]))
            .sum::<f64>();
        out.push(ScoredDoc {
            doc_id: target,
            score: total,
        });
        for (list, cursor) in lists.iter().zip(cursors.iter_mut()) {
            *cursor += 1;
            if *cursor == list.len() {
                break 'outer;
            }
        }
    }
    out
}

/// Documents present in at least one list.
pub fn union<F>(lists: &[Vec<DocPosting>], score: F) -> Vec<ScoredDoc>
where
    F: Fn(usize, &DocPosting) -> f64,
{
    let mut heap: BinaryHeap<Reverse<(u32, usize)>> = lists
        .iter()
        .enumerate()
        .filter_map(|(i, list)| list.first().map(|p| Reverse((p.doc_id, i))))
        .collect();
    let mut cursors = vec![0usize; lists.len()];
    let mut out: Vec<ScoredDoc> = Vec::new();
    while let Some(Reverse((doc_id, i))) = heap.pop() {
        let contribution = score(i, &lists[i][cursors[i]]);
        match out.last_mut() {
            Some(last) if last.doc_id == doc_id => last.score += contribution,
            _ => out.push(ScoredDoc {
                doc_id,
                score: contribution,
            }),
        }
        cursors[i] += 1;
        if let Some(next) = lists[i].get(cursors[i]) {
            heap.push(Reverse((next.doc_id, i)));
        }
    }
    out
}
