//! Canonical edit scripts between two uniquified sequences.
//!
//! Elements of a uniquified sequence are pairwise distinct, so a longest
//! common subsequence of `old` and `new` is a longest increasing subsequence
//! of the `old` positions of shared elements, taken in `new` order. That runs
//! in O(n log n) and yields a minimal remove/insert script. Any element that is
//! both removed and inserted is a move.
//!
//! When several common subsequences of maximal length exist, the one that keeps
//! the later elements of `old` wins, so earlier elements are the ones removed.

use std::collections::HashMap;
use std::hash::Hash;

use super::uniquify::{uniquify, Unique};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal<T> {
    /// Position in `old`
    pub offset: usize,
    pub element: Unique<T>,
    /// Offset of the paired insertion in `new`, if this removal is half of a move
    pub moved_to: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insertion<T> {
    /// Position in `new`
    pub offset: usize,
    pub element: Unique<T>,
    /// Offset of the paired removal in `old`, if this insertion is half of a move
    pub moved_from: Option<usize>,
}

/// Minimal edit script from `old` to `new`.
///
/// Applying every removal in descending offset order and then every insertion
/// in ascending offset order to `old` yields `new`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditScript<T> {
    old: Vec<Unique<T>>,
    new: Vec<Unique<T>>,
    removals: Vec<Removal<T>>,
    insertions: Vec<Insertion<T>>,
}

impl<T> EditScript<T> {
    pub fn old(&self) -> &[Unique<T>] {
        &self.old
    }

    pub fn new_sequence(&self) -> &[Unique<T>] {
        &self.new
    }

    /// Removals, ascending by offset
    pub fn removals(&self) -> &[Removal<T>] {
        &self.removals
    }

    /// Insertions, ascending by offset
    pub fn insertions(&self) -> &[Insertion<T>] {
        &self.insertions
    }

    pub fn is_empty(&self) -> bool {
        self.removals.is_empty() && self.insertions.is_empty()
    }

    /// Number of remove + insert records
    pub fn len(&self) -> usize {
        self.removals.len() + self.insertions.len()
    }

    pub fn move_count(&self) -> usize {
        self.insertions
            .iter()
            .filter(|i| i.moved_from.is_some())
            .count()
    }

    /// Replay the script against `old`: removals descending, then insertions ascending.
    pub fn apply_to(&self, old: &[Unique<T>]) -> Vec<Unique<T>>
    where
        T: Clone,
    {
        let mut out = old.to_vec();
        for removal in self.removals.iter().rev() {
            out.remove(removal.offset);
        }
        for insertion in &self.insertions {
            out.insert(insertion.offset, insertion.element.clone());
        }
        out
    }
}

/// Compute the canonical edit script between two uniquified sequences.
pub fn canonical_diff<T>(old: &[Unique<T>], new: &[Unique<T>]) -> EditScript<T>
where
    T: Clone + Eq + Hash,
{
    let old_index: HashMap<&Unique<T>, usize> =
        old.iter().enumerate().map(|(i, e)| (e, i)).collect();
    let new_index: HashMap<&Unique<T>, usize> =
        new.iter().enumerate().map(|(j, e)| (e, j)).collect();

    // (new position, old position) for every shared element, in new order
    let shared: Vec<(usize, usize)> = new
        .iter()
        .enumerate()
        .filter_map(|(j, e)| old_index.get(e).map(|&i| (j, i)))
        .collect();

    let mut kept_old = vec![false; old.len()];
    let mut kept_new = vec![false; new.len()];
    for t in longest_increasing(&shared) {
        let (j, i) = shared[t];
        kept_old[i] = true;
        kept_new[j] = true;
    }

    let removals = old
        .iter()
        .enumerate()
        .filter(|(i, _)| !kept_old[*i])
        .map(|(i, e)| Removal {
            offset: i,
            element: e.clone(),
            moved_to: new_index.get(e).copied(),
        })
        .collect();

    let insertions = new
        .iter()
        .enumerate()
        .filter(|(j, _)| !kept_new[*j])
        .map(|(j, e)| Insertion {
            offset: j,
            element: e.clone(),
            moved_from: old_index.get(e).copied(),
        })
        .collect();

    EditScript {
        old: old.to_vec(),
        new: new.to_vec(),
        removals,
        insertions,
    }
}

/// Uniquify both sequences and diff them.
pub fn diff_sequences<T>(old: &[T], new: &[T]) -> EditScript<T>
where
    T: Clone + Eq + Hash,
{
    canonical_diff(&uniquify(old), &uniquify(new))
}

/// Indices into `pairs` forming a longest subsequence strictly increasing in
/// `.1`, ties going to the subsequence with the largest leading values.
///
/// Scans right to left. `heads[k]` holds the entry that starts the best
/// increasing run of length `k + 1` found so far, where best means largest
/// starting value; the starting values decrease as `k` grows.
fn longest_increasing(pairs: &[(usize, usize)]) -> Vec<usize> {
    let mut heads: Vec<usize> = Vec::new();
    let mut next: Vec<Option<usize>> = vec![None; pairs.len()];

    for t in (0..pairs.len()).rev() {
        let value = pairs[t].1;
        let len = heads.partition_point(|&h| pairs[h].1 > value);
        next[t] = len.checked_sub(1).map(|k| heads[k]);
        if len == heads.len() {
            heads.push(t);
        } else {
            heads[len] = t;
        }
    }

    let mut run = Vec::with_capacity(heads.len());
    let mut cursor = heads.last().copied();
    while let Some(t) = cursor {
        run.push(t);
        cursor = next[t];
    }
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::uniquify::strip;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_identical_sequences_have_empty_script() {
        let script = diff_sequences(&chars("abcab"), &chars("abcab"));
        assert!(script.is_empty());
        assert_eq!(script.len(), 0);
    }

    #[test]
    fn test_empty_sides_degenerate() {
        let script = diff_sequences(&[], &chars("abc"));
        assert!(script.removals().is_empty());
        assert_eq!(script.insertions().len(), 3);
        assert!(script.insertions().iter().all(|i| i.moved_from.is_none()));

        let script = diff_sequences(&chars("abc"), &[]);
        assert!(script.insertions().is_empty());
        assert_eq!(script.removals().len(), 3);
        assert!(script.removals().iter().all(|r| r.moved_to.is_none()));
    }

    #[test]
    fn test_plain_insert_and_remove() {
        let script = diff_sequences(&chars("abc"), &chars("axc"));
        assert_eq!(script.removals().len(), 1);
        assert_eq!(script.removals()[0].offset, 1);
        assert_eq!(script.removals()[0].moved_to, None);
        assert_eq!(script.insertions().len(), 1);
        assert_eq!(script.insertions()[0].offset, 1);
        assert_eq!(script.insertions()[0].element.value, 'x');
        assert_eq!(script.move_count(), 0);
    }

    #[test]
    fn test_move_is_paired() {
        let old = chars("abcdef");
        let new = chars("axdbcefz");
        let script = diff_sequences(&old, &new);

        assert_eq!(script.removals().len(), 1);
        let removal = &script.removals()[0];
        assert_eq!(removal.element.value, 'd');
        assert_eq!(removal.offset, 3);
        assert_eq!(removal.moved_to, Some(2));

        let inserted: Vec<(usize, char, Option<usize>)> = script
            .insertions()
            .iter()
            .map(|i| (i.offset, i.element.value, i.moved_from))
            .collect();
        assert_eq!(
            inserted,
            vec![(1, 'x', None), (2, 'd', Some(3)), (7, 'z', None)]
        );
        assert_eq!(script.move_count(), 1);
    }

    #[test]
    fn test_swap_tie_break_removes_earlier_element() {
        let script = diff_sequences(&chars("ab"), &chars("ba"));
        assert_eq!(script.removals().len(), 1);
        assert_eq!(script.removals()[0].element.value, 'a');
        assert_eq!(script.removals()[0].offset, 0);
        assert_eq!(script.insertions()[0].offset, 1);
        assert_eq!(script.insertions()[0].moved_from, Some(0));
    }

    #[test]
    fn test_duplicates_are_disambiguated() {
        // Second "a" moves to the front; the first stays put
        let old = chars("abca");
        let new = chars("aabc");
        let script = diff_sequences(&old, &new);
        assert_eq!(script.len(), 2);
        assert_eq!(script.removals()[0].offset, 3);
        assert_eq!(script.removals()[0].element.occurrence, 1);
        assert_eq!(script.insertions()[0].element.occurrence, 1);
        assert_eq!(script.insertions()[0].offset, 1);
    }

    #[test]
    fn test_script_is_minimal() {
        let old = chars("abcdefgh");
        let new = chars("hgfedcba");
        let script = diff_sequences(&old, &new);
        // LCS of a reversal of distinct elements has length 1
        assert_eq!(script.removals().len(), 7);
        assert_eq!(script.insertions().len(), 7);
        assert_eq!(script.move_count(), 7);
    }

    #[test]
    fn test_apply_reproduces_new() {
        let old = uniquify(&chars("aabbcxyz"));
        let new = uniquify(&chars("zbacaby"));
        let script = canonical_diff(&old, &new);
        assert_eq!(strip(&script.apply_to(&old)), chars("zbacaby"));
    }
}
