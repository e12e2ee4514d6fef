//! The ordered map underlying a file's interval tree: line offset -> author mark.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use crate::mark::Mark;

/// A strictly-increasing sequence of `(offset, mark)` entries terminated by
/// an [`Mark::Eof`] sentinel. Built directly on `std::collections::BTreeMap`
/// rather than a hand-rolled balanced tree: the contract this module needs
/// (exact-key lookup, in-order iteration, insert-overwrites, delete-if-absent
/// is a no-op, and `find_ge`) is exactly what `BTreeMap` already provides.
#[derive(Debug, Clone)]
pub struct Tree {
    map: BTreeMap<u32, Mark>,
}

impl Deref for Tree {
    type Target = BTreeMap<u32, Mark>;
    fn deref(&self) -> &Self::Target {
        &self.map
    }
}

impl DerefMut for Tree {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.map
    }
}

impl Tree {
    /// The canonical empty-file tree: a single `(0, Eof)` entry.
    pub fn empty() -> Tree {
        let mut map = BTreeMap::new();
        map.insert(0, Mark::Eof);
        Tree { map }
    }

    /// Build the initial tree for a file of `length` lines, all authored at
    /// `initial_time`. `length == 0` collapses to [`Tree::empty`].
    pub fn new(initial_time: i64, length: u32) -> Tree {
        if length == 0 {
            return Tree::empty();
        }
        let mut map = BTreeMap::new();
        map.insert(0, Mark::from_time(initial_time));
        map.insert(length, Mark::Eof);
        Tree { map }
    }

    /// Build a tree directly from parallel `keys`/`vals` arrays, with `vals`
    /// given in the raw encoding used by [`Mark::from_raw`]. No validation is
    /// implied; callers can build a tree that violates V1-V4, which
    /// [`Tree::validate`] will catch.
    pub fn from_raw_parts(keys: &[u32], vals: &[i64]) -> Tree {
        assert_eq!(
            keys.len(),
            vals.len(),
            "from_tree: keys and vals must have the same length"
        );
        let map = keys
            .iter()
            .copied()
            .zip(vals.iter().copied().map(Mark::from_raw))
            .collect();
        Tree { map }
    }

    /// The offset of the terminal sentinel, i.e. the file's line count.
    /// Panics with an "invalid tree state" message if the tree is empty,
    /// which should never happen in a tree built through this module.
    pub fn len(&self) -> u32 {
        *self
            .map
            .keys()
            .next_back()
            .expect("invalid tree state: tree has no entries")
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The least entry with key `>= k`, if any.
    pub fn find_ge(&self, k: u32) -> Option<(u32, Mark)> {
        self.map.range(k..).next().map(|(&k, &m)| (k, m))
    }

    /// The greatest entry with key `<= k`, if any. Every offset in
    /// `[0, len()]` has one, since the tree always has an entry at 0.
    pub fn find_le(&self, k: u32) -> Option<(u32, Mark)> {
        self.map.range(..=k).next_back().map(|(&k, &m)| (k, m))
    }

    /// Entries with key in `[lo, hi)`, in offset order.
    pub fn entries_in(&self, lo: u32, hi: u32) -> Vec<(u32, Mark)> {
        if lo >= hi {
            return Vec::new();
        }
        self.map.range(lo..hi).map(|(&k, &m)| (k, m)).collect()
    }

    /// Keys in `[lo, hi)`, in ascending order.
    pub fn keys_in(&self, lo: u32, hi: u32) -> Vec<u32> {
        self.entries_in(lo, hi).into_iter().map(|(k, _)| k).collect()
    }

    /// Shift every entry with key `>= threshold` by `delta` (positive or
    /// negative). Used by `update` to make room for an insertion or to
    /// close the gap left by a deletion.
    pub fn shift_from(&mut self, threshold: u32, delta: i64) {
        let tail: Vec<(u32, Mark)> = self
            .map
            .range(threshold..)
            .map(|(&k, &v)| (k, v))
            .collect();
        for (k, _) in &tail {
            self.map.remove(k);
        }
        for (k, v) in tail {
            let shifted = (k as i64 + delta) as u32;
            self.map.insert(shifted, v);
        }
    }

    /// Restore V4 by collapsing adjacent entries that share a mark. A
    /// single left-to-right pass suffices: each candidate is compared
    /// against the last *kept* entry, not the last entry seen, so a whole
    /// run of duplicates collapses in one scan.
    pub fn fuse(&mut self) {
        let entries: Vec<(u32, Mark)> = self.map.iter().map(|(&k, &v)| (k, v)).collect();
        let mut kept: Vec<(u32, Mark)> = Vec::with_capacity(entries.len());
        for (offset, mark) in entries {
            match kept.last() {
                Some(&(_, last_mark)) if last_mark == mark => {}
                _ => kept.push((offset, mark)),
            }
        }
        self.map = kept.into_iter().collect();
    }

    /// Checks V1-V4. Fails fast with an "invalid tree state" message
    /// identifying the violated invariant, rather than returning a `Result`:
    /// every violation here is a programmer error, either in this crate or
    /// in a caller that hand-built a tree via `from_raw_parts`.
    pub fn validate(&self) {
        let mut iter = self.map.iter();
        let (&first_offset, _) = iter
            .clone()
            .next()
            .expect("invalid tree state: tree has no entries");
        assert_eq!(
            first_offset, 0,
            "invalid tree state: first entry's offset must be 0"
        );

        let mut prev_offset: Option<u32> = None;
        let mut prev_mark: Option<Mark> = None;
        let mut eof_count = 0usize;
        let n = self.map.len();
        for (idx, (&offset, &mark)) in iter.by_ref().enumerate() {
            if let Some(p) = prev_offset {
                assert!(
                    offset > p,
                    "invalid tree state: offsets must be strictly increasing"
                );
            }
            if mark.is_eof() {
                eof_count += 1;
                assert_eq!(
                    idx,
                    n - 1,
                    "invalid tree state: EOF mark must only appear as the terminal entry"
                );
            }
            if let Some(pm) = prev_mark {
                assert_ne!(
                    pm, mark,
                    "invalid tree state: adjacent entries must not share a mark"
                );
            }
            prev_offset = Some(offset);
            prev_mark = Some(mark);
        }
        assert_eq!(
            eof_count, 1,
            "invalid tree state: exactly one terminal EOF entry is required"
        );
    }

    /// Render as `"offset mark\n"` lines in offset order, in the raw
    /// encoding, terminated by the EOF sentinel line.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (&offset, &mark) in self.map.iter() {
            out.push_str(&offset.to_string());
            out.push(' ');
            out.push_str(&mark.to_raw().to_string());
            out.push('\n');
        }
        out
    }

    /// Materialize the tree as a `Vec` of length `len()` where element `j`
    /// is the raw mark covering line `j`. Used by tests.
    pub fn flatten(&self) -> Vec<i64> {
        let mut out = Vec::with_capacity(self.len() as usize);
        for (mark, count) in self.runs() {
            out.resize(out.len() + count as usize, mark.to_raw());
        }
        out
    }

    /// The non-terminal runs of this tree as `(mark, length)` pairs, in
    /// offset order. Used by the clone-with-clear catch-up pass and by
    /// `flatten`.
    pub fn runs(&self) -> Vec<(Mark, u32)> {
        let mut out = Vec::new();
        let mut iter = self.map.iter().peekable();
        while let Some((&offset, &mark)) = iter.next() {
            if mark.is_eof() {
                break;
            }
            let next_offset = *iter.peek().map(|(k, _)| *k).unwrap();
            out.push((mark, next_offset - offset));
        }
        out
    }

    /// Rebuild a tree from an explicit, already-fused list of
    /// `(offset, mark)` entries (the last of which must be the terminal
    /// EOF entry). Used by the merge coordinator to install its result.
    pub fn from_entries(entries: Vec<(u32, Mark)>) -> Tree {
        Tree {
            map: entries.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tree_is_canonical() {
        let t = Tree::empty();
        assert_eq!(t.len(), 0);
        assert_eq!(t.dump(), "0 -1\n");
        t.validate();
    }

    #[test]
    fn initial_tree_dumps_as_expected() {
        let t = Tree::new(0, 100);
        assert_eq!(t.dump(), "0 0\n100 -1\n");
        assert_eq!(t.flatten().len(), 100);
        assert!(t.flatten().iter().all(|&m| m == 0));
        t.validate();
    }

    #[test]
    fn find_ge_returns_least_key_at_or_above() {
        let t = Tree::new(0, 100);
        assert_eq!(t.find_ge(0), Some((0, Mark::Author(0))));
        assert_eq!(t.find_ge(1), Some((100, Mark::Eof)));
        assert_eq!(t.find_ge(101), None);
    }

    #[test]
    #[should_panic(expected = "invalid tree state")]
    fn validate_catches_missing_leading_zero() {
        let t = Tree::from_raw_parts(&[1, 100], &[0, -1]);
        t.validate();
    }

    #[test]
    #[should_panic(expected = "invalid tree state")]
    fn validate_catches_unfused_run() {
        let t = Tree::from_raw_parts(&[0, 50, 100], &[0, 0, -1]);
        t.validate();
    }
}
