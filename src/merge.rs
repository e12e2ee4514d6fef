//! Reconciles two diverged file engines branched from a common ancestor,
//! resolving any `MergeMark` placeholders staged by a prior `update` call.

use std::rc::Rc;

use crate::file::FileEngine;
use crate::mark::Mark;
use crate::tree::Tree;

/// Combine `other` into `self`, resolving `MergeMark` placeholders on
/// either side, and report whether `self`'s tree changed.
///
/// Fast path: byte-identical hashes mean byte-identical trees; skip the
/// reconciliation entirely. This trusts the caller's hash — if two engines
/// carry equal hashes but are not in fact structurally identical, this
/// returns an incorrect `false`. That's the caller's bug to avoid, not
/// something this function can detect.
pub fn merge(this: &mut FileEngine, time: i64, other: &FileEngine) -> bool {
    if this.hash == other.hash {
        return false;
    }

    assert_eq!(
        this.tree.len(),
        other.tree.len(),
        "invalid tree state: merge requires two files of matching length"
    );
    let len = this.tree.len();

    let self_entries: Vec<(u32, Mark)> = this.tree.iter().map(|(&k, &v)| (k, v)).collect();
    let other_entries: Vec<(u32, Mark)> = other.tree.iter().map(|(&k, &v)| (k, v)).collect();

    let mut offsets: Vec<u32> = self_entries
        .iter()
        .chain(other_entries.iter())
        .map(|&(k, _)| k)
        .filter(|&k| k < len)
        .collect();
    offsets.sort_unstable();
    offsets.dedup();
    offsets.push(len);

    let shares_sinks_with_other = Rc::ptr_eq(&this.sinks, &other.sinks);

    let mut result: Vec<(u32, Mark)> = Vec::with_capacity(offsets.len());
    for window in offsets.windows(2) {
        let offset = window[0];
        let span = window[1] - offset;
        let self_mark = mark_covering(&self_entries, offset);
        let other_mark = mark_covering(&other_entries, offset);

        let resolved = if self_mark == Mark::MergeMark && other_mark == Mark::MergeMark {
            // Neither test corpus nor the written rule covers this case
            // directly; applying the two substitution rules in sequence
            // (self's mark resolves to other's mark, which is itself a
            // merge-mark and so resolves to `time`) is the fixed point.
            Mark::Author(time)
        } else if self_mark == Mark::MergeMark {
            other_mark
        } else if other_mark == Mark::MergeMark {
            Mark::Author(time)
        } else {
            self_mark
        };

        credit_span(this, time, self_mark, other_mark, resolved, span, shares_sinks_with_other);

        match result.last() {
            Some(&(_, last)) if last == resolved => {}
            _ => result.push((offset, resolved)),
        }
    }
    result.push((len, Mark::Eof));

    let before = this.tree.dump();
    this.tree = Tree::from_entries(result);
    this.tree.dump() != before
}

/// The mark covering `offset` in a sorted, fused entry list, found via
/// binary search for the greatest key `<= offset`.
fn mark_covering(entries: &[(u32, Mark)], offset: u32) -> Mark {
    let idx = entries.partition_point(|&(k, _)| k <= offset);
    entries[idx - 1].1
}

/// Credit one granular segment of the merge (bounded by the union of both
/// sides' own offsets, not by the coarser fused spans in `result` — a
/// `self`/`other` authorship boundary can sit in the middle of a span that
/// merges to a single resolved mark). Four cases:
///
/// - Both sides staged the span under `MergeMark`: neither ever credited it
///   anywhere, so it's credited here for the first time.
/// - Only `self` staged it (`other` carries the real author): `other`'s own
///   `update` call already credited that author when it made the edit. If
///   `self` and `other` feed the same sinks, that credit is already
///   reflected; only replicate it into `self`'s sinks when the two engines
///   don't share a ledger.
/// - Only `other` staged it (`self` carries a real author that the merge
///   reassigns to `time`): `self`'s own earlier edit already credited the
///   old author, so that credit is moved to the new one.
/// - Neither staged it, but the two sides disagree (a real edit conflict):
///   self wins. `self`'s credit for this span was never touched by `self`'s
///   own history, so it stands as-is; `other`'s competing edit is discarded,
///   so its credit must be reversed, but only if it's actually present in
///   the ledger `self` feeds (i.e. the two engines share sinks).
fn credit_span(
    this: &mut FileEngine,
    time: i64,
    self_mark: Mark,
    other_mark: Mark,
    resolved: Mark,
    span: u32,
    shares_sinks_with_other: bool,
) {
    if span == 0 {
        return;
    }
    if self_mark == Mark::MergeMark && other_mark == Mark::MergeMark {
        emit_credit(this, time, resolved, span as i64);
    } else if self_mark == Mark::MergeMark {
        if !shares_sinks_with_other {
            emit_credit(this, time, other_mark, span as i64);
        }
    } else if other_mark == Mark::MergeMark {
        if resolved != self_mark {
            emit_credit(this, time, self_mark, -(span as i64));
            emit_credit(this, time, resolved, span as i64);
        }
    } else if self_mark != other_mark && shares_sinks_with_other {
        emit_credit(this, time, other_mark, -(span as i64));
    }
}

fn emit_credit(this: &FileEngine, time: i64, mark: Mark, delta: i64) {
    if let Mark::Author(t) = mark {
        this.sinks.borrow_mut().emit(time, t, delta);
    }
}
