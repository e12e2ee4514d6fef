//! The per-file state machine: construction, edits, branching, and queries
//! over one file's line-authorship tree.

use std::rc::Rc;

use crate::mark::Mark;
use crate::merge;
use crate::status::{Sink, SharedSinks, SinkList};
use crate::tree::Tree;

/// Opaque content hash attached to a file engine. 20 bytes, matching a Git
/// object id; never interpreted by this crate.
pub type Hash = [u8; 20];

/// The state machine for one tracked file: its interval tree plus the
/// status sinks it feeds on every line-count change.
pub struct FileEngine {
    pub(crate) hash: Hash,
    pub(crate) tree: Tree,
    pub(crate) sinks: SharedSinks,
}

impl FileEngine {
    /// Construct a new engine for a file of `initial_length` lines, all
    /// authored at `initial_time`, feeding `sinks` from the start. Emits an
    /// initial `(+initial_length)` status delta into those sinks unless
    /// `initial_length == 0`.
    pub fn new(
        hash: Hash,
        initial_time: i64,
        initial_length: u32,
        sinks: impl IntoIterator<Item = Sink>,
    ) -> FileEngine {
        assert!(initial_time >= 0, "time must be non-negative");
        let tree = Tree::new(initial_time, initial_length);
        let sinks = Rc::new(std::cell::RefCell::new(SinkList::with_sinks(sinks)));
        if initial_length > 0 {
            sinks
                .borrow_mut()
                .emit(initial_time, initial_time, initial_length as i64);
        }
        FileEngine { hash, tree, sinks }
    }

    /// Construct an engine directly from parallel `keys`/`vals` arrays (the
    /// latter in the raw mark encoding). No validation is implied; run
    /// [`FileEngine::validate`] if the caller's input isn't trusted.
    pub fn from_tree(
        hash: Hash,
        keys: &[u32],
        vals: &[i64],
        sinks: impl IntoIterator<Item = Sink>,
    ) -> FileEngine {
        FileEngine {
            hash,
            tree: Tree::from_raw_parts(keys, vals),
            sinks: Rc::new(std::cell::RefCell::new(SinkList::with_sinks(sinks))),
        }
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn set_hash(&mut self, hash: Hash) {
        self.hash = hash;
    }

    pub fn len(&self) -> u32 {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn dump(&self) -> String {
        self.tree.dump()
    }

    pub fn flatten(&self) -> Vec<i64> {
        self.tree.flatten()
    }

    pub fn validate(&self) {
        self.tree.validate();
    }

    pub fn status_len(&self) -> usize {
        self.sinks.borrow().len()
    }

    /// Add one more sink to this engine, fed from now on.
    pub fn add_sink(&mut self, sink: Sink) {
        self.sinks.borrow_mut().push(sink);
    }

    /// Assert that sink `i` exists. Mirrors the source's `status(i)`
    /// accessor; a boxed closure can't usefully be handed back to the
    /// caller, so this is the bounds-checking half of that contract — the
    /// caller observes a sink's effect through the state it captured when
    /// constructing the closure, not through this engine.
    pub fn status(&self, i: usize) {
        assert!(i < self.sinks.borrow().len(), "status: index out of range");
    }

    /// Apply one atomic edit: insert `added` lines at `position` authored
    /// at `time`, then delete `removed` lines starting immediately after
    /// the insertion point.
    pub fn update(&mut self, time: i64, position: i64, added: i64, removed: i64) {
        assert!(time >= 0, "time must be non-negative");
        assert!(
            added >= 0 && removed >= 0,
            "Length: added and removed must be non-negative"
        );
        let len = self.tree.len() as i64;
        if added > 0 {
            assert!(
                position >= 0 && position <= len,
                "insert: position out of range [0, len()]"
            );
        } else {
            assert!(
                position >= 0 && position <= len,
                "delete: position out of range [0, len()]"
            );
        }

        if added == 0 && removed == 0 {
            // A touch at the merge-mark sentinel has no real author to
            // charge, matching the rule that status sinks never see a
            // MergeMark contribution.
            if let Mark::Author(_) = Mark::from_time(time) {
                self.sinks.borrow_mut().emit(time, time, 0);
            }
            return;
        }

        assert!(
            position + removed <= len,
            "delete: removed exceeds the lines available from position to the terminal sentinel"
        );

        let position = position as u32;
        let added = added as u32;
        let removed = removed as u32;

        if added > 0 {
            self.insert_span(position, added, time);
        }
        if removed > 0 {
            self.delete_span(position + added, removed, time);
        }
        self.tree.fuse();
    }

    fn insert_span(&mut self, position: u32, added: u32, time: i64) {
        let (lo_offset, lo_mark) = self
            .tree
            .find_le(position)
            .expect("invalid tree state: no entry at or before position");

        self.tree.shift_from(position, added as i64);
        self.tree.insert(position, Mark::from_time(time));
        if lo_offset < position {
            // The run that used to cover `position` is split; re-establish
            // its tail past the inserted span. (If lo_offset == position
            // the old entry was shifted verbatim and already serves this
            // purpose.)
            self.tree.insert(position + added, lo_mark);
        }

        // A span staged under the merge-mark sentinel isn't authored by
        // anyone yet; it gets credited later, when `merge` resolves it.
        if let Mark::Author(_) = Mark::from_time(time) {
            self.sinks.borrow_mut().emit(time, time, added as i64);
        }
    }

    fn delete_span(&mut self, start: u32, removed: u32, time: i64) {
        let (_, lo_mark) = self
            .tree
            .find_le(start)
            .expect("invalid tree state: no entry at or before deletion start");
        let end = start + removed;
        let (tail_offset, tail_mark) = self
            .tree
            .find_le(end)
            .expect("invalid tree state: no entry at or before deletion end");

        // Charge each previously-authoring span within [start, end) its
        // share of the removal, using the marks actually present there —
        // never `time`. A span staged under the merge-mark sentinel stays
        // off the books entirely: it gets credited later, when `merge`
        // resolves it, so removing it here must not debit the author it
        // temporarily overwrites.
        if let Mark::Author(_) = Mark::from_time(time) {
            let mut seg_start = start;
            let mut seg_mark = lo_mark;
            for (offset, mark) in self.tree.entries_in(start + 1, end) {
                self.emit_removal(time, seg_mark, offset - seg_start);
                seg_start = offset;
                seg_mark = mark;
            }
            self.emit_removal(time, seg_mark, end - seg_start);
        }

        let doomed: Vec<u32> = self.tree.keys_in(start, end);
        for key in doomed {
            self.tree.remove(&key);
        }
        self.tree.shift_from(end, -(removed as i64));
        if tail_offset < end {
            self.tree.insert(start, tail_mark);
        }
    }

    fn emit_removal(&self, time: i64, mark: Mark, count: u32) {
        if count == 0 {
            return;
        }
        if let Mark::Author(t) = mark {
            self.sinks.borrow_mut().emit(time, t, -(count as i64));
        }
    }

    /// Branch this engine. With `clear_status = false` the clone shares
    /// this engine's sinks (edits on either side accumulate additively).
    /// With `clear_status = true` the clone detaches and attaches
    /// `new_sinks`, first feeding them a negative catch-up delta for every
    /// line alive right now, so they only ever see the delta from this
    /// point onward.
    pub fn clone_branch(
        &self,
        clear_status: bool,
        new_sinks: impl IntoIterator<Item = Sink>,
    ) -> FileEngine {
        let tree = self.tree.clone();
        if !clear_status {
            return FileEngine {
                hash: self.hash,
                tree,
                sinks: Rc::clone(&self.sinks),
            };
        }

        let mut sinks = SinkList::with_sinks(new_sinks);
        for (mark, count) in tree.runs() {
            if let Mark::Author(t) = mark {
                sinks.emit(t, t, -(count as i64));
            }
        }
        FileEngine {
            hash: self.hash,
            tree,
            sinks: Rc::new(std::cell::RefCell::new(sinks)),
        }
    }

    /// Reconcile `self` with `other`, a file branched from a common
    /// ancestor. Returns whether `self`'s tree changed. See [`merge`] for
    /// the reconciliation algorithm.
    pub fn merge(&mut self, time: i64, other: &FileEngine) -> bool {
        merge::merge(self, time, other)
    }
}
