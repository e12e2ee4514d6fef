//! Status sink plumbing: the aging-counter side channel a file engine feeds
//! on every line-count change.

use std::cell::RefCell;
use std::rc::Rc;

use smallvec::SmallVec;

/// A status sink: an opaque, caller-owned callback invoked as
/// `(current_time, previous_time, delta)` whenever the engine's line count
/// changes for some previously-authored span. The closure's captured
/// environment plays the role the source gives to a `(state, function
/// pointer)` pair.
pub type Sink = Box<dyn FnMut(i64, i64, i64)>;

/// The set of sinks a file engine feeds. Most files have exactly one, hence
/// the inline capacity of 1; `SmallVec` avoids a heap allocation for the
/// common case while still supporting more.
///
/// Shared between engines produced by `clone(clearStatus = false)` via
/// `Rc<RefCell<_>>` — the tree itself is always deep-copied, but the sink
/// list is reference-counted so edits on either engine land in the same
/// sinks.
#[derive(Default)]
pub struct SinkList {
    sinks: SmallVec<[Sink; 1]>,
}

pub type SharedSinks = Rc<RefCell<SinkList>>;

impl SinkList {
    pub fn new() -> SinkList {
        SinkList {
            sinks: SmallVec::new(),
        }
    }

    pub fn shared() -> SharedSinks {
        Rc::new(RefCell::new(SinkList::new()))
    }

    pub fn with_sinks(sinks: impl IntoIterator<Item = Sink>) -> SinkList {
        SinkList {
            sinks: sinks.into_iter().collect(),
        }
    }

    pub fn push(&mut self, sink: Sink) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Invoke every sink with the same `(current_time, previous_time,
    /// delta)` triple. No ordering guarantee is promised beyond this call's
    /// own atomicity.
    pub fn emit(&mut self, current_time: i64, previous_time: i64, delta: i64) {
        for sink in &mut self.sinks {
            sink(current_time, previous_time, delta);
        }
    }

    /// Access the `i`-th sink by index, for callers that need to drive a
    /// sink directly (e.g. the clone-with-clear catch-up pass). Panics with
    /// an out-of-range message if `i` is not a valid sink index.
    pub fn get_mut(&mut self, i: usize) -> &mut Sink {
        assert!(i < self.sinks.len(), "status: sink index out of range");
        &mut self.sinks[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn emit_reaches_every_sink() {
        let a = Rc::new(Cell::new(0i64));
        let b = Rc::new(Cell::new(0i64));
        let mut sinks = SinkList::new();
        {
            let a = a.clone();
            sinks.push(Box::new(move |_cur, _prev, delta| a.set(a.get() + delta)));
        }
        {
            let b = b.clone();
            sinks.push(Box::new(move |_cur, _prev, delta| b.set(b.get() + delta)));
        }
        sinks.emit(1, 0, 10);
        assert_eq!(a.get(), 10);
        assert_eq!(b.get(), 10);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn get_mut_rejects_bad_index() {
        let mut sinks = SinkList::new();
        sinks.get_mut(0);
    }
}
