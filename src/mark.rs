//! Author marks attached to each interval of a file's line-authorship tree.

/// Number of bits reserved for an author time stamp. Mirrors the source's
/// `TreeMaxBinPower`; not meant to be tuned per-deployment.
pub const TREE_MAX_BIN_POWER: u32 = 14;

/// Reserved sentinel used by callers to stage a span for later resolution by
/// [`crate::file::FileEngine::merge`].
pub const TREE_MERGE_MARK: i64 = (1 << TREE_MAX_BIN_POWER) - 1;

/// The raw encoding of the end-of-file sentinel in [`Mark::to_raw`]/`Dump` output.
pub const EOF_RAW: i64 = -1;

/// A single interval's author mark.
///
/// Modeled as a tagged enum rather than a bare sentinel integer so illegal
/// states (a negative author time that isn't the EOF sentinel) aren't
/// representable. `mark.rs` is the one place that knows about the raw
/// encoding used at the public API boundary (`update`'s `time` parameter,
/// and `dump`'s textual output).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    /// Terminal sentinel. Appears exactly once, as the last entry.
    Eof,
    /// Placeholder staged by the caller for later reconciliation by `merge`.
    MergeMark,
    /// A normal author time stamp, assigned by the surrounding pipeline.
    Author(i64),
}

impl Mark {
    /// Decode a raw `time` value as passed across the public API (`update`'s
    /// `time` parameter, or a value read back from a pre-built tree via
    /// `from_tree`). Panics (with a "time"-identifiable message) on a
    /// negative value other than the EOF encoding, since callers never pass
    /// `-1` as a `time` argument — that encoding is output-only.
    pub fn from_time(time: i64) -> Mark {
        assert!(time >= 0, "time must be non-negative");
        if time == TREE_MERGE_MARK {
            Mark::MergeMark
        } else {
            Mark::Author(time)
        }
    }

    /// Decode a raw value as it appears in a `dump()`/`from_tree` encoding,
    /// where `-1` denotes EOF.
    pub fn from_raw(raw: i64) -> Mark {
        if raw == EOF_RAW {
            Mark::Eof
        } else {
            Mark::from_time(raw)
        }
    }

    /// Encode back to the raw representation used by `dump()` and by
    /// `from_tree`'s `vals[]` array.
    pub fn to_raw(self) -> i64 {
        match self {
            Mark::Eof => EOF_RAW,
            Mark::MergeMark => TREE_MERGE_MARK,
            Mark::Author(t) => t,
        }
    }

    pub fn is_eof(self) -> bool {
        matches!(self, Mark::Eof)
    }

    pub fn is_merge_mark(self) -> bool {
        matches!(self, Mark::MergeMark)
    }

    /// The author time this mark should be charged to in the status sinks.
    /// Only meaningful for `Author` marks; callers must never ask this of
    /// `Eof` or `MergeMark` (status sinks never see either).
    pub fn author_time(self) -> i64 {
        match self {
            Mark::Author(t) => t,
            _ => panic!("mark has no author time"),
        }
    }
}
