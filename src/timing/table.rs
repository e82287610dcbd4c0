//! Immutable word-timing table.

use serde::{Deserialize, Serialize};

/// Index value meaning "no word currently attributable".
pub const NO_WORD: i32 = -1;

// ---------------------------------------------------------------------------
// WordTiming
// ---------------------------------------------------------------------------

/// One spoken word and the interval (in seconds) it occupies in the audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordTiming {
    pub word: String,
    pub start_time: f64,
    pub end_time: f64,
}

impl WordTiming {
    pub fn new(word: impl Into<String>, start_time: f64, end_time: f64) -> Self {
        Self {
            word: word.into(),
            start_time,
            end_time,
        }
    }
}

// ---------------------------------------------------------------------------
// TimingTable
// ---------------------------------------------------------------------------

/// Ascending table of [`WordTiming`] intervals.
///
/// The table is never mutated after construction; sessions share it behind an
/// `Arc`.  Construction does not reorder or reject entries: a malformed table
/// still resolves without panicking, and [`is_well_formed`](Self::is_well_formed)
/// lets callers decide whether to trust it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimingTable {
    entries: Vec<WordTiming>,
}

impl TimingTable {
    pub fn new(entries: Vec<WordTiming>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[WordTiming] {
        &self.entries
    }

    /// The word sequence, in table order, for the UI to render.
    pub fn words(&self) -> Vec<String> {
        self.entries.iter().map(|w| w.word.clone()).collect()
    }

    /// `true` when every entry has finite times with `end >= start` and the
    /// start times never decrease.
    ///
    /// ```
    /// use lesson_narration::timing::{TimingTable, WordTiming};
    ///
    /// let ok = TimingTable::new(vec![
    ///     WordTiming::new("Hello", 0.0, 0.5),
    ///     WordTiming::new("world", 0.5, 1.0),
    /// ]);
    /// assert!(ok.is_well_formed());
    ///
    /// let backwards = TimingTable::new(vec![
    ///     WordTiming::new("world", 0.5, 1.0),
    ///     WordTiming::new("Hello", 0.0, 0.5),
    /// ]);
    /// assert!(!backwards.is_well_formed());
    /// ```
    pub fn is_well_formed(&self) -> bool {
        let intervals_ok = self.entries.iter().all(|w| {
            w.start_time.is_finite() && w.end_time.is_finite() && w.end_time >= w.start_time
        });
        intervals_ok
            && self
                .entries
                .windows(2)
                .all(|pair| pair[0].start_time <= pair[1].start_time)
    }

    /// Resolve playhead position `t` (seconds) to a word index.
    ///
    /// Returns [`NO_WORD`] before the first word, for an empty table, or for a
    /// non-finite position.  Otherwise returns the greatest `i` with
    /// `start_time[i] <= t`, which covers both "inside word i" and "in the
    /// silence after word i".
    pub fn resolve(&self, t: f64) -> i32 {
        if !t.is_finite() {
            return NO_WORD;
        }
        // Binary search on start times; on a malformed table the answer is
        // still a valid index, just not a meaningful one.
        let started = self.entries.partition_point(|w| w.start_time <= t);
        if started == 0 {
            NO_WORD
        } else {
            (started - 1) as i32
        }
    }
}

impl From<Vec<WordTiming>> for TimingTable {
    fn from(entries: Vec<WordTiming>) -> Self {
        Self::new(entries)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
