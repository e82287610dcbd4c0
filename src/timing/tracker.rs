//! Per-frame word tracker.
//!
//! [`TimingTracker`] is polled once per rendered frame with the controller's
//! current position and reports index *changes* through the callback handed
//! to [`start`](TimingTracker::start).  It never extrapolates: every frame
//! re-reads the position, so rate changes and pauses need no special casing.
//!
//! # Epochs
//!
//! Each `start` and `stop` bumps the tracker epoch.  A frame is scheduled by
//! taking a [`FrameTicket`] stamped with the epoch current at scheduling time;
//! running a ticket from an older epoch does nothing.  This is what keeps a
//! frame queued just before `stop()` from firing the callback afterwards.
//!
//! ```
//! use std::sync::Arc;
//! use lesson_narration::timing::{TimingTable, TimingTracker, WordTiming};
//!
//! let table = Arc::new(TimingTable::new(vec![
//!     WordTiming::new("Hello", 0.0, 0.5),
//!     WordTiming::new("world", 0.5, 1.0),
//! ]));
//!
//! let mut tracker = TimingTracker::new();
//! tracker.start(table, |index| println!("word {index}"));
//!
//! let ticket = tracker.schedule().unwrap();
//! tracker.stop();
//! // Scheduled before stop(): suppressed.
//! assert!(!tracker.run_frame(ticket, 0.3));
//! ```

use std::sync::Arc;

use super::table::{TimingTable, NO_WORD};

/// Callback receiving each newly resolved word index.
pub type IndexCallback = Box<dyn FnMut(i32) + Send>;

// ---------------------------------------------------------------------------
// FrameTicket
// ---------------------------------------------------------------------------

/// A scheduled frame, valid only for the tracker epoch it was issued in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTicket {
    epoch: u64,
}

impl FrameTicket {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

// ---------------------------------------------------------------------------
// TimingTracker
// ---------------------------------------------------------------------------

struct ActiveTrack {
    table: Arc<TimingTable>,
    on_change: IndexCallback,
    last_index: i32,
    /// `false` when the table failed validation; the index then stays -1.
    highlighting: bool,
}

pub struct TimingTracker {
    epoch: u64,
    validate: bool,
    active: Option<ActiveTrack>,
}

impl TimingTracker {
    /// A stopped tracker that validates tables on `start`.
    pub fn new() -> Self {
        Self::with_validation(true)
    }

    /// A stopped tracker.  With `validate` off, malformed tables are resolved
    /// mechanically instead of disabling highlighting.
    pub fn with_validation(validate: bool) -> Self {
        Self {
            epoch: 0,
            validate,
            active: None,
        }
    }

    /// Begin tracking `table`, replacing any previous run.
    ///
    /// The previously emitted index is reset to -1 without firing the
    /// callback; the first frame whose position resolves to a word fires it.
    pub fn start<F>(&mut self, table: Arc<TimingTable>, on_change: F) -> FrameTicket
    where
        F: FnMut(i32) + Send + 'static,
    {
        self.epoch += 1;

        let highlighting = !self.validate || table.is_well_formed();
        if !highlighting {
            log::warn!(
                "tracker: timing table with {} entries is not monotonic; highlighting disabled",
                table.len()
            );
        }

        self.active = Some(ActiveTrack {
            table,
            on_change: Box::new(on_change),
            last_index: NO_WORD,
            highlighting,
        });

        FrameTicket { epoch: self.epoch }
    }

    /// Stop tracking.  Safe to call when never started; invalidates every
    /// outstanding [`FrameTicket`].
    pub fn stop(&mut self) {
        self.epoch += 1;
        if self.active.take().is_some() {
            log::debug!("tracker: stopped at epoch {}", self.epoch);
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Last index emitted in the current run, or -1 when stopped.
    pub fn current_index(&self) -> i32 {
        self.active.as_ref().map_or(NO_WORD, |a| a.last_index)
    }

    /// Schedule the next frame.  `None` when the tracker is stopped.
    pub fn schedule(&self) -> Option<FrameTicket> {
        self.active.as_ref().map(|_| FrameTicket { epoch: self.epoch })
    }

    /// Run a scheduled frame against playhead `position`.
    ///
    /// Returns `true` when the callback fired.  Stale tickets and unchanged
    /// indices return `false`.
    pub fn run_frame(&mut self, ticket: FrameTicket, position: f64) -> bool {
        if ticket.epoch != self.epoch {
            log::trace!(
                "tracker: dropping frame from epoch {} (current {})",
                ticket.epoch,
                self.epoch
            );
            return false;
        }
        let Some(active) = self.active.as_mut() else {
            return false;
        };

        let index = if active.highlighting {
            active.table.resolve(position)
        } else {
            NO_WORD
        };

        if index == active.last_index {
            return false;
        }
        active.last_index = index;
        (active.on_change)(index);
        true
    }

    /// Schedule and immediately run one frame.
    pub fn poll(&mut self, position: f64) -> bool {
        match self.schedule() {
            Some(ticket) => self.run_frame(ticket, position),
            None => false,
        }
    }
}

impl Default for TimingTracker {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
