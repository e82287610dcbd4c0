//! Word timing: the sorted interval table produced by the generation backend
//! and the per-frame tracker that resolves a playhead position to a word.
//!
//! # Resolution rule
//!
//! ```text
//!   t < first.start            → -1
//!   start[i] <= t < start[i+1] → i   (inside word i, or the gap after it)
//!   t >= last.start            → N-1 (last word stays lit through trailing silence)
//! ```
//!
//! A position exactly on a word's `end_time` keeps that word highlighted until
//! the next word's `start_time` is reached.

pub mod table;
pub mod tracker;

pub use table::{TimingTable, WordTiming, NO_WORD};
pub use tracker::{FrameTicket, TimingTracker};
