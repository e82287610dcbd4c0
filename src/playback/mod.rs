//! Playback: status and rate types, the media seam, and the controller that
//! owns the single live audio resource.

pub mod controller;
pub mod media;
pub mod state;

pub use controller::{PlaybackController, PlaybackPoll};
pub use media::{ClockBackend, ClockMedia, MediaBackend, MediaResource, PlaybackError};
pub use state::{PlaybackRate, PlaybackState, PlaybackStatus};
