//! Media seam: the audio resource the controller drives.
//!
//! [`MediaBackend`] opens one [`MediaResource`] per bound session.  Hosts with
//! real audio output supply their own backend; [`ClockBackend`] is the
//! built-in one, a virtual playhead that advances on `tokio::time` at the
//! current rate and produces no sound.

use thiserror::Error;
use tokio::time::Instant;

use crate::session::Session;

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlaybackError {
    /// Play was requested before any session was bound.
    #[error("no audio loaded")]
    NotReady,

    /// The host media resource failed (decode error, autoplay policy, …).
    #[error("media error: {0}")]
    Media(String),
}

// ---------------------------------------------------------------------------
// MediaResource / MediaBackend
// ---------------------------------------------------------------------------

/// A loaded, seekable audio stream.
///
/// Positions are in seconds of media time.  `set_rate` changes how fast the
/// position advances from now on; it must not move the position itself.
pub trait MediaResource: Send {
    fn play(&mut self) -> Result<(), PlaybackError>;
    fn pause(&mut self);
    fn set_rate(&mut self, rate: f64);
    fn seek(&mut self, position: f64);
    fn position(&self) -> f64;
    fn duration(&self) -> f64;

    fn is_ended(&self) -> bool {
        self.position() >= self.duration()
    }

    /// Release the underlying resource.  Called once, before drop.
    fn release(&mut self) {}
}

pub trait MediaBackend: Send + Sync {
    fn open(&self, session: &Session) -> Result<Box<dyn MediaResource>, PlaybackError>;
}

// ---------------------------------------------------------------------------
// ClockMedia
// ---------------------------------------------------------------------------

/// Silent media whose playhead is driven by the tokio clock.
#[derive(Debug)]
pub struct ClockMedia {
    duration: f64,
    rate: f64,
    /// Position at the last play / rate change / seek.
    anchor: f64,
    /// Wall time of `anchor` while running.
    running_since: Option<Instant>,
}

impl ClockMedia {
    pub fn new(duration: f64) -> Self {
        Self {
            duration: duration.max(0.0),
            rate: 1.0,
            anchor: 0.0,
            running_since: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    /// Fold elapsed time into the anchor and restart the segment from now.
    fn rebase(&mut self) {
        if self.running_since.is_some() {
            self.anchor = self.position();
            self.running_since = Some(Instant::now());
        }
    }
}

impl MediaResource for ClockMedia {
    fn play(&mut self) -> Result<(), PlaybackError> {
        if self.running_since.is_none() {
            self.running_since = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.rebase();
        self.running_since = None;
    }

    fn set_rate(&mut self, rate: f64) {
        self.rebase();
        self.rate = rate;
    }

    fn seek(&mut self, position: f64) {
        self.anchor = position.clamp(0.0, self.duration);
        if self.running_since.is_some() {
            self.running_since = Some(Instant::now());
        }
    }

    fn position(&self) -> f64 {
        let advanced = self
            .running_since
            .map_or(0.0, |since| since.elapsed().as_secs_f64() * self.rate);
        (self.anchor + advanced).min(self.duration)
    }

    fn duration(&self) -> f64 {
        self.duration
    }
}

/// Opens a [`ClockMedia`] sized to the session's reported duration.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClockBackend;

impl MediaBackend for ClockBackend {
    fn open(&self, session: &Session) -> Result<Box<dyn MediaResource>, PlaybackError> {
        Ok(Box::new(ClockMedia::new(session.duration_secs)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
