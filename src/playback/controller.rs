//! Playback controller: sole owner of the live audio resource.
//!
//! [`PlaybackController`] binds one [`Session`] at a time, drives its
//! [`MediaResource`], and raises [`EngineEvent::PlayingChanged`] on every
//! playing/not-playing transition.  End of audio is detected when the
//! controller is polled: status becomes `Ended`, the playhead returns to 0 and
//! nothing replays until the next `play()`.

use std::sync::Arc;

use crate::events::{EngineEvent, EventBus};
use crate::session::Session;

use super::media::{MediaBackend, MediaResource, PlaybackError};
use super::state::{PlaybackRate, PlaybackStatus};

/// Result of polling the controller once per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackPoll {
    /// Audio is loaded and playing or paused at this position (seconds).
    Position(f64),
    /// Playback reached the end of the audio during this poll.
    Ended,
    /// Nothing bound, loading, or already ended.
    Inactive,
}

pub struct PlaybackController {
    backend: Arc<dyn MediaBackend>,
    bus: Arc<EventBus>,
    media: Option<Box<dyn MediaResource>>,
    session: Option<Arc<Session>>,
    status: PlaybackStatus,
    rate: PlaybackRate,
}

impl PlaybackController {
    pub fn new(backend: Arc<dyn MediaBackend>, bus: Arc<EventBus>, rate: PlaybackRate) -> Self {
        Self {
            backend,
            bus,
            media: None,
            session: None,
            status: PlaybackStatus::Idle,
            rate,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn rate(&self) -> PlaybackRate {
        self.rate
    }

    pub fn session(&self) -> Option<&Arc<Session>> {
        self.session.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.media.is_some()
    }

    /// Current playhead in seconds; 0 when nothing is loaded.
    pub fn position(&self) -> f64 {
        self.media.as_ref().map_or(0.0, |m| m.position())
    }

    /// Mark a fetch in progress.  Ignored once a session is bound.
    pub fn begin_loading(&mut self) {
        if self.media.is_none() {
            self.status = PlaybackStatus::Loading;
        }
    }

    /// Abandon a fetch started with [`begin_loading`](Self::begin_loading).
    pub fn cancel_loading(&mut self) {
        if self.status == PlaybackStatus::Loading {
            self.status = PlaybackStatus::Idle;
        }
    }

    /// Bind `session`, replacing whatever was loaded.  Ends up `Paused` at 0.
    pub fn load(&mut self, session: Arc<Session>) -> Result<(), PlaybackError> {
        self.dispose();

        let mut media = match self.backend.open(&session) {
            Ok(media) => media,
            Err(err) => {
                log::warn!(
                    "playback: cannot open audio for {}: {err}",
                    session.content_id
                );
                return Err(err);
            }
        };
        media.set_rate(self.rate.as_f64());

        log::debug!(
            "playback: loaded {} ({:.2}s, {} words)",
            session.content_id,
            session.duration_secs,
            session.timings.len()
        );
        self.media = Some(media);
        self.session = Some(session);
        self.status = PlaybackStatus::Paused;
        Ok(())
    }

    /// Start or resume output.  Idempotent while playing; restarts from 0
    /// after `Ended`.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::NotReady`]: nothing is loaded.
    /// - [`PlaybackError::Media`]   : the media refused to play; the
    ///   controller stays `Paused`.
    pub fn play(&mut self) -> Result<(), PlaybackError> {
        if self.status == PlaybackStatus::Playing {
            return Ok(());
        }
        let Some(media) = self.media.as_mut() else {
            return Err(PlaybackError::NotReady);
        };

        if self.status == PlaybackStatus::Ended {
            media.seek(0.0);
        }
        if let Err(err) = media.play() {
            log::warn!("playback: play rejected: {err}");
            media.pause();
            self.status = PlaybackStatus::Paused;
            return Err(err);
        }

        self.status = PlaybackStatus::Playing;
        self.bus.emit(EngineEvent::PlayingChanged(true));
        Ok(())
    }

    /// Freeze the playhead.  Idempotent when not playing.
    pub fn pause(&mut self) {
        if self.status != PlaybackStatus::Playing {
            return;
        }
        if let Some(media) = self.media.as_mut() {
            media.pause();
        }
        self.status = PlaybackStatus::Paused;
        self.bus.emit(EngineEvent::PlayingChanged(false));
    }

    /// Applies to the loaded media immediately and to anything loaded later.
    pub fn set_rate(&mut self, rate: PlaybackRate) {
        self.rate = rate;
        if let Some(media) = self.media.as_mut() {
            media.set_rate(rate.as_f64());
        }
    }

    /// Read the playhead, detecting end of audio.
    pub fn poll(&mut self) -> PlaybackPoll {
        let Some(media) = self.media.as_mut() else {
            return PlaybackPoll::Inactive;
        };
        match self.status {
            PlaybackStatus::Playing if media.is_ended() => {
                media.pause();
                media.seek(0.0);
                self.status = PlaybackStatus::Ended;
                self.bus.emit(EngineEvent::PlayingChanged(false));
                PlaybackPoll::Ended
            }
            PlaybackStatus::Playing | PlaybackStatus::Paused => {
                PlaybackPoll::Position(media.position())
            }
            _ => PlaybackPoll::Inactive,
        }
    }

    /// Release the audio resource and return to `Idle`.  Safe to call any
    /// number of times.
    pub fn dispose(&mut self) {
        let was_playing = self.status == PlaybackStatus::Playing;

        if let Some(mut media) = self.media.take() {
            media.pause();
            media.release();
        }
        if let Some(session) = self.session.take() {
            log::debug!("playback: released audio for {}", session.content_id);
        }
        self.status = PlaybackStatus::Idle;

        if was_playing {
            self.bus.emit(EngineEvent::PlayingChanged(false));
        }
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        if let Some(mut media) = self.media.take() {
            media.release();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
