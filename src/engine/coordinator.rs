//! Lifecycle coordinator: the engine's public surface.
//!
//! [`NarrationEngine`] binds to one piece of content at a time.  It fetches
//! narration lazily on the first `play()`, loads it into the
//! [`PlaybackController`], and starts the [`TimingTracker`] against the
//! session's timing table.  Hosts call [`tick`](NarrationEngine::tick) once
//! per rendered frame.
//!
//! # Stale work
//!
//! Two counters guard against acting on superseded data:
//!
//! * the **fetch token**, bumped on every content change and detach; a
//!   generation result whose token no longer matches is dropped, never bound;
//! * the **tracker epoch**, bumped on every tracker start/stop; a frame
//!   scheduled in an older epoch does nothing.
//!
//! # Locking
//!
//! Engine state sits behind one `std::sync::Mutex`, never held across an
//! `.await`.  Events raised under the lock are queued on the [`EventBus`] and
//! delivered after it is released.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

use crate::config::{EngineConfig, PlaybackConfig};
use crate::events::{EngineEvent, EngineObserver, EventBus, SubscriptionId};
use crate::generation::{ApiGenerator, GenerationError, RetryingGenerator};
use crate::playback::{
    ClockBackend, MediaBackend, PlaybackController, PlaybackError, PlaybackPoll, PlaybackRate,
    PlaybackState, PlaybackStatus,
};
use crate::session::{ContentId, Session, SessionCache};
use crate::timing::{FrameTicket, TimingTracker, NO_WORD};

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// No content is attached.
    #[error("no content attached")]
    Detached,

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

// ---------------------------------------------------------------------------
// EngineState
// ---------------------------------------------------------------------------

struct Attached {
    content_id: ContentId,
    text: String,
}

struct EngineState {
    attached: Option<Attached>,
    controller: PlaybackController,
    tracker: TimingTracker,
    fetch_token: u64,
    /// Whether a pending fetch should start playing once bound.
    autoplay: bool,
}

impl EngineState {
    /// Stop tracking, release audio, invalidate any in-flight fetch and reset
    /// the highlighted word.
    fn teardown(&mut self, word_index: &AtomicI32, bus: &EventBus) {
        self.tracker.stop();
        self.controller.dispose();
        self.fetch_token += 1;
        self.autoplay = false;
        word_index.store(NO_WORD, Ordering::SeqCst);
        bus.emit(EngineEvent::WordIndexChanged(NO_WORD));
    }
}

// ---------------------------------------------------------------------------
// NarrationEngine
// ---------------------------------------------------------------------------

/// Word-timed narration player.  Cheap to clone; clones share one engine.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use lesson_narration::config::EngineConfig;
/// use lesson_narration::engine::NarrationEngine;
/// use lesson_narration::events::ChannelObserver;
///
/// #[tokio::main]
/// async fn main() {
///     let engine = NarrationEngine::from_config(&EngineConfig::default());
///     let (observer, mut events) = ChannelObserver::new();
///     engine.subscribe(Arc::new(observer));
///
///     engine.attach("lesson-1", "Hello world");
///     engine.play().await.unwrap();
///
///     // Once per rendered frame:
///     engine.tick();
///     while let Ok(event) = events.try_recv() {
///         println!("{event:?}");
///     }
/// }
/// ```
#[derive(Clone)]
pub struct NarrationEngine {
    state: Arc<Mutex<EngineState>>,
    cache: Arc<SessionCache>,
    bus: Arc<EventBus>,
    word_index: Arc<AtomicI32>,
    retain_sessions: bool,
}

impl NarrationEngine {
    /// Create an engine.
    ///
    /// # Arguments
    ///
    /// * `cache`  : session cache (and through it, the generation backend).
    /// * `backend`: opens the audio resource for each bound session.
    /// * `config` : rate, validation and cache-retention settings.
    pub fn new(
        cache: Arc<SessionCache>,
        backend: Arc<dyn MediaBackend>,
        config: &PlaybackConfig,
    ) -> Self {
        let bus = Arc::new(EventBus::new());
        let rate = PlaybackRate::nearest(config.default_rate);
        let state = EngineState {
            attached: None,
            controller: PlaybackController::new(backend, Arc::clone(&bus), rate),
            tracker: TimingTracker::with_validation(config.validate_timings),
            fetch_token: 0,
            autoplay: false,
        };

        Self {
            state: Arc::new(Mutex::new(state)),
            cache,
            bus,
            word_index: Arc::new(AtomicI32::new(NO_WORD)),
            retain_sessions: config.retain_sessions,
        }
    }

    /// Engine backed by the HTTP generation client (with retries) and the
    /// silent [`ClockBackend`].
    pub fn from_config(config: &EngineConfig) -> Self {
        let generator = RetryingGenerator::from_config(
            ApiGenerator::from_config(&config.generation),
            &config.generation,
        );
        let cache = Arc::new(SessionCache::new(
            Arc::new(generator),
            config.generation.experience_id.clone(),
        ));
        Self::new(cache, Arc::new(ClockBackend), &config.playback)
    }

    pub fn cache(&self) -> &Arc<SessionCache> {
        &self.cache
    }

    pub fn subscribe(&self, observer: Arc<dyn EngineObserver>) -> SubscriptionId {
        self.bus.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    // -----------------------------------------------------------------------
    // Content lifecycle
    // -----------------------------------------------------------------------

    /// Bind the engine to `content_id`.
    ///
    /// Re-attaching the current content only updates the text.  Any other id
    /// tears the previous content down: tracking stops, audio is released, an
    /// in-flight fetch is orphaned and the word index resets to -1.  Nothing
    /// is fetched until the next `play()`.
    pub fn attach(&self, content_id: impl Into<ContentId>, text: impl Into<String>) {
        let content_id = content_id.into();
        let text = text.into();
        {
            let mut state = self.lock();
            if let Some(attached) = state.attached.as_mut() {
                if attached.content_id == content_id {
                    attached.text = text;
                    return;
                }
            }

            if let Some(previous) = state.attached.take() {
                log::debug!("engine: content {} → {}", previous.content_id, content_id);
                state.teardown(&self.word_index, &self.bus);
                if !self.retain_sessions {
                    self.cache.discard(&previous.content_id);
                }
            } else {
                log::debug!("engine: attached {content_id}");
            }

            state.attached = Some(Attached { content_id, text });
        }
        self.bus.flush();
    }

    /// Unbind from the current content with the same teardown as a content
    /// change.  No-op when nothing is attached.
    pub fn detach(&self) {
        {
            let mut state = self.lock();
            let Some(previous) = state.attached.take() else {
                return;
            };
            log::debug!("engine: detached {}", previous.content_id);
            state.teardown(&self.word_index, &self.bus);
            if !self.retain_sessions {
                self.cache.discard(&previous.content_id);
            }
        }
        self.bus.flush();
    }

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------

    /// Start or resume narration, fetching it first if needed.
    ///
    /// Returns once audio is playing, the fetch failed, or the fetch was
    /// superseded by a content change (which is not an error).  Calling again
    /// while a fetch is in flight waits on that same request, so a caller
    /// that drops its `play()` future does not leave the engine loading.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Detached`]  : nothing is attached.
    /// - [`EngineError::Generation`]: the backend failed; state stays `Idle`.
    /// - [`EngineError::Playback`]  : the media refused to play.
    pub async fn play(&self) -> Result<(), EngineError> {
        let (content_id, token) = {
            let mut state = self.lock();
            let Some(attached) = state.attached.as_ref() else {
                return Err(EngineError::Detached);
            };
            let content_id = attached.content_id.clone();

            match state.controller.status() {
                PlaybackStatus::Playing => return Ok(()),
                PlaybackStatus::Loading => {
                    // Join the fetch already in flight.  Whichever caller
                    // finishes first binds the session.
                    state.autoplay = true;
                    (content_id, state.fetch_token)
                }
                _ if state.controller.is_loaded() => {
                    let result = self.resume(&mut state);
                    drop(state);
                    self.bus.flush();
                    return result;
                }
                _ => {
                    if let Some(session) = self.cache.get(&content_id) {
                        let result = self
                            .bind(&mut state, session)
                            .and_then(|()| self.resume(&mut state));
                        drop(state);
                        self.bus.flush();
                        return result;
                    }

                    state.fetch_token += 1;
                    state.autoplay = true;
                    state.controller.begin_loading();
                    (content_id, state.fetch_token)
                }
            }
        };

        log::debug!("engine: requesting narration for {content_id} (token {token})");
        let fetched = self.cache.request_session(&content_id).await;

        let result = {
            let mut state = self.lock();
            if state.fetch_token != token {
                log::debug!("engine: discarding stale narration for {content_id} (token {token})");
                return Ok(());
            }
            if state.controller.status() != PlaybackStatus::Loading {
                // Settled by another caller waiting on the same fetch.
                return fetched.map(|_| ()).map_err(EngineError::from);
            }

            match fetched {
                Err(err) => {
                    log::warn!("engine: narration for {content_id} unavailable: {err}");
                    state.controller.cancel_loading();
                    state.autoplay = false;
                    self.bus.emit(EngineEvent::GenerationFailed(err.clone()));
                    Err(EngineError::Generation(err))
                }
                Ok(session) => {
                    let autoplay = std::mem::take(&mut state.autoplay);
                    match self.bind(&mut state, session) {
                        Ok(()) if autoplay => self.resume(&mut state),
                        other => other,
                    }
                }
            }
        };
        self.bus.flush();
        result
    }

    /// Pause output.  During a fetch, the narration is still bound when it
    /// arrives but does not start playing.
    pub fn pause(&self) {
        {
            let mut state = self.lock();
            state.autoplay = false;
            state.controller.pause();
        }
        self.bus.flush();
    }

    /// Change speed, snapping `rate` to the nearest supported value.  The
    /// playhead, and so the highlighted word, is unchanged at the instant of
    /// the call.
    pub fn set_rate(&self, rate: f64) -> PlaybackRate {
        let snapped = PlaybackRate::nearest(rate);
        if PlaybackRate::from_f64(rate).is_none() {
            log::debug!("engine: rate {rate} not supported, using {}", snapped.as_f64());
        }
        self.set_playback_rate(snapped);
        snapped
    }

    pub fn set_playback_rate(&self, rate: PlaybackRate) {
        self.lock().controller.set_rate(rate);
    }

    // -----------------------------------------------------------------------
    // Frames
    // -----------------------------------------------------------------------

    /// Schedule the next frame.  `None` while nothing is being tracked.
    pub fn schedule_frame(&self) -> Option<FrameTicket> {
        self.lock().tracker.schedule()
    }

    /// Run a frame scheduled with [`schedule_frame`](Self::schedule_frame).
    /// A ticket from before the last stop/start, content change or detach is
    /// ignored.
    pub fn run_frame(&self, ticket: FrameTicket) {
        {
            let mut state = self.lock();
            if ticket.epoch() != state.tracker.epoch() {
                return;
            }
            match state.controller.poll() {
                PlaybackPoll::Position(t) => {
                    state.tracker.run_frame(ticket, t);
                }
                PlaybackPoll::Ended => {
                    log::debug!("engine: narration ended");
                    state.tracker.stop();
                    self.word_index.store(NO_WORD, Ordering::SeqCst);
                    self.bus.emit(EngineEvent::WordIndexChanged(NO_WORD));
                }
                PlaybackPoll::Inactive => {}
            }
        }
        self.bus.flush();
    }

    /// Schedule and run one frame.
    pub fn tick(&self) {
        if let Some(ticket) = self.schedule_frame() {
            self.run_frame(ticket);
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn state(&self) -> PlaybackState {
        let state = self.lock();
        PlaybackState {
            status: state.controller.status(),
            current_time: state.controller.position(),
            rate: state.controller.rate(),
            current_word_index: self.word_index.load(Ordering::SeqCst),
        }
    }

    pub fn content_id(&self) -> Option<ContentId> {
        self.lock().attached.as_ref().map(|a| a.content_id.clone())
    }

    pub fn text(&self) -> Option<String> {
        self.lock().attached.as_ref().map(|a| a.text.clone())
    }

    /// Words of the bound session, empty until narration is loaded.
    pub fn words(&self) -> Vec<String> {
        self.lock()
            .controller
            .session()
            .map(|s| s.words())
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Load `session` into the controller and announce its words.
    fn bind(&self, state: &mut EngineState, session: Arc<Session>) -> Result<(), EngineError> {
        let words = session.words();
        if let Err(err) = state.controller.load(session) {
            state.controller.cancel_loading();
            return Err(err.into());
        }
        self.bus.emit(EngineEvent::TimingsLoaded(words));
        Ok(())
    }

    /// Play the bound session and make sure the tracker is following it.
    fn resume(&self, state: &mut EngineState) -> Result<(), EngineError> {
        state.controller.play()?;

        if !state.tracker.is_running() {
            if let Some(session) = state.controller.session() {
                let table = Arc::clone(&session.timings);
                let word_index = Arc::clone(&self.word_index);
                let bus = Arc::clone(&self.bus);
                state.tracker.start(table, move |index| {
                    word_index.store(index, Ordering::SeqCst);
                    bus.emit(EngineEvent::WordIndexChanged(index));
                });
            }
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
