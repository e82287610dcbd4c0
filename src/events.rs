//! Engine events and the observer bus that delivers them.
//!
//! Components raise events with [`EventBus::emit`] while they hold engine
//! state; nothing is delivered until [`EventBus::flush`] runs after that state
//! is released.  Observers are therefore free to call back into the engine.
//!
//! ```text
//! controller / tracker / coordinator ──emit──▶ queue ──flush──▶ observers
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use tokio::sync::mpsc;

use crate::generation::GenerationError;

// ---------------------------------------------------------------------------
// EngineEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The highlighted word changed; `-1` means no word.
    WordIndexChanged(i32),
    /// Audio output started (`true`) or stopped (`false`).
    PlayingChanged(bool),
    /// A session was bound; the word sequence to render.
    TimingsLoaded(Vec<String>),
    /// Fetching narration failed.  Playback stays idle; retrying is allowed.
    GenerationFailed(GenerationError),
}

// ---------------------------------------------------------------------------
// EngineObserver
// ---------------------------------------------------------------------------

/// Receiver of engine events.  Every method defaults to a no-op so observers
/// implement only what they render.
pub trait EngineObserver: Send + Sync {
    fn on_word_index_change(&self, _index: i32) {}
    fn on_playing_change(&self, _is_playing: bool) {}
    fn on_timings_loaded(&self, _words: &[String]) {}
    fn on_generation_failed(&self, _error: &GenerationError) {}
}

fn deliver(observer: &dyn EngineObserver, event: &EngineEvent) {
    match event {
        EngineEvent::WordIndexChanged(index) => observer.on_word_index_change(*index),
        EngineEvent::PlayingChanged(playing) => observer.on_playing_change(*playing),
        EngineEvent::TimingsLoaded(words) => observer.on_timings_loaded(words),
        EngineEvent::GenerationFailed(err) => observer.on_generation_failed(err),
    }
}

// ---------------------------------------------------------------------------
// ChannelObserver
// ---------------------------------------------------------------------------

/// Forwards every event into an unbounded tokio channel, for hosts that
/// consume events from an async task or a per-frame `try_recv` loop.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: EngineEvent) {
        // Receiver gone: the host stopped listening.
        let _ = self.tx.send(event);
    }
}

impl EngineObserver for ChannelObserver {
    fn on_word_index_change(&self, index: i32) {
        self.forward(EngineEvent::WordIndexChanged(index));
    }

    fn on_playing_change(&self, is_playing: bool) {
        self.forward(EngineEvent::PlayingChanged(is_playing));
    }

    fn on_timings_loaded(&self, words: &[String]) {
        self.forward(EngineEvent::TimingsLoaded(words.to_vec()));
    }

    fn on_generation_failed(&self, error: &GenerationError) {
        self.forward(EngineEvent::GenerationFailed(error.clone()));
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Deferred, ordered event delivery to a set of observers.
pub struct EventBus {
    observers: Mutex<Vec<(SubscriptionId, Arc<dyn EngineObserver>)>>,
    queue: Mutex<VecDeque<EngineEvent>>,
    dispatching: Mutex<()>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
            queue: Mutex::new(VecDeque::new()),
            dispatching: Mutex::new(()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self, observer: Arc<dyn EngineObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.observers).push((id, observer));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = lock(&self.observers);
        let before = observers.len();
        observers.retain(|(sid, _)| *sid != id);
        observers.len() != before
    }

    /// Queue `event` for the next [`flush`](Self::flush).
    pub fn emit(&self, event: EngineEvent) {
        lock(&self.queue).push_back(event);
    }

    /// Number of queued, undelivered events.
    pub fn pending(&self) -> usize {
        lock(&self.queue).len()
    }

    /// Deliver queued events in emission order.
    ///
    /// Re-entrant calls (an observer triggering another flush) return
    /// immediately; the outer flush drains whatever they queued.
    pub fn flush(&self) {
        loop {
            {
                let _guard = match self.dispatching.try_lock() {
                    Ok(guard) => guard,
                    Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                    Err(TryLockError::WouldBlock) => return,
                };
                loop {
                    let Some(event) = lock(&self.queue).pop_front() else {
                        break;
                    };
                    let observers: Vec<Arc<dyn EngineObserver>> = lock(&self.observers)
                        .iter()
                        .map(|(_, o)| Arc::clone(o))
                        .collect();
                    for observer in &observers {
                        deliver(observer.as_ref(), &event);
                    }
                }
            }
            // An emit racing with the guard release would otherwise wait for
            // the next flush.
            if lock(&self.queue).is_empty() {
                return;
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
