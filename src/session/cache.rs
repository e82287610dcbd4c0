//! Session cache with in-flight request coalescing.
//!
//! Concurrent requests for the same [`ContentId`] share a single generation
//! fetch (a `futures` `Shared` future); the resolved session is kept until
//! explicitly discarded.  Failed fetches are not cached, so the next request
//! tries again.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::generation::{GenerationError, GenerationRequest, SpeechGenerator};

use super::{ContentId, Session};

type SessionResult = Result<Arc<Session>, GenerationError>;
type SharedFetch = Shared<BoxFuture<'static, SessionResult>>;

enum Entry {
    Ready(Arc<Session>),
    Pending { fetch: SharedFetch, ticket: u64 },
}

// ---------------------------------------------------------------------------
// SessionCache
// ---------------------------------------------------------------------------

/// Maps content identity to generated sessions.
///
/// Sessions are handed out as `Arc<Session>`: discarding an entry never frees
/// audio that a playback controller still holds.
pub struct SessionCache {
    generator: Arc<dyn SpeechGenerator>,
    experience_id: Option<String>,
    entries: Mutex<HashMap<ContentId, Entry>>,
    next_ticket: AtomicU64,
}

impl SessionCache {
    /// Create an empty cache in front of `generator`.
    ///
    /// `experience_id` is forwarded with every generation request.
    pub fn new(generator: Arc<dyn SpeechGenerator>, experience_id: Option<String>) -> Self {
        Self {
            generator,
            experience_id,
            entries: Mutex::new(HashMap::new()),
            next_ticket: AtomicU64::new(1),
        }
    }

    /// Return the session for `content_id`, generating it if needed.
    ///
    /// A call made while another call for the same id is in flight awaits
    /// that fetch instead of issuing a second request.
    pub async fn request_session(&self, content_id: &ContentId) -> SessionResult {
        let (fetch, ticket) = {
            let mut entries = self.lock();
            match entries.get(content_id) {
                Some(Entry::Ready(session)) => return Ok(Arc::clone(session)),
                Some(Entry::Pending { fetch, ticket }) => {
                    log::debug!("cache: joining in-flight fetch for {content_id}");
                    (fetch.clone(), *ticket)
                }
                None => {
                    let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
                    let fetch = self.fetch(content_id.clone());
                    entries.insert(
                        content_id.clone(),
                        Entry::Pending {
                            fetch: fetch.clone(),
                            ticket,
                        },
                    );
                    (fetch, ticket)
                }
            }
        };

        let result = fetch.await;

        // Settle the entry, unless it was discarded or replaced meanwhile.
        let mut entries = self.lock();
        let still_pending = matches!(
            entries.get(content_id),
            Some(Entry::Pending { ticket: t, .. }) if *t == ticket
        );
        if still_pending {
            match &result {
                Ok(session) => {
                    entries.insert(content_id.clone(), Entry::Ready(Arc::clone(session)));
                }
                Err(err) => {
                    log::warn!("cache: generation for {content_id} failed: {err}");
                    entries.remove(content_id);
                }
            }
        }

        result
    }

    fn fetch(&self, content_id: ContentId) -> SharedFetch {
        let generator = Arc::clone(&self.generator);
        let request = GenerationRequest {
            lesson_id: content_id.as_str().to_string(),
            experience_id: self.experience_id.clone(),
        };
        log::debug!("cache: generating narration for {content_id}");

        async move {
            let response = generator.generate(&request).await?;
            Session::from_response(content_id, response).map(Arc::new)
        }
        .boxed()
        .shared()
    }

    /// Resolved session for `content_id`, if any.  Never triggers a fetch.
    pub fn get(&self, content_id: &ContentId) -> Option<Arc<Session>> {
        match self.lock().get(content_id) {
            Some(Entry::Ready(session)) => Some(Arc::clone(session)),
            _ => None,
        }
    }

    /// `true` when `content_id` is resolved or in flight.
    pub fn contains(&self, content_id: &ContentId) -> bool {
        self.lock().contains_key(content_id)
    }

    pub fn is_pending(&self, content_id: &ContentId) -> bool {
        matches!(self.lock().get(content_id), Some(Entry::Pending { .. }))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop the entry for `content_id`.  An in-flight fetch still completes for
    /// its current waiters but its result is not stored.
    pub fn discard(&self, content_id: &ContentId) -> bool {
        let removed = self.lock().remove(content_id).is_some();
        if removed {
            log::debug!("cache: discarded {content_id}");
        }
        removed
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ContentId, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::GenerationResponse;
    use crate::timing::WordTiming;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Counts calls; optionally blocks until released; optionally fails.
    struct Gated {
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
        fail: bool,
    }

    impl Gated {
        fn open() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                gate: None,
                fail: false,
            }
        }

        fn gated(gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::open()
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::open()
            }
        }
    }

    #[async_trait]
    impl SpeechGenerator for Gated {
        async fn generate(
            &self,
            request: &GenerationRequest,
        ) -> Result<GenerationResponse, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(GenerationError::Backend {
                    status: 500,
                    message: format!("cannot narrate {}", request.lesson_id),
                });
            }
            Ok(GenerationResponse {
                audio_base64: "AAEC".into(),
                duration: 1.0,
                word_timings: vec![WordTiming::new("Hello", 0.0, 0.5)],
            })
        }
    }

    fn cache_with(generator: Arc<Gated>) -> SessionCache {
        SessionCache::new(generator, Some("exp-1".into()))
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn resolved_session_is_reused() {
        let generator = Arc::new(Gated::open());
        let cache = cache_with(Arc::clone(&generator));
        let id = ContentId::from("lesson-1");

        let a = cache.request_session(&id).await.unwrap();
        let b = cache.request_session(&id).await.unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert!(cache.get(&id).is_some());
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_fetch() {
        let gate = Arc::new(Notify::new());
        let generator = Arc::new(Gated::gated(Arc::clone(&gate)));
        let cache = Arc::new(cache_with(Arc::clone(&generator)));
        let id = ContentId::from("lesson-1");

        let first = {
            let cache = Arc::clone(&cache);
            let id = id.clone();
            tokio::spawn(async move { cache.request_session(&id).await })
        };
        let second = {
            let cache = Arc::clone(&cache);
            let id = id.clone();
            tokio::spawn(async move { cache.request_session(&id).await })
        };

        // Let both tasks reach the pending fetch.
        while !cache.is_pending(&id) {
            tokio::task::yield_now().await;
        }
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        gate.notify_one();

        let a = first.await.unwrap().unwrap();
        let b = second.await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_is_not_cached() {
        let generator = Arc::new(Gated::failing());
        let cache = cache_with(Arc::clone(&generator));
        let id = ContentId::from("lesson-1");

        let err = cache.request_session(&id).await.unwrap_err();
        assert!(matches!(err, GenerationError::Backend { status: 500, .. }));
        assert!(!cache.contains(&id));

        let _ = cache.request_session(&id).await;
        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn discard_keeps_handed_out_sessions_alive() {
        let generator = Arc::new(Gated::open());
        let cache = cache_with(generator);
        let id = ContentId::from("lesson-1");

        let session = cache.request_session(&id).await.unwrap();
        assert!(cache.discard(&id));
        assert!(!cache.discard(&id));
        assert!(cache.is_empty());

        // The caller's handle is unaffected.
        assert_eq!(session.audio.bytes(), &[0, 1, 2]);
    }

    #[tokio::test]
    async fn discard_during_fetch_drops_the_result() {
        let gate = Arc::new(Notify::new());
        let generator = Arc::new(Gated::gated(Arc::clone(&gate)));
        let cache = Arc::new(cache_with(generator));
        let id = ContentId::from("lesson-1");

        let waiter = {
            let cache = Arc::clone(&cache);
            let id = id.clone();
            tokio::spawn(async move { cache.request_session(&id).await })
        };
        while !cache.is_pending(&id) {
            tokio::task::yield_now().await;
        }
        cache.discard(&id);
        gate.notify_one();

        assert!(waiter.await.unwrap().is_ok());
        assert!(!cache.contains(&id));
    }

    #[tokio::test]
    async fn distinct_ids_fetch_separately() {
        let generator = Arc::new(Gated::open());
        let cache = cache_with(Arc::clone(&generator));

        cache.request_session(&"a".into()).await.unwrap();
        cache.request_session(&"b".into()).await.unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);

        cache.clear();
        assert!(cache.is_empty());
    }
}
