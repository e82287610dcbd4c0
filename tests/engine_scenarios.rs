//! End-to-end narration scenarios against the public API, with the built-in
//! clock media on a paused tokio clock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use lesson_narration::config::PlaybackConfig;
use lesson_narration::generation::{
    GenerationError, GenerationRequest, GenerationResponse, SpeechGenerator,
};
use lesson_narration::playback::ClockBackend;
use lesson_narration::{
    ChannelObserver, ContentId, EngineEvent, FrameLoop, NarrationEngine, PlaybackRate,
    PlaybackStatus, SessionCache, WordTiming, NO_WORD,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Narrates every lesson as "Hello world" (0–0.5 s, 0.5–1.0 s, 1.5 s audio).
#[derive(Default)]
struct HelloWorld {
    requests: std::sync::Mutex<Vec<String>>,
    gate: Option<Arc<Notify>>,
    calls: AtomicUsize,
}

impl HelloWorld {
    fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechGenerator for HelloWorld {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.lesson_id.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok(GenerationResponse {
            audio_base64: "UklGRg==".into(),
            duration: 1.5,
            word_timings: vec![
                WordTiming::new("Hello", 0.0, 0.5),
                WordTiming::new("world", 0.5, 1.0),
            ],
        })
    }
}

struct Unavailable;

#[async_trait]
impl SpeechGenerator for Unavailable {
    async fn generate(
        &self,
        _request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        Err(GenerationError::Backend {
            status: 503,
            message: "service unavailable".into(),
        })
    }
}

fn engine_with(
    generator: Arc<dyn SpeechGenerator>,
) -> (NarrationEngine, mpsc::UnboundedReceiver<EngineEvent>) {
    init_logging();
    let cache = Arc::new(SessionCache::new(generator, Some("exp-1".into())));
    let engine = NarrationEngine::new(cache, Arc::new(ClockBackend), &PlaybackConfig::default());
    let (observer, events) = ChannelObserver::new();
    engine.subscribe(Arc::new(observer));
    (engine, events)
}

fn drain(events: &mut mpsc::UnboundedReceiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

fn word_changes(events: &mut mpsc::UnboundedReceiver<EngineEvent>) -> Vec<i32> {
    drain(events)
        .into_iter()
        .filter_map(|e| match e {
            EngineEvent::WordIndexChanged(i) => Some(i),
            _ => None,
        })
        .collect()
}

async fn advance_ms(ms: u64) {
    tokio::time::advance(Duration::from_millis(ms)).await;
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn highlight_follows_narration_to_the_end() {
    let generator = Arc::new(HelloWorld::default());
    let (engine, mut events) = engine_with(generator.clone());

    engine.attach("lesson-1", "Hello world");
    engine.play().await.unwrap();
    assert_eq!(
        drain(&mut events),
        vec![
            EngineEvent::TimingsLoaded(vec!["Hello".into(), "world".into()]),
            EngineEvent::PlayingChanged(true),
        ]
    );

    advance_ms(300).await;
    engine.tick();
    assert_eq!(engine.state().current_word_index, 0);

    advance_ms(200).await;
    engine.tick();
    assert_eq!(engine.state().current_word_index, 1);

    advance_ms(700).await;
    engine.tick();
    assert_eq!(engine.state().current_word_index, 1);
    assert_eq!(word_changes(&mut events), vec![0, 1]);

    advance_ms(300).await;
    engine.tick();
    assert_eq!(
        drain(&mut events),
        vec![
            EngineEvent::PlayingChanged(false),
            EngineEvent::WordIndexChanged(NO_WORD),
        ]
    );
    let state = engine.state();
    assert_eq!(state.status, PlaybackStatus::Ended);
    assert_eq!(state.current_time, 0.0);

    assert_eq!(generator.calls(), 1);
    assert_eq!(*generator.requests.lock().unwrap(), vec!["lesson-1".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn double_play_generates_once() {
    let gate = Arc::new(Notify::new());
    let generator = Arc::new(HelloWorld::gated(Arc::clone(&gate)));
    let (engine, _events) = engine_with(generator.clone());
    engine.attach("lesson-1", "Hello world");

    let first = tokio::spawn({
        let engine = engine.clone();
        async move { engine.play().await }
    });
    let second = tokio::spawn({
        let engine = engine.clone();
        async move { engine.play().await }
    });
    while generator.calls() == 0 {
        tokio::task::yield_now().await;
    }
    tokio::task::yield_now().await;

    gate.notify_one();
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    assert_eq!(generator.calls(), 1);
    assert_eq!(engine.state().status, PlaybackStatus::Playing);
}

#[tokio::test(start_paused = true)]
async fn navigating_away_mid_fetch_discards_the_result() {
    let gate = Arc::new(Notify::new());
    let generator = Arc::new(HelloWorld::gated(Arc::clone(&gate)));
    let (engine, mut events) = engine_with(generator.clone());
    engine.attach("lesson-a", "Lesson A");

    let pending = tokio::spawn({
        let engine = engine.clone();
        async move { engine.play().await }
    });
    while !engine.cache().is_pending(&ContentId::from("lesson-a")) {
        tokio::task::yield_now().await;
    }

    engine.attach("lesson-b", "Lesson B");
    gate.notify_one();
    pending.await.unwrap().unwrap();

    assert_eq!(engine.state().status, PlaybackStatus::Idle);
    assert!(engine.words().is_empty());
    assert_eq!(drain(&mut events), vec![EngineEvent::WordIndexChanged(NO_WORD)]);

    // The narration for A was still cached for a later visit.
    assert!(engine.cache().contains(&ContentId::from("lesson-a")));
}

#[tokio::test(start_paused = true)]
async fn rate_change_mid_word_keeps_the_highlight() {
    let (engine, mut events) = engine_with(Arc::new(HelloWorld::default()));
    engine.attach("lesson-1", "Hello world");
    engine.play().await.unwrap();

    advance_ms(300).await;
    engine.tick();
    drain(&mut events);

    assert_eq!(engine.set_rate(2.0), PlaybackRate::Double);
    engine.tick();
    assert_eq!(engine.state().current_word_index, 0);
    assert!(drain(&mut events).is_empty());

    // 150 ms at 2× moves the playhead 0.3 s, into "world".
    advance_ms(150).await;
    engine.tick();
    assert_eq!(word_changes(&mut events), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn generation_failure_is_reported_and_retryable() {
    let (engine, mut events) = engine_with(Arc::new(Unavailable));
    engine.attach("lesson-1", "Hello world");

    let err = engine.play().await.unwrap_err();
    assert!(err.to_string().contains("503"), "{err}");
    assert_eq!(engine.state().status, PlaybackStatus::Idle);
    assert!(matches!(
        drain(&mut events).as_slice(),
        [EngineEvent::GenerationFailed(GenerationError::Backend { status: 503, .. })]
    ));
    assert!(engine.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn detach_stops_everything() {
    let (engine, mut events) = engine_with(Arc::new(HelloWorld::default()));
    engine.attach("lesson-1", "Hello world");
    engine.play().await.unwrap();
    advance_ms(300).await;
    engine.tick();
    drain(&mut events);

    engine.detach();

    assert_eq!(
        drain(&mut events),
        vec![
            EngineEvent::PlayingChanged(false),
            EngineEvent::WordIndexChanged(NO_WORD),
        ]
    );
    assert_eq!(engine.content_id(), None);
    assert!(engine.schedule_frame().is_none());

    advance_ms(300).await;
    engine.tick();
    assert!(drain(&mut events).is_empty());
}

#[tokio::test(start_paused = true)]
async fn frame_loop_drives_the_tracker() {
    let (engine, mut events) = engine_with(Arc::new(HelloWorld::default()));
    engine.attach("lesson-1", "Hello world");
    engine.play().await.unwrap();
    drain(&mut events);

    let frames = FrameLoop::spawn(engine.clone(), Duration::from_millis(16));
    for _ in 0..40 {
        advance_ms(16).await;
        tokio::task::yield_now().await;
    }
    assert!(frames.is_running());
    assert_eq!(engine.state().current_word_index, 1);
    assert_eq!(word_changes(&mut events), vec![0, 1]);

    frames.stop();
    tokio::task::yield_now().await;
    advance_ms(1000).await;
    tokio::task::yield_now().await;
    assert_eq!(engine.state().status, PlaybackStatus::Playing);
}

#[tokio::test(start_paused = true)]
async fn frame_loop_ticks_at_the_configured_interval() {
    let (engine, mut events) = engine_with(Arc::new(HelloWorld::default()));
    engine.attach("lesson-1", "Hello world");
    engine.play().await.unwrap();
    drain(&mut events);

    let config = PlaybackConfig {
        frame_interval_ms: 100,
        ..PlaybackConfig::default()
    };
    let frames = FrameLoop::from_config(engine.clone(), &config);
    assert_eq!(frames.period(), Duration::from_millis(100));

    for _ in 0..6 {
        advance_ms(100).await;
        tokio::task::yield_now().await;
    }
    assert_eq!(engine.state().current_word_index, 1);
    assert_eq!(word_changes(&mut events), vec![0, 1]);
}
