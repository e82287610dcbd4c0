//! Narration engine: the lifecycle coordinator and its frame driver.
//!
//! # Architecture
//!
//! ```text
//! attach(id) ─▶ NarrationEngine ──play()──▶ SessionCache ──▶ SpeechGenerator
//!                    │                           │
//!                    │◀──────── Arc<Session> ────┘  (dropped if token is stale)
//!                    ├──▶ PlaybackController ──▶ MediaResource
//!                    └──▶ TimingTracker (per frame: position → word index)
//!
//! tick() / FrameLoop ──▶ poll controller ──▶ run tracker frame ──▶ EventBus
//! ```

pub mod coordinator;
pub mod driver;

pub use coordinator::{EngineError, NarrationEngine};
pub use driver::FrameLoop;
