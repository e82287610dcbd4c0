//! Lesson narration: word-timed audio playback.
//!
//! Plays generated narration for a piece of lesson content and reports, once
//! per frame, which word is being spoken so a UI can highlight it.
//!
//! # Modules
//!
//! | Module | Role |
//! |--------|------|
//! | [`timing`] | Word-timing table and the per-frame timing tracker |
//! | [`generation`] | Speech generation contract, HTTP client, retries |
//! | [`session`] | Generated sessions and the coalescing session cache |
//! | [`playback`] | Playback controller over a pluggable media resource |
//! | [`engine`] | Lifecycle coordinator ([`NarrationEngine`]) and frame loop |
//! | [`events`] | Observer trait and the deferred event bus |
//! | [`config`] | `settings.toml` persistence |

pub mod config;
pub mod engine;
pub mod events;
pub mod generation;
pub mod playback;
pub mod session;
pub mod timing;

pub use engine::{EngineError, FrameLoop, NarrationEngine};
pub use events::{ChannelObserver, EngineEvent, EngineObserver};
pub use playback::{PlaybackRate, PlaybackState, PlaybackStatus};
pub use session::{ContentId, Session, SessionCache};
pub use timing::{TimingTable, WordTiming, NO_WORD};
