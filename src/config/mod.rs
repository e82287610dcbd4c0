//! Configuration module for the lesson narration engine.
//!
//! Provides [`EngineConfig`] (top-level settings), sub-configs for the
//! generation client and playback, [`AppPaths`] for the platform settings
//! location, and TOML persistence via `EngineConfig::load` / `EngineConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{EngineConfig, GenerationConfig, PlaybackConfig};
