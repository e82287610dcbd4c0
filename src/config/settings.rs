//! Engine settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// GenerationConfig
// ---------------------------------------------------------------------------

/// Settings for the speech generation backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Base URL of the backend (e.g. `https://learn.example.com`).
    pub base_url: String,
    /// Path of the generation endpoint, appended to `base_url`.
    pub endpoint: String,
    /// Bearer token, or `None` when the backend needs no authentication.
    pub api_key: Option<String>,
    /// Experience (course) the lessons belong to, forwarded with every
    /// generation request.
    pub experience_id: Option<String>,
    /// Maximum seconds to wait for a generation response.
    pub timeout_secs: u64,
    /// Total attempts for retryable failures (1 disables retrying).
    pub max_attempts: u32,
    /// Pause between attempts in milliseconds.
    pub retry_backoff_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".into(),
            endpoint: "/api/tts/generate".into(),
            api_key: None,
            experience_id: None,
            timeout_secs: 30,
            max_attempts: 2,
            retry_backoff_ms: 250,
        }
    }
}

// ---------------------------------------------------------------------------
// PlaybackConfig
// ---------------------------------------------------------------------------

/// Playback and word-tracking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Initial playback rate.  Snapped to the nearest supported rate.
    pub default_rate: f64,
    /// Frame period used by
    /// [`FrameLoop::from_config`](crate::engine::FrameLoop::from_config) when
    /// the host has no render loop of its own.
    pub frame_interval_ms: u64,
    /// Reject malformed timing tables (highlighting stays off for the session).
    pub validate_timings: bool,
    /// Keep generated sessions cached after navigating to other content.
    /// When off, the previous content's session is discarded on every change.
    pub retain_sessions: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_rate: 1.0,
            frame_interval_ms: 16,
            validate_timings: true,
            retain_sessions: true,
        }
    }
}

// ---------------------------------------------------------------------------
// EngineConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level engine configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use lesson_narration::config::EngineConfig;
///
/// // Load (returns Default when file is missing)
/// let config = EngineConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Speech generation backend settings.
    pub generation: GenerationConfig,
    /// Playback settings.
    pub playback: PlaybackConfig,
}

impl EngineConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(EngineConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
