//! Cross-platform settings location using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir:
//!   Windows: %APPDATA%\lesson-narration\
//!   macOS:   ~/Library/Application Support/lesson-narration/
//!   Linux:   ~/.config/lesson-narration/

use std::path::PathBuf;

/// Holds the resolved settings directory and file.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory holding `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "lesson-narration";

    /// Resolves paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// config directory.
    pub fn new() -> Self {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::in_dir(base.join(Self::APP_NAME))
    }

    /// Paths rooted at `config_dir`, for hosts that keep engine settings next
    /// to their own.
    pub fn in_dir(config_dir: impl Into<PathBuf>) -> Self {
        let config_dir = config_dir.into();
        let settings_file = config_dir.join("settings.toml");
        Self {
            config_dir,
            settings_file,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
