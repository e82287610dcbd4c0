//! Playback status, rate and the state snapshot handed to the UI.

use serde::{Deserialize, Serialize};

use crate::timing::NO_WORD;

// ---------------------------------------------------------------------------
// PlaybackStatus
// ---------------------------------------------------------------------------

/// Lifecycle of the bound narration.
///
/// ```text
/// Idle ──play (no session)──▶ Loading ──session bound──▶ Paused / Playing
/// Playing ◀──play / pause──▶ Paused
/// Playing ──end of audio──▶ Ended ──play──▶ Playing (from 0)
/// any ──content change / detach──▶ Idle
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Ended,
}

impl PlaybackStatus {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackStatus::Playing)
    }

    /// A short label suitable for a status line.
    pub fn label(&self) -> &'static str {
        match self {
            PlaybackStatus::Idle => "Idle",
            PlaybackStatus::Loading => "Loading",
            PlaybackStatus::Playing => "Playing",
            PlaybackStatus::Paused => "Paused",
            PlaybackStatus::Ended => "Ended",
        }
    }
}

// ---------------------------------------------------------------------------
// PlaybackRate
// ---------------------------------------------------------------------------

/// The supported playback speeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackRate {
    /// 0.75×
    Slow,
    /// 1×
    #[default]
    Normal,
    /// 1.25×
    Brisk,
    /// 1.5×
    Fast,
    /// 2×
    Double,
}

impl PlaybackRate {
    pub const ALL: [PlaybackRate; 5] = [
        PlaybackRate::Slow,
        PlaybackRate::Normal,
        PlaybackRate::Brisk,
        PlaybackRate::Fast,
        PlaybackRate::Double,
    ];

    pub fn as_f64(self) -> f64 {
        match self {
            PlaybackRate::Slow => 0.75,
            PlaybackRate::Normal => 1.0,
            PlaybackRate::Brisk => 1.25,
            PlaybackRate::Fast => 1.5,
            PlaybackRate::Double => 2.0,
        }
    }

    /// The exact member for `value`, if there is one.
    pub fn from_f64(value: f64) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|rate| (rate.as_f64() - value).abs() < 1e-9)
    }

    /// Clamp `value` to the closest supported rate.  Ties go to the slower
    /// rate; NaN maps to 1×.
    ///
    /// ```
    /// use lesson_narration::playback::PlaybackRate;
    ///
    /// assert_eq!(PlaybackRate::nearest(1.4), PlaybackRate::Fast);
    /// assert_eq!(PlaybackRate::nearest(9.0), PlaybackRate::Double);
    /// assert_eq!(PlaybackRate::nearest(0.1), PlaybackRate::Slow);
    /// ```
    pub fn nearest(value: f64) -> Self {
        if value.is_nan() {
            return PlaybackRate::Normal;
        }
        let value = value.clamp(PlaybackRate::Slow.as_f64(), PlaybackRate::Double.as_f64());
        let mut best = PlaybackRate::Slow;
        for rate in Self::ALL {
            if (rate.as_f64() - value).abs() < (best.as_f64() - value).abs() {
                best = rate;
            }
        }
        best
    }
}

// ---------------------------------------------------------------------------
// PlaybackState
// ---------------------------------------------------------------------------

/// Point-in-time view of the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    /// Playhead in seconds.
    pub current_time: f64,
    pub rate: PlaybackRate,
    /// `-1` when no word is attributable.
    pub current_word_index: i32,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            status: PlaybackStatus::Idle,
            current_time: 0.0,
            rate: PlaybackRate::Normal,
            current_word_index: NO_WORD,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_playing_is_playing() {
        assert!(PlaybackStatus::Playing.is_playing());
        assert!(!PlaybackStatus::Idle.is_playing());
        assert!(!PlaybackStatus::Loading.is_playing());
        assert!(!PlaybackStatus::Paused.is_playing());
        assert!(!PlaybackStatus::Ended.is_playing());
    }

    #[test]
    fn labels() {
        assert_eq!(PlaybackStatus::Idle.label(), "Idle");
        assert_eq!(PlaybackStatus::Ended.label(), "Ended");
    }

    #[test]
    fn exact_rates_round_trip() {
        for rate in PlaybackRate::ALL {
            assert_eq!(PlaybackRate::from_f64(rate.as_f64()), Some(rate));
        }
        assert_eq!(PlaybackRate::from_f64(1.1), None);
    }

    #[test]
    fn nearest_clamps_and_snaps() {
        assert_eq!(PlaybackRate::nearest(1.0), PlaybackRate::Normal);
        assert_eq!(PlaybackRate::nearest(1.3), PlaybackRate::Brisk);
        assert_eq!(PlaybackRate::nearest(1.8), PlaybackRate::Double);
        assert_eq!(PlaybackRate::nearest(-3.0), PlaybackRate::Slow);
        assert_eq!(PlaybackRate::nearest(f64::INFINITY), PlaybackRate::Double);
        assert_eq!(PlaybackRate::nearest(f64::NAN), PlaybackRate::Normal);
    }

    #[test]
    fn ties_go_to_the_slower_rate() {
        assert_eq!(PlaybackRate::nearest(1.75), PlaybackRate::Fast);
    }

    #[test]
    fn default_state_is_idle_with_no_word() {
        let state = PlaybackState::default();
        assert_eq!(state.status, PlaybackStatus::Idle);
        assert_eq!(state.current_word_index, -1);
        assert_eq!(state.rate, PlaybackRate::Normal);
    }
}
