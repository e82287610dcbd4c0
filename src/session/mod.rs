//! Sessions (a generated audio asset paired with its word timing table)
//! and the cache that hands them out.
//!
//! ```text
//! request_session(id) ──▶ Ready?   ── yes ──▶ Arc<Session>
//!                         Pending? ── yes ──▶ await the same fetch
//!                         else ─────────────▶ SpeechGenerator::generate → Pending
//! ```

pub mod cache;

use std::fmt;
use std::sync::Arc;

use base64::Engine as _;

use crate::generation::{GenerationError, GenerationResponse};
use crate::timing::TimingTable;

pub use cache::SessionCache;

// ---------------------------------------------------------------------------
// ContentId
// ---------------------------------------------------------------------------

/// Identity of a piece of narrated content (a lesson id).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentId(String);

impl ContentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ContentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// AudioAsset
// ---------------------------------------------------------------------------

/// Encoded audio bytes as returned by the backend.  Cheap to clone.
#[derive(Clone, PartialEq, Eq)]
pub struct AudioAsset(Arc<[u8]>);

impl AudioAsset {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }

    /// Decode a base64 payload, accepting an optional `data:…;base64,` prefix.
    pub fn from_base64(encoded: &str) -> Result<Self, GenerationError> {
        let payload = match encoded.split_once(";base64,") {
            Some((prefix, rest)) if prefix.starts_with("data:") => rest,
            _ => encoded,
        };
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map(Self::new)
            .map_err(|e| GenerationError::Decode(e.to_string()))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for AudioAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AudioAsset({} bytes)", self.0.len())
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Generated narration for one piece of content.  Immutable once built.
#[derive(Debug, Clone)]
pub struct Session {
    pub content_id: ContentId,
    pub audio: AudioAsset,
    pub duration_secs: f64,
    pub timings: Arc<TimingTable>,
}

impl Session {
    pub fn new(
        content_id: ContentId,
        audio: AudioAsset,
        duration_secs: f64,
        timings: TimingTable,
    ) -> Self {
        Self {
            content_id,
            audio,
            duration_secs,
            timings: Arc::new(timings),
        }
    }

    /// Build a session from a backend response.
    ///
    /// # Errors
    ///
    /// - [`GenerationError::Decode`]: the audio payload is not valid base64.
    /// - [`GenerationError::Parse`] : the duration is negative or not finite.
    pub fn from_response(
        content_id: ContentId,
        response: GenerationResponse,
    ) -> Result<Self, GenerationError> {
        if !response.duration.is_finite() || response.duration < 0.0 {
            return Err(GenerationError::Parse(format!(
                "invalid duration {}",
                response.duration
            )));
        }
        let audio = AudioAsset::from_base64(&response.audio_base64)?;
        Ok(Self::new(
            content_id,
            audio,
            response.duration,
            TimingTable::new(response.word_timings),
        ))
    }

    /// Word sequence for the UI, in timing order.
    pub fn words(&self) -> Vec<String> {
        self.timings.words()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::WordTiming;

    fn response(audio: &str, duration: f64) -> GenerationResponse {
        GenerationResponse {
            audio_base64: audio.into(),
            duration,
            word_timings: vec![
                WordTiming::new("Hello", 0.0, 0.5),
                WordTiming::new("world", 0.5, 1.0),
            ],
        }
    }

    #[test]
    fn from_response_decodes_audio_and_timings() {
        // "AAEC" = [0, 1, 2]
        let session = Session::from_response("lesson-1".into(), response("AAEC", 1.0)).unwrap();
        assert_eq!(session.audio.bytes(), &[0, 1, 2]);
        assert_eq!(session.duration_secs, 1.0);
        assert_eq!(session.words(), vec!["Hello", "world"]);
        assert_eq!(session.content_id.as_str(), "lesson-1");
    }

    #[test]
    fn data_url_prefix_is_accepted() {
        let asset = AudioAsset::from_base64("data:audio/mpeg;base64,AAEC").unwrap();
        assert_eq!(asset.bytes(), &[0, 1, 2]);
    }

    #[test]
    fn invalid_base64_is_a_decode_error() {
        let err = Session::from_response("lesson-1".into(), response("not base64!", 1.0))
            .unwrap_err();
        assert!(matches!(err, GenerationError::Decode(_)));
    }

    #[test]
    fn negative_duration_is_a_parse_error() {
        let err = Session::from_response("lesson-1".into(), response("AAEC", -1.0)).unwrap_err();
        assert!(matches!(err, GenerationError::Parse(_)));
    }

    #[test]
    fn audio_debug_hides_bytes() {
        let asset = AudioAsset::new(vec![0; 2048]);
        assert_eq!(format!("{asset:?}"), "AudioAsset(2048 bytes)");
    }

    #[test]
    fn content_id_conversions() {
        let a: ContentId = "lesson-1".into();
        let b: ContentId = String::from("lesson-1").into();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "lesson-1");
    }
}
