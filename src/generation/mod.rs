//! Speech generation: the request/response contract with the external
//! text-to-speech backend.
//!
//! This module provides:
//! * [`SpeechGenerator`]: async trait implemented by every backend.
//! * [`ApiGenerator`]: HTTP client for the backend's generation endpoint.
//! * [`RetryingGenerator`]: wraps any generator; retries transient failures.
//! * [`GenerationError`]: error variants for generation requests.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use lesson_narration::config::EngineConfig;
//! use lesson_narration::generation::{
//!     ApiGenerator, GenerationRequest, RetryingGenerator, SpeechGenerator,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = EngineConfig::default();
//!     let generator = RetryingGenerator::from_config(
//!         ApiGenerator::from_config(&config.generation),
//!         &config.generation,
//!     );
//!
//!     let response = generator
//!         .generate(&GenerationRequest {
//!             lesson_id: "lesson-1".into(),
//!             experience_id: config.generation.experience_id.clone(),
//!         })
//!         .await
//!         .unwrap();
//!     println!("{} words, {:.1}s", response.word_timings.len(), response.duration);
//! }
//! ```

pub mod client;
pub mod retry;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use client::{
    ApiGenerator, GenerationError, GenerationRequest, GenerationResponse, SpeechGenerator,
};
pub use retry::RetryingGenerator;
