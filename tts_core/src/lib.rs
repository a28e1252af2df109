//! Reference-voice synthesis with a content-addressed result cache.
//!
//! The speech model itself runs out of process (see [`engine`]). This crate
//! normalizes requests, keys them by a digest of the normalized text, conforms
//! the reference audio, drives the engine with a fallback probe and publishes
//! results under `<output_dir>/<fingerprint>/`.

pub mod cache;
pub mod condition;
pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod normalize;
pub mod orchestrator;
pub mod service;
pub mod wav;

pub use cache::{CacheEntry, CacheLookup, CacheStore};
pub use condition::ReferenceConditioner;
pub use config::TtsConfig;
pub use engine::{CommandEngine, EngineRequest, SynthesisEngine};
pub use error::{ConditioningFailed, EngineError, FailureDiagnosis, Result, TtsError};
pub use fingerprint::{fingerprint, ContentFingerprint};
pub use normalize::{normalize_request, normalize_text, NormalizedRequest, SynthesisRequest};
pub use orchestrator::{Artifact, Orchestrator};
pub use service::{SynthesisOutcome, SynthesisService, SynthesisStatus};
