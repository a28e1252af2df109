use std::fmt;

use thiserror::Error;

/// Why both synthesis attempts ended without usable audio for the caller's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureDiagnosis {
    /// The fallback sentence synthesized fine, so the engine works and the
    /// requested text is what it cannot handle.
    IncompatibleInput,
    /// The fallback sentence failed as well.
    EngineUnavailable,
}

impl fmt::Display for FailureDiagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureDiagnosis::IncompatibleInput => f.write_str("input text is incompatible with the model"),
            FailureDiagnosis::EngineUnavailable => f.write_str("synthesis engine is unavailable"),
        }
    }
}

/// Errors surfaced by the synthesis pipeline
#[derive(Debug, Error)]
pub enum TtsError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Synthesis failed ({diagnosis}). primary attempt: {primary}; fallback attempt: {fallback}")]
    SynthesisFailed {
        diagnosis: FailureDiagnosis,
        primary: String,
        fallback: String,
    },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a single call into the external engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to spawn engine: {0}")]
    Spawn(std::io::Error),

    #[error("engine exited with status {status:?}: {stderr}")]
    Exit { status: Option<i32>, stderr: String },

    #[error("engine timed out after {0}s")]
    Timeout(u64),

    #[error("engine reported success but wrote no audio to {0}")]
    MissingOutput(String),

    #[error("engine produced silent audio (rms {rms:.4})")]
    SilentOutput { rms: f32 },
}

/// Non-fatal: the reference audio could not be conformed and is used as-is.
#[derive(Debug, Error)]
#[error("conditioning {path} failed: {reason}")]
pub struct ConditioningFailed {
    pub path: String,
    pub reason: String,
}

pub type Result<T> = std::result::Result<T, TtsError>;
