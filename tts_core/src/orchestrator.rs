//! Drives the engine with the primary/fallback attempt sequence.
//!
//! 1. caller's text
//! 2. on failure, the fixed fallback sentence, to tell a broken engine from an
//!    incompatible input
//!
//! A fallback success is never returned as the caller's audio. It only sets the
//! diagnosis of the `SynthesisFailed` error to `IncompatibleInput`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::TtsConfig;
use crate::engine::{EngineRequest, SynthesisEngine};
use crate::error::{EngineError, FailureDiagnosis, Result, TtsError};
use crate::normalize::NormalizedRequest;
use crate::wav;

/// Audio produced for the caller's text, still in the staging area.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub elapsed: Duration,
}

pub struct Orchestrator {
    engine: Arc<dyn SynthesisEngine>,
    staging_dir: PathBuf,
    fallback_text: String,
    audio_ext: String,
    silence_threshold: Option<f32>,
}

impl Orchestrator {
    pub fn new(engine: Arc<dyn SynthesisEngine>, cfg: &TtsConfig) -> Self {
        Self {
            engine,
            staging_dir: cfg.staging_dir(),
            fallback_text: cfg.fallback_text.clone(),
            audio_ext: cfg.audio_ext.clone(),
            silence_threshold: cfg.silence_threshold,
        }
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    pub async fn synthesize(&self, req: &NormalizedRequest, reference_audio: &Path) -> Result<Artifact> {
        tokio::fs::create_dir_all(&self.staging_dir).await?;
        let started = Instant::now();

        let primary = match self.attempt(&req.target_text, req, reference_audio).await {
            Ok(path) => {
                let elapsed = started.elapsed();
                info!("Speech synthesized in {:.2} seconds", elapsed.as_secs_f64());
                return Ok(Artifact { path, elapsed });
            }
            Err(e) => e,
        };
        warn!("Primary synthesis failed: {primary}; probing engine with fallback sentence");

        match self.attempt(&self.fallback_text, req, reference_audio).await {
            Ok(path) => {
                discard(&path).await;
                warn!("Fallback sentence succeeded; input text is incompatible: {:?}", req.target_text);
                Err(TtsError::SynthesisFailed {
                    diagnosis: FailureDiagnosis::IncompatibleInput,
                    primary: primary.to_string(),
                    fallback: "fallback sentence synthesized successfully".to_string(),
                })
            }
            Err(fallback) => {
                warn!("Fallback synthesis failed as well: {fallback}");
                Err(TtsError::SynthesisFailed {
                    diagnosis: FailureDiagnosis::EngineUnavailable,
                    primary: primary.to_string(),
                    fallback: fallback.to_string(),
                })
            }
        }
    }

    async fn attempt(
        &self,
        text: &str,
        req: &NormalizedRequest,
        reference_audio: &Path,
    ) -> std::result::Result<PathBuf, EngineError> {
        let output_path = self
            .staging_dir
            .join(format!("{}.{}", uuid::Uuid::new_v4(), self.audio_ext));
        let engine_req = EngineRequest {
            target_text: text.to_string(),
            reference_text: req.reference_text.clone(),
            reference_audio: reference_audio.to_path_buf(),
            output_path: output_path.clone(),
        };

        let mut staged = StagedOutput::new(output_path);
        let result = self.engine.synthesize(&engine_req).await;
        let result = match (result, self.silence_threshold) {
            (Ok(path), Some(threshold)) => self.reject_silence(path, threshold).await,
            (other, _) => other,
        };
        if result.is_ok() {
            staged.keep();
        }
        result
    }

    async fn reject_silence(&self, path: PathBuf, threshold: f32) -> std::result::Result<PathBuf, EngineError> {
        let probe = path.clone();
        let rms = tokio::task::spawn_blocking(move || wav::file_rms(&probe))
            .await
            .map_err(|e| anyhow::anyhow!("Task join error: {e}"))
            .and_then(|r| r);
        match rms {
            Ok(rms) if rms < threshold => Err(EngineError::SilentOutput { rms }),
            Ok(_) => Ok(path),
            Err(e) => {
                // Not a WAV we can decode; leave the verdict to the engine's exit status
                warn!("Silence check skipped for {}: {e:#}", path.display());
                Ok(path)
            }
        }
    }
}

/// Staged engine output that is removed on drop unless kept, so a cancelled
/// attempt leaves nothing behind in the staging dir.
struct StagedOutput {
    path: PathBuf,
    keep: bool,
}

impl StagedOutput {
    fn new(path: PathBuf) -> Self {
        Self { path, keep: false }
    }

    fn keep(&mut self) {
        self.keep = true;
    }
}

impl Drop for StagedOutput {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Could not remove staged audio {}: {e}", self.path.display());
            }
        }
    }
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove staged audio {}: {e}", path.display());
        }
    }
}
