//! Cache-aware synthesis entry point.
//!
//! normalize -> fingerprint -> lookup -> (condition + synthesize -> publish)

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as TokioMutex;
use tracing::info;

use crate::cache::{CacheEntry, CacheStore};
use crate::condition::ReferenceConditioner;
use crate::config::TtsConfig;
use crate::engine::{CommandEngine, SynthesisEngine};
use crate::error::{Result, TtsError};
use crate::fingerprint::{fingerprint, ContentFingerprint};
use crate::normalize::{normalize_request, validate_relative_path, NormalizedRequest, SynthesisRequest};
use crate::orchestrator::Orchestrator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisStatus {
    Success,
    Cached,
}

#[derive(Debug, Clone)]
pub struct SynthesisOutcome {
    pub status: SynthesisStatus,
    pub entry: CacheEntry,
    /// Audio path relative to the data root
    pub audio_relative_path: PathBuf,
    /// Normalized text the audio was produced from
    pub text: String,
    pub elapsed: Duration,
}

pub struct SynthesisService {
    config: TtsConfig,
    conditioner: ReferenceConditioner,
    orchestrator: Orchestrator,
    // entry dir -> lock held while that entry is being produced
    inflight: InflightMap,
}

impl SynthesisService {
    pub fn new(config: TtsConfig, engine: Arc<dyn SynthesisEngine>) -> Self {
        let orchestrator = Orchestrator::new(engine, &config);
        Self {
            conditioner: ReferenceConditioner::new(config.target_sample_rate),
            orchestrator,
            config,
            inflight: DashMap::new(),
        }
    }

    /// Service backed by the configured engine command
    pub fn from_config(config: TtsConfig) -> Self {
        let engine = Arc::new(CommandEngine::from_config(&config));
        Self::new(config, engine)
    }

    pub fn config(&self) -> &TtsConfig {
        &self.config
    }

    fn resolve(&self, rel: &str) -> PathBuf {
        self.config.data_root.join(rel)
    }

    fn store_for(&self, output_dir: &str) -> CacheStore {
        CacheStore::new(self.resolve(output_dir), &self.config.audio_ext)
    }

    /// Look up a published entry without synthesizing.
    pub fn lookup(&self, output_dir: &str, fp: &ContentFingerprint) -> Result<Option<CacheEntry>> {
        validate_relative_path("Output directory", output_dir)?;
        Ok(self.store_for(output_dir).lookup(fp))
    }

    pub async fn synthesize(&self, req: &SynthesisRequest) -> Result<SynthesisOutcome> {
        let started = Instant::now();
        let norm = normalize_request(req)?;
        info!("Processing TTS request: {:?}", norm.target_text);

        let reference = self.resolve(&norm.reference_audio_path);
        if !reference.is_file() {
            return Err(TtsError::InvalidRequest(format!(
                "Reference audio file not found: {}",
                norm.reference_audio_path
            )));
        }

        let fp = fingerprint(&norm.target_text);
        let store = self.store_for(&norm.output_dir);
        let relative = Path::new(&norm.output_dir)
            .join(fp.as_str())
            .join(format!("{}.{}", fp, self.config.audio_ext));

        let outcome = |status, entry: CacheEntry| SynthesisOutcome {
            status,
            entry,
            audio_relative_path: relative.clone(),
            text: norm.target_text.clone(),
            elapsed: started.elapsed(),
        };

        if let Some(entry) = store.lookup(&fp) {
            info!("Cache hit for {}", fp);
            return Ok(outcome(SynthesisStatus::Cached, entry));
        }

        let slot = InflightSlot::acquire(&self.inflight, store.entry_dir(&fp));
        let produced = {
            let _guard = slot.mutex().lock().await;
            // Another request may have published while we waited
            match store.lookup(&fp) {
                Some(entry) => {
                    info!("Cache hit for {} after waiting on in-flight synthesis", fp);
                    Ok((SynthesisStatus::Cached, entry))
                }
                None => self
                    .produce(&norm, &reference, &store, &fp)
                    .await
                    .map(|entry| (SynthesisStatus::Success, entry)),
            }
        };
        drop(slot);

        let (status, entry) = produced?;
        Ok(outcome(status, entry))
    }

    async fn produce(
        &self,
        norm: &NormalizedRequest,
        reference: &Path,
        store: &CacheStore,
        fp: &ContentFingerprint,
    ) -> Result<CacheEntry> {
        let conditioner = self.conditioner;
        let original = reference.to_path_buf();
        let conformant = tokio::task::spawn_blocking(move || conditioner.condition(&original))
            .await
            .map_err(|e| TtsError::Cache(format!("Task join error: {e}")))?;

        let artifact = self.orchestrator.synthesize(norm, &conformant).await?;

        let store = store.clone();
        let fp = fp.clone();
        let text = norm.target_text.clone();
        let staged = artifact.path.clone();
        let published = tokio::task::spawn_blocking(move || store.publish(&fp, &staged, &text))
            .await
            .map_err(|e| TtsError::Cache(format!("Task join error: {e}")))?;

        if published.is_err() {
            let _ = tokio::fs::remove_file(&artifact.path).await;
        }
        published
    }
}

type InflightMap = DashMap<PathBuf, Arc<TokioMutex<()>>>;

/// A claim on the per-entry lock. Dropping it, on completion or when the
/// request future is cancelled, removes the map entry once no one else holds it.
struct InflightSlot<'a> {
    map: &'a InflightMap,
    key: PathBuf,
    lock: Arc<TokioMutex<()>>,
}

impl<'a> InflightSlot<'a> {
    fn acquire(map: &'a InflightMap, key: PathBuf) -> Self {
        let lock = map.entry(key.clone()).or_default().clone();
        Self { map, key, lock }
    }

    fn mutex(&self) -> &TokioMutex<()> {
        &self.lock
    }
}

impl Drop for InflightSlot<'_> {
    fn drop(&mut self) {
        // The map's reference plus ours: nobody else is waiting. Cloning needs
        // the shard lock that remove_if holds, so the check cannot race.
        self.map.remove_if(&self.key, |_, l| Arc::strong_count(l) == 2);
    }
}
