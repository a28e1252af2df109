//! Resumable batch driver: generate numbered sentences, synthesize each one,
//! and record finished lines in a per-file ledger so a rerun skips them.

pub mod ledger;
pub mod submit;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use llm_core::SentenceGenerator;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{error, info, warn};
use tts_core::SynthesisRequest;

pub use ledger::{ledger_path, Ledger};
pub use submit::{HttpSubmitter, LocalSubmitter, Submitter};

static SENTENCE_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\s+(.+)$").expect("valid regex"));

/// Sentence text of a `"<n>. <text>"` line, or None if the line is malformed.
pub fn parse_sentence_line(line: &str) -> Option<&str> {
    SENTENCE_LINE
        .captures(line.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub total_sentences: usize,
    pub sentences_per_batch: usize,
    pub reference_text: String,
    pub reference_audio: String,
    pub save_dir: String,
    pub tts_api_url: String,
    /// Process just this sentence file instead of generating new batches
    pub resume_file: Option<PathBuf>,
    /// Submit through the in-process service instead of HTTP
    pub in_process: bool,
    pub submit_timeout_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            total_sentences: 100,
            sentences_per_batch: 10,
            reference_text: "很多这样的人，而这样有个通病就是，很自信，甚至自负".to_string(),
            reference_audio: "example/leijun.wav".to_string(),
            save_dir: "example/results".to_string(),
            tts_api_url: "http://localhost:9003/tts".to_string(),
            resume_file: None,
            in_process: false,
            // Longer than the server's default request timeout
            submit_timeout_secs: 900,
        }
    }
}

impl BatchConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        Self {
            total_sentences: var("BATCH_TOTAL_SENTENCES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(d.total_sentences),
            sentences_per_batch: var("BATCH_SENTENCES_PER_BATCH")
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(d.sentences_per_batch),
            reference_text: var("BATCH_REFERENCE_TEXT").unwrap_or(d.reference_text),
            reference_audio: var("BATCH_REFERENCE_AUDIO").unwrap_or(d.reference_audio),
            save_dir: var("BATCH_SAVE_DIR").unwrap_or(d.save_dir),
            tts_api_url: var("BATCH_TTS_API_URL").unwrap_or(d.tts_api_url),
            resume_file: var("BATCH_RESUME_FILE").map(PathBuf::from),
            in_process: var("BATCH_IN_PROCESS")
                .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
                .unwrap_or(d.in_process),
            submit_timeout_secs: var("BATCH_SUBMIT_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(d.submit_timeout_secs),
        }
    }

    /// `ceil(total / per_batch)`
    pub fn batch_count(&self) -> usize {
        self.total_sentences.div_ceil(self.sentences_per_batch.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Pending,
    GeneratingSentences,
    Processing,
    Done,
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BatchState::Pending => "PENDING",
            BatchState::GeneratingSentences => "GENERATING_SENTENCES",
            BatchState::Processing => "PROCESSING",
            BatchState::Done => "DONE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Lines synthesized (or found cached) and recorded in this run
    pub processed: usize,
    pub already_done: usize,
    pub malformed: usize,
    pub failed: usize,
    pub skipped_batches: usize,
}

impl std::ops::AddAssign for BatchReport {
    fn add_assign(&mut self, other: Self) {
        self.processed += other.processed;
        self.already_done += other.already_done;
        self.malformed += other.malformed;
        self.failed += other.failed;
        self.skipped_batches += other.skipped_batches;
    }
}

pub struct BatchDriver {
    generator: Arc<dyn SentenceGenerator>,
    submitter: Arc<dyn Submitter>,
    config: BatchConfig,
}

impl BatchDriver {
    pub fn new(
        generator: Arc<dyn SentenceGenerator>,
        submitter: Arc<dyn Submitter>,
        config: BatchConfig,
    ) -> Self {
        Self {
            generator,
            submitter,
            config,
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    fn advance(batch: usize, state: &mut BatchState, next: BatchState) {
        info!("Batch {}: {} -> {}", batch, state, next);
        *state = next;
    }

    /// Run every batch. Generation failures skip the batch; per-line
    /// failures are counted and the run continues.
    pub async fn run(&self) -> BatchReport {
        let batches = self.config.batch_count();
        info!(
            "Starting TTS batch processing: {} sentences, {} per batch, {} batches",
            self.config.total_sentences, self.config.sentences_per_batch, batches
        );

        let mut total = BatchReport::default();
        for batch in 1..=batches {
            info!("Processing batch {} of {}", batch, batches);
            let mut state = BatchState::Pending;

            Self::advance(batch, &mut state, BatchState::GeneratingSentences);
            let file = match self.generator.generate(self.config.sentences_per_batch).await {
                Ok(file) => file,
                Err(e) => {
                    warn!("Failed to generate sentences, skipping batch {}: {}", batch, e);
                    total.skipped_batches += 1;
                    continue;
                }
            };

            Self::advance(batch, &mut state, BatchState::Processing);
            match self.process_file(&file).await {
                Ok(report) => {
                    info!("Completed batch {}: {:?}", batch, report);
                    total += report;
                }
                Err(e) => {
                    error!("Batch {} aborted on {}: {:#}", batch, file.display(), e);
                    total.skipped_batches += 1;
                    continue;
                }
            }
            Self::advance(batch, &mut state, BatchState::Done);
        }

        info!("All batches completed: {:?}", total);
        total
    }

    fn request_for(&self, sentence: &str) -> SynthesisRequest {
        SynthesisRequest {
            target_text: sentence.to_string(),
            reference_text: Some(self.config.reference_text.clone()),
            reference_audio_path: Some(self.config.reference_audio.clone()),
            output_dir: Some(self.config.save_dir.clone()),
        }
    }

    /// Submit each not-yet-recorded line of `path`, appending it to the
    /// ledger once it is in the cache.
    pub async fn process_file(&self, path: &Path) -> anyhow::Result<BatchReport> {
        info!("Processing sentences from {}", path.display());
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading sentence file {}", path.display()))?;
        let mut ledger = Ledger::open(ledger_path(path)).await?;

        let mut report = BatchReport::default();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            let Some(sentence) = parse_sentence_line(line) else {
                warn!("Malformed sentence (no prefix): {}", line);
                report.malformed += 1;
                continue;
            };
            if ledger.contains(line) {
                report.already_done += 1;
                continue;
            }

            info!("Processing: {}", line);
            match self.submitter.submit(&self.request_for(sentence)).await {
                Ok(status) => {
                    info!("TTS {:?}: {}", status, sentence);
                    ledger.append(line).await?;
                    report.processed += 1;
                }
                Err(e) => {
                    error!("TTS failed for {:?}: {:#}", sentence, e);
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }
}
