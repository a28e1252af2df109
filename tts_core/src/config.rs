// Process-wide synthesis configuration, built once at startup

use std::path::PathBuf;
use std::time::Duration;

/// Sentence used for the second attempt when the caller's text fails.
pub const DEFAULT_FALLBACK_TEXT: &str = "Today is a good day to take a walk in the park.";

/// Engine stderr fragments that do not affect the produced audio.
pub const DEFAULT_BENIGN_ERRORS: &[&str] = &["KeyError: 'outputs'"];

#[derive(Debug, Clone)]
pub struct TtsConfig {
    /// Root that request paths (reference audio, output dir) are resolved against
    pub data_root: PathBuf,
    pub target_sample_rate: u32,
    pub engine_program: String,
    pub engine_args: Vec<String>,
    pub engine_workdir: Option<PathBuf>,
    pub engine_timeout_secs: u64,
    pub fallback_text: String,
    pub benign_errors: Vec<String>,
    /// Where the engine writes before publish; defaults to `<data_root>/.staging`
    pub staging_dir: Option<PathBuf>,
    pub audio_ext: String,
    pub silence_threshold: Option<f32>,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("."),
            target_sample_rate: 16_000,
            engine_program: "python3".to_string(),
            engine_args: vec![
                "client_http.py".to_string(),
                "--server-url".to_string(),
                "localhost:9002".to_string(),
            ],
            engine_workdir: None,
            engine_timeout_secs: 300,
            fallback_text: DEFAULT_FALLBACK_TEXT.to_string(),
            benign_errors: DEFAULT_BENIGN_ERRORS.iter().map(|s| s.to_string()).collect(),
            staging_dir: None,
            audio_ext: "wav".to_string(),
            silence_threshold: None,
        }
    }
}

impl TtsConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let data_root = std::env::var("TTS_DATA_ROOT")
            .ok()
            .map(PathBuf::from)
            .unwrap_or(defaults.data_root);

        let target_sample_rate = std::env::var("TTS_TARGET_SAMPLE_RATE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.target_sample_rate);

        let engine_program = std::env::var("TTS_ENGINE_PROGRAM").unwrap_or(defaults.engine_program);

        let engine_args = std::env::var("TTS_ENGINE_ARGS")
            .ok()
            .map(|args| args.split_whitespace().map(|s| s.to_string()).collect())
            .unwrap_or(defaults.engine_args);

        let engine_workdir = std::env::var("TTS_ENGINE_WORKDIR").ok().map(PathBuf::from);

        let engine_timeout_secs = std::env::var("TTS_ENGINE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.engine_timeout_secs);

        let fallback_text = std::env::var("TTS_FALLBACK_TEXT")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.fallback_text);

        let benign_errors = std::env::var("TTS_BENIGN_ERRORS")
            .ok()
            .map(|v| {
                v.split('|')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.benign_errors);

        let staging_dir = std::env::var("TTS_STAGING_DIR").ok().map(PathBuf::from);

        let audio_ext = std::env::var("TTS_AUDIO_EXT")
            .ok()
            .map(|v| v.trim_start_matches('.').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.audio_ext);

        let silence_threshold = std::env::var("TTS_SILENCE_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok());

        Self {
            data_root,
            target_sample_rate,
            engine_program,
            engine_args,
            engine_workdir,
            engine_timeout_secs,
            fallback_text,
            benign_errors,
            staging_dir,
            audio_ext,
            silence_threshold,
        }
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_timeout_secs)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir
            .clone()
            .unwrap_or_else(|| self.data_root.join(".staging"))
    }
}
