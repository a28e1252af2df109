//! The external synthesis engine.
//!
//! The model runs out of process. `CommandEngine` drives it as a child process
//! with the client-script flag convention; tests plug in their own
//! `SynthesisEngine`.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::EngineError;

/// One call into the engine. `output_path` is where the audio must appear.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub target_text: String,
    pub reference_text: String,
    pub reference_audio: PathBuf,
    pub output_path: PathBuf,
}

#[async_trait]
pub trait SynthesisEngine: Send + Sync {
    /// Synthesize `req` and return the path of the produced audio.
    async fn synthesize(&self, req: &EngineRequest) -> Result<PathBuf, EngineError>;
}

/// Runs `<program> <args..> --output-audio .. --reference-audio .. --reference-text .. --target-text ..`
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
    workdir: Option<PathBuf>,
    timeout: Duration,
    benign_errors: Vec<String>,
}

impl CommandEngine {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            workdir: None,
            timeout: Duration::from_secs(300),
            benign_errors: Vec::new(),
        }
    }

    pub fn from_config(cfg: &crate::config::TtsConfig) -> Self {
        Self {
            program: cfg.engine_program.clone(),
            args: cfg.engine_args.clone(),
            workdir: cfg.engine_workdir.clone(),
            timeout: cfg.engine_timeout(),
            benign_errors: cfg.benign_errors.clone(),
        }
    }

    pub fn with_workdir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_benign_errors(mut self, sigs: Vec<String>) -> Self {
        self.benign_errors = sigs;
        self
    }

    fn command(&self, req: &EngineRequest) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--output-audio")
            .arg(&req.output_path)
            .arg("--reference-audio")
            .arg(&req.reference_audio)
            .arg("--reference-text")
            .arg(&req.reference_text)
            .arg("--target-text")
            .arg(&req.target_text)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn is_benign(&self, stderr: &str) -> bool {
        self.benign_errors.iter().any(|sig| stderr.contains(sig.as_str()))
    }
}

fn produced(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_file() && m.len() > 0).unwrap_or(false)
}

#[async_trait]
impl SynthesisEngine for CommandEngine {
    async fn synthesize(&self, req: &EngineRequest) -> Result<PathBuf, EngineError> {
        info!(
            "Running engine {} for {} chars -> {}",
            self.program,
            req.target_text.chars().count(),
            req.output_path.display()
        );

        let child = self.command(req).spawn().map_err(EngineError::Spawn)?;

        // Dropping the wait future on timeout drops the child, which kills it
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(res) => res.map_err(EngineError::Spawn)?,
            Err(_) => {
                warn!("Engine timed out after {}s; child killed", self.timeout.as_secs());
                return Err(EngineError::Timeout(self.timeout.as_secs()));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.trim().is_empty() {
            debug!("Engine stdout: {}", stdout.trim());
        }
        if !stderr.trim().is_empty() {
            debug!("Engine stderr: {}", stderr.trim());
        }

        if !output.status.success() {
            if self.is_benign(&stderr) {
                info!("Ignoring benign engine error (exit {:?})", output.status.code());
            } else {
                return Err(EngineError::Exit {
                    status: output.status.code(),
                    stderr: stderr.trim().to_string(),
                });
            }
        }

        if !produced(&req.output_path) {
            return Err(EngineError::MissingOutput(req.output_path.display().to_string()));
        }
        Ok(req.output_path.clone())
    }
}
