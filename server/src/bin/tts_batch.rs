//! Generate numbered sentences with the LLM and synthesize each of them.
//!
//! `BATCH_RESUME_FILE=<path>` reprocesses one existing sentence file, and
//! `BATCH_RESUME_FILE=latest` picks the newest file in the generated dir.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use llm_core::{latest_sentence_file, GeneratorConfig, LlmClient};
use tracing::info;

use server::batch::{BatchConfig, BatchDriver, HttpSubmitter, LocalSubmitter, Submitter};
use tts_core::{SynthesisService, TtsConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _ = dotenv::dotenv();

    let config = BatchConfig::from_env();
    let generator_config = GeneratorConfig::from_env();
    let generated_dir = generator_config.output_dir.clone();
    let generator = Arc::new(LlmClient::new(generator_config).context("configuring LLM client")?);

    let submitter: Arc<dyn Submitter> = if config.in_process {
        let tts_config = TtsConfig::from_env();
        tokio::fs::create_dir_all(tts_config.staging_dir()).await?;
        info!("Submitting in-process, data root {}", tts_config.data_root.display());
        Arc::new(LocalSubmitter::new(Arc::new(SynthesisService::from_config(tts_config))))
    } else {
        info!("Submitting to {}", config.tts_api_url);
        Arc::new(HttpSubmitter::new(
            config.tts_api_url.clone(),
            Duration::from_secs(config.submit_timeout_secs),
        )?)
    };

    let resume = match config.resume_file.clone() {
        Some(path) if path.as_os_str() == "latest" => Some(
            latest_sentence_file(&generated_dir)?
                .with_context(|| format!("no sentence files in {}", generated_dir.display()))?,
        ),
        other => other,
    };

    let driver = BatchDriver::new(generator, submitter, config);
    let report = match resume {
        Some(path) => {
            info!("Resuming {}", path.display());
            driver.process_file(&path).await?
        }
        None => driver.run().await,
    };

    info!(
        "Done: {} processed, {} already done, {} malformed, {} failed, {} batches skipped",
        report.processed, report.already_done, report.malformed, report.failed, report.skipped_batches
    );
    Ok(())
}
