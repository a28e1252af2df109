//! Transports that hand one sentence to the cache-aware synthesis entry point.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde::Deserialize;
use tts_core::{SynthesisRequest, SynthesisService, SynthesisStatus};

#[async_trait]
pub trait Submitter: Send + Sync {
    /// Ok only when the sentence ends up in the cache.
    async fn submit(&self, req: &SynthesisRequest) -> anyhow::Result<SynthesisStatus>;
}

#[derive(Deserialize)]
struct SubmitReply {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

/// POSTs to a running server's `/tts` endpoint
pub struct HttpSubmitter {
    client: reqwest::Client,
    url: String,
}

impl HttpSubmitter {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl Submitter for HttpSubmitter {
    async fn submit(&self, req: &SynthesisRequest) -> anyhow::Result<SynthesisStatus> {
        let response = self
            .client
            .post(&self.url)
            .json(req)
            .send()
            .await
            .with_context(|| format!("POST {}", self.url))?;

        let code = response.status();
        let body = response.text().await.context("reading TTS response")?;
        let reply: SubmitReply = serde_json::from_str(&body)
            .with_context(|| format!("HTTP {code}: unexpected body {body}"))?;

        match reply.status.as_str() {
            "success" if code.is_success() => Ok(SynthesisStatus::Success),
            "cached" if code.is_success() => Ok(SynthesisStatus::Cached),
            _ => Err(anyhow!(
                "HTTP {}: {}",
                code,
                reply.error.unwrap_or(reply.status)
            )),
        }
    }
}

/// Calls the service directly, no server needed
pub struct LocalSubmitter {
    service: Arc<SynthesisService>,
}

impl LocalSubmitter {
    pub fn new(service: Arc<SynthesisService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Submitter for LocalSubmitter {
    async fn submit(&self, req: &SynthesisRequest) -> anyhow::Result<SynthesisStatus> {
        let outcome = self.service.synthesize(req).await?;
        Ok(outcome.status)
    }
}
