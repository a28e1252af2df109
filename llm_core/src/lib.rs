pub mod sentences;

use std::env;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub use sentences::{extract_numbered, latest_sentence_file};

#[derive(Debug, Error)]
pub enum GenerationError {
    /// The generator produced no usable sentence file
    #[error("Sentence generation unavailable: {0}")]
    Unavailable(String),

    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Produces a file of `count` numbered sentences.
#[async_trait]
pub trait SentenceGenerator: Send + Sync {
    async fn generate(&self, count: usize) -> Result<PathBuf, GenerationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAI,
    Ollama,
}

impl LlmProvider {
    fn default_base_url(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "https://api.openai.com/v1",
            LlmProvider::Ollama => "http://localhost:11434/v1",
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "gpt-3.5-turbo",
            LlmProvider::Ollama => "llama2",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    /// Directory the numbered sentence files are written to
    pub output_dir: PathBuf,
}

impl GeneratorConfig {
    pub fn from_env() -> Self {
        let provider = match env::var("LLM_PROVIDER").unwrap_or_default().as_str() {
            "ollama" => LlmProvider::Ollama,
            _ => LlmProvider::OpenAI,
        };
        let model = env::var("LLM_MODEL").unwrap_or_else(|_| provider.default_model().to_string());
        let base_url = env::var("LLM_BASE_URL").unwrap_or_else(|_| provider.default_base_url().to_string());
        let api_key = env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty());
        let max_tokens = env::var("LLM_MAX_TOKENS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(4096);
        let output_dir = env::var("GENERATED_SENTENCES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("generated_sentences"));

        Self {
            provider,
            model,
            base_url,
            api_key,
            max_tokens,
            output_dir,
        }
    }
}

/// Structure for the OpenAI Chat API request
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

/// Structure for the OpenAI Chat API response
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Prompt asking for `count` short, comma-free everyday sentences, one numbered per line.
pub fn sentence_prompt(count: usize) -> String {
    format!(
        "generate {count} random English sentences(less than 25 words) line by line, make the sentences use as many as possible words but common used in daily life, make sentences covers diff topics and fields, especially daily spoken languages, for we use these for asr model training as dataset, format like this(not blank line before them, just line by line). Sentences should not include any commas or other punctuation marks in the middle of the sentence:\n1. xxxx.\n2. yyyy.\n"
    )
}

pub struct LlmClient {
    client: Client,
    config: GeneratorConfig,
}

impl LlmClient {
    pub fn new(config: GeneratorConfig) -> Result<Self, GenerationError> {
        if config.provider == LlmProvider::OpenAI && config.api_key.is_none() {
            return Err(GenerationError::Config(
                "OPENAI_API_KEY must be set for the openai provider".to_string(),
            ));
        }
        Ok(Self {
            client: Client::new(),
            config,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    /// Send a chat prompt and return the first response
    pub async fn chat(&self, user_message: &str) -> Result<String, GenerationError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let req_body = ChatRequest {
            model: &self.config.model,
            messages: vec![Message { role: "user", content: user_message }],
            max_tokens: self.config.max_tokens,
        };

        let mut request = self.client.post(url).json(&req_body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await?
            .error_for_status()? // convert non-200 into error
            .json::<ChatResponse>()
            .await?;

        Ok(response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default())
    }
}

#[async_trait]
impl SentenceGenerator for LlmClient {
    async fn generate(&self, count: usize) -> Result<PathBuf, GenerationError> {
        info!("Generating {} sentences with {}", count, self.config.model);
        let reply = self.chat(&sentence_prompt(count)).await?;

        let lines = extract_numbered(&reply);
        if lines.is_empty() {
            warn!("LLM reply contained no numbered sentences");
            return Err(GenerationError::Unavailable("reply contained no numbered sentences".to_string()));
        }

        let dir = self.config.output_dir.clone();
        let path = tokio::task::spawn_blocking(move || sentences::save_next(&dir, &lines))
            .await
            .map_err(|e| GenerationError::Unavailable(format!("Task join error: {e}")))??;
        info!("Generated sentences saved to {}", path.display());
        Ok(path)
    }
}
