//! OpenAI-compatible AI backend implementation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use conspectium_core::{defaults, AiError, Error, NoteVariant, Result};

use super::error::{classify_transport, to_ai_error, OpenAIErrorCode};
use super::types::*;
use crate::backend::{AiBackend, QuizDraft, TranscriptionOutput, VariantDraft};
use crate::json::parse_model_json;
use crate::prompts::{note_variant_prompt, quiz_prompt, SYSTEM_PROMPT};

/// Configuration for an OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// API key for authentication (optional for local endpoints).
    pub api_key: Option<String>,
    /// Model used for note and quiz generation.
    pub gen_model: String,
    /// Model used for speech-to-text.
    pub transcribe_model: String,
    pub temperature: f32,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::OPENAI_URL.to_string(),
            api_key: None,
            gen_model: defaults::GEN_MODEL.to_string(),
            transcribe_model: defaults::TRANSCRIBE_MODEL.to_string(),
            temperature: defaults::GEN_TEMPERATURE,
            timeout_seconds: defaults::AI_TIMEOUT_SECS,
        }
    }
}

impl OpenAIConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `OPENAI_BASE_URL` | `https://api.openai.com/v1` | API endpoint |
    /// | `OPENAI_API_KEY` | unset | Bearer token |
    /// | `OPENAI_GEN_MODEL` | `gpt-4o-mini` | Note/quiz model |
    /// | `OPENAI_TRANSCRIBE_MODEL` | `whisper-1` | Speech-to-text model |
    /// | `OPENAI_TIMEOUT` | `300` | Request timeout (seconds) |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
            gen_model: std::env::var("OPENAI_GEN_MODEL").unwrap_or(defaults.gen_model),
            transcribe_model: std::env::var("OPENAI_TRANSCRIBE_MODEL")
                .unwrap_or(defaults.transcribe_model),
            temperature: defaults.temperature,
            timeout_seconds: std::env::var("OPENAI_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_seconds),
        }
    }

    /// Config for the text-only client, when `OPENAI_TEXT_API_KEY` is set.
    ///
    /// Identical to [`OpenAIConfig::from_env`] except for the key.
    pub fn text_from_env() -> Option<Self> {
        let key = std::env::var("OPENAI_TEXT_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())?;
        Some(Self {
            api_key: Some(key),
            ..Self::from_env()
        })
    }
}

/// OpenAI-compatible AI backend.
pub struct OpenAIBackend {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIBackend {
    /// Create a new OpenAI backend with the given configuration.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = "openai",
            url = %config.base_url,
            gen_model = %config.gen_model,
            transcribe_model = %config.transcribe_model,
            "Initializing OpenAI backend"
        );

        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(OpenAIConfig::from_env())
    }

    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint)
    }

    /// Build a POST request with authentication if configured.
    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.post(self.url(endpoint));
        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }
        req
    }

    /// Map a non-success response onto a classified error.
    async fn error_from_response(response: reqwest::Response) -> AiError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let (message, error_type) = match serde_json::from_str::<OpenAIErrorResponse>(&body) {
            Ok(parsed) => (parsed.error.message, parsed.error.error_type),
            Err(_) if body.is_empty() => (status.to_string(), String::new()),
            Err(_) => (body, String::new()),
        };
        let code = OpenAIErrorCode::from_response(status.as_u16(), &error_type);
        to_ai_error(code, &format!("OpenAI returned {}: {}", status, message))
    }

    /// Run one JSON-mode chat completion and decode the content as `T`.
    async fn chat_json<T: DeserializeOwned>(&self, prompt: String) -> std::result::Result<T, AiError> {
        let request = ChatCompletionRequest {
            model: self.config.gen_model.clone(),
            messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)],
            temperature: Some(self.config.temperature),
            response_format: Some(ResponseFormat::json_object()),
            stream: false,
        };

        let response = self
            .build_request("/chat/completions")
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let result: ChatCompletionResponse =
            response.json().await.map_err(|e| classify_transport(&e))?;

        let content = result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AiError::permanent("OpenAI returned no content"))?;

        parse_model_json(&content)
    }
}

#[async_trait]
impl AiBackend for OpenAIBackend {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> std::result::Result<TranscriptionOutput, AiError> {
        let start = Instant::now();
        let size = audio.len();

        let file_part = reqwest::multipart::Part::bytes(audio)
            .file_name(filename.to_string())
            .mime_str(mime_type)
            .map_err(|e| AiError::permanent(format!("Invalid audio mime type: {}", e)))?;

        let form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("model", self.config.transcribe_model.clone())
            .text("response_format", "verbose_json");

        let response = self
            .build_request("/audio/transcriptions")
            .multipart(form)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let result: TranscriptionResponse =
            response.json().await.map_err(|e| classify_transport(&e))?;

        debug!(
            model = %self.config.transcribe_model,
            size,
            transcript_len = result.text.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Transcription complete"
        );

        Ok(TranscriptionOutput {
            transcript: result.text,
            duration_sec: result.duration,
            language: result.language,
        })
    }

    async fn generate_note_variant(
        &self,
        text: &str,
        variant: NoteVariant,
    ) -> std::result::Result<VariantDraft, AiError> {
        let start = Instant::now();
        let draft: VariantDraft = self.chat_json(note_variant_prompt(text, variant)).await?;
        debug!(
            model = %self.config.gen_model,
            %variant,
            markdown_len = draft.markdown.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Note variant generated"
        );
        Ok(draft)
    }

    async fn generate_quiz(
        &self,
        text: &str,
        question_count: u32,
    ) -> std::result::Result<QuizDraft, AiError> {
        let start = Instant::now();
        let draft: QuizDraft = self.chat_json(quiz_prompt(text, question_count)).await?;
        debug!(
            model = %self.config.gen_model,
            questions = draft.questions.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Quiz generated"
        );
        Ok(draft)
    }

    fn model_name(&self) -> &str {
        &self.config.gen_model
    }
}
