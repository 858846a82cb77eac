//! OpenAI-compatible provider adapter (OpenAI, OpenRouter).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use nexus_core::{
    defaults, EmbeddingProvider, Error, ImagePayload, ImageProvider, ImageRequest, ModelConfig,
    Provider, Result, TextProvider, TextRequest,
};

use super::types::*;
use crate::http::{check_dimension, send_json};

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// Bearer token (optional for local endpoints).
    pub api_key: Option<String>,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
    /// HTTP-Referer header for OpenRouter attribution (optional).
    pub http_referer: Option<String>,
    /// X-Title header for app name on OpenRouter (optional).
    pub x_title: Option<String>,
    /// Expected embedding dimension; checked when set.
    pub embed_dimension: Option<usize>,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::OPENAI_URL.to_string(),
            api_key: None,
            timeout_seconds: defaults::PROVIDER_TIMEOUT_SECS,
            http_referer: None,
            x_title: None,
            embed_dimension: None,
        }
    }
}

impl OpenAIConfig {
    /// OpenAI cloud settings.
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    /// OpenRouter settings with the attribution title set.
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self {
            base_url: defaults::OPENROUTER_URL.to_string(),
            api_key: Some(api_key.into()),
            x_title: Some(defaults::OPENROUTER_TITLE.to_string()),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Adapter for one model behind an OpenAI-compatible API.
pub struct OpenAIBackend {
    client: Client,
    config: OpenAIConfig,
    model: ModelConfig,
}

impl OpenAIBackend {
    pub fn new(model: ModelConfig, config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        debug!(
            subsystem = "inference",
            component = "openai",
            provider = %model.provider,
            model = %model.model,
            base_url = %config.base_url,
            "Initializing OpenAI-compatible adapter"
        );

        Ok(Self {
            client,
            config,
            model,
        })
    }

    /// Get the current configuration.
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    /// Build a request with authentication and attribution headers.
    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let mut req = self.client.post(&url);

        if let Some(ref api_key) = self.config.api_key {
            req = req.bearer_auth(api_key);
        }
        if let Some(ref referer) = self.config.http_referer {
            req = req.header("HTTP-Referer", referer);
        }
        if let Some(ref title) = self.config.x_title {
            req = req.header("X-Title", title);
        }

        req.header("Content-Type", "application/json")
    }

    async fn chat(&self, request: &ChatCompletionRequest) -> Result<ResponseMessage> {
        let response: ChatCompletionResponse =
            send_json(self.build_request("/chat/completions").json(request)).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .ok_or_else(|| Error::MalformedResponse("Response has no choices".to_string()))
    }
}

impl Provider for OpenAIBackend {
    fn model_config(&self) -> &ModelConfig {
        &self.model
    }
}

#[async_trait]
impl TextProvider for OpenAIBackend {
    async fn generate_text(&self, request: &TextRequest) -> Result<String> {
        let start = Instant::now();
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref().filter(|s| !s.is_empty()) {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(&request.prompt));

        let format_type = if request.json_output {
            "json_object"
        } else {
            "text"
        };
        let body = ChatCompletionRequest {
            model: self.model.model.clone(),
            messages,
            response_format: Some(ResponseFormat {
                format_type: format_type.to_string(),
            }),
            modalities: None,
            image_config: None,
        };

        let content = self
            .chat(&body)
            .await?
            .content
            .ok_or_else(|| Error::MalformedResponse("Message has no content".to_string()))?;

        debug!(
            subsystem = "inference",
            component = "openai",
            model = %self.model.model,
            prompt_len = request.prompt.len(),
            response_len = content.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Text generation complete"
        );
        Ok(content)
    }
}

#[async_trait]
impl ImageProvider for OpenAIBackend {
    async fn generate_image(&self, request: &ImageRequest) -> Result<ImagePayload> {
        let body = ChatCompletionRequest {
            model: self.model.model.clone(),
            messages: vec![ChatMessage::user(&request.prompt)],
            response_format: None,
            modalities: Some(vec!["image".to_string(), "text".to_string()]),
            image_config: Some(ImageConfig {
                aspect_ratio: request.aspect_ratio.clone(),
            }),
        };

        let message = self.chat(&body).await?;
        message
            .images
            .first()
            .map(|img| ImagePayload::from(img.image_url.url()))
            .filter(|p| !p.as_str().is_empty())
            .ok_or_else(|| Error::MalformedResponse("Response contains no image".to_string()))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIBackend {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let body = EmbeddingRequest {
            model: self.model.model.clone(),
            input: text.to_string(),
        };
        let response: EmbeddingResponse =
            send_json(self.build_request("/embeddings").json(&body)).await?;

        let vector = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Error::MalformedResponse("Response has no embedding data".to_string()))?;
        check_dimension(vector, self.config.embed_dimension)
    }
}
