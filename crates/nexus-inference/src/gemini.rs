//! Google Generative Language adapter.
//!
//! Authenticates with an API key in the `x-goog-api-key` header. Text and
//! images go through `models/{model}:generateContent`, embeddings through
//! `models/{model}:embedContent`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use nexus_core::{
    defaults, EmbeddingProvider, Error, ImagePayload, ImageProvider, ImageRequest, ModelConfig,
    Provider, Result, TextProvider, TextRequest,
};

use crate::http::{check_dimension, send_json};

/// Connection settings for the Gemini API.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_seconds: u64,
    /// Expected embedding dimension; checked when set.
    pub embed_dimension: Option<usize>,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: defaults::GEMINI_URL.to_string(),
            api_key: api_key.into(),
            timeout_seconds: defaults::PROVIDER_TIMEOUT_SECS,
            embed_dimension: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_config: Option<GeminiImageConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiImageConfig {
    aspect_ratio: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Serialize)]
struct EmbedContentRequest {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: Option<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

// =============================================================================
// ADAPTER
// =============================================================================

/// Adapter for one Gemini model.
pub struct GeminiBackend {
    client: Client,
    config: GeminiConfig,
    model: ModelConfig,
}

impl GeminiBackend {
    pub fn new(model: ModelConfig, config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            config,
            model,
        })
    }

    fn build_request(&self, action: &str) -> reqwest::RequestBuilder {
        let url = format!(
            "{}/models/{}:{}",
            self.config.base_url.trim_end_matches('/'),
            self.model.model,
            action
        );
        self.client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .header("Content-Type", "application/json")
    }

    async fn generate_content(&self, body: &GenerateContentRequest) -> Result<Vec<Part>> {
        let response: GenerateContentResponse =
            send_json(self.build_request("generateContent").json(body)).await?;
        response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts)
            .filter(|parts| !parts.is_empty())
            .ok_or_else(|| Error::MalformedResponse("Response has no candidates".to_string()))
    }
}

fn user_content(text: &str) -> Content {
    Content {
        role: Some("user".to_string()),
        parts: vec![Part::text(text)],
    }
}

impl Provider for GeminiBackend {
    fn model_config(&self) -> &ModelConfig {
        &self.model
    }
}

#[async_trait]
impl TextProvider for GeminiBackend {
    async fn generate_text(&self, request: &TextRequest) -> Result<String> {
        let start = Instant::now();
        let body = GenerateContentRequest {
            contents: vec![user_content(&request.prompt)],
            system_instruction: request
                .system
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(|s| Content {
                    role: None,
                    parts: vec![Part::text(s)],
                }),
            generation_config: request.json_output.then(|| GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
                ..Default::default()
            }),
        };

        let parts = self.generate_content(&body).await?;
        let texts: Vec<String> = parts.into_iter().filter_map(|p| p.text).collect();
        if texts.is_empty() {
            return Err(Error::MalformedResponse("Response has no text parts".to_string()));
        }
        let text = texts.concat();

        debug!(
            subsystem = "inference",
            component = "gemini",
            model = %self.model.model,
            prompt_len = request.prompt.len(),
            response_len = text.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Text generation complete"
        );
        Ok(text)
    }
}

#[async_trait]
impl ImageProvider for GeminiBackend {
    async fn generate_image(&self, request: &ImageRequest) -> Result<ImagePayload> {
        let body = GenerateContentRequest {
            contents: vec![user_content(&request.prompt)],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["TEXT".to_string(), "IMAGE".to_string()]),
                image_config: Some(GeminiImageConfig {
                    aspect_ratio: request.aspect_ratio.clone(),
                }),
                ..Default::default()
            }),
        };

        let parts = self.generate_content(&body).await?;
        parts
            .into_iter()
            .find_map(|p| p.inline_data)
            .map(|d| ImagePayload(format!("data:{};base64,{}", d.mime_type, d.data)))
            .ok_or_else(|| Error::MalformedResponse("Response contains no image".to_string()))
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiBackend {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let body = EmbedContentRequest {
            content: Content {
                role: None,
                parts: vec![Part::text(text)],
            },
        };
        let response: EmbedContentResponse =
            send_json(self.build_request("embedContent").json(&body)).await?;
        let vector = response
            .embedding
            .map(|e| e.values)
            .ok_or_else(|| Error::MalformedResponse("Response has no embedding".to_string()))?;
        check_dimension(vector, self.config.embed_dimension)
    }
}
