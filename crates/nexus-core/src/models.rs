//! Data model for generation chains, knowledge documents, and artifacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// =============================================================================
// PROVIDERS AND CHAINS
// =============================================================================

/// Wire family of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google Generative Language API, authenticated with an API key header.
    Gemini,
    /// OpenRouter (OpenAI-compatible chat completions, bearer token).
    OpenRouter,
    /// OpenAI cloud API (bearer token).
    OpenAi,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
            Self::OpenRouter => write!(f, "openrouter"),
            Self::OpenAi => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openrouter" => Ok(Self::OpenRouter),
            "openai" => Ok(Self::OpenAi),
            other => Err(Error::Config(format!("Unknown provider: {}", other))),
        }
    }
}

/// Generation capability served by a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Text,
    Image,
    Embedding,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Image => write!(f, "image"),
            Self::Embedding => write!(f, "embedding"),
        }
    }
}

/// One entry in a fallback chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelConfig {
    pub provider: ProviderKind,
    pub model: String,
}

impl ModelConfig {
    pub fn new(provider: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Parse a `provider:model` slug.
    ///
    /// Only the first colon separates the provider, so model ids that
    /// contain colons (`mistralai/mistral-7b-instruct:free`) survive intact.
    pub fn parse_slug(slug: &str) -> Result<Self> {
        let (provider, model) = slug
            .trim()
            .split_once(':')
            .ok_or_else(|| Error::Config(format!("Expected provider:model, got '{}'", slug)))?;
        let model = model.trim();
        if model.is_empty() {
            return Err(Error::Config(format!("Empty model in slug '{}'", slug)));
        }
        Ok(Self::new(provider.parse()?, model))
    }

    /// Label used for logs and artifact names, e.g. `openrouter/openai/gpt-5-image`.
    pub fn label(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }
}

impl std::fmt::Display for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.provider, self.model)
    }
}

/// Ordered list of models for one capability. Never empty.
///
/// Deserialization goes through [`FallbackChain::new`], so an empty entry
/// list is rejected there too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFallbackChain")]
pub struct FallbackChain {
    capability: Capability,
    entries: Vec<ModelConfig>,
}

#[derive(Deserialize)]
struct RawFallbackChain {
    capability: Capability,
    entries: Vec<ModelConfig>,
}

impl TryFrom<RawFallbackChain> for FallbackChain {
    type Error = Error;

    fn try_from(raw: RawFallbackChain) -> Result<Self> {
        Self::new(raw.capability, raw.entries)
    }
}

impl FallbackChain {
    pub fn new(capability: Capability, entries: Vec<ModelConfig>) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::Config(format!(
                "{} fallback chain must have at least one entry",
                capability
            )));
        }
        Ok(Self {
            capability,
            entries,
        })
    }

    /// Parse a comma-separated list of `provider:model` slugs.
    pub fn parse(capability: Capability, spec: &str) -> Result<Self> {
        let entries = spec
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ModelConfig::parse_slug)
            .collect::<Result<Vec<_>>>()?;
        Self::new(capability, entries)
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn entries(&self) -> &[ModelConfig] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first(&self) -> Option<&ModelConfig> {
        self.entries.first()
    }
}

// =============================================================================
// REQUESTS AND PAYLOADS
// =============================================================================

/// Single-turn text generation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextRequest {
    pub prompt: String,
    #[serde(default)]
    pub system: Option<String>,
    /// Ask the provider for a structured (JSON) response.
    #[serde(default)]
    pub json_output: bool,
}

impl TextRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn json(mut self) -> Self {
        self.json_output = true;
        self
    }
}

/// Image generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub prompt: String,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
}

fn default_aspect_ratio() -> String {
    crate::defaults::IMAGE_ASPECT_RATIO.to_string()
}

impl ImageRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            aspect_ratio: default_aspect_ratio(),
        }
    }

    pub fn with_aspect_ratio(mut self, ratio: impl Into<String>) -> Self {
        self.aspect_ratio = ratio.into();
        self
    }
}

/// Raw image reference returned by a provider: a `data:` URL or a remote URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImagePayload(pub String);

impl ImagePayload {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_inline(&self) -> bool {
        self.0.starts_with("data:")
    }

    pub fn is_remote(&self) -> bool {
        self.0.starts_with("http://") || self.0.starts_with("https://")
    }
}

impl From<String> for ImagePayload {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ImagePayload {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// =============================================================================
// KNOWLEDGE BASE
// =============================================================================

/// A knowledge base document. Only `embedding` and `embedding_updated_at`
/// are written by this system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeDocument {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub embedding_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KnowledgeDocument {
    /// Present, non-empty, and every component finite.
    pub fn has_valid_embedding(&self) -> bool {
        self.valid_embedding().is_some()
    }

    pub fn valid_embedding(&self) -> Option<&[f32]> {
        match &self.embedding {
            Some(v) if !v.is_empty() && v.iter().all(|x| x.is_finite()) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Text that gets embedded for this document, capped at `max_chars`.
    pub fn embedding_text(&self, max_chars: usize) -> String {
        crate::error::truncate_chars(&format!("{}\n{}", self.title, self.content), max_chars)
    }

    pub fn citation(&self) -> &str {
        citation(self.source_url.as_deref(), &self.source)
    }
}

/// `source_url` when present and non-empty, `source` otherwise.
fn citation<'a>(source_url: Option<&'a str>, source: &'a str) -> &'a str {
    match source_url {
        Some(url) if !url.is_empty() => url,
        _ => source,
    }
}

/// A staged embedding write. The store assigns `embedding_updated_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingUpdate {
    pub document_id: String,
    pub embedding: Vec<f32>,
}

/// Filter for fetching candidate documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentFilter {
    /// Array-membership filter on `category`. `None` or empty matches all.
    pub categories: Option<Vec<String>>,
}

impl DocumentFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn categories(categories: Vec<String>) -> Self {
        Self {
            categories: Some(categories),
        }
    }

    pub fn matches(&self, doc: &KnowledgeDocument) -> bool {
        match &self.categories {
            Some(cats) if !cats.is_empty() => cats.iter().any(|c| c == &doc.category),
            _ => true,
        }
    }
}

/// One ranked retrieval hit. Computed per query, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalResult {
    pub document_id: String,
    pub title: String,
    pub content: String,
    pub category: String,
    pub source: String,
    pub source_url: Option<String>,
    pub tags: Vec<String>,
    pub similarity: f32,
}

impl RetrievalResult {
    pub fn from_document(doc: KnowledgeDocument, similarity: f32) -> Self {
        Self {
            document_id: doc.id,
            title: doc.title,
            content: doc.content,
            category: doc.category,
            source: doc.source,
            source_url: doc.source_url,
            tags: doc.tags,
            similarity,
        }
    }

    pub fn citation(&self) -> &str {
        citation(self.source_url.as_deref(), &self.source)
    }
}

// =============================================================================
// ARTIFACTS
// =============================================================================

/// A persisted, publicly addressable generated image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedArtifactRef {
    pub public_url: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub produced_by: String,
    pub produced_at: DateTime<Utc>,
}
