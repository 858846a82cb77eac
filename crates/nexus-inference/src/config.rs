//! Provider and chain configuration.
//!
//! Everything is read from environment variables (a `.env` file is loaded by
//! the binary). Chains default to the lists in [`nexus_core::defaults`] and
//! can be overridden with comma-separated `provider:model` slugs:
//!
//! | Variable | Purpose |
//! |----------|---------|
//! | `NEXUS_TEXT_CHAIN` | Text generation chain |
//! | `NEXUS_IMAGE_CHAIN` | Image generation chain |
//! | `NEXUS_EMBED_CHAIN` | Embedding chain |
//! | `GEMINI_API_KEY`, `OPENROUTER_API_KEY`, `OPENAI_API_KEY` | Provider credentials |
//! | `GEMINI_BASE_URL`, `OPENROUTER_BASE_URL`, `OPENAI_BASE_URL` | Endpoint overrides |
//! | `NEXUS_PROVIDER_TIMEOUT_SECS` | Per-request timeout |
//! | `NEXUS_EMBED_DIM` | Expected embedding dimension |
//!
//! # Example
//!
//! ```rust,no_run
//! use nexus_inference::config::InferenceConfig;
//!
//! let config = InferenceConfig::from_env().expect("invalid chain configuration");
//! let executor = config.build_executor().expect("failed to build providers");
//! ```

use std::env;
use std::sync::Arc;

use tracing::{info, warn};

use nexus_core::{
    defaults, Capability, EmbeddingProvider, FallbackChain, ImageProvider, ModelConfig,
    ProviderKind, Result, TextProvider,
};

use crate::fallback::FallbackExecutor;
use crate::gemini::{GeminiBackend, GeminiConfig};
use crate::openai::{OpenAIBackend, OpenAIConfig};

/// One chain per capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub text: FallbackChain,
    pub image: FallbackChain,
    pub embedding: FallbackChain,
}

impl ChainConfig {
    /// The built-in chains.
    pub fn builtin() -> Result<Self> {
        Ok(Self {
            text: FallbackChain::parse(Capability::Text, &defaults::TEXT_CHAIN.join(","))?,
            image: FallbackChain::parse(Capability::Image, &defaults::IMAGE_CHAIN.join(","))?,
            embedding: FallbackChain::parse(
                Capability::Embedding,
                &defaults::EMBED_CHAIN.join(","),
            )?,
        })
    }

    /// Built-in chains with per-capability environment overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::builtin()?;
        if let Some(spec) = non_empty_var("NEXUS_TEXT_CHAIN") {
            config.text = FallbackChain::parse(Capability::Text, &spec)?;
        }
        if let Some(spec) = non_empty_var("NEXUS_IMAGE_CHAIN") {
            config.image = FallbackChain::parse(Capability::Image, &spec)?;
        }
        if let Some(spec) = non_empty_var("NEXUS_EMBED_CHAIN") {
            config.embedding = FallbackChain::parse(Capability::Embedding, &spec)?;
        }
        Ok(config)
    }
}

/// Credentials and endpoints per provider family.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub gemini_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub gemini_base_url: String,
    pub openrouter_base_url: String,
    pub openai_base_url: String,
    pub timeout_seconds: u64,
    pub embed_dimension: Option<usize>,
    /// Sent as `HTTP-Referer` to OpenRouter.
    pub http_referer: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            openrouter_api_key: None,
            openai_api_key: None,
            gemini_base_url: defaults::GEMINI_URL.to_string(),
            openrouter_base_url: defaults::OPENROUTER_URL.to_string(),
            openai_base_url: defaults::OPENAI_URL.to_string(),
            timeout_seconds: defaults::PROVIDER_TIMEOUT_SECS,
            embed_dimension: None,
            http_referer: None,
        }
    }
}

impl ProviderSettings {
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            gemini_api_key: non_empty_var("GEMINI_API_KEY"),
            openrouter_api_key: non_empty_var("OPENROUTER_API_KEY"),
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            gemini_base_url: non_empty_var("GEMINI_BASE_URL").unwrap_or(base.gemini_base_url),
            openrouter_base_url: non_empty_var("OPENROUTER_BASE_URL")
                .unwrap_or(base.openrouter_base_url),
            openai_base_url: non_empty_var("OPENAI_BASE_URL").unwrap_or(base.openai_base_url),
            timeout_seconds: non_empty_var("NEXUS_PROVIDER_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(base.timeout_seconds),
            embed_dimension: non_empty_var("NEXUS_EMBED_DIM").and_then(|v| v.parse().ok()),
            http_referer: non_empty_var("OPENROUTER_HTTP_REFERER"),
        }
    }

    fn api_key(&self, kind: ProviderKind) -> Option<&str> {
        match kind {
            ProviderKind::Gemini => self.gemini_api_key.as_deref(),
            ProviderKind::OpenRouter => self.openrouter_api_key.as_deref(),
            ProviderKind::OpenAi => self.openai_api_key.as_deref(),
        }
    }

    fn openai_config(&self, kind: ProviderKind, api_key: &str) -> OpenAIConfig {
        let mut config = match kind {
            ProviderKind::OpenRouter => OpenAIConfig::openrouter(api_key)
                .with_base_url(&self.openrouter_base_url),
            _ => OpenAIConfig::openai(api_key).with_base_url(&self.openai_base_url),
        };
        if kind == ProviderKind::OpenRouter {
            config.http_referer = self.http_referer.clone();
        }
        config.timeout_seconds = self.timeout_seconds;
        config.embed_dimension = self.embed_dimension;
        config
    }

    fn gemini_config(&self, api_key: &str) -> GeminiConfig {
        let mut config = GeminiConfig::new(api_key).with_base_url(&self.gemini_base_url);
        config.timeout_seconds = self.timeout_seconds;
        config.embed_dimension = self.embed_dimension;
        config
    }
}

/// Complete inference configuration.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub chains: ChainConfig,
    pub providers: ProviderSettings,
}

impl InferenceConfig {
    pub fn new(chains: ChainConfig, providers: ProviderSettings) -> Self {
        Self { chains, providers }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(ChainConfig::from_env()?, ProviderSettings::from_env()))
    }

    /// Build adapters for every chain entry that has credentials.
    ///
    /// Entries whose provider has no API key are skipped with a warning, so a
    /// deployment with only one key still gets a working (shorter) chain.
    pub fn build_executor(&self) -> Result<FallbackExecutor> {
        let text = self.build_chain(
            &self.chains.text,
            |b| Arc::new(b) as Arc<dyn TextProvider>,
            |b| Arc::new(b) as Arc<dyn TextProvider>,
        )?;
        let image = self.build_chain(
            &self.chains.image,
            |b| Arc::new(b) as Arc<dyn ImageProvider>,
            |b| Arc::new(b) as Arc<dyn ImageProvider>,
        )?;
        let embedding = self.build_chain(
            &self.chains.embedding,
            |b| Arc::new(b) as Arc<dyn EmbeddingProvider>,
            |b| Arc::new(b) as Arc<dyn EmbeddingProvider>,
        )?;

        info!(
            subsystem = "inference",
            component = "config",
            text_providers = text.len(),
            image_providers = image.len(),
            embedding_providers = embedding.len(),
            "Provider chains configured"
        );

        Ok(FallbackExecutor::new(text, image, embedding))
    }

    fn build_chain<T: ?Sized>(
        &self,
        chain: &FallbackChain,
        wrap_openai: impl Fn(OpenAIBackend) -> Arc<T>,
        wrap_gemini: impl Fn(GeminiBackend) -> Arc<T>,
    ) -> Result<Vec<Arc<T>>> {
        let mut adapters = Vec::with_capacity(chain.len());
        for entry in chain.entries() {
            let Some(api_key) = self.providers.api_key(entry.provider) else {
                warn!(
                    subsystem = "inference",
                    component = "config",
                    capability = %chain.capability(),
                    provider = %entry.provider,
                    model = %entry.model,
                    "No API key for provider, skipping chain entry"
                );
                continue;
            };
            adapters.push(self.build_adapter(entry, api_key, &wrap_openai, &wrap_gemini)?);
        }
        Ok(adapters)
    }

    fn build_adapter<T: ?Sized>(
        &self,
        entry: &ModelConfig,
        api_key: &str,
        wrap_openai: &impl Fn(OpenAIBackend) -> Arc<T>,
        wrap_gemini: &impl Fn(GeminiBackend) -> Arc<T>,
    ) -> Result<Arc<T>> {
        Ok(match entry.provider {
            ProviderKind::Gemini => wrap_gemini(GeminiBackend::new(
                entry.clone(),
                self.providers.gemini_config(api_key),
            )?),
            kind => wrap_openai(OpenAIBackend::new(
                entry.clone(),
                self.providers.openai_config(kind, api_key),
            )?),
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
