//! Ordered fallback across provider chains.
//!
//! A chain is tried strictly in order, one attempt at a time. The first
//! success wins and later entries are never called. When every entry fails
//! the caller gets [`Error::AggregateFailure`] carrying the last error.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use nexus_core::{
    Capability, EmbeddingProvider, Error, ImagePayload, ImageProvider, ImageRequest, Provider,
    Result, TextProvider, TextRequest,
};

/// Run `attempt` against each provider in order until one succeeds.
pub async fn execute_chain<'a, P, T, F, Fut>(
    capability: Capability,
    chain: &'a [Arc<P>],
    mut attempt: F,
) -> Result<T>
where
    P: Provider + ?Sized,
    F: FnMut(&'a P) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if chain.is_empty() {
        return Err(Error::Config(format!(
            "No {} providers configured",
            capability
        )));
    }

    let mut last_error = None;
    for (index, provider) in chain.iter().enumerate() {
        let model = provider.model_config();
        let start = Instant::now();
        debug!(
            subsystem = "inference",
            component = "fallback",
            capability = %capability,
            provider = %model.provider,
            model = %model.model,
            attempt = index + 1,
            "Attempting provider"
        );

        match attempt(provider.as_ref()).await {
            Ok(value) => {
                info!(
                    subsystem = "inference",
                    component = "fallback",
                    capability = %capability,
                    provider = %model.provider,
                    model = %model.model,
                    attempt = index + 1,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Provider succeeded"
                );
                return Ok(value);
            }
            Err(e) => {
                warn!(
                    subsystem = "inference",
                    component = "fallback",
                    capability = %capability,
                    provider = %model.provider,
                    model = %model.model,
                    attempt = index + 1,
                    error = %e,
                    "Provider failed, trying next"
                );
                last_error = Some(e);
            }
        }
    }

    let last = last_error.unwrap_or_else(|| Error::Internal("empty chain".to_string()));
    warn!(
        subsystem = "inference",
        component = "fallback",
        capability = %capability,
        attempts = chain.len(),
        "All providers in chain failed"
    );
    Err(Error::AggregateFailure {
        capability,
        attempts: chain.len(),
        last: Box::new(last),
    })
}

// A fence pair wrapping the whole payload, with an optional language tag.
static OUTER_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z0-9_+-]*[ \t]*\n(.*?)\n?```\s*$").expect("valid fence regex")
});

/// Remove a markdown code fence wrapping the whole reply and trim it.
///
/// Models asked for JSON often wrap it in ```` ```json ```` fences; callers
/// get the bare payload. Fenced blocks inside prose are left alone.
pub fn strip_code_fences(text: &str) -> String {
    match OUTER_FENCE.captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// Provider chains for every capability.
#[derive(Clone, Default)]
pub struct FallbackExecutor {
    text: Vec<Arc<dyn TextProvider>>,
    image: Vec<Arc<dyn ImageProvider>>,
    embedding: Vec<Arc<dyn EmbeddingProvider>>,
}

impl FallbackExecutor {
    pub fn new(
        text: Vec<Arc<dyn TextProvider>>,
        image: Vec<Arc<dyn ImageProvider>>,
        embedding: Vec<Arc<dyn EmbeddingProvider>>,
    ) -> Self {
        Self {
            text,
            image,
            embedding,
        }
    }

    pub fn with_text(mut self, chain: Vec<Arc<dyn TextProvider>>) -> Self {
        self.text = chain;
        self
    }

    pub fn with_image(mut self, chain: Vec<Arc<dyn ImageProvider>>) -> Self {
        self.image = chain;
        self
    }

    pub fn with_embedding(mut self, chain: Vec<Arc<dyn EmbeddingProvider>>) -> Self {
        self.embedding = chain;
        self
    }

    pub fn text_chain(&self) -> &[Arc<dyn TextProvider>] {
        &self.text
    }

    pub fn image_chain(&self) -> &[Arc<dyn ImageProvider>] {
        &self.image
    }

    pub fn embedding_chain(&self) -> &[Arc<dyn EmbeddingProvider>] {
        &self.embedding
    }

    /// Generate text, returning the first success with code fences stripped.
    pub async fn generate_text(&self, request: &TextRequest) -> Result<String> {
        let raw = execute_chain(Capability::Text, &self.text, |p| p.generate_text(request)).await?;
        Ok(strip_code_fences(&raw))
    }

    /// Generate an image, returning the first provider's raw payload.
    pub async fn generate_image(&self, request: &ImageRequest) -> Result<ImagePayload> {
        execute_chain(Capability::Image, &self.image, |p| p.generate_image(request)).await
    }

    /// Embed a non-empty text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Embedding input must not be empty".to_string(),
            ));
        }
        execute_chain(Capability::Embedding, &self.embedding, |p| p.embed_text(text)).await
    }
}
