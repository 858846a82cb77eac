//! Scripted mock providers for deterministic testing.
//!
//! ## Usage
//!
//! ```rust
//! use nexus_core::ProviderKind;
//! use nexus_inference::mock::{MockFailure, MockProvider};
//!
//! let flaky = MockProvider::new(ProviderKind::Gemini, "a").failing(MockFailure::Transport(503));
//! let good = MockProvider::new(ProviderKind::OpenRouter, "b").returning_text("hello");
//! assert_eq!(flaky.call_count(), 0);
//! # let _ = good;
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use nexus_core::{
    EmbeddingProvider, Error, ImagePayload, ImageProvider, ImageRequest, ModelConfig, Provider,
    ProviderKind, Result, TextProvider, TextRequest,
};

/// Failure a mock produces. Turned into a fresh [`Error`] on every call.
#[derive(Debug, Clone, PartialEq)]
pub enum MockFailure {
    /// Non-2xx HTTP status.
    Transport(u16),
    /// Network failure with no response.
    Unreachable,
    /// 2xx response with the wrong shape.
    Malformed(String),
}

impl MockFailure {
    pub fn to_error(&self) -> Error {
        match self {
            MockFailure::Transport(status) => {
                Error::transport(Some(*status), format!("mock status {}", status))
            }
            MockFailure::Unreachable => Error::transport(None, "mock connection refused"),
            MockFailure::Malformed(msg) => Error::MalformedResponse(msg.clone()),
        }
    }
}

type Scripted<T> = Option<std::result::Result<T, MockFailure>>;

/// Mock adapter implementing every provider capability.
///
/// Capabilities that were never scripted fail with `MalformedResponse`.
#[derive(Clone)]
pub struct MockProvider {
    model: ModelConfig,
    text: Scripted<String>,
    image: Scripted<ImagePayload>,
    embedding: Scripted<Vec<f32>>,
    /// Embeddings keyed by a substring of the input; first match wins.
    embedding_rules: Vec<(String, std::result::Result<Vec<f32>, MockFailure>)>,
    latency: Option<Duration>,
    calls: Arc<AtomicUsize>,
    inputs: Arc<Mutex<Vec<String>>>,
}

impl MockProvider {
    pub fn new(provider: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            model: ModelConfig::new(provider, model),
            text: None,
            image: None,
            embedding: None,
            embedding_rules: Vec::new(),
            latency: None,
            calls: Arc::new(AtomicUsize::new(0)),
            inputs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn returning_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(Ok(text.into()));
        self
    }

    pub fn returning_image(mut self, payload: impl Into<ImagePayload>) -> Self {
        self.image = Some(Ok(payload.into()));
        self
    }

    pub fn returning_embedding(mut self, vector: Vec<f32>) -> Self {
        self.embedding = Some(Ok(vector));
        self
    }

    /// Return `vector` for inputs containing `needle`.
    pub fn embedding_for(mut self, needle: impl Into<String>, vector: Vec<f32>) -> Self {
        self.embedding_rules.push((needle.into(), Ok(vector)));
        self
    }

    /// Fail embedding inputs containing `needle`.
    pub fn failing_embedding_for(mut self, needle: impl Into<String>, failure: MockFailure) -> Self {
        self.embedding_rules.push((needle.into(), Err(failure)));
        self
    }

    /// Fail every capability.
    pub fn failing(mut self, failure: MockFailure) -> Self {
        self.text = Some(Err(failure.clone()));
        self.image = Some(Err(failure.clone()));
        self.embedding = Some(Err(failure));
        self
    }

    /// Sleep before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of calls across all capabilities.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts or texts received, in call order.
    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().map(|v| v.clone()).unwrap_or_default()
    }

    async fn record(&self, input: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut inputs) = self.inputs.lock() {
            inputs.push(input.to_string());
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn resolve<T: Clone>(&self, scripted: &Scripted<T>, capability: &str) -> Result<T> {
        match scripted {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(failure)) => Err(failure.to_error()),
            None => Err(Error::MalformedResponse(format!(
                "mock {} has no scripted {} response",
                self.model, capability
            ))),
        }
    }
}

impl Provider for MockProvider {
    fn model_config(&self) -> &ModelConfig {
        &self.model
    }
}

#[async_trait]
impl TextProvider for MockProvider {
    async fn generate_text(&self, request: &TextRequest) -> Result<String> {
        self.record(&request.prompt).await;
        self.resolve(&self.text, "text")
    }
}

#[async_trait]
impl ImageProvider for MockProvider {
    async fn generate_image(&self, request: &ImageRequest) -> Result<ImagePayload> {
        self.record(&request.prompt).await;
        self.resolve(&self.image, "image")
    }
}

#[async_trait]
impl EmbeddingProvider for MockProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        self.record(text).await;
        if let Some((_, outcome)) = self
            .embedding_rules
            .iter()
            .find(|(needle, _)| text.contains(needle.as_str()))
        {
            return outcome.clone().map_err(|f| f.to_error());
        }
        self.resolve(&self.embedding, "embedding")
    }
}
