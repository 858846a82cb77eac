//! Core traits for pipeline abstractions.
//!
//! These traits define the interfaces that concrete providers and stores
//! must satisfy, enabling pluggable backends and testability.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// PROVIDER TRAITS
// =============================================================================

/// Identity shared by every provider adapter.
pub trait Provider: Send + Sync {
    /// The chain entry this adapter serves.
    fn model_config(&self) -> &ModelConfig;
}

/// Adapter for single-turn text generation.
#[async_trait]
pub trait TextProvider: Provider {
    /// Generate text for the request. Returns the raw model output.
    async fn generate_text(&self, request: &TextRequest) -> Result<String>;
}

/// Adapter for image generation.
#[async_trait]
pub trait ImageProvider: Provider {
    /// Generate one image and return its raw reference.
    async fn generate_image(&self, request: &ImageRequest) -> Result<ImagePayload>;
}

/// Adapter for text embeddings.
#[async_trait]
pub trait EmbeddingProvider: Provider {
    /// Embed a single text blob.
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;
}

// =============================================================================
// STORE TRAITS
// =============================================================================

/// Document store holding the knowledge base.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch documents matching the filter, in the store's natural order.
    async fn fetch(&self, filter: &DocumentFilter) -> Result<Vec<KnowledgeDocument>>;

    /// Overwrite one document's embedding and stamp `embedding_updated_at`.
    async fn update_embedding(&self, document_id: &str, embedding: Vec<f32>) -> Result<()>;

    /// Apply a group of embedding updates atomically.
    async fn commit_batch(&self, updates: Vec<EmbeddingUpdate>) -> Result<()>;
}

/// Content type and descriptive metadata attached to a blob.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlobMetadata {
    pub content_type: String,
    pub metadata: HashMap<String, String>,
}

/// Handle to an object written to a blob store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub path: String,
    pub size_bytes: u64,
}

/// Blob store for generated artifacts.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write bytes under `path`, replacing any existing object.
    async fn write(&self, path: &str, data: &[u8], metadata: BlobMetadata) -> Result<ObjectRef>;

    /// Make the object publicly retrievable and return its public URL.
    async fn make_public(&self, object: &ObjectRef) -> Result<String>;
}
