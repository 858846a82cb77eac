//! Shared application state.

use std::sync::Arc;

use nexus_db::FilesystemBlobStore;
use nexus_inference::{FallbackExecutor, ImageService};
use nexus_jobs::EmbeddingBackfillJob;
use nexus_search::RagRetriever;

/// Services shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<FallbackExecutor>,
    pub images: Arc<ImageService>,
    pub retriever: Arc<RagRetriever>,
    pub backfill: Arc<EmbeddingBackfillJob>,
    /// Artifact storage behind `/files`.
    pub files: Arc<FilesystemBlobStore>,
}
