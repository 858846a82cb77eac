//! Route handlers.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use nexus_core::{defaults, GeneratedArtifactRef, ImageRequest, RetrievalResult, TextRequest};
use nexus_search::build_context;

use crate::error::ApiError;
use crate::state::AppState;

/// Instructions prepended to every chat prompt.
const CHAT_SYSTEM_PROMPT: &str = "You are the Systemic Shift assistant. \
Answer clearly and concisely, and cite sources when you use them.";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// =============================================================================
// GENERATION
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct GenerateTextBody {
    pub prompt: String,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
pub struct GenerateTextResponse {
    pub text: String,
}

pub async fn generate_text(
    State(state): State<AppState>,
    Json(body): Json<GenerateTextBody>,
) -> Result<Json<GenerateTextResponse>, ApiError> {
    if body.prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("prompt is required".to_string()));
    }

    let mut request = TextRequest::new(body.prompt);
    if let Some(system) = body.system.filter(|s| !s.trim().is_empty()) {
        request = request.with_system(system);
    }
    if body.json {
        request = request.json();
    }

    let text = state.executor.generate_text(&request).await?;
    Ok(Json(GenerateTextResponse { text }))
}

#[derive(Debug, Deserialize)]
pub struct GenerateImageBody {
    pub prompt: String,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateImageResponse {
    pub status: &'static str,
    pub image_url: String,
    pub artifact: GeneratedArtifactRef,
}

pub async fn generate_image(
    State(state): State<AppState>,
    Json(body): Json<GenerateImageBody>,
) -> Result<Json<GenerateImageResponse>, ApiError> {
    let mut request = ImageRequest::new(body.prompt);
    if let Some(ratio) = body.aspect_ratio.filter(|r| !r.trim().is_empty()) {
        request = request.with_aspect_ratio(ratio);
    }

    let artifact = state.images.generate(&request).await?;
    Ok(Json(GenerateImageResponse {
        status: "ok",
        image_url: artifact.public_url.clone(),
        artifact,
    }))
}

/// Serve a published artifact. Anything else is a 404.
pub async fn serve_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    let object = state.files.read_public(&path).await?;
    let content_type = if object.content_type.is_empty() {
        "application/octet-stream".to_string()
    } else {
        object.content_type
    };
    Ok(([(header::CONTENT_TYPE, content_type)], object.data).into_response())
}

// =============================================================================
// KNOWLEDGE BASE
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchBody {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub max_context_length: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<RetrievalResult>,
    pub context: String,
}

pub async fn search_knowledge(
    State(state): State<AppState>,
    Json(body): Json<SearchBody>,
) -> Result<Json<SearchResponse>, ApiError> {
    if body.query.trim().is_empty() {
        return Err(ApiError::BadRequest("query is required".to_string()));
    }

    let results = state
        .retriever
        .retrieve(
            &body.query,
            body.top_k.unwrap_or(defaults::RETRIEVAL_TOP_K),
            body.categories.as_deref(),
        )
        .await;
    let context = build_context(
        &results,
        body.max_context_length.unwrap_or(defaults::CONTEXT_MAX_LENGTH),
    );
    Ok(Json(SearchResponse { results, context }))
}

#[derive(Debug, Default, Deserialize)]
pub struct EmbeddingsBody {
    #[serde(default)]
    pub batch_size: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct EmbeddingsResponse {
    pub success: bool,
    pub processed: usize,
    pub message: String,
}

pub async fn generate_embeddings(
    State(state): State<AppState>,
    body: Option<Json<EmbeddingsBody>>,
) -> Result<Json<EmbeddingsResponse>, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let batch_size = body.batch_size.unwrap_or(defaults::BACKFILL_BATCH_SIZE);

    let processed = state.backfill.backfill_all(batch_size).await?;
    info!(
        subsystem = "api",
        component = "knowledge",
        op = "generate_embeddings",
        processed,
        "Embedding backfill finished"
    );
    Ok(Json(EmbeddingsResponse {
        success: true,
        processed,
        message: format!("Successfully generated embeddings for {} documents", processed),
    }))
}

// =============================================================================
// CHAT
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub message: String,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub sources: Vec<RetrievalResult>,
}

pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatBody>,
) -> Result<Json<ChatResponse>, ApiError> {
    if body.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message is required".to_string()));
    }

    let augmented = state
        .retriever
        .augment_prompt(
            CHAT_SYSTEM_PROMPT,
            &body.message,
            defaults::RETRIEVAL_TOP_K,
            body.categories.as_deref(),
        )
        .await;
    let reply = state
        .executor
        .generate_text(&TextRequest::new(augmented.prompt))
        .await?;

    Ok(Json(ChatResponse {
        reply,
        sources: augmented.sources,
    }))
}
