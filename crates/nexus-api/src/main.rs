//! Nexus API server.
//!
//! Exposes text and image generation, knowledge base search and embedding
//! backfill, and a retrieval-augmented chat endpoint over HTTP.

mod error;
mod handlers;
mod state;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nexus_core::{defaults, BlobStore, DocumentStore};
use nexus_db::{Database, FilesystemBlobStore, MemoryDocumentStore};
use nexus_inference::{
    ArtifactPersister, FallbackExecutor, HelperConfig, ImageService, InferenceConfig, LocalHelper,
};
use nexus_jobs::{BackfillConfig, EmbeddingBackfillJob};
use nexus_search::RagRetriever;

use crate::state::AppState;

/// Parse allowed CORS origins from `ALLOWED_ORIGINS` (comma-separated).
///
/// Returns `None` when unset, which allows any origin.
fn parse_allowed_origins() -> Option<Vec<HeaderValue>> {
    let origins_str = std::env::var("ALLOWED_ORIGINS").ok()?;
    if origins_str.trim().is_empty() {
        return None;
    }

    Some(
        origins_str
            .split(',')
            .filter_map(|s| {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                match trimmed.parse::<HeaderValue>() {
                    Ok(v) => Some(v),
                    Err(e) => {
                        warn!("Invalid CORS origin '{}': {}", trimmed, e);
                        None
                    }
                }
            })
            .collect(),
    )
}

/// Initialize tracing.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables daily-rotated file logging)
///   RUST_LOG    - standard env filter (default: "nexus=info,tower_http=info")
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "nexus_api=info,nexus_inference=info,nexus_search=info,nexus_jobs=info,nexus_db=info,tower_http=info"
            .into()
    });
    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = if let Some(ref path) = log_file {
        let file_dir = Path::new(path).parent().unwrap_or(Path::new("."));
        let file_name = Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("nexus-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false),
                )
                .init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );
    guard
}

fn env_or(name: &str, default: impl Into<String>) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.into())
}

/// Knowledge store: PostgreSQL when `DATABASE_URL` is set, memory otherwise.
async fn open_document_store() -> anyhow::Result<Arc<dyn DocumentStore>> {
    match std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()) {
        Some(url) => {
            let db = Database::connect(&url).await?;
            db.migrate().await?;
            info!(subsystem = "api", component = "startup", "Using PostgreSQL knowledge store");
            Ok(Arc::new(db.knowledge))
        }
        None => {
            warn!(
                subsystem = "api",
                component = "startup",
                "DATABASE_URL not set, using an empty in-memory knowledge store"
            );
            Ok(Arc::new(MemoryDocumentStore::default()))
        }
    }
}

/// Build the router. Published artifacts are served at `/files`.
fn build_router(state: AppState) -> Router {
    let cors = match parse_allowed_origins() {
        Some(origins) => CorsLayer::new().allow_origin(AllowOrigin::list(origins)),
        None => CorsLayer::new().allow_origin(Any),
    }
    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
    .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
    .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/generate/text", post(handlers::generate_text))
        .route("/api/v1/generate/image", post(handlers::generate_image))
        .route("/api/v1/knowledge/search", post(handlers::search_knowledge))
        .route("/api/v1/knowledge/embeddings", post(handlers::generate_embeddings))
        .route("/api/v1/chat", post(handlers::chat))
        .route("/files/*path", get(handlers::serve_file))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn build_state(
    executor: Arc<FallbackExecutor>,
    store: Arc<dyn DocumentStore>,
    files: Arc<FilesystemBlobStore>,
    image_folder: &str,
    helper: Option<LocalHelper>,
    backfill: BackfillConfig,
) -> anyhow::Result<AppState> {
    let blob_store: Arc<dyn BlobStore> = files.clone();
    let persister = Arc::new(ArtifactPersister::new(blob_store, image_folder)?);
    let mut images = ImageService::new(executor.clone(), persister);
    if let Some(helper) = helper {
        images = images.with_helper(helper);
    }

    Ok(AppState {
        retriever: Arc::new(RagRetriever::new(executor.clone(), store.clone())),
        backfill: Arc::new(EmbeddingBackfillJob::new(executor.clone(), store, backfill)),
        images: Arc::new(images),
        executor,
        files,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let _file_guard = init_logging();

    let port: u16 = std::env::var("SERVER_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(defaults::SERVER_PORT);

    let executor = Arc::new(InferenceConfig::from_env()?.build_executor()?);
    let store = open_document_store().await?;

    let blob_root = PathBuf::from(env_or("NEXUS_BLOB_ROOT", "./data/blobs"));
    tokio::fs::create_dir_all(&blob_root).await?;
    let public_base_url = env_or(
        "NEXUS_PUBLIC_BASE_URL",
        format!("http://localhost:{}/files", port),
    );
    let blob_store = Arc::new(FilesystemBlobStore::new(&blob_root, public_base_url.clone()));
    let image_folder = env_or("NEXUS_IMAGE_FOLDER", defaults::IMAGE_FOLDER);

    let state = build_state(
        executor,
        store,
        blob_store,
        &image_folder,
        Some(LocalHelper::new(HelperConfig::from_env())),
        BackfillConfig::from_env(),
    )?;

    info!(
        subsystem = "api",
        component = "startup",
        blob_root = %blob_root.display(),
        public_base_url = %public_base_url,
        image_folder = %image_folder,
        "Artifact storage configured"
    );

    let app = build_router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
