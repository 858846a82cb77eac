//! Embedding backfill for the knowledge base.
//!
//! Documents that already carry a valid embedding are left untouched. The rest
//! are embedded one at a time and committed in batches; the job sleeps after
//! every full batch. A failed document is skipped, a failed commit aborts.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use nexus_core::{
    defaults, DocumentFilter, DocumentStore, EmbeddingUpdate, Error, KnowledgeDocument, Result,
};
use nexus_inference::FallbackExecutor;

/// Backfill batching settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillConfig {
    /// Documents per committed batch.
    pub batch_size: usize,
    /// Sleep after each full batch.
    pub pause: Duration,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::BACKFILL_BATCH_SIZE,
            pause: Duration::from_millis(defaults::BACKFILL_PAUSE_MS),
        }
    }
}

impl BackfillConfig {
    /// Load from `BACKFILL_BATCH_SIZE` and `BACKFILL_PAUSE_MS`.
    pub fn from_env() -> Self {
        let batch_size = std::env::var("BACKFILL_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::BACKFILL_BATCH_SIZE);

        let pause_ms = std::env::var("BACKFILL_PAUSE_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::BACKFILL_PAUSE_MS);

        Self {
            batch_size,
            pause: Duration::from_millis(pause_ms),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }
}

/// Outcome of one backfill run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillReport {
    /// Documents embedded and committed.
    pub processed: usize,
    /// Documents that already had a valid embedding.
    pub skipped: usize,
    /// Documents whose embedding failed.
    pub failed: usize,
    /// Batches committed.
    pub batches: usize,
}

/// Embeds every knowledge base document that lacks a valid vector.
pub struct EmbeddingBackfillJob {
    executor: Arc<FallbackExecutor>,
    store: Arc<dyn DocumentStore>,
    config: BackfillConfig,
}

impl EmbeddingBackfillJob {
    pub fn new(
        executor: Arc<FallbackExecutor>,
        store: Arc<dyn DocumentStore>,
        config: BackfillConfig,
    ) -> Self {
        Self {
            executor,
            store,
            config,
        }
    }

    /// Run with `batch_size` instead of the configured size and return the
    /// number of documents processed.
    pub async fn backfill_all(&self, batch_size: usize) -> Result<usize> {
        let config = self.config.clone().with_batch_size(batch_size);
        Ok(self.run_with(&config).await?.processed)
    }

    /// Run with the configured settings.
    pub async fn run(&self) -> Result<BackfillReport> {
        self.run_with(&self.config).await
    }

    async fn run_with(&self, config: &BackfillConfig) -> Result<BackfillReport> {
        if config.batch_size == 0 {
            return Err(Error::InvalidInput(
                "Backfill batch size must be at least 1".to_string(),
            ));
        }

        let start = Instant::now();
        let documents = self.store.fetch(&DocumentFilter::all()).await?;
        info!(
            subsystem = "jobs",
            component = "backfill",
            op = "start",
            documents = documents.len(),
            batch_size = config.batch_size,
            "Starting embedding backfill"
        );

        let mut report = BackfillReport::default();
        let mut staged: Vec<EmbeddingUpdate> = Vec::with_capacity(config.batch_size);

        for doc in &documents {
            if doc.has_valid_embedding() {
                debug!(
                    subsystem = "jobs",
                    component = "backfill",
                    document_id = %doc.id,
                    "Embedding present, skipping"
                );
                report.skipped += 1;
                continue;
            }

            match self.embed(doc).await {
                Ok(embedding) => staged.push(EmbeddingUpdate {
                    document_id: doc.id.clone(),
                    embedding,
                }),
                Err(e) => {
                    warn!(
                        subsystem = "jobs",
                        component = "backfill",
                        document_id = %doc.id,
                        error = %e,
                        "Failed to embed document"
                    );
                    report.failed += 1;
                    continue;
                }
            }

            if staged.len() >= config.batch_size {
                self.commit(&mut staged, &mut report).await?;
                tokio::time::sleep(config.pause).await;
            }
        }

        if !staged.is_empty() {
            self.commit(&mut staged, &mut report).await?;
        }

        info!(
            subsystem = "jobs",
            component = "backfill",
            op = "complete",
            processed = report.processed,
            skipped = report.skipped,
            failed = report.failed,
            batches = report.batches,
            duration_ms = start.elapsed().as_millis() as u64,
            "Embedding backfill complete"
        );
        Ok(report)
    }

    async fn embed(&self, doc: &KnowledgeDocument) -> Result<Vec<f32>> {
        self.executor
            .embed(&doc.embedding_text(defaults::EMBED_TEXT_MAX_CHARS))
            .await
    }

    async fn commit(
        &self,
        staged: &mut Vec<EmbeddingUpdate>,
        report: &mut BackfillReport,
    ) -> Result<()> {
        let batch = std::mem::take(staged);
        let size = batch.len();
        self.store.commit_batch(batch).await.inspect_err(|e| {
            warn!(
                subsystem = "jobs",
                component = "backfill",
                batch_size = size,
                error = %e,
                "Batch commit failed, aborting backfill"
            );
        })?;
        report.processed += size;
        report.batches += 1;
        info!(
            subsystem = "jobs",
            component = "backfill",
            batch_size = size,
            processed = report.processed,
            "Committed embedding batch"
        );
        Ok(())
    }
}
