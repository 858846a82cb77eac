//! Semantic retrieval over the knowledge base.
//!
//! Retrieval never fails: provider or store errors are logged and produce an
//! empty result so the caller can still answer without context.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use nexus_core::{defaults, DocumentFilter, DocumentStore, Result, RetrievalResult};
use nexus_inference::FallbackExecutor;

use crate::context::build_context;
use crate::similarity::cosine_similarity;

/// A chat prompt enriched with knowledge base context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugmentedPrompt {
    pub prompt: String,
    pub sources: Vec<RetrievalResult>,
}

/// Embeds queries and ranks stored documents by cosine similarity.
pub struct RagRetriever {
    executor: Arc<FallbackExecutor>,
    store: Arc<dyn DocumentStore>,
    context_max_length: usize,
}

impl RagRetriever {
    pub fn new(executor: Arc<FallbackExecutor>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            executor,
            store,
            context_max_length: defaults::CONTEXT_MAX_LENGTH,
        }
    }

    /// Set the context budget used by [`augment_prompt`](Self::augment_prompt).
    pub fn with_context_max_length(mut self, max_length: usize) -> Self {
        self.context_max_length = max_length;
        self
    }

    /// Return up to `top_k` documents most similar to `query`.
    ///
    /// Documents without a usable embedding are embedded on the spot and the
    /// vector is written back. Ties keep the store's fetch order.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        categories: Option<&[String]>,
    ) -> Vec<RetrievalResult> {
        if top_k == 0 {
            return Vec::new();
        }

        let start = Instant::now();
        match self.rank(query, top_k, categories).await {
            Ok(results) => {
                info!(
                    subsystem = "search",
                    component = "retriever",
                    op = "retrieve",
                    result_count = results.len(),
                    top_similarity = results.first().map(|r| r.similarity),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Retrieval complete"
                );
                results
            }
            Err(e) => {
                warn!(
                    subsystem = "search",
                    component = "retriever",
                    op = "retrieve",
                    error = %e,
                    "Retrieval failed, continuing without context"
                );
                Vec::new()
            }
        }
    }

    async fn rank(
        &self,
        query: &str,
        top_k: usize,
        categories: Option<&[String]>,
    ) -> Result<Vec<RetrievalResult>> {
        let query_vector = self.executor.embed(query).await?;
        let filter = match categories {
            Some(c) if !c.is_empty() => DocumentFilter::categories(c.to_vec()),
            _ => DocumentFilter::all(),
        };
        let documents = self.store.fetch(&filter).await?;
        debug!(
            subsystem = "search",
            component = "retriever",
            candidates = documents.len(),
            dimension = query_vector.len(),
            "Scoring candidates"
        );

        let mut scored = Vec::with_capacity(documents.len());
        for doc in documents {
            let vector = match doc.valid_embedding() {
                Some(v) => v.to_vec(),
                None => {
                    let text = doc.embedding_text(defaults::EMBED_TEXT_MAX_CHARS);
                    match self.backfill(&doc.id, &text).await {
                        Some(v) => v,
                        None => continue,
                    }
                }
            };

            if vector.len() != query_vector.len() {
                warn!(
                    subsystem = "search",
                    component = "retriever",
                    document_id = %doc.id,
                    expected = query_vector.len(),
                    actual = vector.len(),
                    "Embedding dimension mismatch, skipping document"
                );
                continue;
            }

            let similarity = cosine_similarity(&query_vector, &vector);
            trace!(document_id = %doc.id, similarity, "Scored candidate");
            scored.push(RetrievalResult::from_document(doc, similarity));
        }

        // sort_by is stable, so equal scores keep fetch order.
        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    /// Embed a document that has no usable vector and store the result.
    ///
    /// Returns `None` when embedding fails. A failed write is logged and the
    /// fresh vector is still used for ranking.
    async fn backfill(&self, document_id: &str, text: &str) -> Option<Vec<f32>> {
        debug!(
            subsystem = "search",
            component = "retriever",
            document_id = %document_id,
            "Embedding document on demand"
        );
        let vector = match self.executor.embed(text).await {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    subsystem = "search",
                    component = "retriever",
                    document_id = %document_id,
                    error = %e,
                    "Failed to embed document, skipping"
                );
                return None;
            }
        };

        if let Err(e) = self.store.update_embedding(document_id, vector.clone()).await {
            warn!(
                subsystem = "search",
                component = "retriever",
                document_id = %document_id,
                error = %e,
                "Failed to store backfilled embedding"
            );
        }
        Some(vector)
    }

    /// Build a chat prompt from `base_prompt`, retrieved context, and the
    /// user's question.
    pub async fn augment_prompt(
        &self,
        base_prompt: &str,
        query: &str,
        top_k: usize,
        categories: Option<&[String]>,
    ) -> AugmentedPrompt {
        let sources = self.retrieve(query, top_k, categories).await;
        let context = build_context(&sources, self.context_max_length);

        let mut prompt = String::new();
        if !base_prompt.trim().is_empty() {
            prompt.push_str(base_prompt.trim());
            prompt.push_str("\n\n");
        }
        if !context.is_empty() {
            prompt.push_str(&context);
            prompt.push_str("\n\n");
            prompt.push_str(
                "Use the knowledge base information above when it is relevant. \
                 If the answer is not in it, say so.\n\n",
            );
        }
        prompt.push_str("User question: ");
        prompt.push_str(query.trim());

        AugmentedPrompt { prompt, sources }
    }
}
