//! In-memory document store.
//!
//! Keeps documents in insertion order, which is also its fetch order. Records
//! every write so callers can assert on write counts and batch boundaries, and
//! can be told to fail writes to exercise error paths.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use nexus_core::{
    DocumentFilter, DocumentStore, EmbeddingUpdate, Error, KnowledgeDocument, Result,
};

/// [`DocumentStore`] backed by a vector behind an async lock.
#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: RwLock<Vec<KnowledgeDocument>>,
    single_writes: RwLock<Vec<String>>,
    batches: RwLock<Vec<usize>>,
    fail_fetch: AtomicBool,
    fail_updates: AtomicBool,
    fail_commits: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new(docs: Vec<KnowledgeDocument>) -> Self {
        Self {
            docs: RwLock::new(docs),
            ..Default::default()
        }
    }

    /// Make every subsequent `fetch` fail.
    pub fn fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `update_embedding` fail.
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `commit_batch` fail.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Current snapshot of a document.
    pub async fn get(&self, document_id: &str) -> Option<KnowledgeDocument> {
        self.docs
            .read()
            .await
            .iter()
            .find(|d| d.id == document_id)
            .cloned()
    }

    /// Ids written through `update_embedding`, in call order.
    pub async fn single_writes(&self) -> Vec<String> {
        self.single_writes.read().await.clone()
    }

    /// Size of every committed batch, in commit order.
    pub async fn committed_batches(&self) -> Vec<usize> {
        self.batches.read().await.clone()
    }

    /// Total embedding writes from both paths.
    pub async fn write_count(&self) -> usize {
        self.single_writes.read().await.len() + self.batches.read().await.iter().sum::<usize>()
    }
}

fn apply(docs: &mut [KnowledgeDocument], document_id: &str, embedding: Vec<f32>) -> Result<()> {
    let doc = docs
        .iter_mut()
        .find(|d| d.id == document_id)
        .ok_or_else(|| Error::NotFound(format!("Knowledge document {}", document_id)))?;
    doc.embedding = Some(embedding);
    doc.embedding_updated_at = Some(Utc::now());
    Ok(())
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn fetch(&self, filter: &DocumentFilter) -> Result<Vec<KnowledgeDocument>> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(Error::Storage("document store unavailable".to_string()));
        }
        Ok(self
            .docs
            .read()
            .await
            .iter()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect())
    }

    async fn update_embedding(&self, document_id: &str, embedding: Vec<f32>) -> Result<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(Error::Storage(format!("write rejected for {}", document_id)));
        }
        apply(&mut self.docs.write().await, document_id, embedding)?;
        self.single_writes.write().await.push(document_id.to_string());
        Ok(())
    }

    async fn commit_batch(&self, updates: Vec<EmbeddingUpdate>) -> Result<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(Error::Storage("batch commit rejected".to_string()));
        }
        let mut docs = self.docs.write().await;
        // Validate first so a bad id leaves the batch unapplied.
        for update in &updates {
            if !docs.iter().any(|d| d.id == update.document_id) {
                return Err(Error::NotFound(format!(
                    "Knowledge document {}",
                    update.document_id
                )));
            }
        }
        let count = updates.len();
        for update in updates {
            apply(&mut docs, &update.document_id, update.embedding)?;
        }
        self.batches.write().await.push(count);
        Ok(())
    }
}
