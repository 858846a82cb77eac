//! PostgreSQL knowledge base store.

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::debug;

use nexus_core::{
    DocumentFilter, DocumentStore, EmbeddingUpdate, Error, KnowledgeDocument, Result,
};

const SELECT_COLUMNS: &str = "id, title, content, category, tags, source, source_url, \
     embedding, embedding_updated_at, created_at, updated_at";

/// PostgreSQL implementation of [`DocumentStore`] over the `knowledge_base` table.
pub struct PgDocumentStore {
    pool: Pool<Postgres>,
}

impl PgDocumentStore {
    /// Create a new PgDocumentStore with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Insert or replace a document. Used by ingestion tooling and tests.
    pub async fn upsert(&self, doc: &KnowledgeDocument) -> Result<()> {
        sqlx::query(
            "INSERT INTO knowledge_base
                 (id, title, content, category, tags, source, source_url,
                  embedding, embedding_updated_at, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             ON CONFLICT (id) DO UPDATE SET
                 title = EXCLUDED.title,
                 content = EXCLUDED.content,
                 category = EXCLUDED.category,
                 tags = EXCLUDED.tags,
                 source = EXCLUDED.source,
                 source_url = EXCLUDED.source_url,
                 embedding = EXCLUDED.embedding,
                 embedding_updated_at = EXCLUDED.embedding_updated_at,
                 updated_at = EXCLUDED.updated_at",
        )
        .bind(&doc.id)
        .bind(&doc.title)
        .bind(&doc.content)
        .bind(&doc.category)
        .bind(&doc.tags)
        .bind(&doc.source)
        .bind(&doc.source_url)
        .bind(doc.embedding.clone().map(Vector::from))
        .bind(doc.embedding_updated_at)
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    /// Write one embedding inside an open transaction.
    pub async fn update_embedding_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        document_id: &str,
        embedding: Vec<f32>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE knowledge_base
             SET embedding = $2, embedding_updated_at = NOW()
             WHERE id = $1",
        )
        .bind(document_id)
        .bind(Vector::from(embedding))
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Knowledge document {}", document_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn fetch(&self, filter: &DocumentFilter) -> Result<Vec<KnowledgeDocument>> {
        let categories = filter.categories.as_ref().filter(|c| !c.is_empty());

        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS}
             FROM knowledge_base
             WHERE ($1::text[] IS NULL OR category = ANY($1))
             ORDER BY created_at, id"
        ))
        .bind(categories)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "knowledge",
            op = "fetch",
            result_count = rows.len(),
            "Fetched knowledge documents"
        );

        Ok(rows.iter().map(document_from_row).collect())
    }

    async fn update_embedding(&self, document_id: &str, embedding: Vec<f32>) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        self.update_embedding_tx(&mut tx, document_id, embedding).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn commit_batch(&self, updates: Vec<EmbeddingUpdate>) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let count = updates.len();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        for update in updates {
            self.update_embedding_tx(&mut tx, &update.document_id, update.embedding)
                .await?;
        }
        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "knowledge",
            op = "commit_batch",
            result_count = count,
            "Committed embedding batch"
        );
        Ok(())
    }
}

fn document_from_row(row: &sqlx::postgres::PgRow) -> KnowledgeDocument {
    let embedding: Option<Vector> = row.get("embedding");
    KnowledgeDocument {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        category: row.get("category"),
        tags: row.get("tags"),
        source: row.get("source"),
        source_url: row.get("source_url"),
        embedding: embedding.map(|v| v.to_vec()),
        embedding_updated_at: row.get("embedding_updated_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
