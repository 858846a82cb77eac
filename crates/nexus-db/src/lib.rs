//! # nexus-db
//!
//! Storage backends for the Nexus AI pipeline.
//!
//! This crate provides:
//! - Connection pool management
//! - A PostgreSQL + pgvector knowledge base store
//! - An in-memory knowledge base store for tests and local runs
//! - A filesystem blob store for generated artifacts
//!
//! ## Example
//!
//! ```rust,ignore
//! use nexus_db::{Database, DocumentFilter, DocumentStore};
//!
//! let db = Database::connect("postgres://localhost/nexus").await?;
//! let docs = db.knowledge.fetch(&DocumentFilter::all()).await?;
//! ```

pub mod blob;
pub mod knowledge;
pub mod memory;
pub mod pool;

// Re-export core types
pub use nexus_core::*;

pub use blob::{BlobSidecar, FilesystemBlobStore, PublicObject};
pub use knowledge::PgDocumentStore;
pub use memory::MemoryDocumentStore;
pub use pool::{create_pool, PoolConfig};

/// Database context holding the pool and the knowledge store.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Knowledge base store.
    pub knowledge: PgDocumentStore,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            knowledge: PgDocumentStore::new(pool.clone()),
            pool,
        }
    }

    /// Connect with pool settings from the environment.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url, PoolConfig::from_env()).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }
}
