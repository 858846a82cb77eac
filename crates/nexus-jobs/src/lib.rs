//! # nexus-jobs
//!
//! Batch jobs for the Nexus AI pipeline.
//!
//! This crate provides:
//! - Embedding backfill over the whole knowledge base, committed in batches
//!   with a pause between batches to stay under provider rate limits
//!
//! ## Example
//!
//! ```ignore
//! use nexus_jobs::{BackfillConfig, EmbeddingBackfillJob};
//!
//! let job = EmbeddingBackfillJob::new(executor, store, BackfillConfig::from_env());
//! let report = job.run().await?;
//! println!("embedded {} documents", report.processed);
//! ```

pub mod backfill;

// Re-export core types
pub use nexus_core::*;

pub use backfill::{BackfillConfig, BackfillReport, EmbeddingBackfillJob};
