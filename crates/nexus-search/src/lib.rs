//! # nexus-search
//!
//! Retrieval-augmented generation support for the Nexus AI pipeline.
//!
//! This crate provides:
//! - Cosine similarity over embedding vectors
//! - A retriever that ranks knowledge base documents against a query,
//!   embedding documents that have no vector yet
//! - Bounded context assembly for chat prompts
//!
//! ## Example
//!
//! ```ignore
//! use nexus_search::{build_context, RagRetriever};
//!
//! let retriever = RagRetriever::new(executor, store);
//! let results = retriever.retrieve("What are our Q3 goals?", 3, None).await;
//! let context = build_context(&results, 3000);
//! ```

pub mod context;
pub mod retriever;
pub mod similarity;

// Re-export core types
pub use nexus_core::*;

pub use context::{build_context, CONTEXT_HEADER};
pub use retriever::{AugmentedPrompt, RagRetriever};
pub use similarity::cosine_similarity;
