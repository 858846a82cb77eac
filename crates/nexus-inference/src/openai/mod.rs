//! OpenAI-compatible provider adapter.
//!
//! Serves the `openai` and `openrouter` chain entries: bearer auth, the chat
//! completions endpoint for text and images, and the embeddings endpoint.
//!
//! # Example
//!
//! ```rust,no_run
//! use nexus_core::{ModelConfig, ProviderKind, TextProvider, TextRequest};
//! use nexus_inference::openai::{OpenAIBackend, OpenAIConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let model = ModelConfig::new(ProviderKind::OpenRouter, "openai/gpt-3.5-turbo");
//!     let backend = OpenAIBackend::new(model, OpenAIConfig::openrouter("sk-or-...")).unwrap();
//!     let text = backend.generate_text(&TextRequest::new("Hello")).await.unwrap();
//!     println!("{text}");
//! }
//! ```

mod backend;
mod types;

pub use backend::{OpenAIBackend, OpenAIConfig};
pub use types::*;
