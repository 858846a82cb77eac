//! # nexus-inference
//!
//! Multi-provider generation layer for the Nexus AI pipeline.
//!
//! This crate provides:
//! - Provider adapters for OpenAI-compatible APIs (OpenAI, OpenRouter) and Gemini
//! - An ordered fallback executor for text, image, and embedding chains
//! - Artifact persistence for generated images
//! - A local helper process as the last image fallback
//! - Environment-driven chain and credential configuration
//!
//! # Feature Flags
//!
//! - `mock`: Expose scripted mock providers for downstream tests
//!
//! # Example
//!
//! ```rust,no_run
//! use nexus_core::TextRequest;
//! use nexus_inference::InferenceConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let executor = InferenceConfig::from_env().unwrap().build_executor().unwrap();
//!     let text = executor.generate_text(&TextRequest::new("Summarize our Q3 goals").json()).await;
//!     println!("{text:?}");
//! }
//! ```

pub mod artifact;
pub mod config;
pub mod fallback;
pub mod gemini;
pub mod helper;
mod http;
pub mod image;
pub mod openai;

// Scripted mock providers for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use nexus_core::*;

pub use artifact::{decode_data_url, sanitize_label, ArtifactPersister};
pub use config::{ChainConfig, InferenceConfig, ProviderSettings};
pub use fallback::{execute_chain, strip_code_fences, FallbackExecutor};
pub use gemini::{GeminiBackend, GeminiConfig};
pub use helper::{HelperConfig, LocalHelper};
pub use image::{ImageService, LOCAL_HELPER_LABEL};
pub use openai::{OpenAIBackend, OpenAIConfig};
