//! # nexus-core
//!
//! Core types, traits, and abstractions for the Nexus AI pipeline.
//!
//! This crate provides the data model, error taxonomy, and trait definitions
//! that the other Nexus crates depend on.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{truncate_chars, Error, Result};
pub use models::*;
pub use traits::*;
