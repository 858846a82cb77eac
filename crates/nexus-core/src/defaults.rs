//! Centralized default constants for the Nexus AI pipeline.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates should reference these constants instead of defining their own
//! magic numbers.

// =============================================================================
// PROVIDERS
// =============================================================================

/// Default OpenRouter API base URL.
pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1";

/// Default OpenAI API base URL.
pub const OPENAI_URL: &str = "https://api.openai.com/v1";

/// Default Google Generative Language API base URL.
pub const GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Per-request timeout for provider calls.
pub const PROVIDER_TIMEOUT_SECS: u64 = 120;

/// Provider error bodies are cut to this many characters.
pub const ERROR_BODY_MAX_CHARS: usize = 500;

/// Default aspect ratio sent with image requests.
pub const IMAGE_ASPECT_RATIO: &str = "1:1";

/// Title sent to OpenRouter in the `X-Title` header.
pub const OPENROUTER_TITLE: &str = "Systemic Shift AI";

// =============================================================================
// CHAINS
// =============================================================================

/// Text generation chain, cheapest and most reliable first.
pub const TEXT_CHAIN: &[&str] = &[
    "gemini:gemini-2.5-flash",
    "gemini:gemini-2.5-flash-lite",
    "gemini:gemini-2.0-flash",
    "gemini:gemini-2.0-flash-lite",
    "openrouter:mistralai/mistral-7b-instruct:free",
    "openrouter:openai/gpt-3.5-turbo",
    "openrouter:z-ai/glm-4-32b",
    "openrouter:openai/gpt-oss-20b:free",
    "openrouter:openai/gpt-oss-120b",
    "openrouter:z-ai/glm-4.5-air:free",
    "openrouter:openai/gpt-5-nano",
];

/// Image generation chain.
pub const IMAGE_CHAIN: &[&str] = &[
    "openrouter:openai/gpt-5-image-mini",
    "openrouter:google/gemini-2.5-flash-image-preview",
    "openrouter:google/gemini-2.5-flash-image",
    "openrouter:openai/gpt-5-image",
];

/// Embedding chain.
pub const EMBED_CHAIN: &[&str] = &[
    "openai:text-embedding-3-small",
    "openrouter:openai/text-embedding-3-small",
];

// =============================================================================
// RETRIEVAL
// =============================================================================

/// Characters of `title + content` sent to the embedding model.
pub const EMBED_TEXT_MAX_CHARS: usize = 8000;

/// Default number of documents returned by retrieval.
pub const RETRIEVAL_TOP_K: usize = 3;

/// Default character budget for assembled context.
pub const CONTEXT_MAX_LENGTH: usize = 3000;

/// Minimum content characters worth emitting in a truncated context block.
pub const CONTEXT_MIN_TRUNCATED: usize = 50;

// =============================================================================
// BACKFILL
// =============================================================================

/// Documents per committed batch.
pub const BACKFILL_BATCH_SIZE: usize = 10;

/// Pause between batch commits.
pub const BACKFILL_PAUSE_MS: u64 = 500;

// =============================================================================
// LOCAL HELPER
// =============================================================================

/// Wall-clock limit for the local image helper.
pub const HELPER_TIMEOUT_SECS: u64 = 120;

/// Captured stdout limit for the local image helper.
pub const HELPER_MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Environment variable carrying the helper's credential.
pub const HELPER_CREDENTIAL_ENV: &str = "OPENROUTER_API_KEY";

/// Script locations probed in order.
pub const HELPER_SCRIPTS: &[&str] = &[
    "scripts/generate_image.py",
    "functions/scripts/image_generator.py",
    "/opt/nexus/scripts/generate_image.py",
];

/// Interpreters tried in order.
pub const HELPER_INTERPRETERS: &[&str] = &["python3", "python"];

// =============================================================================
// ARTIFACTS
// =============================================================================

/// Blob folder for generated images.
pub const IMAGE_FOLDER: &str = "generated_images";

/// Timeout for downloading remote artifacts.
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;
