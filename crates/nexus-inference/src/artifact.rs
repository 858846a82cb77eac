//! Persist raw image payloads as public blobs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use reqwest::Client;
use tracing::{debug, info};

use nexus_core::{
    defaults, BlobMetadata, BlobStore, Error, GeneratedArtifactRef, ImagePayload, Result,
};

const PNG: &str = "image/png";
const JPEG: &str = "image/jpeg";

/// Turns provider image output into a stored, publicly addressable object.
pub struct ArtifactPersister {
    blob_store: Arc<dyn BlobStore>,
    client: Client,
    folder: String,
}

impl ArtifactPersister {
    pub fn new(blob_store: Arc<dyn BlobStore>, folder: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(defaults::DOWNLOAD_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            blob_store,
            client,
            folder: folder.into().trim_matches('/').to_string(),
        })
    }

    /// Decode or download `raw`, store it, and return its public reference.
    pub async fn persist(
        &self,
        raw: &ImagePayload,
        producer_label: &str,
    ) -> Result<GeneratedArtifactRef> {
        let (mime, bytes) = if raw.is_inline() {
            decode_data_url(raw.as_str())?
        } else if raw.is_remote() {
            self.download(raw.as_str()).await?
        } else {
            return Err(Error::UnsupportedPayload(format!(
                "Expected data: or http(s) URL, got '{}'",
                nexus_core::truncate_chars(raw.as_str(), 64)
            )));
        };

        let produced_at = Utc::now();
        let path = object_name(&self.folder, producer_label, mime, produced_at.timestamp_millis());
        let mut metadata = HashMap::new();
        metadata.insert("producedBy".to_string(), producer_label.to_string());
        metadata.insert("producedAt".to_string(), produced_at.to_rfc3339());

        let object = self
            .blob_store
            .write(
                &path,
                &bytes,
                BlobMetadata {
                    content_type: mime.to_string(),
                    metadata,
                },
            )
            .await?;
        let public_url = self.blob_store.make_public(&object).await?;

        info!(
            subsystem = "inference",
            component = "artifact",
            op = "persist",
            producer = %producer_label,
            mime_type = mime,
            size_bytes = object.size_bytes,
            "Stored generated artifact"
        );

        Ok(GeneratedArtifactRef {
            public_url,
            mime_type: mime.to_string(),
            size_bytes: object.size_bytes,
            produced_by: producer_label.to_string(),
            produced_at,
        })
    }

    async fn download(&self, url: &str) -> Result<(&'static str, Vec<u8>)> {
        debug!(
            subsystem = "inference",
            component = "artifact",
            op = "download",
            url = %url,
            "Downloading remote artifact"
        );
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::DownloadFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::DownloadFailed(format!("HTTP {} for {}", status.as_u16(), url)));
        }

        let header_mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(recognized_mime);
        let mime = header_mime
            .or_else(|| mime_from_url(url))
            .unwrap_or(PNG);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::DownloadFailed(e.to_string()))?;
        Ok((mime, bytes.to_vec()))
    }
}

/// Split a `data:<mime>;base64,<payload>` URL into a normalized mime and bytes.
pub fn decode_data_url(url: &str) -> Result<(&'static str, Vec<u8>)> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| Error::UnsupportedPayload("Not a data URL".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::UnsupportedPayload("Data URL has no payload".to_string()))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| Error::UnsupportedPayload("Data URL is not base64-encoded".to_string()))?;

    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|e| Error::UnsupportedPayload(format!("Invalid base64 payload: {}", e)))?;
    if bytes.is_empty() {
        return Err(Error::UnsupportedPayload("Empty image payload".to_string()));
    }
    Ok((recognized_mime(mime).unwrap_or(PNG), bytes))
}

/// `image/png` or `image/jpeg` for the types we store; `None` otherwise.
fn recognized_mime(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "image/png" => Some(PNG),
        "image/jpeg" | "image/jpg" => Some(JPEG),
        _ => None,
    }
}

fn mime_from_url(url: &str) -> Option<&'static str> {
    let path = url.split(['?', '#']).next().unwrap_or_default().to_ascii_lowercase();
    if path.ends_with(".jpg") || path.ends_with(".jpeg") {
        Some(JPEG)
    } else if path.ends_with(".png") {
        Some(PNG)
    } else {
        None
    }
}

/// Replace everything outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn object_name(folder: &str, label: &str, mime: &str, unix_millis: i64) -> String {
    let extension = if mime == JPEG { "jpg" } else { "png" };
    let suffix: u32 = rand::random();
    let file = format!(
        "{}_{}_{:08x}.{}",
        unix_millis,
        sanitize_label(label),
        suffix,
        extension
    );
    if folder.is_empty() {
        file
    } else {
        format!("{}/{}", folder, file)
    }
}
