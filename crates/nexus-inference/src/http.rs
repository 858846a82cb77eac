//! Response handling shared by the HTTP adapters.

use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;

use nexus_core::{Error, Result};

/// Send a request and decode a JSON body.
///
/// Network failures and non-2xx statuses become [`Error::Transport`]; a 2xx
/// body that is not declared as JSON or does not match `T` becomes
/// [`Error::MalformedResponse`]. Request URLs are stripped from transport
/// errors.
pub(crate) async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let response = request
        .send()
        .await
        .map_err(|e| Error::transport(None, e.without_url().to_string()))?;
    decode_json(response).await
}

pub(crate) async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::transport(Some(status.as_u16()), body));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !content_type.to_ascii_lowercase().contains("json") {
        return Err(Error::MalformedResponse(format!(
            "Expected JSON response, got content-type '{}'",
            content_type
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::transport(Some(status.as_u16()), e.without_url().to_string()))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::MalformedResponse(format!("Failed to parse response: {}", e)))
}

/// Check a returned vector against the configured dimension.
pub(crate) fn check_dimension(vector: Vec<f32>, expected: Option<usize>) -> Result<Vec<f32>> {
    if vector.is_empty() {
        return Err(Error::MalformedResponse("Empty embedding".to_string()));
    }
    match expected {
        Some(dim) if dim != vector.len() => Err(Error::MalformedResponse(format!(
            "Embedding dimension mismatch: expected {}, got {}",
            dim,
            vector.len()
        ))),
        _ => Ok(vector),
    }
}
