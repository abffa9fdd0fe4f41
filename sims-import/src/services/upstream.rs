//! Shared HTTP plumbing for the hosted backend's REST endpoints

use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;

use crate::error::UpstreamError;

const USER_AGENT: &str = concat!("sims-import/", env!("CARGO_PKG_VERSION"));

/// Fields the backend uses for human-readable error text, in lookup order
const MESSAGE_FIELDS: [&str; 4] = ["msg", "message", "error_description", "error"];

pub fn build_http_client(timeout: Duration) -> Result<Client, UpstreamError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| UpstreamError::Network(e.to_string()))
}

/// Turn a non-success response into an [`UpstreamError::Rejected`]
pub async fn rejection(response: Response) -> UpstreamError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    UpstreamError::Rejected {
        status: status.as_u16(),
        message: error_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Upstream request failed")
                .to_string()
        }),
    }
}

/// Extract the error text from a backend error body
///
/// JSON bodies are searched for `msg`, `message`, `error_description` and
/// `error`; a non-JSON body is returned as-is.
pub fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(body) {
        Ok(json) => MESSAGE_FIELDS
            .iter()
            .find_map(|field| json.get(field).and_then(Value::as_str))
            .map(str::to_string),
        Err(_) => Some(body.to_string()),
    }
}
