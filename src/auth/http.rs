//! JSON-over-HTTP helpers shared by the authorization-server clients. They
//! enforce one timeout policy, map transport failures into `HttpError` and
//! never log request bodies, which carry signatures, codes and verifiers.

use super::error::HttpError;
use crate::APP_USER_AGENT;
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use url::Url;

/// Default request timeout applied when the caller does not configure one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Maximum number of error body characters surfaced to callers.
const MAX_ERROR_CHARS: usize = 200;

/// Build the shared reqwest client.
///
/// # Errors
/// Returns `HttpError::Serialization` if the TLS backend cannot be initialized.
pub fn build_client(timeout: Duration) -> Result<Client, HttpError> {
    Client::builder()
        .user_agent(APP_USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|err| HttpError::Serialization(format!("Failed to build HTTP client: {err}")))
}

/// Join a base URL and an absolute API path, keeping any base path prefix.
///
/// # Errors
/// Returns `HttpError::Serialization` when the result is not a valid URL.
pub fn build_url(base_url: &Url, path: &str) -> Result<Url, HttpError> {
    let base = base_url.as_str().trim_end_matches('/');
    let path = path.trim().trim_start_matches('/');

    Url::parse(&format!("{base}/{path}"))
        .map_err(|err| HttpError::Serialization(format!("Failed to build URL: {err}")))
}

/// POST a JSON body and decode a JSON response.
///
/// # Errors
/// Returns `HttpError` on transport failures, non-success statuses or undecodable bodies.
pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
    client: &Client,
    url: Url,
    body: &B,
) -> Result<T, HttpError> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(map_request_error)?;

    handle_json_response(response).await
}

/// Maps reqwest errors into `HttpError` variants with timeout detection.
pub fn map_request_error(err: reqwest::Error) -> HttpError {
    if err.is_timeout() {
        HttpError::Timeout("Request timed out. Please try again.".to_string())
    } else if err.is_builder() {
        HttpError::Serialization(format!("Failed to build request: {err}"))
    } else if err.is_decode() {
        HttpError::Parse(format!("Failed to decode response: {err}"))
    } else {
        HttpError::Network(format!("Unable to reach the server: {err}"))
    }
}

async fn handle_json_response<T: DeserializeOwned>(response: Response) -> Result<T, HttpError> {
    let status = response.status();

    if status.is_success() {
        response
            .json::<T>()
            .await
            .map_err(|err| HttpError::Parse(format!("Failed to decode response: {err}")))
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(HttpError::Http {
            status: status.as_u16(),
            message: sanitize_body(&body),
        })
    }
}

/// Trim and truncate error bodies before they reach logs or users.
pub fn sanitize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Request failed.".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_CHARS).collect()
    }
}
