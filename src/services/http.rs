//! Shared HTTP plumbing for the OpenAI-compatible endpoints.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{ApiFailure, ConfigError};
use crate::models::ApiConfig;
use crate::utils::excerpt;

const ERROR_BODY_CHARS: usize = 500;

/// Build the single HTTP client used for every API call of a run.
///
/// The bearer token is attached as a default header when a key is configured.
pub fn build_http_client(config: &ApiConfig) -> Result<Client, ConfigError> {
    let mut headers = HeaderMap::new();
    if let Some(ref key) = config.api_key {
        let mut value = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|e| {
            ConfigError::Invalid {
                field: "api_key",
                message: e.to_string(),
            }
        })?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .default_headers(headers)
        .build()
        .map_err(|e| ConfigError::Invalid {
            field: "api",
            message: format!("failed to build HTTP client: {e}"),
        })
}

/// POST `body` as JSON and decode a JSON reply.
pub(crate) async fn post_json<B, T>(client: &Client, url: &str, body: &B) -> Result<T, ApiFailure>
where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
{
    debug!(url, "POST");
    let response = client.post(url).json(body).send().await.map_err(|e| {
        if e.is_timeout() {
            ApiFailure::Timeout
        } else if e.is_connect() {
            ApiFailure::ConnectionError {
                url: url.to_string(),
                message: e.to_string(),
            }
        } else {
            ApiFailure::RequestError(e)
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiFailure::ServerError {
            status: status.as_u16(),
            body: excerpt(body.trim(), ERROR_BODY_CHARS),
        });
    }

    let text = response.text().await.map_err(|e| {
        if e.is_timeout() {
            ApiFailure::Timeout
        } else {
            ApiFailure::RequestError(e)
        }
    })?;
    serde_json::from_str(&text).map_err(|e| ApiFailure::InvalidResponse(e.to_string()))
}
