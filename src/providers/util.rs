use anyhow::{Context, Result, anyhow};
use reqwest::header::HeaderMap;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Builds an HTTP client with a fixed per-request timeout.
pub fn build_client(timeout: Duration, headers: HeaderMap) -> Result<Client> {
    Client::builder()
        .user_agent("etfcache/1.0")
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Issues a single GET and decodes the JSON body.
///
/// Non-success statuses, empty bodies and undecodable payloads are all
/// reported as errors. There is no retry.
pub async fn get_json<T: DeserializeOwned>(client: &Client, url: Url) -> Result<T> {
    debug!("Requesting {}", url);

    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| anyhow!("Request error: {} URL: {}", e, url))?;

    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("HTTP error: {} URL: {}", status, url));
    }

    let text = response
        .text()
        .await
        .with_context(|| format!("Failed to get response text from {url}"))?;

    if text.trim().is_empty() {
        return Err(anyhow!("Received empty response from {}", url));
    }

    serde_json::from_str(&text)
        .map_err(|e| anyhow!("Failed to parse JSON response from {}: {}", url, e))
}
