use std::time::Duration;

use forma_common::error::{FormaError, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use tracing::{debug, error};

use crate::validation::validate_url;

const DOWNLOAD_TIMEOUT_SECS: u64 = 300;
const CONNECT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT_STRING: &str = "forma formula evaluator (Rust)";

pub fn build_http_client() -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    Client::builder()
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| FormaError::Generic(format!("Failed to build HTTP client: {e}")))
}

/// Tries `url` and then each mirror in order, returning the first body that
/// downloads. Integrity is the caller's concern; this only moves bytes.
pub async fn download_with_mirrors(
    client: &Client,
    name: &str,
    url: &str,
    mirrors: &[String],
) -> Result<Vec<u8>> {
    let urls_to_try = std::iter::once(url).chain(mirrors.iter().map(String::as_str));
    let mut last_error: Option<FormaError> = None;

    for current_url in urls_to_try {
        debug!("Attempting download of '{}' from: {}", name, current_url);
        match download_bytes(client, name, current_url).await {
            Ok(bytes) => {
                debug!(
                    "Downloaded {} bytes for '{}' from {}",
                    bytes.len(),
                    name,
                    current_url
                );
                return Ok(bytes);
            }
            Err(e) => {
                error!("Download attempt failed from {}: {}", current_url, e);
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        FormaError::FetchUnavailable(
            name.to_string(),
            url.to_string(),
            "All download attempts failed.".to_string(),
        )
    }))
}

pub async fn download_bytes(client: &Client, name: &str, url: &str) -> Result<Vec<u8>> {
    validate_url(url).map_err(|e| {
        FormaError::FetchUnavailable(name.to_string(), url.to_string(), e.to_string())
    })?;

    let unavailable =
        |reason: String| FormaError::FetchUnavailable(name.to_string(), url.to_string(), reason);

    let response = client.get(url).send().await.map_err(|e| {
        debug!("HTTP request failed for {url}: {e}");
        unavailable(format!("HTTP request failed: {e}"))
    })?;
    let status = response.status();
    debug!("Received HTTP status: {} for {}", status, url);

    if !status.is_success() {
        return Err(match status {
            StatusCode::NOT_FOUND => unavailable("Resource not found (404)".to_string()),
            StatusCode::FORBIDDEN => unavailable("Access forbidden (403)".to_string()),
            _ => unavailable(format!("HTTP error {status}")),
        });
    }

    let content = response
        .bytes()
        .await
        .map_err(|e| unavailable(format!("Failed to read response body bytes: {e}")))?;
    Ok(content.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn non_https_url_is_fetch_unavailable_without_network() {
        let client = build_http_client().unwrap();
        let err = download_bytes(&client, "ccap", "http://example.com/a.tar.gz")
            .await
            .unwrap_err();
        match err {
            FormaError::FetchUnavailable(name, url, reason) => {
                assert_eq!(name, "ccap");
                assert_eq!(url, "http://example.com/a.tar.gz");
                assert!(reason.contains("Must be https"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn every_mirror_failing_reports_the_last_error() {
        let client = build_http_client().unwrap();
        let mirrors = vec!["ftp://mirror.example.com/a.tar.gz".to_string()];
        let err = download_with_mirrors(&client, "ccap", "http://example.com/a.tar.gz", &mirrors)
            .await
            .unwrap_err();
        match err {
            FormaError::FetchUnavailable(_, url, _) => {
                assert_eq!(url, "ftp://mirror.example.com/a.tar.gz")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
