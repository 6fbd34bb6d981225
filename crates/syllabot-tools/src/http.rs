use std::time::Duration;

use reqwest::{Client, Response};
use tracing::debug;

use syllabot_core::config::HttpConfig;
use syllabot_core::error::{Result, SyllabotError};

/// Build the shared HTTP client used by every document tool.
pub fn build_client(config: &HttpConfig) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| SyllabotError::Configuration(format!("Failed to create HTTP client: {}", e)))
}

/// GET `url` and reject non-2xx statuses. Transport failures and bad
/// statuses become `Fetch` errors; nothing is retried.
async fn send_checked(http: &Client, url: &str) -> Result<Response> {
    debug!(url, "GET");
    let resp = http
        .get(url)
        .send()
        .await
        .map_err(|e| SyllabotError::fetch(url, e))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(SyllabotError::fetch(
            url,
            format!(
                "HTTP {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            ),
        ));
    }
    Ok(resp)
}

fn body_error(url: &str, e: reqwest::Error) -> SyllabotError {
    SyllabotError::fetch(url, format!("Failed to read response body: {}", e))
}

/// GET `url` and return the whole body.
pub async fn get_bytes(http: &Client, url: &str) -> Result<Vec<u8>> {
    let body = send_checked(http, url)
        .await?
        .bytes()
        .await
        .map_err(|e| body_error(url, e))?;
    debug!(url, bytes = body.len(), "Fetched");
    Ok(body.to_vec())
}

/// GET `url` as text, decoded with the charset the response declares
/// (UTF-8 when it declares none). Same failure mapping as [`get_bytes`].
pub async fn get_text(http: &Client, url: &str) -> Result<String> {
    let text = send_checked(http, url)
        .await?
        .text()
        .await
        .map_err(|e| body_error(url, e))?;
    debug!(url, chars = text.chars().count(), "Fetched");
    Ok(text)
}
