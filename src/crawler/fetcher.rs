//! HTTP fetcher implementation
//!
//! This module handles the single GET a crawl makes:
//! - Building the HTTP client with the configured user agent and timeout
//! - Streaming the body so that content-encoding is undone by the client,
//!   giving up once it grows past the size limit
//! - Collapsing every transport failure into one "no response" outcome

use crate::config::UserAgentConfig;
use crate::storage::Headers;
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::time::Duration;

/// Largest decoded body a crawl keeps (50 MiB)
pub const DEFAULT_MAX_BODY_BYTES: u64 = 50 * 1024 * 1024;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// A response arrived, whatever its status
    Response {
        /// HTTP status code
        status_code: u16,
        /// Response headers, names lowercased
        headers: Headers,
        /// Decoded body
        body: Vec<u8>,
    },

    /// Network error (connection refused, timeout, DNS, TLS, broken or
    /// oversized body)
    NetworkError {
        /// Error description
        error: String,
    },
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Upper bound for one whole request, body included
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use marksync::config::UserAgentConfig;
/// use marksync::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "Marksync".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Copies response headers, lowercasing names and joining repeated ones
pub fn lowercase_headers(headers: &HeaderMap) -> Headers {
    let mut out = Headers::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        out.entry(name.as_str().to_ascii_lowercase())
            .and_modify(|existing: &mut String| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.clone());
    }
    out
}

/// Fetches a URL once
///
/// Any status code counts as a response. Redirects are followed by the
/// client; the recorded status and headers are those of the final hop.
///
/// | Condition | Result |
/// |-----------|--------|
/// | Any HTTP status | `Response` |
/// | Timeout | `NetworkError` |
/// | Connection refused / DNS / TLS | `NetworkError` |
/// | Body stream broken part way | `NetworkError` |
/// | Body larger than `max_body_bytes` | `NetworkError` |
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The URL to fetch
/// * `max_body_bytes` - Limit on the decoded body; reading stops as soon as
///   it is exceeded
pub async fn fetch_url(client: &Client, url: &str, max_body_bytes: u64) -> FetchResult {
    let mut response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => return network_error(e),
    };

    let status_code = response.status().as_u16();
    let headers = lowercase_headers(response.headers());

    if response.content_length().is_some_and(|len| len > max_body_bytes) {
        return body_too_large(max_body_bytes);
    }

    let mut body = Vec::new();
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                if (body.len() + chunk.len()) as u64 > max_body_bytes {
                    return body_too_large(max_body_bytes);
                }
                body.extend_from_slice(&chunk);
            }
            Ok(None) => break,
            Err(e) => return network_error(e),
        }
    }

    FetchResult::Response {
        status_code,
        headers,
        body,
    }
}

fn body_too_large(max_body_bytes: u64) -> FetchResult {
    FetchResult::NetworkError {
        error: format!("Body larger than {} bytes", max_body_bytes),
    }
}

fn network_error(e: reqwest::Error) -> FetchResult {
    let error = if e.is_timeout() {
        format!("Request timeout: {}", e)
    } else if e.is_connect() {
        format!("Connection failed: {}", e)
    } else {
        e.to_string()
    };
    FetchResult::NetworkError { error }
}
