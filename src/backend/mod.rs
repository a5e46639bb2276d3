//! HTTP client for the hosted backend.
//!
//! One [`BackendClient`] carries the base URL and credentials for every call:
//! the auth endpoints ([`auth`]), the bookmark table ([`records`]), and the
//! streaming change feed (opened by [`crate::sync::HttpFeedTransport`]).

mod auth;
mod error;
mod records;

pub use error::BackendError;

use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Response bodies larger than this are rejected.
pub const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024; // 5MB

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

const MAX_RETRIES: u32 = 3;

struct Inner {
    http: reqwest::Client,
    base: Url,
    anon_key: SecretString,
    access_token: SecretString,
    timeout: Duration,
}

/// Cheaply cloneable handle to the backend.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<Inner>,
}

impl fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendClient")
            .field("base", &self.inner.base.as_str())
            .field("anon_key", &"[REDACTED]")
            .field("access_token", &"[REDACTED]")
            .field("timeout", &self.inner.timeout)
            .finish()
    }
}

impl BackendClient {
    /// Build a client for `base_url`.
    ///
    /// The base URL must be HTTPS; plain HTTP is accepted only for
    /// `localhost`/`127.0.0.1` (local development and tests).
    pub fn new(
        base_url: &str,
        anon_key: SecretString,
        access_token: SecretString,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let base = Url::parse(base_url.trim())
            .map_err(|e| BackendError::InvalidBaseUrl(e.to_string()))?;

        match base.scheme() {
            "https" => {}
            "http" if is_local(&base) => {
                tracing::warn!(base_url = %base, "Using non-HTTPS backend URL (localhost only)");
            }
            _ => {
                tracing::error!(base_url = %base, "Rejecting non-HTTPS backend URL (HTTPS required except for localhost)");
                return Err(BackendError::InsecureBaseUrl);
            }
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("markvault/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base,
                anon_key,
                access_token,
                timeout,
            }),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base
    }

    /// False when no access token is configured (nobody signed in).
    pub fn has_session(&self) -> bool {
        !self.inner.access_token.expose_secret().trim().is_empty()
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.inner
            .base
            .join(path)
            .map_err(|e| BackendError::InvalidBaseUrl(e.to_string()))
    }

    pub(crate) fn get(&self, url: Url) -> reqwest::RequestBuilder {
        self.authorize(self.inner.http.get(url))
    }

    pub(crate) fn post(&self, url: Url) -> reqwest::RequestBuilder {
        self.authorize(self.inner.http.post(url))
    }

    pub(crate) fn delete(&self, url: Url) -> reqwest::RequestBuilder {
        self.authorize(self.inner.http.delete(url))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", self.inner.anon_key.expose_secret())
            .header(
                "Authorization",
                format!("Bearer {}", self.inner.access_token.expose_secret()),
            )
    }

    /// Send with the request timeout and map non-2xx statuses to errors.
    ///
    /// The timeout covers connecting and receiving headers only, so the
    /// change feed can keep streaming the body afterwards.
    pub(crate) async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, BackendError> {
        let response = tokio::time::timeout(self.inner.timeout, request.send())
            .await
            .map_err(|_| BackendError::Timeout)?
            .map_err(BackendError::Network)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(BackendError::Unauthorized);
        }
        if !status.is_success() {
            return Err(BackendError::HttpStatus(status.as_u16()));
        }
        Ok(response)
    }

    /// Send and read the body as text, bounded by the timeout and size cap.
    pub(crate) async fn send_text(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<String, BackendError> {
        let response = self.send(request).await?;
        tokio::time::timeout(
            self.inner.timeout,
            read_limited_text(response, MAX_RESPONSE_SIZE),
        )
        .await
        .map_err(|_| BackendError::Timeout)?
    }
}

fn is_local(url: &Url) -> bool {
    matches!(url.host_str(), Some("localhost") | Some("127.0.0.1"))
}

/// Run an idempotent request, retrying transient failures.
/// Uses exponential backoff: 1s, 2s, 4s (max 3 retries).
pub(crate) async fn with_retry<T, F, Fut>(op: &'static str, mut attempt: F) -> Result<T, BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let mut retry_count = 0;

    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && retry_count < MAX_RETRIES => {
                let delay = 1u64 << retry_count; // 1s, 2s, 4s
                tracing::debug!(
                    op,
                    error = %e,
                    retry = retry_count + 1,
                    delay_secs = delay,
                    "Retrying backend request after transient error"
                );
                tokio::time::sleep(Duration::from_secs(delay)).await;
                retry_count += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn read_limited_text(
    response: reqwest::Response,
    limit: usize,
) -> Result<String, BackendError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(BackendError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(BackendError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(BackendError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    String::from_utf8(bytes).map_err(|_| BackendError::Decode("invalid UTF-8".to_string()))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn client_for(uri: &str) -> BackendClient {
        BackendClient::new(
            uri,
            SecretString::from("anon-key".to_string()),
            SecretString::from("token-123".to_string()),
            Duration::from_secs(5),
        )
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[test]
    fn test_http_base_url_rejected() {
        let result = BackendClient::new(
            "http://evil.com",
            secret("k"),
            secret("t"),
            DEFAULT_REQUEST_TIMEOUT,
        );
        assert!(matches!(result, Err(BackendError::InsecureBaseUrl)));
    }

    #[test]
    fn test_localhost_http_allowed() {
        for base in ["http://localhost:54321", "http://127.0.0.1:8080"] {
            let result = BackendClient::new(base, secret("k"), secret("t"), DEFAULT_REQUEST_TIMEOUT);
            assert!(result.is_ok(), "{base} should be allowed");
        }
    }

    #[test]
    fn test_garbage_base_url_rejected() {
        let result = BackendClient::new("not a url", secret("k"), secret("t"), DEFAULT_REQUEST_TIMEOUT);
        assert!(matches!(result, Err(BackendError::InvalidBaseUrl(_))));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let client = BackendClient::new(
            "https://db.example.com",
            secret("anon-secret"),
            secret("token-secret"),
            DEFAULT_REQUEST_TIMEOUT,
        )
        .unwrap();
        let debug = format!("{:?}", client);
        assert!(!debug.contains("anon-secret"));
        assert!(!debug.contains("token-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_has_session() {
        let signed_out = BackendClient::new(
            "https://db.example.com",
            secret("k"),
            secret("  "),
            DEFAULT_REQUEST_TIMEOUT,
        )
        .unwrap();
        assert!(!signed_out.has_session());
    }

    #[tokio::test]
    async fn test_retry_gives_up_on_permanent_error() {
        let mut calls = 0;
        let result: Result<(), _> = with_retry("test", || {
            calls += 1;
            async { Err(BackendError::HttpStatus(404)) }
        })
        .await;
        assert!(matches!(result, Err(BackendError::HttpStatus(404))));
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_transient_error() {
        let mut calls = 0;
        let result = with_retry("test", || {
            calls += 1;
            let outcome = if calls < 3 {
                Err(BackendError::HttpStatus(503))
            } else {
                Ok(calls)
            };
            async move { outcome }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_stops_after_max_retries() {
        let mut calls = 0;
        let result: Result<(), _> = with_retry("test", || {
            calls += 1;
            async { Err(BackendError::Timeout) }
        })
        .await;
        assert!(matches!(result, Err(BackendError::Timeout)));
        assert_eq!(calls, 4); // Initial attempt + 3 retries
    }
}
