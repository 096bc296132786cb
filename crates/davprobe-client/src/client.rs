//! The protocol client seam and its HTTP implementation.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::ClientError;
use crate::lock::{LockRequest, LockToken};
use crate::path::encode_path;
use crate::property::{PropertyName, PropertySet};
use crate::request::{DavRequest, Depth, PropfindBody, Verb};
use crate::response::DavResponse;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Issues one request and captures the whole response.
///
/// Implementations must not treat non-2xx statuses as errors; judging a
/// status is the caller's job.
pub trait ProtocolClient: Send + Sync {
    fn execute(
        &self,
        request: &DavRequest,
    ) -> impl Future<Output = Result<DavResponse, ClientError>> + Send;
}

/// Client settings.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// Basic-auth user; no `Authorization` header is sent when unset.
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ClientConfig {
    #[must_use]
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A WebDAV client bound to one base URL.
pub struct DavClient {
    http: reqwest::Client,
    base_url: String,
    config: ClientConfig,
    last: Mutex<Option<DavResponse>>,
}

impl fmt::Debug for DavClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DavClient")
            .field("base_url", &self.base_url)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DavClient {
    pub fn new(base_url: &str, config: ClientConfig) -> Result<Self, ClientError> {
        let parsed = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl {
                url: base_url.to_string(),
                reason: "expected an http(s) URL".to_string(),
            });
        }

        let http = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            config,
            last: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute, percent-encoded URL for a server path.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, encode_path(path))
        } else {
            format!("{}/{}", self.base_url, encode_path(path))
        }
    }

    /// The most recent response, if any request completed.
    pub fn last_response(&self) -> Option<DavResponse> {
        self.last.lock().clone()
    }

    pub async fn get(&self, path: &str) -> Result<DavResponse, ClientError> {
        self.execute(&DavRequest::get(path)).await
    }

    pub async fn put(&self, path: &str, body: impl Into<Bytes>) -> Result<DavResponse, ClientError> {
        self.execute(&DavRequest::put(path, body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<DavResponse, ClientError> {
        self.execute(&DavRequest::delete(path)).await
    }

    pub async fn mkcol(&self, path: &str) -> Result<DavResponse, ClientError> {
        self.execute(&DavRequest::mkcol(path)).await
    }

    pub async fn copy(
        &self,
        from: &str,
        to: &str,
        overwrite: bool,
    ) -> Result<DavResponse, ClientError> {
        self.execute(&DavRequest::copy(from, to).with_overwrite(overwrite))
            .await
    }

    pub async fn move_(
        &self,
        from: &str,
        to: &str,
        overwrite: bool,
    ) -> Result<DavResponse, ClientError> {
        self.execute(&DavRequest::move_(from, to).with_overwrite(overwrite))
            .await
    }

    pub async fn lock(&self, path: &str, lock: &LockRequest) -> Result<DavResponse, ClientError> {
        self.execute(&DavRequest::lock(path, lock)).await
    }

    pub async fn refresh_lock(
        &self,
        path: &str,
        token: &LockToken,
    ) -> Result<DavResponse, ClientError> {
        self.execute(&DavRequest::refresh_lock(path, token.clone()))
            .await
    }

    pub async fn unlock(&self, path: &str, token: &LockToken) -> Result<DavResponse, ClientError> {
        self.execute(&DavRequest::unlock(path, token.clone())).await
    }

    pub async fn propfind(
        &self,
        path: &str,
        depth: Option<Depth>,
        body: &PropfindBody,
    ) -> Result<DavResponse, ClientError> {
        self.execute(&DavRequest::propfind(path, depth, body)).await
    }

    pub async fn proppatch(
        &self,
        path: &str,
        set: &PropertySet,
        remove: &[PropertyName],
    ) -> Result<DavResponse, ClientError> {
        self.execute(&DavRequest::proppatch(path, set, remove)).await
    }
}

impl ProtocolClient for DavClient {
    async fn execute(&self, request: &DavRequest) -> Result<DavResponse, ClientError> {
        let method = Method::from_bytes(request.verb.as_str().as_bytes())
            .map_err(|_| ClientError::InvalidMethod(request.verb.to_string()))?;
        let url = self.url(&request.path);

        let mut builder = self.http.request(method, &url);
        if let Some(username) = &self.config.username {
            builder = builder.basic_auth(username, self.config.password.as_deref());
        }
        for (name, value) in request.headers() {
            builder = builder.header(name, value);
        }
        if let Some(destination) = &request.destination {
            builder = builder.header("Destination", self.url(destination));
        }
        // PUT always carries a body, even an empty one
        if !request.body.is_empty() || request.verb == Verb::Put {
            builder = builder.body(request.body.clone());
        }

        trace!(verb = %request.verb, url = %url, "Sending request");
        let started = Instant::now();
        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        debug!(
            verb = %request.verb,
            path = %request.path,
            status = status.as_u16(),
            bytes = body.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "Request completed"
        );

        let response = DavResponse::new(status, headers, body);
        *self.last.lock() = Some(response.clone());
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_and_encodes() {
        let client = DavClient::new("http://127.0.0.1:8080/", ClientConfig::default()).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:8080");
        assert_eq!(
            client.url("/test/file 1.txt"),
            "http://127.0.0.1:8080/test/file%201.txt"
        );
        assert_eq!(client.url("test"), "http://127.0.0.1:8080/test");
    }

    #[test]
    fn test_base_url_with_prefix() {
        let client = DavClient::new("http://host/dav/", ClientConfig::default()).unwrap();
        assert_eq!(client.url("/test/"), "http://host/dav/test/");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            DavClient::new("not a url", ClientConfig::default()),
            Err(ClientError::InvalidUrl { .. })
        ));
        assert!(matches!(
            DavClient::new("ftp://host/", ClientConfig::default()),
            Err(ClientError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_config_debug_redacts_password() {
        let config = ClientConfig::default().with_basic_auth("tester", "secret");
        let debug = format!("{config:?}");
        assert!(debug.contains("tester"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_no_response_before_first_request() {
        let client = DavClient::new("http://127.0.0.1:1", ClientConfig::default()).unwrap();
        assert!(client.last_response().is_none());
    }
}
