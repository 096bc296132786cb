//! Captured responses.

use std::borrow::Cow;

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;

use crate::error::MultistatusError;
use crate::lock::{LockToken, extract_lock_tokens};
use crate::multistatus::Multistatus;

/// A fully-read response: status, headers and body.
#[derive(Debug, Clone)]
pub struct DavResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl DavResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn multistatus(&self) -> Result<Multistatus, MultistatusError> {
        Multistatus::parse(&self.body)
    }

    /// Tokens listed in the body's `lockdiscovery`.
    pub fn lock_tokens(&self) -> Result<Vec<LockToken>, MultistatusError> {
        extract_lock_tokens(&self.body)
    }

    /// Token from the `Lock-Token` response header.
    pub fn lock_token_header(&self) -> Option<LockToken> {
        self.header("Lock-Token")
            .map(LockToken::new)
            .filter(|token| !token.as_str().is_empty())
    }

    /// Tokens a LOCK response issued.
    ///
    /// The `lockdiscovery` body is authoritative; the `Lock-Token` header
    /// is used only when the body names no token.
    pub fn issued_lock_tokens(&self) -> Result<Vec<LockToken>, MultistatusError> {
        let tokens = if self.body.is_empty() {
            Vec::new()
        } else {
            self.lock_tokens()?
        };
        if tokens.is_empty() {
            return Ok(self.lock_token_header().into_iter().collect());
        }
        Ok(tokens)
    }
}
