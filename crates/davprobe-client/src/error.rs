//! Error types for the protocol client.

use thiserror::Error;

/// Errors from issuing a request.
///
/// A non-2xx status is not an error at this layer; it is returned as a
/// normal [`DavResponse`](crate::DavResponse) for the caller to judge.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The base URL could not be parsed or cannot carry paths.
    #[error("Invalid base URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The method token is not a valid HTTP method.
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// The request could not be sent or its response not read.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Errors from interpreting a response body.
#[derive(Debug, Error)]
pub enum MultistatusError {
    #[error("Response body is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Root element is not DAV:multistatus")]
    NotMultistatus,

    #[error("Malformed status line: '{0}'")]
    InvalidStatus(String),

    #[error("<response> element without <href>")]
    MissingHref,
}

/// A property name not in `{namespace}name` form.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid property name '{0}', expected {{namespace}}name")]
pub struct PropertyNameError(pub String);
