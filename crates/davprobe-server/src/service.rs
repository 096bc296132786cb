//! Request handling for the server-under-test.
//!
//! Wraps the dav-server handler with the two concerns the harness
//! provisions from outside: Basic authentication and the PROPFIND depth
//! policy.

use crate::config::{Credentials, ServerConfig};
use crate::filesystem::DeadPropFs;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use dav_server::DavHandler;
use dav_server::body::Body;
use dav_server::memls::MemLs;
use hyper::body::Incoming;
use hyper::header::{AUTHORIZATION, HeaderMap, HeaderValue, WWW_AUTHENTICATE};
use hyper::{Request, Response, StatusCode};
use std::path::Path;
use tracing::{debug, trace};

/// dav-server only answers infinite-depth PROPFIND for requests carrying
/// this header; everything else gets 403 `propfind-finite-depth`.
const INFINITE_DEPTH_HEADER: &str = "x-litmus";

const REALM_CHALLENGE: &str = "Basic realm=\"davprobe\"";

/// Validates `Authorization: Basic` headers against configured credentials.
#[derive(Clone)]
pub(crate) struct BasicAuth {
    credentials: Credentials,
}

impl BasicAuth {
    pub(crate) fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Whether the request carries the configured credentials.
    pub(crate) fn accepts(&self, headers: &HeaderMap) -> bool {
        let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
            return false;
        };
        let Some((scheme, encoded)) = value.trim().split_once(' ') else {
            return false;
        };
        if !scheme.eq_ignore_ascii_case("basic") {
            return false;
        }
        let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
            return false;
        };
        let Ok(decoded) = String::from_utf8(decoded) else {
            return false;
        };
        decoded.split_once(':').is_some_and(|(user, password)| {
            user == self.credentials.username && password == self.credentials.password
        })
    }
}

/// The WebDAV application served on every accepted connection.
pub(crate) struct DavApp {
    handler: DavHandler,
    auth: Option<BasicAuth>,
    allow_infinite_depth: bool,
}

impl DavApp {
    pub(crate) fn new(root: &Path, config: &ServerConfig) -> Self {
        // MemLs enforces exclusive/shared locks and single-use lock tokens.
        let handler = DavHandler::builder()
            .filesystem(Box::new(DeadPropFs::new(root)))
            .locksystem(MemLs::new())
            .build_handler();

        Self {
            handler,
            auth: config.credentials.clone().map(BasicAuth::new),
            allow_infinite_depth: config.allow_infinite_depth,
        }
    }

    pub(crate) async fn handle(&self, mut req: Request<Incoming>) -> Response<Body> {
        trace!(method = %req.method(), uri = %req.uri(), "Handling request");

        if let Some(auth) = &self.auth
            && !auth.accepts(req.headers())
        {
            debug!(method = %req.method(), uri = %req.uri(), "Rejecting unauthenticated request");
            return unauthorized();
        }

        if self.allow_infinite_depth
            && req.method().as_str() == "PROPFIND"
            && wants_infinite_depth(req.headers())
        {
            req.headers_mut()
                .insert(INFINITE_DEPTH_HEADER, HeaderValue::from_static("davprobe"));
        }

        self.handler.handle(req).await
    }
}

/// PROPFIND without a Depth header means `infinity` (RFC 4918 9.1).
fn wants_infinite_depth(headers: &HeaderMap) -> bool {
    match headers.get("Depth").and_then(|v| v.to_str().ok()) {
        None => true,
        Some(depth) => depth.trim().eq_ignore_ascii_case("infinity"),
    }
}

fn unauthorized() -> Response<Body> {
    let mut resp = Response::new(Body::from("401 Unauthorized\n"));
    *resp.status_mut() = StatusCode::UNAUTHORIZED;
    resp.headers_mut()
        .insert(WWW_AUTHENTICATE, HeaderValue::from_static(REALM_CHALLENGE));
    resp
}
