//! Typed WebDAV requests.

use std::fmt;

use bytes::Bytes;
use quick_xml::escape::escape;

use crate::lock::{LockRequest, LockTimeout, LockToken};
use crate::property::{PropertyName, PropertySet};

/// The HTTP/WebDAV methods the harness issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Put,
    Delete,
    Mkcol,
    Copy,
    Move,
    Lock,
    Unlock,
    Propfind,
    Proppatch,
}

impl Verb {
    pub const ALL: [Verb; 10] = [
        Self::Get,
        Self::Put,
        Self::Delete,
        Self::Mkcol,
        Self::Copy,
        Self::Move,
        Self::Lock,
        Self::Unlock,
        Self::Propfind,
        Self::Proppatch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Mkcol => "MKCOL",
            Self::Copy => "COPY",
            Self::Move => "MOVE",
            Self::Lock => "LOCK",
            Self::Unlock => "UNLOCK",
            Self::Propfind => "PROPFIND",
            Self::Proppatch => "PROPPATCH",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of the `Depth` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    Zero,
    One,
    Infinity,
}

impl Depth {
    pub fn header_value(self) -> &'static str {
        match self {
            Self::Zero => "0",
            Self::One => "1",
            Self::Infinity => "infinity",
        }
    }
}

/// What a PROPFIND asks for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PropfindBody {
    #[default]
    AllProp,
    PropName,
    Props(Vec<PropertyName>),
}

impl PropfindBody {
    pub fn to_xml(&self) -> String {
        let mut xml = String::from(r#"<?xml version="1.0" encoding="utf-8"?>"#);
        xml.push_str(r#"<D:propfind xmlns:D="DAV:">"#);
        match self {
            Self::AllProp => xml.push_str("<D:allprop/>"),
            Self::PropName => xml.push_str("<D:propname/>"),
            Self::Props(names) => {
                xml.push_str("<D:prop>");
                for (idx, name) in names.iter().enumerate() {
                    xml.push_str(&property_element(idx, name, None));
                }
                xml.push_str("</D:prop>");
            }
        }
        xml.push_str("</D:propfind>");
        xml
    }
}

/// `propertyupdate` body setting `set` and removing `remove`.
pub fn propertyupdate_body(set: &PropertySet, remove: &[PropertyName]) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="utf-8"?>"#);
    xml.push_str(r#"<D:propertyupdate xmlns:D="DAV:">"#);
    if !set.is_empty() {
        xml.push_str("<D:set><D:prop>");
        for (idx, (name, value)) in set.iter().enumerate() {
            xml.push_str(&property_element(idx, name, Some(value)));
        }
        xml.push_str("</D:prop></D:set>");
    }
    if !remove.is_empty() {
        xml.push_str("<D:remove><D:prop>");
        for (idx, name) in remove.iter().enumerate() {
            xml.push_str(&property_element(idx, name, None));
        }
        xml.push_str("</D:prop></D:remove>");
    }
    xml.push_str("</D:propertyupdate>");
    xml
}

/// One property element with its namespace declared in place.
fn property_element(idx: usize, name: &PropertyName, value: Option<&str>) -> String {
    let (tag, decl) = if name.namespace.is_empty() {
        (name.name.clone(), r#" xmlns="""#.to_string())
    } else {
        (
            format!("P{idx}:{}", name.name),
            format!(r#" xmlns:P{idx}="{}""#, escape(name.namespace.as_str())),
        )
    };
    match value {
        Some(value) => format!("<{tag}{decl}>{}</{tag}>", escape(value)),
        None => format!("<{tag}{decl}/>"),
    }
}

/// A single request, independent of the base URL it is sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavRequest {
    pub verb: Verb,
    /// Path relative to the server root, e.g. `/test/file1.txt`.
    pub path: String,
    pub depth: Option<Depth>,
    pub overwrite: Option<bool>,
    /// Target path for COPY/MOVE; sent as an absolute URL.
    pub destination: Option<String>,
    /// Sent as `Lock-Token` (UNLOCK).
    pub lock_token: Option<LockToken>,
    /// Sent as an `If` tagged list (refresh, writes under a lock).
    pub if_token: Option<LockToken>,
    pub timeout: Option<LockTimeout>,
    pub content_type: Option<&'static str>,
    pub body: Bytes,
}

const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";

impl DavRequest {
    pub fn new(verb: Verb, path: impl Into<String>) -> Self {
        Self {
            verb,
            path: path.into(),
            depth: None,
            overwrite: None,
            destination: None,
            lock_token: None,
            if_token: None,
            timeout: None,
            content_type: None,
            body: Bytes::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Verb::Get, path)
    }

    pub fn put(path: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            content_type: Some("application/octet-stream"),
            ..Self::new(Verb::Put, path)
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Verb::Delete, path)
    }

    pub fn mkcol(path: impl Into<String>) -> Self {
        Self::new(Verb::Mkcol, path)
    }

    pub fn copy(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            destination: Some(to.into()),
            ..Self::new(Verb::Copy, from)
        }
    }

    pub fn move_(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            destination: Some(to.into()),
            ..Self::new(Verb::Move, from)
        }
    }

    pub fn lock(path: impl Into<String>, lock: &LockRequest) -> Self {
        Self {
            depth: Some(lock.depth),
            timeout: lock.timeout,
            content_type: Some(XML_CONTENT_TYPE),
            body: Bytes::from(lock.body()),
            ..Self::new(Verb::Lock, path)
        }
    }

    /// LOCK without a body, naming the held token in `If`.
    pub fn refresh_lock(path: impl Into<String>, token: LockToken) -> Self {
        Self {
            if_token: Some(token),
            ..Self::new(Verb::Lock, path)
        }
    }

    pub fn unlock(path: impl Into<String>, token: LockToken) -> Self {
        Self {
            lock_token: Some(token),
            ..Self::new(Verb::Unlock, path)
        }
    }

    pub fn propfind(path: impl Into<String>, depth: Option<Depth>, body: &PropfindBody) -> Self {
        Self {
            depth,
            content_type: Some(XML_CONTENT_TYPE),
            body: Bytes::from(body.to_xml()),
            ..Self::new(Verb::Propfind, path)
        }
    }

    pub fn proppatch(path: impl Into<String>, set: &PropertySet, remove: &[PropertyName]) -> Self {
        Self {
            content_type: Some(XML_CONTENT_TYPE),
            body: Bytes::from(propertyupdate_body(set, remove)),
            ..Self::new(Verb::Proppatch, path)
        }
    }

    #[must_use]
    pub fn with_depth(mut self, depth: Depth) -> Self {
        self.depth = Some(depth);
        self
    }

    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = Some(overwrite);
        self
    }

    #[must_use]
    pub fn with_if_token(mut self, token: LockToken) -> Self {
        self.if_token = Some(token);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: LockTimeout) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Headers derived from the typed fields, excluding `Destination`,
    /// which needs the base URL.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::new();
        if let Some(depth) = self.depth {
            headers.push(("Depth", depth.header_value().to_string()));
        }
        if let Some(overwrite) = self.overwrite {
            headers.push(("Overwrite", if overwrite { "T" } else { "F" }.to_string()));
        }
        if let Some(token) = &self.lock_token {
            headers.push(("Lock-Token", token.coded_url()));
        }
        if let Some(token) = &self.if_token {
            headers.push(("If", format!("({})", token.coded_url())));
        }
        if let Some(timeout) = self.timeout {
            headers.push(("Timeout", timeout.header_value()));
        }
        if let Some(content_type) = self.content_type {
            headers.push(("Content-Type", content_type.to_string()));
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header<'a>(headers: &'a [(&'static str, String)], name: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_copy_headers() {
        let req = DavRequest::copy("/test/file1.txt", "/test/file2.txt")
            .with_overwrite(true)
            .with_depth(Depth::Infinity);
        let headers = req.headers();

        assert_eq!(req.verb, Verb::Copy);
        assert_eq!(req.destination.as_deref(), Some("/test/file2.txt"));
        assert_eq!(header(&headers, "Overwrite"), Some("T"));
        assert_eq!(header(&headers, "Depth"), Some("infinity"));
    }

    #[test]
    fn test_lock_request_headers_and_body() {
        let lock = LockRequest::exclusive()
            .with_owner("test-bench")
            .with_timeout(LockTimeout::Seconds(3600));
        let req = DavRequest::lock("/test/lock-0", &lock);
        let headers = req.headers();

        assert_eq!(header(&headers, "Depth"), Some("infinity"));
        assert_eq!(header(&headers, "Timeout"), Some("Second-3600"));
        let body = std::str::from_utf8(&req.body).unwrap();
        assert!(body.contains("<D:owner>test-bench</D:owner>"));
    }

    #[test]
    fn test_refresh_and_unlock_token_headers() {
        let token = LockToken::new("urn:uuid:1");

        let refresh = DavRequest::refresh_lock("/test/lock-0", token.clone());
        assert_eq!(header(&refresh.headers(), "If"), Some("(<urn:uuid:1>)"));
        assert!(refresh.body.is_empty());

        let unlock = DavRequest::unlock("/test/lock-0", token);
        assert_eq!(
            header(&unlock.headers(), "Lock-Token"),
            Some("<urn:uuid:1>")
        );
    }

    #[test]
    fn test_propfind_without_depth_sends_no_depth_header() {
        let req = DavRequest::propfind("/", None, &PropfindBody::AllProp);
        assert_eq!(header(&req.headers(), "Depth"), None);
        assert!(std::str::from_utf8(&req.body).unwrap().contains("<D:allprop/>"));
    }

    #[test]
    fn test_propfind_named_props() {
        let body = PropfindBody::Props(vec![PropertyName::new("testns:", "testname")]).to_xml();
        assert!(body.contains(r#"<P0:testname xmlns:P0="testns:"/>"#), "{body}");
    }

    #[test]
    fn test_propertyupdate_escapes_values() {
        let set = PropertySet::new().with(PropertyName::new("testns:", "testname"), "a<b&c");
        let body = propertyupdate_body(&set, &[PropertyName::new("", "old")]);

        assert!(
            body.contains(r#"<D:set><D:prop><P0:testname xmlns:P0="testns:">a&lt;b&amp;c</P0:testname></D:prop></D:set>"#),
            "{body}"
        );
        assert!(
            body.contains(r#"<D:remove><D:prop><old xmlns=""/></D:prop></D:remove>"#),
            "{body}"
        );
    }

    #[test]
    fn test_verb_tokens() {
        assert_eq!(Verb::Proppatch.to_string(), "PROPPATCH");
        assert_eq!(Verb::ALL.len(), 10);
    }
}
