//! Lock requests, lock tokens and lockdiscovery parsing.

use std::fmt;

use quick_xml::NsReader;
use quick_xml::events::Event;
use quick_xml::escape::escape;

use crate::error::MultistatusError;
use crate::multistatus::is_dav;
use crate::request::Depth;

/// An opaque lock token issued by the server.
///
/// The harness never constructs or inspects tokens; it only carries what
/// a LOCK response returned back to the server in `If` / `Lock-Token`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockToken(String);

impl LockToken {
    /// Wrap a token as received, stripping `<...>` if present.
    pub fn new(token: impl AsRef<str>) -> Self {
        let token = token.as_ref().trim();
        let token = token
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .unwrap_or(token);
        Self(token.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The token as a Coded-URL, as used in `Lock-Token` and `If` headers.
    pub fn coded_url(&self) -> String {
        format!("<{}>", self.0)
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockScope {
    #[default]
    Exclusive,
    Shared,
}

impl LockScope {
    fn element(self) -> &'static str {
        match self {
            Self::Exclusive => "exclusive",
            Self::Shared => "shared",
        }
    }
}

/// Requested lock lifetime, sent as the `Timeout` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockTimeout {
    Seconds(u64),
    Infinite,
}

impl LockTimeout {
    pub fn header_value(self) -> String {
        match self {
            Self::Seconds(secs) => format!("Second-{secs}"),
            Self::Infinite => "Infinite".to_string(),
        }
    }
}

/// Parameters of a LOCK request creating a new write lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRequest {
    pub scope: LockScope,
    pub owner: Option<String>,
    pub depth: Depth,
    pub timeout: Option<LockTimeout>,
}

impl Default for LockRequest {
    fn default() -> Self {
        Self {
            scope: LockScope::Exclusive,
            owner: None,
            depth: Depth::Infinity,
            timeout: None,
        }
    }
}

impl LockRequest {
    pub fn exclusive() -> Self {
        Self::default()
    }

    pub fn shared() -> Self {
        Self {
            scope: LockScope::Shared,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    #[must_use]
    pub fn with_depth(mut self, depth: Depth) -> Self {
        self.depth = depth;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: LockTimeout) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The `lockinfo` request body.
    pub fn body(&self) -> String {
        let mut xml = String::from(r#"<?xml version="1.0" encoding="utf-8"?>"#);
        xml.push_str(r#"<D:lockinfo xmlns:D="DAV:">"#);
        xml.push_str(&format!(
            "<D:lockscope><D:{}/></D:lockscope>",
            self.scope.element()
        ));
        xml.push_str("<D:locktype><D:write/></D:locktype>");
        if let Some(owner) = &self.owner {
            xml.push_str(&format!("<D:owner>{}</D:owner>", escape(owner.as_str())));
        }
        xml.push_str("</D:lockinfo>");
        xml
    }
}

/// Extract every `DAV:locktoken/DAV:href` value from a LOCK response body.
pub fn extract_lock_tokens(body: &[u8]) -> Result<Vec<LockToken>, MultistatusError> {
    let text = std::str::from_utf8(body)?;
    let mut reader = NsReader::from_str(text);
    reader.config_mut().trim_text(true);

    // (is DAV namespace, local name) of each open element
    let mut stack: Vec<(bool, String)> = Vec::new();
    let mut tokens = Vec::new();

    loop {
        match reader.read_resolved_event()? {
            (ns, Event::Start(e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                stack.push((is_dav(&ns), local));
            }
            (_, Event::End(_)) => {
                stack.pop();
            }
            (_, Event::Text(t)) => {
                if in_locktoken_href(&stack) {
                    tokens.push(LockToken::new(t.unescape()?));
                }
            }
            (_, Event::CData(c)) => {
                if in_locktoken_href(&stack) {
                    tokens.push(LockToken::new(String::from_utf8_lossy(&c)));
                }
            }
            (_, Event::Eof) => break,
            _ => {}
        }
    }

    Ok(tokens)
}

fn in_locktoken_href(stack: &[(bool, String)]) -> bool {
    match stack {
        [.., (true, parent), (true, leaf)] => parent == "locktoken" && leaf == "href",
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCK_RESPONSE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:prop xmlns:D="DAV:">
  <D:lockdiscovery>
    <D:activelock>
      <D:locktype><D:write/></D:locktype>
      <D:lockscope><D:exclusive/></D:lockscope>
      <D:depth>infinity</D:depth>
      <D:owner>test-bench</D:owner>
      <D:timeout>Second-3600</D:timeout>
      <D:locktoken><D:href>urn:uuid:e71d4fae-5dec-22d6-fea5-00a0c91e6be4</D:href></D:locktoken>
      <D:lockroot><D:href>/test/lock-0</D:href></D:lockroot>
    </D:activelock>
  </D:lockdiscovery>
</D:prop>"#;

    #[test]
    fn test_extract_single_token() {
        let tokens = extract_lock_tokens(LOCK_RESPONSE.as_bytes()).unwrap();
        assert_eq!(
            tokens,
            vec![LockToken::new("urn:uuid:e71d4fae-5dec-22d6-fea5-00a0c91e6be4")]
        );
    }

    #[test]
    fn test_lockroot_href_is_not_a_token() {
        let tokens = extract_lock_tokens(LOCK_RESPONSE.as_bytes()).unwrap();
        assert!(tokens.iter().all(|t| t.as_str() != "/test/lock-0"));
    }

    #[test]
    fn test_extract_respects_namespace_not_prefix() {
        let body = r#"<a:prop xmlns:a="DAV:"><a:lockdiscovery><a:activelock>
            <a:locktoken><a:href>opaquelocktoken:1</a:href></a:locktoken>
            </a:activelock></a:lockdiscovery></a:prop>"#;
        let tokens = extract_lock_tokens(body.as_bytes()).unwrap();
        assert_eq!(tokens, vec![LockToken::new("opaquelocktoken:1")]);

        let foreign = r#"<x:locktoken xmlns:x="urn:other"><x:href>nope</x:href></x:locktoken>"#;
        assert!(extract_lock_tokens(foreign.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_extract_multiple_tokens() {
        let body = r#"<D:prop xmlns:D="DAV:"><D:lockdiscovery>
            <D:activelock><D:locktoken><D:href>t1</D:href></D:locktoken></D:activelock>
            <D:activelock><D:locktoken><D:href>t2</D:href></D:locktoken></D:activelock>
            </D:lockdiscovery></D:prop>"#;
        let tokens = extract_lock_tokens(body.as_bytes()).unwrap();
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn test_extract_from_malformed_xml_fails() {
        let body = "<D:prop xmlns:D=\"DAV:\"><D:locktoken></D:prop>";
        assert!(extract_lock_tokens(body.as_bytes()).is_err());
    }

    #[test]
    fn test_token_strips_angle_brackets() {
        let token = LockToken::new(" <urn:uuid:abc> ");
        assert_eq!(token.as_str(), "urn:uuid:abc");
        assert_eq!(token.coded_url(), "<urn:uuid:abc>");
    }

    #[test]
    fn test_lockinfo_body() {
        let body = LockRequest::exclusive().with_owner("test-bench").body();
        assert!(body.contains("<D:lockscope><D:exclusive/></D:lockscope>"));
        assert!(body.contains("<D:locktype><D:write/></D:locktype>"));
        assert!(body.contains("<D:owner>test-bench</D:owner>"));

        let shared = LockRequest::shared().with_owner("a&b").body();
        assert!(shared.contains("<D:shared/>"));
        assert!(shared.contains("<D:owner>a&amp;b</D:owner>"));
    }

    #[test]
    fn test_timeout_header() {
        assert_eq!(LockTimeout::Seconds(3600).header_value(), "Second-3600");
        assert_eq!(LockTimeout::Infinite.header_value(), "Infinite");
    }
}
