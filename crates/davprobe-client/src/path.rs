//! Percent-encoding helpers for request paths and response hrefs.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

/// Characters left as-is in a path: unreserved, sub-delims, ':', '@' and
/// the segment separator. '?' and '#' would start a query or fragment.
const PATH: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/')
    .remove(b':')
    .remove(b'@')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=');

/// Percent-encode a path for use in a URL or a Destination header.
///
/// Non-ASCII characters must be percent-encoded in HTTP headers.
pub fn encode_path(path: &str) -> String {
    utf8_percent_encode(path, PATH).to_string()
}

/// Decode `%XX` escapes. Invalid escapes are kept verbatim.
pub fn decode_path(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

/// Reduce an href to a comparable path: no scheme/authority, decoded,
/// no trailing slash (except for the root).
pub fn normalize_href(href: &str) -> String {
    let path = ["http://", "https://"]
        .iter()
        .find_map(|scheme| href.strip_prefix(scheme))
        .map_or(href, |rest| rest.find('/').map_or("/", |idx| &rest[idx..]));

    let decoded = decode_path(path);
    let trimmed = decoded.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
