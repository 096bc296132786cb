//! Multistatus (207) response bodies.
//!
//! The parser is namespace-aware: elements are matched on their resolved
//! namespace URI and local name, never on the prefix a server chose.

use quick_xml::NsReader;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use reqwest::StatusCode;

use crate::error::MultistatusError;
use crate::path::normalize_href;
use crate::property::{DAV_NAMESPACE, PropertyName};

/// A parsed `DAV:multistatus` body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Multistatus {
    pub responses: Vec<ResourceStatus>,
}

/// One `DAV:response` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceStatus {
    pub href: String,
    /// Resource-level status, present when no propstat is reported.
    pub status: Option<StatusCode>,
    pub propstats: Vec<PropStat>,
}

/// A group of properties sharing one status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropStat {
    pub status: StatusCode,
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: PropertyName,
    /// Text content, or `None` for empty / structured-only values.
    pub value: Option<String>,
}

/// A property as reported for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyStatus<'a> {
    pub status: StatusCode,
    pub property: &'a Property,
}

impl Multistatus {
    pub fn parse(body: &[u8]) -> Result<Self, MultistatusError> {
        let text = std::str::from_utf8(body)?;
        let mut reader = NsReader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut builder = Builder::default();
        loop {
            match reader.read_resolved_event()? {
                (ns, Event::Start(e)) => {
                    builder.open(&ns, e.local_name().as_ref())?;
                }
                (ns, Event::Empty(e)) => {
                    builder.open(&ns, e.local_name().as_ref())?;
                    builder.close()?;
                }
                (_, Event::End(_)) => builder.close()?,
                (_, Event::Text(t)) => builder.text(&t.unescape()?),
                (_, Event::CData(c)) => builder.text(&String::from_utf8_lossy(&c)),
                (_, Event::Eof) => break,
                _ => {}
            }
        }
        builder.finish()
    }

    /// Hrefs of all reported resources, in document order.
    pub fn hrefs(&self) -> impl Iterator<Item = &str> {
        self.responses.iter().map(|r| r.href.as_str())
    }

    /// Find the response for a path, comparing decoded paths and ignoring
    /// any scheme/authority and trailing slash.
    pub fn resource(&self, path: &str) -> Option<&ResourceStatus> {
        let wanted = normalize_href(path);
        self.responses.iter().find(|r| r.path() == wanted)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.resource(path).is_some()
    }

    pub fn property(&self, path: &str, name: &PropertyName) -> Option<PropertyStatus<'_>> {
        self.resource(path)?.property(name)
    }
}

impl ResourceStatus {
    /// The decoded, normalized path of this resource.
    pub fn path(&self) -> String {
        normalize_href(&self.href)
    }

    pub fn property(&self, name: &PropertyName) -> Option<PropertyStatus<'_>> {
        self.propstats.iter().find_map(|ps| {
            ps.properties
                .iter()
                .find(|p| &p.name == name)
                .map(|property| PropertyStatus {
                    status: ps.status,
                    property,
                })
        })
    }

    pub fn properties(&self) -> impl Iterator<Item = PropertyStatus<'_>> {
        self.propstats.iter().flat_map(|ps| {
            ps.properties.iter().map(|property| PropertyStatus {
                status: ps.status,
                property,
            })
        })
    }
}

pub(crate) fn is_dav(ns: &ResolveResult<'_>) -> bool {
    matches!(ns, ResolveResult::Bound(Namespace(uri)) if *uri == DAV_NAMESPACE.as_bytes())
}

fn namespace_of(ns: &ResolveResult<'_>) -> String {
    match ns {
        ResolveResult::Bound(Namespace(uri)) => String::from_utf8_lossy(uri).into_owned(),
        _ => String::new(),
    }
}

/// Parse the code out of `HTTP/1.1 200 OK`.
fn parse_status_line(line: &str) -> Result<StatusCode, MultistatusError> {
    line.split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .ok_or_else(|| MultistatusError::InvalidStatus(line.trim().to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Multistatus,
    Response,
    Href,
    ResponseStatus,
    Propstat,
    PropstatStatus,
    Prop,
    Property,
    /// Child element inside a property value.
    Nested,
    Other,
}

#[derive(Debug, Default)]
struct PartialResponse {
    href: Option<String>,
    status: Option<StatusCode>,
    propstats: Vec<PropStat>,
}

#[derive(Debug, Default)]
struct PartialPropstat {
    status: Option<StatusCode>,
    properties: Vec<Property>,
}

#[derive(Debug, Default)]
struct Builder {
    stack: Vec<Node>,
    seen_root: bool,
    responses: Vec<ResourceStatus>,
    response: Option<PartialResponse>,
    propstat: Option<PartialPropstat>,
    property: Option<PropertyName>,
    text: String,
}

impl Builder {
    fn open(&mut self, ns: &ResolveResult<'_>, local: &[u8]) -> Result<(), MultistatusError> {
        let dav = is_dav(ns);
        let local = String::from_utf8_lossy(local);

        let node = match (self.stack.last().copied(), dav, &*local) {
            (None, true, "multistatus") => {
                self.seen_root = true;
                Node::Multistatus
            }
            (None, _, _) => return Err(MultistatusError::NotMultistatus),
            (Some(Node::Multistatus), true, "response") => {
                self.response = Some(PartialResponse::default());
                Node::Response
            }
            (Some(Node::Response), true, "href") => {
                self.text.clear();
                Node::Href
            }
            (Some(Node::Response), true, "status") => {
                self.text.clear();
                Node::ResponseStatus
            }
            (Some(Node::Response), true, "propstat") => {
                self.propstat = Some(PartialPropstat::default());
                Node::Propstat
            }
            (Some(Node::Propstat), true, "prop") => Node::Prop,
            (Some(Node::Propstat), true, "status") => {
                self.text.clear();
                Node::PropstatStatus
            }
            (Some(Node::Prop), _, _) => {
                self.property = Some(PropertyName::new(namespace_of(ns), &*local));
                self.text.clear();
                Node::Property
            }
            (Some(Node::Property | Node::Nested), _, _) => Node::Nested,
            _ => Node::Other,
        };
        self.stack.push(node);
        Ok(())
    }

    fn text(&mut self, text: &str) {
        if matches!(
            self.stack.last(),
            Some(
                Node::Href
                    | Node::ResponseStatus
                    | Node::PropstatStatus
                    | Node::Property
                    | Node::Nested
            )
        ) {
            self.text.push_str(text);
        }
    }

    fn close(&mut self) -> Result<(), MultistatusError> {
        match self.stack.pop() {
            Some(Node::Href) => {
                if let Some(response) = self.response.as_mut() {
                    response.href = Some(self.text.trim().to_string());
                }
            }
            Some(Node::ResponseStatus) => {
                let status = parse_status_line(&self.text)?;
                if let Some(response) = self.response.as_mut() {
                    response.status = Some(status);
                }
            }
            Some(Node::PropstatStatus) => {
                let status = parse_status_line(&self.text)?;
                if let Some(propstat) = self.propstat.as_mut() {
                    propstat.status = Some(status);
                }
            }
            Some(Node::Property) => {
                let value = self.text.trim();
                let value = (!value.is_empty()).then(|| value.to_string());
                if let (Some(name), Some(propstat)) = (self.property.take(), self.propstat.as_mut())
                {
                    propstat.properties.push(Property { name, value });
                }
            }
            Some(Node::Propstat) => {
                if let Some(propstat) = self.propstat.take() {
                    let status = propstat
                        .status
                        .ok_or_else(|| MultistatusError::InvalidStatus(String::new()))?;
                    if let Some(response) = self.response.as_mut() {
                        response.propstats.push(PropStat {
                            status,
                            properties: propstat.properties,
                        });
                    }
                }
            }
            Some(Node::Response) => {
                if let Some(response) = self.response.take() {
                    let href = response.href.ok_or(MultistatusError::MissingHref)?;
                    self.responses.push(ResourceStatus {
                        href,
                        status: response.status,
                        propstats: response.propstats,
                    });
                }
            }
            Some(Node::Multistatus | Node::Prop | Node::Nested | Node::Other) | None => {}
        }
        Ok(())
    }

    fn finish(self) -> Result<Multistatus, MultistatusError> {
        if !self.seen_root {
            return Err(MultistatusError::NotMultistatus);
        }
        Ok(Multistatus {
            responses: self.responses,
        })
    }
}
