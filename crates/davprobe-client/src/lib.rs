//! Typed WebDAV client for conformance runs.
//!
//! This crate issues the requests a scenario describes and captures the
//! complete response. It has two halves:
//!
//! - [`ProtocolClient`] / [`DavClient`]: send a [`DavRequest`] and return a
//!   [`DavResponse`] with status, headers and body, whatever the status.
//! - Body inspection: [`Multistatus`] for 207 responses and
//!   [`extract_lock_tokens`] for `lockdiscovery` bodies, both matching
//!   elements by namespace URI rather than prefix.
//!
//! # Example
//!
//! ```no_run
//! use davprobe_client::{ClientConfig, DavClient, Depth, PropfindBody};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = DavClient::new("http://127.0.0.1:8080", ClientConfig::default())?;
//! client.mkcol("/test/").await?;
//! client.put("/test/file1.txt", "this is a file\nwith two lines").await?;
//!
//! let resp = client.propfind("/test/", Some(Depth::One), &PropfindBody::AllProp).await?;
//! let multistatus = resp.multistatus()?;
//! assert!(multistatus.contains("/test/file1.txt"));
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod lock;
mod multistatus;
mod path;
mod property;
mod request;
mod response;

pub use client::{ClientConfig, DEFAULT_REQUEST_TIMEOUT, DavClient, ProtocolClient};
pub use error::{MultistatusError, ClientError, PropertyNameError};
pub use lock::{LockRequest, LockScope, LockTimeout, LockToken, extract_lock_tokens};
pub use multistatus::{Multistatus, PropStat, Property, PropertyStatus, ResourceStatus};
pub use path::{decode_path, encode_path, normalize_href};
pub use property::{DAV_NAMESPACE, PropertyName, PropertySet};
pub use request::{DavRequest, Depth, PropfindBody, Verb, propertyupdate_body};
pub use response::DavResponse;

// Re-export so callers can name statuses without depending on reqwest.
pub use reqwest::StatusCode;
