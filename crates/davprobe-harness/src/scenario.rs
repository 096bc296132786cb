//! Scenarios, steps and their expected outcomes.
//!
//! A [`Scenario`] is an ordered list of [`Step`]s. Order matters: later
//! steps rely on resources created and lock tokens captured by earlier
//! ones. Step constructors encode the default policy for each operation
//! (see [`crate::policy`]); `.expect()`, `.tolerate_failure()` and
//! `.check()` override or extend it.

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use davprobe_client::{
    DavRequest, Depth, LockRequest, LockTimeout, LockToken, PropertyName, PropertySet,
    PropfindBody, StatusCode, Verb,
};

use crate::policy::Operation;
use crate::runner::FailureKind;

/// Owner recorded on locks taken by built-in steps.
pub const LOCK_OWNER: &str = "davprobe";

/// Lock lifetime requested on refresh.
pub const REFRESH_TIMEOUT: LockTimeout = LockTimeout::Seconds(3600);

/// First digit of a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Informational,
    Success,
    Redirection,
    ClientError,
    ServerError,
}

impl StatusClass {
    pub fn of(status: StatusCode) -> Option<Self> {
        match status.as_u16() / 100 {
            1 => Some(Self::Informational),
            2 => Some(Self::Success),
            3 => Some(Self::Redirection),
            4 => Some(Self::ClientError),
            5 => Some(Self::ServerError),
            _ => None,
        }
    }

    pub fn contains(self, status: StatusCode) -> bool {
        Self::of(status) == Some(self)
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Informational => "1xx",
            Self::Success => "2xx",
            Self::Redirection => "3xx",
            Self::ClientError => "4xx",
            Self::ServerError => "5xx",
        })
    }
}

/// The status policy of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Exactly this status.
    Status(StatusCode),
    /// Any status in this class.
    Class(StatusClass),
    /// Any non-2xx status.
    Rejected,
    /// Any status at all; captures and checks are skipped.
    Tolerated,
}

impl Expect {
    pub fn accepts(self, status: StatusCode) -> bool {
        match self {
            Self::Status(expected) => status == expected,
            Self::Class(class) => class.contains(status),
            Self::Rejected => !status.is_success(),
            Self::Tolerated => true,
        }
    }
}

impl fmt::Display for Expect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "{status}"),
            Self::Class(class) => write!(f, "{class}"),
            Self::Rejected => f.write_str("non-2xx"),
            Self::Tolerated => f.write_str("any status"),
        }
    }
}

/// Post-conditions on a response, evaluated after the status policy passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    /// Body equals these bytes.
    Body(Bytes),
    /// Multistatus reports `name` on `path` with a status in `class`.
    PropertyStatus {
        path: String,
        name: PropertyName,
        class: StatusClass,
    },
    /// Multistatus reports `name` on `path` with status 2xx and this text.
    PropertyValue {
        path: String,
        name: PropertyName,
        value: String,
    },
    /// Multistatus includes a response for `path`.
    Href(String),
    /// Multistatus has no response for `path`.
    NoHref(String),
    /// The response names the same lock token as the binding.
    SameToken(String),
}

impl Check {
    pub fn body(body: impl Into<Bytes>) -> Self {
        Self::Body(body.into())
    }

    pub fn property_status(path: impl Into<String>, name: PropertyName, class: StatusClass) -> Self {
        Self::PropertyStatus {
            path: path.into(),
            name,
            class,
        }
    }

    pub fn property_value(
        path: impl Into<String>,
        name: PropertyName,
        value: impl Into<String>,
    ) -> Self {
        Self::PropertyValue {
            path: path.into(),
            name,
            value: value.into(),
        }
    }

    pub fn href(path: impl Into<String>) -> Self {
        Self::Href(path.into())
    }

    pub fn no_href(path: impl Into<String>) -> Self {
        Self::NoHref(path.into())
    }

    pub fn same_token(var: impl Into<String>) -> Self {
        Self::SameToken(var.into())
    }

    pub(crate) fn needs_multistatus(&self) -> bool {
        matches!(
            self,
            Self::PropertyStatus { .. } | Self::PropertyValue { .. } | Self::Href(_) | Self::NoHref(_)
        )
    }
}

/// Values a step extracts from its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    /// Bind the single issued lock token to a variable.
    LockToken(String),
}

/// Lock tokens captured during one run, by variable name.
#[derive(Debug, Default)]
pub struct Bindings {
    tokens: HashMap<String, LockToken>,
}

impl Bindings {
    pub fn bind(&mut self, var: impl Into<String>, token: LockToken) -> Option<LockToken> {
        self.tokens.insert(var.into(), token)
    }

    pub fn token(&self, var: &str) -> Result<&LockToken, FailureKind> {
        self.tokens
            .get(var)
            .ok_or_else(|| FailureKind::UnboundVariable(var.to_string()))
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// What a step sends besides headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    None,
    Bytes(Bytes),
    Lock(LockRequest),
    PropertyUpdate {
        set: PropertySet,
        remove: Vec<PropertyName>,
    },
    Propfind(PropfindBody),
}

/// One request plus its expected outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub verb: Verb,
    pub path: String,
    pub destination: Option<String>,
    pub depth: Option<Depth>,
    pub overwrite: Option<bool>,
    pub timeout: Option<LockTimeout>,
    pub payload: Payload,
    /// Variable holding the lock token this step presents.
    pub token: Option<String>,
    pub expect: Expect,
    pub capture: Option<Capture>,
    pub checks: Vec<Check>,
}

impl Step {
    fn new(verb: Verb, path: impl Into<String>, operation: Operation) -> Self {
        Self {
            verb,
            path: path.into(),
            destination: None,
            depth: None,
            overwrite: None,
            timeout: None,
            payload: Payload::None,
            token: None,
            expect: operation.expect(),
            capture: None,
            checks: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Collections and content
    // ------------------------------------------------------------------

    pub fn mkcol(path: impl Into<String>) -> Self {
        Self::new(Verb::Mkcol, path, Operation::MkcolNew)
    }

    /// PUT to a path with no resource yet.
    pub fn put_new(path: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            payload: Payload::Bytes(body.into()),
            ..Self::new(Verb::Put, path, Operation::PutNew)
        }
    }

    /// PUT over an existing resource.
    pub fn put_replace(path: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            payload: Payload::Bytes(body.into()),
            ..Self::new(Verb::Put, path, Operation::PutReplace)
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Verb::Get, path, Operation::GetExisting)
    }

    pub fn get_missing(path: impl Into<String>) -> Self {
        Self::new(Verb::Get, path, Operation::GetMissing)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Verb::Delete, path, Operation::Delete)
    }

    /// DELETE of a possibly-absent resource before a fresh run.
    pub fn cleanup(path: impl Into<String>) -> Self {
        Self::new(Verb::Delete, path, Operation::Cleanup)
    }

    // ------------------------------------------------------------------
    // Locks
    // ------------------------------------------------------------------

    /// Exclusive depth-infinity write lock; binds the token to `var`.
    pub fn lock_exclusive(path: impl Into<String>, var: impl Into<String>) -> Self {
        Self::lock(path, LockRequest::exclusive(), Operation::LockNew).capture_token(var)
    }

    /// Shared depth-infinity write lock; binds the token to `var`.
    pub fn lock_shared(path: impl Into<String>, var: impl Into<String>) -> Self {
        Self::lock(path, LockRequest::shared(), Operation::LockNew).capture_token(var)
    }

    /// Exclusive lock attempt that must be refused.
    pub fn lock_conflict(path: impl Into<String>) -> Self {
        Self::lock(path, LockRequest::exclusive(), Operation::LockConflict)
    }

    fn lock(path: impl Into<String>, request: LockRequest, operation: Operation) -> Self {
        let request = request.with_owner(LOCK_OWNER);
        Self {
            depth: Some(request.depth),
            timeout: request.timeout,
            payload: Payload::Lock(request),
            ..Self::new(Verb::Lock, path, operation)
        }
    }

    fn capture_token(mut self, var: impl Into<String>) -> Self {
        self.capture = Some(Capture::LockToken(var.into()));
        self
    }

    /// Bodyless LOCK presenting the token in `var`; the token must not change.
    pub fn refresh_lock(path: impl Into<String>, var: impl Into<String>) -> Self {
        let var = var.into();
        Self {
            timeout: Some(REFRESH_TIMEOUT),
            token: Some(var.clone()),
            checks: vec![Check::SameToken(var)],
            ..Self::new(Verb::Lock, path, Operation::LockRefresh)
        }
    }

    pub fn unlock(path: impl Into<String>, var: impl Into<String>) -> Self {
        Self {
            token: Some(var.into()),
            ..Self::new(Verb::Unlock, path, Operation::Unlock)
        }
    }

    /// UNLOCK with a token that was already released.
    pub fn unlock_consumed(path: impl Into<String>, var: impl Into<String>) -> Self {
        Self {
            token: Some(var.into()),
            ..Self::new(Verb::Unlock, path, Operation::UnlockConsumed)
        }
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    /// PROPPATCH setting every property; each must report success.
    pub fn proppatch_set(path: impl Into<String>, set: PropertySet) -> Self {
        let path = path.into();
        let checks = set
            .names()
            .map(|name| Check::property_status(path.clone(), name.clone(), StatusClass::Success))
            .collect();
        Self {
            payload: Payload::PropertyUpdate {
                set,
                remove: Vec::new(),
            },
            checks,
            ..Self::new(Verb::Proppatch, path, Operation::Proppatch)
        }
    }

    /// PROPPATCH removing properties; each must report success.
    pub fn proppatch_remove(path: impl Into<String>, remove: Vec<PropertyName>) -> Self {
        let path = path.into();
        let checks = remove
            .iter()
            .map(|name| Check::property_status(path.clone(), name.clone(), StatusClass::Success))
            .collect();
        Self {
            payload: Payload::PropertyUpdate {
                set: PropertySet::new(),
                remove,
            },
            checks,
            ..Self::new(Verb::Proppatch, path, Operation::Proppatch)
        }
    }

    /// allprop PROPFIND; `None` sends no Depth header.
    pub fn propfind(path: impl Into<String>, depth: Option<Depth>) -> Self {
        Self {
            depth,
            payload: Payload::Propfind(PropfindBody::AllProp),
            ..Self::new(Verb::Propfind, path, Operation::Propfind)
        }
    }

    /// PROPFIND for named properties.
    pub fn propfind_props(
        path: impl Into<String>,
        depth: Option<Depth>,
        names: Vec<PropertyName>,
    ) -> Self {
        Self {
            depth,
            payload: Payload::Propfind(PropfindBody::Props(names)),
            ..Self::new(Verb::Propfind, path, Operation::Propfind)
        }
    }

    // ------------------------------------------------------------------
    // Copy / move
    // ------------------------------------------------------------------

    /// COPY with Overwrite: T and Depth: infinity to an absent destination.
    pub fn copy(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::transfer(Verb::Copy, from, to, Operation::TransferNew)
    }

    /// COPY with Overwrite: T onto an existing destination.
    pub fn copy_replace(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::transfer(Verb::Copy, from, to, Operation::TransferReplace)
    }

    /// MOVE with Overwrite: T and Depth: infinity to an absent destination.
    pub fn move_(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::transfer(Verb::Move, from, to, Operation::TransferNew)
    }

    /// MOVE with Overwrite: T onto an existing destination.
    pub fn move_replace(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::transfer(Verb::Move, from, to, Operation::TransferReplace)
    }

    fn transfer(
        verb: Verb,
        from: impl Into<String>,
        to: impl Into<String>,
        operation: Operation,
    ) -> Self {
        Self {
            destination: Some(to.into()),
            depth: Some(Depth::Infinity),
            overwrite: Some(true),
            ..Self::new(verb, from, operation)
        }
    }

    // ------------------------------------------------------------------
    // Overrides
    // ------------------------------------------------------------------

    #[must_use]
    pub fn expect(mut self, expect: Expect) -> Self {
        self.expect = expect;
        self
    }

    #[must_use]
    pub fn expect_status(self, status: StatusCode) -> Self {
        self.expect(Expect::Status(status))
    }

    #[must_use]
    pub fn tolerate_failure(self) -> Self {
        self.expect(Expect::Tolerated)
    }

    #[must_use]
    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
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

    /// Present the token bound to `var` in an `If` header.
    #[must_use]
    pub fn with_lock(mut self, var: impl Into<String>) -> Self {
        self.token = Some(var.into());
        self
    }

    /// Build the request, resolving any token variable.
    pub fn request(&self, bindings: &Bindings) -> Result<DavRequest, FailureKind> {
        let mut request = match &self.payload {
            Payload::None => DavRequest::new(self.verb, self.path.as_str()),
            Payload::Bytes(body) => DavRequest {
                verb: self.verb,
                ..DavRequest::put(self.path.as_str(), body.clone())
            },
            Payload::Lock(lock) => DavRequest::lock(self.path.as_str(), lock),
            Payload::PropertyUpdate { set, remove } => {
                DavRequest::proppatch(self.path.as_str(), set, remove)
            }
            Payload::Propfind(body) => DavRequest::propfind(self.path.as_str(), self.depth, body),
        };

        request.depth = self.depth;
        request.overwrite = self.overwrite;
        request.destination.clone_from(&self.destination);
        request.timeout = self.timeout;

        if let Some(var) = &self.token {
            let token = bindings.token(var)?.clone();
            if self.verb == Verb::Unlock {
                request.lock_token = Some(token);
            } else {
                request.if_token = Some(token);
            }
        }
        Ok(request)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb, self.path)?;
        if let Some(destination) = &self.destination {
            write!(f, " -> {destination}")?;
        }
        Ok(())
    }
}

/// A named, ordered sequence of steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub name: String,
    pub description: String,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            steps: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    #[must_use]
    pub fn steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
