//! Namespaced property names and property sets.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::PropertyNameError;

/// The `DAV:` namespace URI.
pub const DAV_NAMESPACE: &str = "DAV:";

/// A namespaced property name, written in Clark notation as `{namespace}name`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyName {
    pub namespace: String,
    pub name: String,
}

impl PropertyName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// A live property in the `DAV:` namespace.
    pub fn dav(name: impl Into<String>) -> Self {
        Self::new(DAV_NAMESPACE, name)
    }

    pub fn is_dav(&self) -> bool {
        self.namespace == DAV_NAMESPACE
    }
}

impl fmt::Display for PropertyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{}", self.namespace, self.name)
    }
}

impl FromStr for PropertyName {
    type Err = PropertyNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix('{')
            .ok_or_else(|| PropertyNameError(s.to_string()))?;
        let (namespace, name) = rest
            .split_once('}')
            .ok_or_else(|| PropertyNameError(s.to_string()))?;
        if name.is_empty() || name.contains(['{', '}']) {
            return Err(PropertyNameError(s.to_string()));
        }
        Ok(Self::new(namespace, name))
    }
}

/// Dead properties to write with PROPPATCH, keyed by name.
///
/// A name appears at most once; setting it again replaces the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertySet {
    values: BTreeMap<PropertyName, String>,
}

impl PropertySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: PropertyName, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: PropertyName, value: impl Into<String>) -> Option<String> {
        self.values.insert(name, value.into())
    }

    pub fn get(&self, name: &PropertyName) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &PropertyName> {
        self.values.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PropertyName, &str)> {
        self.values.iter().map(|(k, v)| (k, v.as_str()))
    }
}

impl FromIterator<(PropertyName, String)> for PropertySet {
    fn from_iter<T: IntoIterator<Item = (PropertyName, String)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clark_notation_round_trip() {
        let name: PropertyName = "{testns:}testname".parse().unwrap();
        assert_eq!(name.namespace, "testns:");
        assert_eq!(name.name, "testname");
        assert_eq!(name.to_string(), "{testns:}testname");
    }

    #[test]
    fn test_empty_namespace_is_allowed() {
        let name: PropertyName = "{}plain".parse().unwrap();
        assert_eq!(name.namespace, "");
        assert_eq!(name.name, "plain");
    }

    #[test]
    fn test_invalid_clark_notation() {
        assert!("testname".parse::<PropertyName>().is_err());
        assert!("{testns:testname".parse::<PropertyName>().is_err());
        assert!("{testns:}".parse::<PropertyName>().is_err());
    }

    #[test]
    fn test_property_set_replaces_value() {
        let name = PropertyName::new("testns:", "testname");
        let mut set = PropertySet::new().with(name.clone(), "first");

        let previous = set.set(name.clone(), "second");

        assert_eq!(previous.as_deref(), Some("first"));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(&name), Some("second"));
    }

    #[test]
    fn test_dav_namespace() {
        assert!(PropertyName::dav("getcontentlength").is_dav());
        assert!(!PropertyName::new("testns:", "x").is_dav());
    }
}
