//! Typed attribute containers for subjects and resources.
//!
//! The PDP wire format accepts arbitrary name/value maps. Internally they are
//! kept in a sorted map so that iteration order, equality and hashing never
//! depend on insertion order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Resource attribute naming the owning service.
pub const SERVICE_NAME: &str = "serviceName";
/// Resource attribute naming the owning account.
pub const ACCOUNT_ID: &str = "accountId";
/// Resource attribute naming the service instance.
pub const SERVICE_INSTANCE: &str = "serviceInstance";
/// Resource attribute naming the resource type.
pub const RESOURCE_TYPE: &str = "resourceType";
/// Resource attribute naming the resource itself.
pub const RESOURCE: &str = "resource";
/// Subject attribute holding the IAM identifier.
pub const ID: &str = "id";
/// Subject attribute holding the token scope.
pub const SCOPE: &str = "scope";

/// A single attribute value.
///
/// Values are strings, except for nested attribute sets that appear in
/// decoded token claims.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Plain string value.
    Text(String),
    /// Nested attribute set.
    Nested(Attributes),
}

impl AttributeValue {
    /// The string value, if this is a text attribute.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Nested(_) => None,
        }
    }

    /// The nested attributes, if any.
    pub fn as_nested(&self) -> Option<&Attributes> {
        match self {
            Self::Text(_) => None,
            Self::Nested(attrs) => Some(attrs),
        }
    }
}

impl From<Value> for AttributeValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => Self::Text(s),
            Value::Null => Self::Text(String::new()),
            Value::Bool(b) => Self::Text(b.to_string()),
            Value::Number(n) => Self::Text(n.to_string()),
            Value::Object(map) => Self::Nested(
                map.into_iter()
                    .map(|(k, v)| (k, AttributeValue::from(v)))
                    .collect(),
            ),
            array @ Value::Array(_) => Self::Text(array.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for AttributeValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(AttributeValue::from)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Attributes> for AttributeValue {
    fn from(value: Attributes) -> Self {
        Self::Nested(value)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Nested(attrs) => {
                f.write_str("{")?;
                for (i, (name, value)) in attrs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{name}={value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

/// A sorted name → value attribute map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, AttributeValue>);

impl Attributes {
    /// Create an empty attribute set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace an attribute.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Remove an attribute.
    pub fn remove(&mut self, name: &str) -> Option<AttributeValue> {
        self.0.remove(name)
    }

    /// Look up an attribute.
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.0.get(name)
    }

    /// Look up a text attribute.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(AttributeValue::as_str)
    }

    /// Check if an attribute is present.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if there are no attributes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate attribute names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Check if this set names exactly the attributes of `shape`.
    pub fn has_exact_names(&self, shape: &[String]) -> bool {
        self.len() == shape.len() && shape.iter().all(|name| self.contains(name))
    }

    /// Project onto `shape`, yielding values in shape order.
    ///
    /// Returns `None` if any attribute of the shape is missing.
    pub fn project<'a>(&'a self, shape: &'a [String]) -> Option<Vec<(&'a str, &'a AttributeValue)>> {
        shape
            .iter()
            .map(|name| self.get(name).map(|value| (name.as_str(), value)))
            .collect()
    }

    /// Keep only the attributes whose names satisfy `keep`.
    pub fn retain_names(&self, mut keep: impl FnMut(&str) -> bool) -> Self {
        self.0
            .iter()
            .filter(|(name, _)| keep(name))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl<K, V> FromIterator<(K, V)> for Attributes
where
    K: Into<String>,
    V: Into<AttributeValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = (&'a String, &'a AttributeValue);
    type IntoIter = std::collections::btree_map::Iter<'a, String, AttributeValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
