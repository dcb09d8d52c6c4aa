//! Tag sets attached to scopes, log records and spans.

use std::collections::btree_map::{self, BTreeMap};
use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Tag name to value mapping.
///
/// Values are JSON values so that any `Serialize` type can be attached.
/// Keys are kept sorted, which makes the `Display` output stable.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Tags(BTreeMap<String, Value>);

impl Tags {
    /// Create an empty tag set.
    #[inline]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Insert a tag, replacing any previous value for `key`.
    ///
    /// A value that cannot be serialized is stored as its error text.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Serialize) {
        self.0.insert(key.into(), to_value(value));
    }

    /// Builder-style [`Tags::insert`].
    #[inline]
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.insert(key, value);
        self
    }

    /// Get a tag value.
    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Check if a tag is present.
    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate tags in key order.
    #[inline]
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }

    /// Merge two tag sets into a new one.
    ///
    /// Every entry of `self` is kept unless `other` has the same key, in which
    /// case `other` wins. Neither input is modified.
    pub fn merge(&self, other: &Tags) -> Tags {
        let mut merged = self.0.clone();
        merged.extend(other.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        Tags(merged)
    }

    /// Merge `other` into `self` in place.
    pub(crate) fn extend_from(&mut self, other: &Tags) {
        self.0
            .extend(other.0.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

/// Convert any serializable value into a tag value.
pub(crate) fn to_value(value: impl Serialize) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| Value::String(e.to_string()))
}

/// Render a tag value the way it appears in text attributes.
///
/// Strings are used as-is (no quotes), everything else as compact JSON.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.0 {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            write!(f, "[{}:{}]", key, value_text(value))?;
        }
        Ok(())
    }
}

impl<K, V> FromIterator<(K, V)> for Tags
where
    K: Into<String>,
    V: Serialize,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tags = Tags::new();
        for (key, value) in iter {
            tags.insert(key, value);
        }
        tags
    }
}

impl<'a> IntoIterator for &'a Tags {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Build a [`Tags`] set from `key => value` pairs.
///
/// ```rust
/// let tags = tracelog::tags! { "user" => "alice", "attempt" => 3 };
/// assert_eq!(tags.len(), 2);
/// ```
#[macro_export]
macro_rules! tags {
    () => { $crate::Tags::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut tags = $crate::Tags::new();
        $( tags.insert($key, $value); )+
        tags
    }};
}
