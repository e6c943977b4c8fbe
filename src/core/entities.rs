//! core::entities
//!
//! Structured entities produced by the fact providers.
//!
//! Each provider assembles exactly one of these from a protocol exchange and
//! publishes it as its terminal fact. Entities are immutable once published;
//! a re-resolution produces a new value, never a mutation in place.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::Serialize;
use serde_json::{Map, Value};

use super::types::Oid;

/// Mapping from reference name (possibly rebased below a path prefix) to
/// commit id.
pub type RefSet = BTreeMap<String, Oid>;

/// Mapping from parsed semantic version to commit id.
///
/// `semver::Version` orders by semantic-version precedence, so iteration
/// yields versions lowest-first and `iter().next_back()` is the highest.
pub type VersionSet = BTreeMap<semver::Version, Oid>;

/// Relative paths declared in a repository's submodule manifest at a given
/// commit.
pub type SubmoduleSet = BTreeSet<PathBuf>;

/// A flat configuration listing plus its nested projection.
///
/// The flat view maps dotted keys to raw string values. The nested view is
/// built by splitting each key on `.`; the literal strings `"true"` and
/// `"false"` coerce to booleans there, everything else stays a string.
/// Duplicate keys are last-written-wins, matching the listing protocol where
/// later lines override earlier ones.
///
/// # Example
///
/// ```
/// use gitfacts::core::entities::ConfigMap;
///
/// let mut config = ConfigMap::new();
/// config.insert("core.bare", "false");
/// config.insert("submodule.vendor.url", "../vendor");
///
/// assert_eq!(config.get("core.bare"), Some("false"));
/// assert_eq!(config.get_bool("core.bare"), Some(false));
///
/// let nested = config.lookup(["submodule", "vendor", "url"]).unwrap();
/// assert_eq!(nested.as_str(), Some("../vendor"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigMap {
    flat: BTreeMap<String, String>,
    nested: Value,
}

impl ConfigMap {
    /// Create an empty configuration map.
    pub fn new() -> Self {
        Self {
            flat: BTreeMap::new(),
            nested: Value::Object(Map::new()),
        }
    }

    /// Record one `key=value` entry. Later writes to the same key win, in
    /// both the flat view and the nested projection.
    pub fn insert(&mut self, key: &str, value: &str) {
        self.flat.insert(key.to_string(), value.to_string());

        let coerced = match value {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            other => Value::String(other.to_string()),
        };

        let segments: Vec<&str> = key.split('.').collect();
        nested_insert(&mut self.nested, &segments, coerced);
    }

    /// Look up a raw value by its flat dotted key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.flat.get(key).map(String::as_str)
    }

    /// Look up a flat key and coerce `"true"`/`"false"` to a boolean.
    /// Any other value is `None`.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.flat.get(key).map(String::as_str) {
            Some("true") => Some(true),
            Some("false") => Some(false),
            _ => None,
        }
    }

    /// Walk the nested projection by successive key lookups.
    pub fn lookup<'a, I>(&self, path: I) -> Option<&Value>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut node = &self.nested;
        for segment in path {
            node = node.as_object()?.get(segment)?;
        }
        Some(node)
    }

    /// The nested projection as a JSON object tree.
    pub fn nested(&self) -> &Value {
        &self.nested
    }

    /// Iterate the flat entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.flat.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of distinct flat keys.
    pub fn len(&self) -> usize {
        self.flat.len()
    }

    /// Whether no entries have been recorded.
    pub fn is_empty(&self) -> bool {
        self.flat.is_empty()
    }
}

impl Default for ConfigMap {
    fn default() -> Self {
        Self::new()
    }
}

/// Descend the object tree along `segments`, creating objects as needed,
/// and write `leaf` at the end. A scalar found at an intermediate path
/// loses to the deeper write (last-written-wins).
fn nested_insert(node: &mut Value, segments: &[&str], leaf: Value) {
    let map = match node {
        Value::Object(map) => map,
        other => {
            *other = Value::Object(Map::new());
            match other {
                Value::Object(map) => map,
                _ => unreachable!(),
            }
        }
    };

    match segments {
        [] => {}
        [last] => {
            map.insert((*last).to_string(), leaf);
        }
        [head, rest @ ..] => {
            let child = map
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            nested_insert(child, rest, leaf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_and_nested_agree() {
        let mut config = ConfigMap::new();
        config.insert("submodule.submodule.url", "../elsewhere");

        assert_eq!(config.get("submodule.submodule.url"), Some("../elsewhere"));
        let nested = config.lookup(["submodule", "submodule", "url"]).unwrap();
        assert_eq!(nested.as_str(), Some("../elsewhere"));
    }

    #[test]
    fn booleans_coerce_only_in_nested_view() {
        let mut config = ConfigMap::new();
        config.insert("core.bare", "true");
        config.insert("core.ignorecase", "false");

        // Flat view keeps raw strings.
        assert_eq!(config.get("core.bare"), Some("true"));
        assert_eq!(config.get_bool("core.bare"), Some(true));
        assert_eq!(config.get_bool("core.ignorecase"), Some(false));

        assert_eq!(config.lookup(["core", "bare"]), Some(&Value::Bool(true)));
        assert_eq!(
            config.lookup(["core", "ignorecase"]),
            Some(&Value::Bool(false))
        );
    }

    #[test]
    fn non_boolean_stays_string() {
        let mut config = ConfigMap::new();
        config.insert("core.compression", "9");
        assert_eq!(
            config.lookup(["core", "compression"]).unwrap().as_str(),
            Some("9")
        );
        assert_eq!(config.get_bool("core.compression"), None);
    }

    #[test]
    fn last_written_wins() {
        let mut config = ConfigMap::new();
        config.insert("remote.origin.url", "first");
        config.insert("remote.origin.url", "second");

        assert_eq!(config.get("remote.origin.url"), Some("second"));
        assert_eq!(
            config.lookup(["remote", "origin", "url"]).unwrap().as_str(),
            Some("second")
        );
        assert_eq!(config.len(), 1);
    }

    #[test]
    fn deeper_write_replaces_scalar_intermediate() {
        let mut config = ConfigMap::new();
        config.insert("a.b", "scalar");
        config.insert("a.b.c", "deep");

        assert_eq!(config.get("a.b"), Some("scalar"));
        assert_eq!(config.lookup(["a", "b", "c"]).unwrap().as_str(), Some("deep"));
    }

    #[test]
    fn single_segment_key() {
        let mut config = ConfigMap::new();
        config.insert("bare", "true");
        assert_eq!(config.lookup(["bare"]), Some(&Value::Bool(true)));
    }

    #[test]
    fn missing_lookup_is_none() {
        let config = ConfigMap::new();
        assert!(config.lookup(["nope"]).is_none());
        assert!(config.get("nope").is_none());
        assert!(config.is_empty());
    }
}
