//! Ordered, YAML-shaped value model
//!
//! Every mapping in a TOSCA document is order-preserving; merge results keep
//! the container of the winning side so provenance metadata attached to a
//! mapping survives merging.

use indexmap::IndexMap;
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Deref, DerefMut};

/// Where a value was read from, used in diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provenance {
    /// Source document (path or URL)
    pub file: Option<String>,
    /// Line in the source document, when known
    pub line: Option<u64>,
}

impl Provenance {
    /// Provenance pointing at a whole document
    #[must_use]
    pub fn from_file(file: impl Into<String>) -> Self {
        Self {
            file: Some(file.into()),
            line: None,
        }
    }
}

/// An ordered string-keyed mapping with optional provenance
///
/// Equality is structural: provenance is ignored so that two parses of the
/// same document compare equal.
#[derive(Debug, Clone, Default)]
pub struct Mapping {
    entries: IndexMap<String, Value>,
    /// Source location of the mapping, carried through merges
    pub provenance: Option<Provenance>,
}

impl Mapping {
    /// Create an empty mapping
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty mapping carrying the given provenance
    #[must_use]
    pub fn with_provenance(provenance: Option<Provenance>) -> Self {
        Self {
            entries: IndexMap::new(),
            provenance,
        }
    }

    /// The underlying ordered map
    #[must_use]
    pub fn entries(&self) -> &IndexMap<String, Value> {
        &self.entries
    }

    /// Fetch a nested string value
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(Value::as_str)
    }

    /// Fetch a nested mapping value
    #[must_use]
    pub fn get_map(&self, key: &str) -> Option<&Mapping> {
        self.entries.get(key).and_then(Value::as_map)
    }

    /// Fetch a nested list value
    #[must_use]
    pub fn get_list(&self, key: &str) -> Option<&[Value]> {
        self.entries.get(key).and_then(Value::as_list)
    }

    /// Fetch a nested boolean value
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.entries.get(key).and_then(Value::as_bool)
    }
}

impl PartialEq for Mapping {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Deref for Mapping {
    type Target = IndexMap<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.entries
    }
}

impl DerefMut for Mapping {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.entries
    }
}

impl FromIterator<(String, Value)> for Mapping {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
            provenance: None,
        }
    }
}

impl IntoIterator for Mapping {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Mapping {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// A YAML-shaped value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// YAML null
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Integer(i64),
    /// Floating-point number
    Float(f64),
    /// String
    String(String),
    /// An RFC 3339 timestamp kept in its literal form
    Timestamp(String),
    /// Ordered sequence
    List(Vec<Value>),
    /// Ordered mapping
    Map(Mapping),
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Value {
    /// Name of the value's shape, used in diagnostics
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Timestamp(_) => "timestamp",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// True for `Value::Null`
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The boolean payload, if any
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer payload, if any
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The numeric payload widened to f64, if any
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// The string payload, if any
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Timestamp(s) => Some(s),
            _ => None,
        }
    }

    /// The list payload, if any
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// The mapping payload, if any
    #[must_use]
    pub fn as_map(&self) -> Option<&Mapping> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Mutable mapping payload, if any
    pub fn as_map_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Number of elements for strings, lists and maps
    #[must_use]
    pub fn length(&self) -> Option<usize> {
        match self {
            Value::String(s) => Some(s.chars().count()),
            Value::List(items) => Some(items.len()),
            Value::Map(map) => Some(map.len()),
            _ => None,
        }
    }

    /// Order two values when they are comparable
    ///
    /// Integers and floats compare numerically across variants; strings
    /// compare lexicographically; timestamps compare by instant when both
    /// parse as RFC 3339.
    #[must_use]
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => {
                let a = chrono::DateTime::parse_from_rfc3339(a).ok()?;
                let b = chrono::DateTime::parse_from_rfc3339(b).ok()?;
                Some(a.cmp(&b))
            }
            _ => {
                let a = self.as_f64()?;
                let b = other.as_f64()?;
                a.partial_cmp(&b)
            }
        }
    }

    /// Convert a `serde_yaml` tree, preserving mapping order
    ///
    /// `provenance` tags every mapping in the tree with the source document.
    #[must_use]
    pub fn from_yaml(yaml: &serde_yaml::Value, provenance: Option<&Provenance>) -> Self {
        match yaml {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(*b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_yaml::Value::String(s) => Value::String(s.clone()),
            serde_yaml::Value::Sequence(items) => Value::List(
                items
                    .iter()
                    .map(|item| Value::from_yaml(item, provenance))
                    .collect(),
            ),
            serde_yaml::Value::Mapping(entries) => {
                let mut map = Mapping::with_provenance(provenance.cloned());
                for (key, value) in entries {
                    let key = match key {
                        serde_yaml::Value::String(s) => s.clone(),
                        other => yaml_scalar_to_string(other),
                    };
                    map.insert(key, Value::from_yaml(value, provenance));
                }
                Value::Map(map)
            }
            serde_yaml::Value::Tagged(tagged) => Value::from_yaml(&tagged.value, provenance),
        }
    }

    /// Convert into a `serde_json` value (provenance is dropped)
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::String(s) | Value::Timestamp(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }

    /// Recursively apply `overlay` onto `self`
    ///
    /// Overlay wins on leaves; when both sides hold mappings the merge
    /// recurses; list values on the overlay replace the base. The result
    /// keeps the overlay mapping's container (and its provenance) at each
    /// merged level.
    #[must_use]
    pub fn merge(base: &Value, overlay: &Value) -> Value {
        match (base, overlay) {
            (Value::Map(base_map), Value::Map(overlay_map)) => {
                let mut merged = Mapping::with_provenance(
                    overlay_map
                        .provenance
                        .clone()
                        .or_else(|| base_map.provenance.clone()),
                );
                for (key, base_value) in base_map {
                    match overlay_map.get(key) {
                        Some(overlay_value) => {
                            merged.insert(key.clone(), Value::merge(base_value, overlay_value));
                        }
                        None => {
                            merged.insert(key.clone(), base_value.clone());
                        }
                    }
                }
                for (key, overlay_value) in overlay_map {
                    if !merged.contains_key(key) {
                        merged.insert(key.clone(), overlay_value.clone());
                    }
                }
                Value::Map(merged)
            }
            _ => overlay.clone(),
        }
    }
}

fn yaml_scalar_to_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::String(s) => s.clone(),
        _ => String::new(),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(s) | Value::Timestamp(s) => write!(f, "{s}"),
            Value::List(_) | Value::Map(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
