//! Hierarchical configuration values addressed by dotted key paths.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use super::schema::{ValueKind, as_bool, as_date, as_float, as_integer, as_string, coerce};
use crate::error::{Result, SimulationError};

/// A single configuration value
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    /// Boolean flag
    Bool(bool),
    /// Whole number
    Integer(i64),
    /// Floating point number
    Float(f64),
    /// Free text, including filesystem paths
    String(String),
    /// Calendar date
    Date(NaiveDate),
    /// Ordered list of values
    List(Vec<ConfigValue>),
    /// Nested subtree
    Tree(ConfigurationTree),
}

impl ConfigValue {
    /// The kind of this value before any coercion
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Integer(_) => ValueKind::Integer,
            Self::Float(_) => ValueKind::Float,
            Self::String(_) => ValueKind::String,
            Self::Date(_) => ValueKind::Date,
            Self::List(_) => ValueKind::List,
            Self::Tree(_) => ValueKind::Tree,
        }
    }

    /// Parse a scalar written on a command line (`--set key=value`)
    ///
    /// The text is read as a YAML scalar, so `220` becomes an integer,
    /// `0.5` a float and `true` a boolean.
    pub fn parse_scalar(text: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(text)?;
        Self::from_yaml(&value)?.ok_or_else(|| {
            SimulationError::Specification(format!("empty value '{text}' cannot be assigned"))
        })
    }

    /// Convert a YAML node; `null` yields `None`
    pub fn from_yaml(value: &serde_yaml::Value) -> Result<Option<Self>> {
        use serde_yaml::Value;

        let converted = match value {
            Value::Null => return Ok(None),
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    Self::Float(f)
                } else {
                    return Err(SimulationError::Specification(format!(
                        "number {n} is out of range"
                    )));
                }
            }
            Value::String(s) => Self::String(s.clone()),
            Value::Sequence(items) => Self::List(
                items
                    .iter()
                    .map(Self::from_yaml)
                    .filter_map(Result::transpose)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Value::Mapping(_) => Self::Tree(ConfigurationTree::from_yaml(value)?),
            Value::Tagged(tagged) if tagged.tag == DATE_TAG => {
                let date = tagged.value.as_str().and_then(iso_date).ok_or_else(|| {
                    SimulationError::Specification(format!(
                        "!{DATE_TAG} expects a YYYY-MM-DD scalar, found {:?}",
                        tagged.value
                    ))
                })?;
                Self::Date(date)
            }
            Value::Tagged(tagged) => {
                return Err(SimulationError::Specification(format!(
                    "unsupported YAML tag {}",
                    tagged.tag
                )));
            }
        };
        Ok(Some(converted))
    }

    /// Convert to a YAML node; dates become `!date YYYY-MM-DD` scalars
    #[must_use]
    pub fn to_yaml_value(&self) -> serde_yaml::Value {
        use serde_yaml::Value;
        use serde_yaml::value::{Tag, TaggedValue};

        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Integer(i) => Value::from(*i),
            Self::Float(x) => Value::from(*x),
            Self::String(s) => Value::String(s.clone()),
            Self::Date(d) => Value::Tagged(Box::new(TaggedValue {
                tag: Tag::new(DATE_TAG),
                value: Value::String(d.format("%Y-%m-%d").to_string()),
            })),
            Self::List(items) => Value::Sequence(items.iter().map(Self::to_yaml_value).collect()),
            Self::Tree(tree) => tree.to_yaml_value(),
        }
    }

    /// Short human-readable rendering used in error messages
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::String(s) => format!("string \"{s}\""),
            Self::List(items) => format!("list of {} items", items.len()),
            Self::Tree(tree) => format!("subtree with {} keys", tree.len()),
            other => format!("{} {other}", other.kind()),
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Tree(tree) => write!(f, "{{{} keys}}", tree.len()),
        }
    }
}

impl Serialize for ConfigValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Float(x) => serializer.serialize_f64(*x),
            Self::String(s) => serializer.serialize_str(s),
            Self::Date(d) => serializer.collect_str(&d.format("%Y-%m-%d")),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Tree(tree) => tree.serialize(serializer),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for ConfigValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<NaiveDate> for ConfigValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<ConfigurationTree> for ConfigValue {
    fn from(value: ConfigurationTree) -> Self {
        Self::Tree(value)
    }
}

/// YAML tag marking a date scalar
const DATE_TAG: &str = "date";

fn iso_date(s: &str) -> Option<NaiveDate> {
    let bytes = s.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Hierarchical mapping from key paths to values
///
/// Keys are stored one segment per level; the accessors take dotted paths
/// such as `time.start.year`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigurationTree {
    entries: BTreeMap<String, ConfigValue>,
}

impl ConfigurationTree {
    /// Create an empty tree
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion of a dotted key
    #[must_use]
    pub fn with(mut self, path: &str, value: impl Into<ConfigValue>) -> Self {
        self.set(path, value);
        self
    }

    /// Number of top-level keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the tree has no keys
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over top-level entries
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ConfigValue)> {
        self.entries.iter()
    }

    /// Look up a dotted path
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&ConfigValue> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.entries.get(first)?;
        for segment in segments {
            match current {
                ConfigValue::Tree(tree) => current = tree.entries.get(segment)?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Whether a dotted path is present
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// The subtree at a dotted path, if it is one
    #[must_use]
    pub fn subtree(&self, path: &str) -> Option<&Self> {
        match self.get(path)? {
            ConfigValue::Tree(tree) => Some(tree),
            _ => None,
        }
    }

    /// Set a dotted path, creating intermediate subtrees as needed
    ///
    /// A scalar standing where a subtree is needed is replaced.
    pub fn set(&mut self, path: &str, value: impl Into<ConfigValue>) {
        let value = value.into();
        match path.split_once('.') {
            None => {
                self.entries.insert(path.to_string(), value);
            }
            Some((head, rest)) => {
                let slot = self
                    .entries
                    .entry(head.to_string())
                    .or_insert_with(|| ConfigValue::Tree(Self::new()));
                if !matches!(slot, ConfigValue::Tree(_)) {
                    *slot = ConfigValue::Tree(Self::new());
                }
                if let ConfigValue::Tree(tree) = slot {
                    tree.set(rest, value);
                }
            }
        }
    }

    /// All leaves as `(dotted path, value)` pairs, in key order
    #[must_use]
    pub fn leaves(&self) -> Vec<(String, &ConfigValue)> {
        let mut out = Vec::new();
        self.collect_leaves("", &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a ConfigValue)>) {
        for (key, value) in &self.entries {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            match value {
                ConfigValue::Tree(tree) => tree.collect_leaves(&path, out),
                leaf => out.push((path, leaf)),
            }
        }
    }

    /// Overlay `other` onto this tree key by key
    ///
    /// Subtrees present in both are merged recursively; any other value in
    /// `other` replaces the value here. Keys only present here are kept.
    pub fn merge_from(&mut self, other: &Self) {
        for (key, incoming) in &other.entries {
            match (self.entries.get_mut(key), incoming) {
                (Some(ConfigValue::Tree(existing)), ConfigValue::Tree(overlay)) => {
                    existing.merge_from(overlay);
                }
                _ => {
                    self.entries.insert(key.clone(), incoming.clone());
                }
            }
        }
    }

    /// Build a tree from a YAML mapping
    ///
    /// Dotted keys are expanded into nested subtrees and `null` values are
    /// skipped.
    pub fn from_yaml(value: &serde_yaml::Value) -> Result<Self> {
        let mapping = match value {
            serde_yaml::Value::Mapping(mapping) => mapping,
            serde_yaml::Value::Null => return Ok(Self::new()),
            other => {
                return Err(SimulationError::Specification(format!(
                    "expected a mapping of configuration keys, found {other:?}"
                )));
            }
        };

        let mut tree = Self::new();
        for (key, node) in mapping {
            let key = yaml_key(key)?;
            let Some(value) = ConfigValue::from_yaml(node)? else {
                log::debug!("Skipping null configuration value for '{key}'");
                continue;
            };
            match value {
                // Merge rather than overwrite so `time.start.year` and a
                // nested `time: {end: ...}` can coexist in one document.
                ConfigValue::Tree(subtree) => {
                    let mut overlay = Self::new();
                    overlay.set(&key, ConfigValue::Tree(subtree));
                    tree.merge_from(&overlay);
                }
                scalar => tree.set(&key, scalar),
            }
        }
        Ok(tree)
    }

    /// Parse a YAML document
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(text)?;
        Self::from_yaml(&value)
    }

    /// Serialize to a YAML document
    ///
    /// Plain strings stay strings when read back, even date-like ones;
    /// dates are written with a `!date` tag.
    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.to_yaml_value())?)
    }

    /// Convert to a YAML mapping
    #[must_use]
    pub fn to_yaml_value(&self) -> serde_yaml::Value {
        self.entries
            .iter()
            .map(|(key, value)| (serde_yaml::Value::String(key.clone()), value.to_yaml_value()))
            .collect::<serde_yaml::Mapping>()
            .into()
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SimulationError::Specification(format!("JSON serialization failed: {e}")))
    }

    /// Read a dotted path coerced to `kind`
    ///
    /// # Errors
    /// `MissingConfiguration` when absent, `ConfigurationType` when the value
    /// cannot be coerced
    pub fn get_as(&self, path: &str, kind: ValueKind) -> Result<ConfigValue> {
        self.typed(path, kind, |value| coerce(value, kind))
    }

    fn typed<T>(
        &self,
        path: &str,
        kind: ValueKind,
        convert: impl FnOnce(&ConfigValue) -> Option<T>,
    ) -> Result<T> {
        let value = self
            .get(path)
            .ok_or_else(|| SimulationError::MissingConfiguration {
                key: path.to_string(),
            })?;
        convert(value).ok_or_else(|| SimulationError::ConfigurationType {
            key: path.to_string(),
            expected: kind,
            found: value.describe(),
        })
    }

    /// Read an integer
    pub fn get_i64(&self, path: &str) -> Result<i64> {
        self.typed(path, ValueKind::Integer, as_integer)
    }

    /// Read a number
    pub fn get_f64(&self, path: &str) -> Result<f64> {
        self.typed(path, ValueKind::Float, as_float)
    }

    /// Read a boolean
    pub fn get_bool(&self, path: &str) -> Result<bool> {
        self.typed(path, ValueKind::Bool, as_bool)
    }

    /// Read a string
    pub fn get_string(&self, path: &str) -> Result<String> {
        self.typed(path, ValueKind::String, as_string)
    }

    /// Read a filesystem path
    pub fn get_path(&self, path: &str) -> Result<PathBuf> {
        self.typed(path, ValueKind::Path, |value| match value {
            ConfigValue::String(s) => Some(PathBuf::from(s)),
            _ => None,
        })
    }

    /// Read a date
    pub fn get_date(&self, path: &str) -> Result<NaiveDate> {
        self.typed(path, ValueKind::Date, as_date)
    }

    /// Read an integer, falling back to `default` when absent
    pub fn get_i64_or(&self, path: &str, default: i64) -> Result<i64> {
        if self.contains(path) { self.get_i64(path) } else { Ok(default) }
    }

    /// Read a number, falling back to `default` when absent
    pub fn get_f64_or(&self, path: &str, default: f64) -> Result<f64> {
        if self.contains(path) { self.get_f64(path) } else { Ok(default) }
    }

    /// Read a boolean, falling back to `default` when absent
    pub fn get_bool_or(&self, path: &str, default: bool) -> Result<bool> {
        if self.contains(path) { self.get_bool(path) } else { Ok(default) }
    }

    /// Read a string, falling back to `default` when absent
    pub fn get_string_or(&self, path: &str, default: &str) -> Result<String> {
        if self.contains(path) {
            self.get_string(path)
        } else {
            Ok(default.to_string())
        }
    }
}

impl Serialize for ConfigurationTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

fn yaml_key(key: &serde_yaml::Value) -> Result<String> {
    match key {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        other => Err(SimulationError::Specification(format!(
            "configuration keys must be scalars, found {other:?}"
        ))),
    }
}
