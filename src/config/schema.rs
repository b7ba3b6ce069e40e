//! Declared value kinds and coercion rules for configuration validation.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;

use super::tree::ConfigValue;
use crate::time::parse_date;

/// The kind a configuration leaf is expected to have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Integer,
    Float,
    String,
    Date,
    Path,
    List,
    Tree,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::Float => "number",
            Self::String => "string",
            Self::Date => "date",
            Self::Path => "path",
            Self::List => "list",
            Self::Tree => "subtree",
        };
        write!(f, "{name}")
    }
}

/// Read a value as an integer
///
/// Whole floats and numeric strings are accepted.
#[must_use]
pub fn as_integer(value: &ConfigValue) -> Option<i64> {
    match value {
        ConfigValue::Integer(i) => Some(*i),
        #[allow(clippy::cast_possible_truncation)]
        ConfigValue::Float(x) if x.fract() == 0.0 && x.is_finite() && x.abs() < 9.0e15 => {
            Some(*x as i64)
        }
        ConfigValue::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Read a value as a number, widening integers
#[must_use]
pub fn as_float(value: &ConfigValue) -> Option<f64> {
    match value {
        ConfigValue::Float(x) => Some(*x),
        #[allow(clippy::cast_precision_loss)]
        ConfigValue::Integer(i) => Some(*i as f64),
        ConfigValue::String(s) => s.trim().parse::<f64>().ok().filter(|x| x.is_finite()),
        _ => None,
    }
}

/// Read a value as a boolean
#[must_use]
pub fn as_bool(value: &ConfigValue) -> Option<bool> {
    match value {
        ConfigValue::Bool(b) => Some(*b),
        ConfigValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Read a scalar as text
#[must_use]
pub fn as_string(value: &ConfigValue) -> Option<String> {
    match value {
        ConfigValue::String(s) => Some(s.clone()),
        ConfigValue::Integer(_)
        | ConfigValue::Float(_)
        | ConfigValue::Bool(_)
        | ConfigValue::Date(_) => Some(value.to_string()),
        ConfigValue::List(_) | ConfigValue::Tree(_) => None,
    }
}

/// Read a value as a date, parsing strings in any supported format
#[must_use]
pub fn as_date(value: &ConfigValue) -> Option<NaiveDate> {
    match value {
        ConfigValue::Date(d) => Some(*d),
        ConfigValue::String(s) => parse_date(s),
        _ => None,
    }
}

/// Coerce a value to `kind`, returning `None` when no rule applies
#[must_use]
pub fn coerce(value: &ConfigValue, kind: ValueKind) -> Option<ConfigValue> {
    match kind {
        ValueKind::Bool => as_bool(value).map(ConfigValue::Bool),
        ValueKind::Integer => as_integer(value).map(ConfigValue::Integer),
        ValueKind::Float => as_float(value).map(ConfigValue::Float),
        ValueKind::String => as_string(value).map(ConfigValue::String),
        ValueKind::Date => as_date(value).map(ConfigValue::Date),
        ValueKind::Path => match value {
            ConfigValue::String(_) => Some(value.clone()),
            _ => None,
        },
        ValueKind::List => match value {
            ConfigValue::List(_) => Some(value.clone()),
            _ => None,
        },
        ValueKind::Tree => match value {
            ConfigValue::Tree(_) => Some(value.clone()),
            _ => None,
        },
    }
}

/// A declared configuration key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaEntry {
    /// Expected kind of the leaf
    pub kind: ValueKind,
    /// Whether the key must be present after merging
    pub required: bool,
}

/// Typed declarations for configuration keys, contributed by the core and by
/// each component
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSchema {
    entries: BTreeMap<String, SchemaEntry>,
}

impl ConfigSchema {
    /// Create an empty schema
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an optional key
    #[must_use]
    pub fn optional(mut self, key: &str, kind: ValueKind) -> Self {
        self.declare(key, kind, false);
        self
    }

    /// Declare a required key
    #[must_use]
    pub fn required(mut self, key: &str, kind: ValueKind) -> Self {
        self.declare(key, kind, true);
        self
    }

    /// Declare a key
    ///
    /// Redeclaring a key keeps the last kind and remembers if any
    /// declaration required it.
    pub fn declare(&mut self, key: &str, kind: ValueKind, required: bool) {
        let entry = self.entries.entry(key.to_string()).or_insert(SchemaEntry {
            kind,
            required: false,
        });
        entry.kind = kind;
        entry.required |= required;
    }

    /// Add every declaration of `other`
    pub fn extend(&mut self, other: &Self) {
        for (key, entry) in &other.entries {
            self.declare(key, entry.kind, entry.required);
        }
    }

    /// Look up a declaration
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&SchemaEntry> {
        self.entries.get(key)
    }

    /// Iterate over declarations in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &SchemaEntry)> {
        self.entries.iter()
    }

    /// Number of declared keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is declared
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
