//! Field selectors
//!
//! A field is an ordered key path rooted in one of the entry's three
//! addressable sections. The string syntax is dotted keys with an
//! optional root sigil:
//!
//! ```text
//! a.b.c            record root (implicit)
//! $record.a.b.c    record root (explicit)
//! $record          the whole record
//! $labels.env      a label
//! $resource.region a resource key
//! ```
//!
//! `$attributes` is accepted as an alias for `$labels` in the string
//! syntax.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::{Entry, Value};

#[cfg(test)]
#[path = "field_test.rs"]
mod tests;

/// The entry section a field is rooted in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldRoot {
    Record,
    Labels,
    Resource,
}

/// A typed path into an entry
///
/// Value-typed and comparable by structural equality. Missing paths read
/// as `None`; writes auto-create intermediate maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    root: FieldRoot,
    keys: Vec<String>,
}

impl Field {
    /// A path under the record root; empty keys address the whole record
    pub fn record<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            root: FieldRoot::Record,
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// The whole record
    pub fn record_root() -> Self {
        Self {
            root: FieldRoot::Record,
            keys: Vec::new(),
        }
    }

    /// A label key
    pub fn label(key: impl Into<String>) -> Self {
        Self {
            root: FieldRoot::Labels,
            keys: vec![key.into()],
        }
    }

    /// A resource key
    pub fn resource(key: impl Into<String>) -> Self {
        Self {
            root: FieldRoot::Resource,
            keys: vec![key.into()],
        }
    }

    /// The root section of this field
    pub fn root(&self) -> FieldRoot {
        self.root
    }

    /// The key path under the root
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Read the value at this path
    ///
    /// Returns `None` when any part of the path is absent. Flat-map roots
    /// surface their values as string scalars.
    pub fn get(&self, entry: &Entry) -> Option<Value> {
        match self.root {
            FieldRoot::Record => {
                let mut current = &entry.record;
                for key in &self.keys {
                    current = current.as_map()?.get(key)?;
                }
                Some(current.clone())
            }
            FieldRoot::Labels => self
                .flat_key()
                .and_then(|k| entry.labels.get(k))
                .cloned()
                .map(Value::String),
            FieldRoot::Resource => self
                .flat_key()
                .and_then(|k| entry.resource.get(k))
                .cloned()
                .map(Value::String),
        }
    }

    /// Write a value at this path
    ///
    /// Record paths auto-create intermediate maps; an intermediate that
    /// holds a scalar is replaced by a map. Flat-map roots coerce the
    /// value to a string.
    pub fn set(&self, entry: &mut Entry, value: Value) {
        match self.root {
            FieldRoot::Record => {
                let Some((last, parents)) = self.keys.split_last() else {
                    entry.record = value;
                    return;
                };
                let mut current = &mut entry.record;
                for key in parents {
                    current = ensure_map(current)
                        .entry(key.clone())
                        .or_insert_with(Value::empty_map);
                }
                ensure_map(current).insert(last.clone(), value);
            }
            FieldRoot::Labels => {
                if let Some(key) = self.flat_key() {
                    entry.labels.insert(key.to_owned(), value.coerce_string());
                }
            }
            FieldRoot::Resource => {
                if let Some(key) = self.flat_key() {
                    entry.resource.insert(key.to_owned(), value.coerce_string());
                }
            }
        }
    }

    /// Remove and return the value at this path
    pub fn delete(&self, entry: &mut Entry) -> Option<Value> {
        match self.root {
            FieldRoot::Record => {
                let Some((last, parents)) = self.keys.split_last() else {
                    let old = std::mem::replace(&mut entry.record, Value::empty_map());
                    return Some(old);
                };
                let mut current = &mut entry.record;
                for key in parents {
                    current = current.as_map_mut()?.get_mut(key)?;
                }
                current.as_map_mut()?.remove(last)
            }
            FieldRoot::Labels => self
                .flat_key()
                .and_then(|k| entry.labels.remove(k))
                .map(Value::String),
            FieldRoot::Resource => self
                .flat_key()
                .and_then(|k| entry.resource.remove(k))
                .map(Value::String),
        }
    }

    fn flat_key(&self) -> Option<&str> {
        self.keys.first().map(String::as_str)
    }
}

/// Coerce a value into a map (replacing a scalar) and borrow it
fn ensure_map(value: &mut Value) -> &mut std::collections::BTreeMap<String, Value> {
    if !value.is_map() {
        *value = Value::empty_map();
    }
    match value {
        Value::Map(map) => map,
        _ => unreachable!("value was just replaced with a map"),
    }
}

impl Default for Field {
    fn default() -> Self {
        Self::record_root()
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let root = match self.root {
            FieldRoot::Record => "$record",
            FieldRoot::Labels => "$labels",
            FieldRoot::Resource => "$resource",
        };
        if self.keys.is_empty() {
            f.write_str(root)
        } else {
            write!(f, "{}.{}", root, self.keys.join("."))
        }
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("field cannot be empty".to_owned());
        }

        let (root, rest) = if let Some(stripped) = s.strip_prefix('$') {
            let (root_name, rest) = match stripped.split_once('.') {
                Some((r, rest)) => (r, Some(rest)),
                None => (stripped, None),
            };
            let root = match root_name {
                "record" => FieldRoot::Record,
                "labels" | "attributes" => FieldRoot::Labels,
                "resource" => FieldRoot::Resource,
                other => return Err(format!("unknown field root '${other}'")),
            };
            (root, rest)
        } else {
            (FieldRoot::Record, Some(s))
        };

        let keys: Vec<String> = match rest {
            Some(rest) if !rest.is_empty() => rest.split('.').map(str::to_owned).collect(),
            _ => Vec::new(),
        };

        if keys.iter().any(String::is_empty) {
            return Err(format!("field '{s}' contains an empty key"));
        }
        if matches!(root, FieldRoot::Labels | FieldRoot::Resource) && keys.len() != 1 {
            return Err(format!("field '{s}' must name exactly one key"));
        }

        Ok(Self { root, keys })
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Field {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
