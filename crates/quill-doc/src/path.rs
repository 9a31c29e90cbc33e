//! Field paths addressing into a document's field map
//!
//! Three forms exist on the wire:
//! - a plain top-level key: `clientName`
//! - an indexed element-and-property reference: `items[0].qty`
//! - a broadcast over the line-item list: `all_items.unitPrice`
//!
//! Parsing never fails; anything that is not a well-formed indexed or
//! broadcast reference is treated as a plain key.

use serde_json::Value;
use std::fmt;

use crate::document::{FieldMap, ITEMS_KEY};

/// Prefix selecting every element of the line-item list.
const BROADCAST_PREFIX: &str = "all_items.";

/// A parsed field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldPath {
    /// A top-level key.
    Plain(String),
    /// One property of one element of a named list. Indices are zero-based
    /// and validated against list bounds at patch time, not here.
    Indexed {
        /// Name of the list field.
        list: String,
        /// Zero-based element index.
        index: usize,
        /// Property of the addressed element.
        prop: String,
    },
    /// One property of every element of the `items` list.
    Broadcast {
        /// Property to set on each element.
        prop: String,
    },
}

impl FieldPath {
    /// Parses a raw path string. Never fails: malformed indexed or
    /// broadcast syntax degrades to a plain key.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if let Some(prop) = raw.strip_prefix(BROADCAST_PREFIX) {
            if !prop.is_empty() && !prop.contains('.') && !prop.contains('[') {
                return Self::Broadcast {
                    prop: prop.to_string(),
                };
            }
        }
        if let Some(parsed) = Self::parse_indexed(raw) {
            return parsed;
        }
        Self::Plain(raw.to_string())
    }

    fn parse_indexed(raw: &str) -> Option<Self> {
        let open = raw.find('[')?;
        let close = raw[open..].find(']')? + open;
        let list = &raw[..open];
        let index: usize = raw[open + 1..close].parse().ok()?;
        let prop = raw[close + 1..].strip_prefix('.')?;
        if list.is_empty() || prop.is_empty() || prop.contains('.') || prop.contains('[') {
            return None;
        }
        Some(Self::Indexed {
            list: list.to_string(),
            index,
            prop: prop.to_string(),
        })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(key) => f.write_str(key),
            Self::Indexed { list, index, prop } => write!(f, "{list}[{index}].{prop}"),
            Self::Broadcast { prop } => write!(f, "all_items.{prop}"),
        }
    }
}

/// Reads the current value addressed by `path`, for before-value capture.
///
/// The broadcast form reports the first element's property as the
/// representative prior value.
#[must_use]
pub fn read_field(fields: &FieldMap, path: &FieldPath) -> Option<Value> {
    match path {
        FieldPath::Plain(key) => fields.get(key).cloned(),
        FieldPath::Indexed { list, index, prop } => fields
            .get(list)?
            .as_array()?
            .get(*index)?
            .get(prop)
            .cloned(),
        FieldPath::Broadcast { prop } => fields
            .get(ITEMS_KEY)?
            .as_array()?
            .first()?
            .get(prop)
            .cloned(),
    }
}
