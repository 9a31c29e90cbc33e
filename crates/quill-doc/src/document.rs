//! Live document state as seen by the mutation pipeline

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Field-map key of the line-item list.
pub(crate) const ITEMS_KEY: &str = "items";

/// Line-item quantity property.
pub(crate) const QTY_KEY: &str = "qty";

/// Line-item unit-price property.
pub(crate) const UNIT_PRICE_KEY: &str = "unitPrice";

/// Derived per-item amount property (`qty * unitPrice`).
pub(crate) const AMOUNT_KEY: &str = "amount";

/// Derived document total (`sum of amounts`).
pub(crate) const TOTAL_AMOUNT_KEY: &str = "totalAmount";

/// Identifier of one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    /// A fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle status. A `Final` document is locked: no component of this
/// core may mutate its field map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Editable working copy.
    Draft,
    /// Finalized; the field map is immutable from here on.
    Final,
}

/// A document's field map: string keys to scalars or line-item lists.
pub type FieldMap = serde_json::Map<String, Value>;

/// One live document. Owned by the external document store; this core
/// reads and patches it through the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier, also the version-history key.
    pub id: DocumentId,
    /// Current field values.
    pub fields: FieldMap,
    /// Last rendered output blob.
    pub rendered: String,
    /// Lifecycle status.
    pub status: DocumentStatus,
}

impl Document {
    /// A fresh draft with the given fields and empty rendered output.
    #[must_use]
    pub fn draft(fields: FieldMap) -> Self {
        Self {
            id: DocumentId::new(),
            fields,
            rendered: String::new(),
            status: DocumentStatus::Draft,
        }
    }

    /// True when the document is locked against mutation.
    #[inline]
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.status == DocumentStatus::Final
    }

    /// Shallow-merges a patch fragment: each key overwrites wholesale.
    pub fn merge_fields(&mut self, patch: FieldMap) {
        for (key, value) in patch {
            self.fields.insert(key, value);
        }
    }
}

/// Renders a field value for human-readable reporting (before-values in
/// dispatch results). Strings are unquoted; everything else uses its JSON
/// form.
#[must_use]
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
