//! Fully-parsed assistant instructions
//!
//! An [`Instruction`] is only ever produced once its streamed JSON argument
//! text has parsed completely; partially-streamed instructions never leave
//! the decoder. The raw form keeps the name as a string so a dispatcher can
//! record and log unknown names instead of dropping them at decode time;
//! [`InstructionKind`] is the typed view checked at the dispatch boundary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Instruction name for a single-field document update.
pub const UPDATE_DOCUMENT_FIELD: &str = "update_document_field";

/// Instruction name for creating a document from a template.
pub const GENERATE_DOCUMENT: &str = "generate_document";

/// One named, fully-parsed request with arguments, eligible for dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// Call identifier as assigned by the assistant.
    pub id: String,
    /// Instruction name; unknown names are preserved for reporting.
    pub name: String,
    /// Completely parsed argument map.
    pub arguments: Map<String, Value>,
}

/// Why an instruction failed typed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstructionError {
    /// The name matches no known instruction shape.
    #[error("unknown instruction name: {0}")]
    UnknownName(String),

    /// A required argument is absent or not usable as text.
    #[error("missing required argument: {0}")]
    MissingArgument(&'static str),
}

/// The two known instruction shapes, validated at the dispatch boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionKind {
    /// Set one addressed field of the active document.
    UpdateDocumentField {
        /// Path addressing the field (plain, indexed, or broadcast form).
        field_path: String,
        /// Replacement value as freeform text.
        new_value: String,
    },
    /// Create a new document from a template and preset.
    GenerateDocument {
        /// Template to instantiate.
        template_key: String,
        /// Named preset of template defaults.
        preset: String,
    },
}

impl TryFrom<&Instruction> for InstructionKind {
    type Error = InstructionError;

    fn try_from(instruction: &Instruction) -> Result<Self, Self::Error> {
        match instruction.name.as_str() {
            UPDATE_DOCUMENT_FIELD => Ok(Self::UpdateDocumentField {
                field_path: require_text(&instruction.arguments, "field_path")?,
                new_value: require_text(&instruction.arguments, "new_value")?,
            }),
            GENERATE_DOCUMENT => Ok(Self::GenerateDocument {
                template_key: require_text(&instruction.arguments, "template_key")?,
                preset: require_text(&instruction.arguments, "preset")?,
            }),
            other => Err(InstructionError::UnknownName(other.to_string())),
        }
    }
}

/// Reads a required argument as text. Scalars that arrived as JSON numbers
/// or booleans are rendered, since the origin of the value is freeform.
fn require_text(
    arguments: &Map<String, Value>,
    key: &'static str,
) -> Result<String, InstructionError> {
    match arguments.get(key) {
        Some(Value::String(text)) => Ok(text.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        _ => Err(InstructionError::MissingArgument(key)),
    }
}
