//! Dispatch results and failure taxonomy
//!
//! A failed instruction never aborts its batch: each one gets its own
//! result, and later instructions still run (they may depend on fields an
//! earlier one just recomputed, so order is preserved instead).

use quill_doc::DocumentId;
use quill_wire::{Instruction, InstructionError};
use serde_json::Value;

/// What a successful instruction did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A field of the active document was patched.
    FieldUpdated {
        /// Rendered prior value at the path, when one existed.
        before_value: Option<String>,
    },
    /// A new document was created from a template.
    DocumentCreated {
        /// Identifier returned by the document store.
        document_id: DocumentId,
    },
}

/// Why an instruction was rejected. All variants are recoverable: the
/// document is left untouched and the batch continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// There is no document to update.
    #[error("no active document")]
    NoActiveDocument,

    /// The active document is final and locked against mutation.
    #[error("document is final and cannot be modified")]
    DocumentLocked,

    /// A required argument is absent.
    #[error("missing required argument: {0}")]
    MissingArgument(&'static str),

    /// The instruction name matches no known shape.
    #[error("unknown instruction: {0}")]
    UnknownInstruction(String),

    /// The template collaborator did not return a document.
    #[error("document creation failed: {0}")]
    TemplateFailed(String),
}

impl From<InstructionError> for DispatchError {
    fn from(err: InstructionError) -> Self {
        match err {
            InstructionError::UnknownName(name) => Self::UnknownInstruction(name),
            InstructionError::MissingArgument(key) => Self::MissingArgument(key),
        }
    }
}

/// The per-instruction record returned by dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResult {
    /// The instruction as it was dispatched.
    pub instruction: Instruction,
    /// Success with its outcome, or the specific failure.
    pub outcome: Result<DispatchOutcome, DispatchError>,
}

impl DispatchResult {
    /// True when the instruction applied.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// A human-readable summary for the notification surface.
    #[must_use]
    pub fn message(&self) -> String {
        match &self.outcome {
            Ok(DispatchOutcome::FieldUpdated { before_value }) => {
                let path = self
                    .instruction
                    .arguments
                    .get("field_path")
                    .and_then(Value::as_str)
                    .unwrap_or("field");
                match before_value {
                    Some(before) => format!("Updated {path} (was {before})"),
                    None => format!("Updated {path}"),
                }
            }
            Ok(DispatchOutcome::DocumentCreated { document_id }) => {
                format!("Created document {document_id}")
            }
            Err(err) => format!("Could not apply {}: {err}", self.instruction.name),
        }
    }
}
