//! External collaborator interfaces
//!
//! The document store, the renderer, and the notification surface are
//! owned elsewhere in the application; the pipeline only sees these
//! traits. All three are synchronous: dispatch and patching happen inline
//! with one decode step (the transport await is the only suspension
//! point).

use quill_doc::{Document, DocumentId};

use crate::dispatch::DispatchResult;

/// Failure creating a document from a template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// No template is registered under that key.
    #[error("unknown template: {0}")]
    UnknownTemplate(String),

    /// The template system failed to produce a document.
    #[error("document creation failed: {0}")]
    CreationFailed(String),
}

/// The external document store: source of the active document and target
/// of new-document requests.
pub trait DocumentStore {
    /// The document currently being edited, if any.
    fn active_document(&mut self) -> Option<&mut Document>;

    /// Creates a document from a template and preset, returning its id.
    fn create_from_template(
        &mut self,
        template_key: &str,
        preset: &str,
    ) -> Result<DocumentId, TemplateError>;
}

/// Sink for display-text deltas, appended in arrival order.
pub trait DeltaSink {
    /// Appends one fragment to the visible response buffer.
    fn push_delta(&mut self, text: &str);
}

impl DeltaSink for String {
    fn push_delta(&mut self, text: &str) {
        self.push_str(text);
    }
}

/// Notification surface: one human-readable message per dispatched
/// instruction. Message content is a presentation concern.
pub trait Notifier {
    /// Reports one instruction result.
    fn notify(&mut self, result: &DispatchResult);
}

/// Notifier that discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&mut self, _result: &DispatchResult) {}
}
