//! In-memory collaborators for tests and examples
//!
//! Small honest implementations of the external interfaces, enough to run
//! the pipeline end to end without a network or a real document store.

use std::collections::VecDeque;

use async_trait::async_trait;
use quill_doc::{Document, DocumentId, FieldMap};
use quill_wire::{Transport, TransportError};

use crate::api::{DocumentStore, Notifier, TemplateError};
use crate::dispatch::DispatchResult;

/// Document store holding at most one active document.
#[derive(Debug, Default)]
pub struct MemoryStore {
    active: Option<Document>,
    templates: Vec<String>,
    /// Template/preset pairs requested so far, in order.
    pub created: Vec<(String, String)>,
}

impl MemoryStore {
    /// An empty store with no active document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store with the given active document.
    #[must_use]
    pub fn with_active(document: Document) -> Self {
        Self {
            active: Some(document),
            ..Self::default()
        }
    }

    /// Restricts `create_from_template` to the given template keys.
    /// Without this every key is accepted.
    #[must_use]
    pub fn with_templates(mut self, keys: &[&str]) -> Self {
        self.templates = keys.iter().map(ToString::to_string).collect();
        self
    }

    /// Read access to the active document.
    #[must_use]
    pub fn active(&self) -> Option<&Document> {
        self.active.as_ref()
    }
}

impl DocumentStore for MemoryStore {
    fn active_document(&mut self) -> Option<&mut Document> {
        self.active.as_mut()
    }

    fn create_from_template(
        &mut self,
        template_key: &str,
        preset: &str,
    ) -> Result<DocumentId, TemplateError> {
        if !self.templates.is_empty() && !self.templates.iter().any(|t| t == template_key) {
            return Err(TemplateError::UnknownTemplate(template_key.to_string()));
        }
        let mut fields = FieldMap::new();
        fields.insert("templateKey".to_string(), template_key.into());
        fields.insert("preset".to_string(), preset.into());
        let document = Document::draft(fields);
        let id = document.id;
        self.created
            .push((template_key.to_string(), preset.to_string()));
        // The freshly created document becomes the editing target.
        self.active = Some(document);
        Ok(id)
    }
}

/// Notifier that records every message for assertion.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    /// Messages in notification order.
    pub messages: Vec<String>,
}

impl Notifier for RecordingNotifier {
    fn notify(&mut self, result: &DispatchResult) {
        self.messages.push(result.message());
    }
}

/// Transport replaying a scripted sequence of chunks and failures.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    steps: VecDeque<Result<String, TransportError>>,
    stall_when_empty: bool,
}

impl ScriptedTransport {
    /// Yields the given chunks in order, then closes.
    #[must_use]
    pub fn from_chunks<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        Self {
            steps: chunks.into_iter().map(|c| Ok(c.into())).collect(),
            stall_when_empty: false,
        }
    }

    /// Appends a terminal failure after the scripted chunks.
    #[must_use]
    pub fn then_fail(mut self, error: TransportError) -> Self {
        self.steps.push_back(Err(error));
        self
    }

    /// Never closes: once the script is exhausted the transport stalls
    /// forever. For exercising cancellation.
    #[must_use]
    pub fn then_stall(mut self) -> Self {
        self.stall_when_empty = true;
        self
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn next_chunk(&mut self) -> Result<Option<String>, TransportError> {
        match self.steps.pop_front() {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(err)) => Err(err),
            None => {
                if self.stall_when_empty {
                    futures::future::pending::<()>().await;
                }
                Ok(None)
            }
        }
    }
}
