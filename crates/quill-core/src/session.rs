//! Document session: dispatcher plus owned version history
//!
//! The session ties the version store's lifecycle to the editing context
//! instead of hiding it in module-level state. Instructions in a batch are
//! applied strictly in order: later patches may read derived fields (such
//! as `totalAmount`) that earlier patches in the same batch just
//! recomputed.

use quill_doc::{
    build_patch, display_value, read_field, FieldPath, Snapshot, SnapshotId, VersionError,
    VersionStore,
};
use quill_wire::{Instruction, InstructionKind};

use crate::api::{DocumentStore, Notifier};
use crate::dispatch::{DispatchError, DispatchOutcome, DispatchResult};

/// Restore failure at the session boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RestoreError {
    /// There is no document to restore onto.
    #[error("no active document")]
    NoActiveDocument,

    /// The active document is final and locked against mutation.
    #[error("document is final and cannot be modified")]
    DocumentLocked,

    /// The version store rejected the restore.
    #[error(transparent)]
    Version(#[from] VersionError),
}

/// One editing session over the external document store.
#[derive(Debug)]
pub struct DocumentSession<S, N> {
    store: S,
    notifier: N,
    versions: VersionStore,
}

impl<S: DocumentStore, N: Notifier> DocumentSession<S, N> {
    /// Creates a session with a fresh, empty version history.
    #[must_use]
    pub fn new(store: S, notifier: N) -> Self {
        Self {
            store,
            notifier,
            versions: VersionStore::new(),
        }
    }

    /// Applies a batch of instructions strictly in order.
    ///
    /// Every instruction yields a result and a notification; failures do
    /// not abort the batch.
    pub fn dispatch(&mut self, instructions: &[Instruction]) -> Vec<DispatchResult> {
        instructions
            .iter()
            .map(|instruction| {
                let outcome = self.dispatch_one(instruction);
                match &outcome {
                    Ok(done) => {
                        tracing::info!("instruction {} applied: {done:?}", instruction.name);
                    }
                    Err(err) => {
                        tracing::warn!("instruction {} rejected: {err}", instruction.name);
                    }
                }
                let result = DispatchResult {
                    instruction: instruction.clone(),
                    outcome,
                };
                self.notifier.notify(&result);
                result
            })
            .collect()
    }

    fn dispatch_one(
        &mut self,
        instruction: &Instruction,
    ) -> Result<DispatchOutcome, DispatchError> {
        match InstructionKind::try_from(instruction)? {
            InstructionKind::UpdateDocumentField {
                field_path,
                new_value,
            } => self.update_field(&field_path, &new_value),
            InstructionKind::GenerateDocument {
                template_key,
                preset,
            } => self.generate_document(&template_key, &preset),
        }
    }

    fn update_field(
        &mut self,
        field_path: &str,
        new_value: &str,
    ) -> Result<DispatchOutcome, DispatchError> {
        let Some(document) = self.store.active_document() else {
            return Err(DispatchError::NoActiveDocument);
        };
        if document.is_final() {
            return Err(DispatchError::DocumentLocked);
        }
        let path = FieldPath::parse(field_path);
        let before_value = read_field(&document.fields, &path)
            .as_ref()
            .map(display_value);
        let patch = build_patch(&path, new_value, &document.fields);
        self.versions
            .update_with_version(document, patch, &format!("update {field_path}"));
        Ok(DispatchOutcome::FieldUpdated { before_value })
    }

    fn generate_document(
        &mut self,
        template_key: &str,
        preset: &str,
    ) -> Result<DispatchOutcome, DispatchError> {
        let document_id = self
            .store
            .create_from_template(template_key, preset)
            .map_err(|err| DispatchError::TemplateFailed(err.to_string()))?;
        Ok(DispatchOutcome::DocumentCreated { document_id })
    }

    /// Snapshots the active document's current state.
    pub fn snapshot_active(&mut self, reason: &str) -> Result<Snapshot, RestoreError> {
        let Some(document) = self.store.active_document() else {
            return Err(RestoreError::NoActiveDocument);
        };
        Ok(self.versions.save_version(document, reason))
    }

    /// Restores a snapshot onto the active document, preserving the
    /// current state as a pre-restore backup.
    pub fn restore_version(&mut self, snapshot_id: SnapshotId) -> Result<(), RestoreError> {
        let Some(document) = self.store.active_document() else {
            return Err(RestoreError::NoActiveDocument);
        };
        if document.is_final() {
            return Err(RestoreError::DocumentLocked);
        }
        self.versions.restore_version(document, snapshot_id)?;
        Ok(())
    }

    /// The session's version history.
    #[inline]
    #[must_use]
    pub fn versions(&self) -> &VersionStore {
        &self.versions
    }

    /// The wrapped document store.
    #[inline]
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The wrapped notification surface.
    #[inline]
    #[must_use]
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Mutable access to the wrapped document store.
    #[inline]
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}
