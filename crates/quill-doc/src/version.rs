//! Per-document version history with snapshot/restore
//!
//! The store is an explicitly owned object held by the session context (not
//! process-global state) and is volatile: history lives for the running
//! session only. Snapshots are append-only and never mutated; every
//! mutation applied through [`VersionStore::update_with_version`] is
//! preceded by a snapshot of the prior state, so history is always one
//! snapshot ahead of the live document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::document::{Document, DocumentId, FieldMap};

/// Identifier of one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotId(pub Uuid);

impl SnapshotId {
    /// A fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An immutable copy of a document's state at snapshot time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Snapshot identifier, the restore key.
    pub id: SnapshotId,
    /// Version string `"<major>.<minor>"`, starting at `"1.0"`.
    pub version: String,
    /// Deep copy of the field map at snapshot time.
    pub fields: FieldMap,
    /// Copy of the rendered output at snapshot time.
    pub rendered: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Why the snapshot was taken.
    pub reason: String,
}

/// Restore failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    /// No snapshot with that id exists for the document.
    #[error("no snapshot {snapshot_id} for document {document_id}")]
    NotFound {
        /// The document whose history was searched.
        document_id: DocumentId,
        /// The missing snapshot.
        snapshot_id: SnapshotId,
    },
}

/// Append-only version histories, keyed by document id.
#[derive(Debug, Default)]
pub struct VersionStore {
    histories: HashMap<DocumentId, Vec<Snapshot>>,
}

impl VersionStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots the document's current state and appends it to history.
    ///
    /// The version string continues from the last snapshot (`"1.0"` for a
    /// fresh document), incrementing the minor component.
    pub fn save_version(&mut self, document: &Document, reason: &str) -> Snapshot {
        let history = self.histories.entry(document.id).or_default();
        let version = next_version(history.last().map(|s| s.version.as_str()));
        let snapshot = Snapshot {
            id: SnapshotId::new(),
            version,
            fields: document.fields.clone(),
            rendered: document.rendered.clone(),
            created_at: Utc::now(),
            reason: reason.to_string(),
        };
        tracing::debug!(
            "saved version {} of document {} ({reason})",
            snapshot.version,
            document.id
        );
        history.push(snapshot.clone());
        snapshot
    }

    /// All snapshots of a document, oldest first.
    #[must_use]
    pub fn versions(&self, id: DocumentId) -> &[Snapshot] {
        self.histories.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Restores a snapshot onto the live document.
    ///
    /// The current state is saved first as a pre-restore backup, so a
    /// restore is itself restorable.
    pub fn restore_version(
        &mut self,
        document: &mut Document,
        snapshot_id: SnapshotId,
    ) -> Result<(), VersionError> {
        let target = self
            .versions(document.id)
            .iter()
            .find(|s| s.id == snapshot_id)
            .cloned()
            .ok_or(VersionError::NotFound {
                document_id: document.id,
                snapshot_id,
            })?;
        self.save_version(document, "pre-restore backup");
        document.fields = target.fields;
        document.rendered = target.rendered;
        tracing::info!(
            "restored document {} to version {}",
            document.id,
            target.version
        );
        Ok(())
    }

    /// Applies a field patch, always snapshotting the pre-mutation state
    /// first. Returns the snapshot that preserved the prior state.
    pub fn update_with_version(
        &mut self,
        document: &mut Document,
        patch: FieldMap,
        reason: &str,
    ) -> Snapshot {
        let snapshot = self.save_version(document, reason);
        document.merge_fields(patch);
        snapshot
    }
}

fn next_version(last: Option<&str>) -> String {
    let Some(last) = last else {
        return "1.0".to_string();
    };
    let (major, minor) = last.split_once('.').unwrap_or((last, "0"));
    let major: u32 = major.parse().unwrap_or(1);
    let minor: u32 = minor.parse().unwrap_or(0);
    format!("{major}.{}", minor + 1)
}
