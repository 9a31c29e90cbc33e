//! Document model, patch engine, and version store
//!
//! A document is a string-keyed field map rendered elsewhere into
//! human-readable output. This crate owns the three pure-state concerns of
//! the mutation pipeline:
//! - [`FieldPath`]: addressing a scalar field, an indexed line-item
//!   property, or a broadcast over every line item
//! - [`build_patch`]: turning a freeform text value into a field-map
//!   fragment, recomputing dependent line-item amounts and the total
//! - [`VersionStore`]: per-document append-only snapshots with
//!   auto-snapshot-before-mutation and restore

pub mod document;
pub mod patch;
pub mod path;
pub mod version;

pub use document::{display_value, Document, DocumentId, DocumentStatus, FieldMap};
pub use patch::{build_patch, smart_convert};
pub use path::{read_field, FieldPath};
pub use version::{Snapshot, SnapshotId, VersionError, VersionStore};
