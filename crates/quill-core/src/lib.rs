//! Streamed-assistant mutation pipeline
//!
//! Wires the decoded event stream to the live document: display deltas go
//! to the renderer, completed instructions go through the dispatcher, and
//! every mutation is preceded by a version snapshot. The model is
//! single-writer and cooperative (one stream per document at a time); the
//! only suspension point is the transport await inside [`run_stream`],
//! which also carries the explicit shutdown signal.

pub mod api;
pub mod dispatch;
pub mod harness;
pub mod pipeline;
pub mod session;

pub use api::{DeltaSink, DocumentStore, NoopNotifier, Notifier, TemplateError};
pub use dispatch::{DispatchError, DispatchOutcome, DispatchResult};
pub use harness::{MemoryStore, RecordingNotifier, ScriptedTransport};
pub use pipeline::{run_stream, PipelineError, StreamStats};
pub use session::{DocumentSession, RestoreError};
