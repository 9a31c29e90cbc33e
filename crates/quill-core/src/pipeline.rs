//! Async pipeline driver
//!
//! One task owns the transport reader exclusively. Awaiting the next chunk
//! is the pipeline's only suspension point, and the shutdown signal is
//! raced against exactly that await; everything downstream of a chunk
//! (decode, dispatch, patch, version) runs synchronously.

use quill_wire::{DecodeError, DecoderConfig, FrameDecoder, StreamEvent, Transport, TransportError};
use tokio::sync::watch;

use crate::api::{DeltaSink, DocumentStore, Notifier};
use crate::session::DocumentSession;

/// Stream-fatal pipeline failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// The transport failed; surfaced verbatim, never retried here.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The decoder gave up (buffer ceiling exceeded).
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The caller signalled shutdown.
    #[error("stream cancelled")]
    Cancelled,
}

/// Counters for one completed stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Raw chunks read from the transport.
    pub chunks: usize,
    /// Display deltas forwarded to the sink.
    pub deltas: usize,
    /// Instructions that applied successfully.
    pub instructions: usize,
    /// Instructions rejected with a recoverable failure.
    pub failed_instructions: usize,
    /// True when the stream completed (sentinel or clean closure).
    pub completed: bool,
}

/// Drives one event stream to completion.
///
/// Transport failures and decoder overflow are terminal; instruction-level
/// failures are not (they are counted and the stream continues). Flipping
/// the shutdown signal to `true` aborts at the next chunk boundary.
pub async fn run_stream<T, S, N, D>(
    transport: &mut T,
    session: &mut DocumentSession<S, N>,
    sink: &mut D,
    config: DecoderConfig,
    mut shutdown: watch::Receiver<bool>,
) -> Result<StreamStats, PipelineError>
where
    T: Transport,
    S: DocumentStore,
    N: Notifier,
    D: DeltaSink,
{
    let mut decoder = FrameDecoder::new(config);
    let mut stats = StreamStats::default();

    loop {
        let chunk = tokio::select! {
            () = wait_for_shutdown(&mut shutdown) => return Err(PipelineError::Cancelled),
            chunk = transport.next_chunk() => chunk?,
        };
        let Some(chunk) = chunk else {
            break;
        };
        stats.chunks += 1;
        let events = decoder.feed(&chunk)?;
        route_events(events, session, sink, &mut stats);
        if decoder.is_done() {
            break;
        }
    }

    let events = decoder.finish()?;
    route_events(events, session, sink, &mut stats);
    tracing::debug!(
        "stream finished: {} chunks, {} deltas, {} instructions ({} failed)",
        stats.chunks,
        stats.deltas,
        stats.instructions,
        stats.failed_instructions
    );
    Ok(stats)
}

fn route_events<S, N, D>(
    events: Vec<StreamEvent>,
    session: &mut DocumentSession<S, N>,
    sink: &mut D,
    stats: &mut StreamStats,
) where
    S: DocumentStore,
    N: Notifier,
    D: DeltaSink,
{
    for event in events {
        match event {
            StreamEvent::Delta(text) => {
                sink.push_delta(&text);
                stats.deltas += 1;
            }
            StreamEvent::Instructions(batch) => {
                for result in session.dispatch(&batch) {
                    if result.is_success() {
                        stats.instructions += 1;
                    } else {
                        stats.failed_instructions += 1;
                    }
                }
            }
            StreamEvent::Done => stats.completed = true,
        }
    }
}

/// Resolves when the caller signals shutdown; never resolves once the
/// sender is gone (cancellation is then no longer possible).
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            futures::future::pending::<()>().await;
        }
    }
}
