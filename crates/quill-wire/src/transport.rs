//! Transport interface for the raw event stream
//!
//! The transport itself (HTTP client, retry policy, auth) is an external
//! collaborator. This core only sees an ordered sequence of text chunks and
//! a typed, terminal failure classification. Retry is an external policy:
//! nothing here re-issues a request.

use async_trait::async_trait;

/// Terminal transport failure, surfaced before or between frames.
///
/// Each category maps to a non-success response class from the remote
/// assistant endpoint and ends the current stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The remote endpoint rejected the request for rate reasons.
    #[error("assistant endpoint rate limited the stream")]
    RateLimited,

    /// The account or plan has no remaining quota.
    #[error("assistant endpoint quota exhausted")]
    QuotaExhausted,

    /// Any other non-success response or connection-level failure.
    #[error("assistant endpoint unavailable: {0}")]
    Unavailable(String),
}

/// Ordered source of raw text chunks for one stream.
///
/// `Ok(None)` signals transport closure (end of stream without a sentinel
/// frame). Implementations must not retry internally; a failure is terminal
/// for the stream it interrupts.
#[async_trait]
pub trait Transport: Send {
    /// Awaits the next chunk of raw text.
    async fn next_chunk(&mut self) -> Result<Option<String>, TransportError>;
}
