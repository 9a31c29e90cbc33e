//! Best-effort recovery parsing for incomplete streamed JSON
//!
//! A token-by-token assistant stream is incomplete by construction until the
//! stream ends, so the text in flight rarely parses as-is. This crate
//! provides:
//! - [`parse`]: strict parse first, then a bounded textual repair pass and a
//!   retry, always returning a well-formed [`ParseOutcome`]
//! - [`StreamAccumulator`]: an append/finalize wrapper that owns the growing
//!   buffer and re-parses it on every chunk
//!
//! Repair is heuristic and lossy at the tail (a dangling key fragment is
//! stripped, an open string is closed, open brackets are balanced). It never
//! invents content before the truncation point.

pub mod accumulator;
pub mod parse;

pub use accumulator::{AccumulateError, StreamAccumulator, DEFAULT_BUFFER_CAPACITY};
pub use parse::{estimate_progress, extract_top_keys, parse, ParseOutcome};
