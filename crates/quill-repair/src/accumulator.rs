//! Append/finalize accumulation of a chunked JSON payload
//!
//! The accumulator owns the growing buffer for one streamed payload and
//! re-parses the whole buffer on every append (the repair pass is not
//! incremental, and chunk boundaries carry no meaning). The buffer is
//! bounded: a stream that never terminates fails with a capacity error
//! instead of growing without limit.

use serde_json::Value;

use crate::parse::{parse, ParseOutcome};

/// Default byte ceiling for one accumulated payload.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024 * 1024;

/// Error from [`StreamAccumulator::append`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccumulateError {
    /// The configured buffer ceiling would be exceeded by this chunk.
    #[error("accumulation buffer exceeded {limit} bytes")]
    CapacityExceeded {
        /// The configured ceiling in bytes.
        limit: usize,
    },
}

/// Stateful wrapper over [`parse`] for successive byte chunks of one payload.
#[derive(Debug, Clone)]
pub struct StreamAccumulator {
    buffer: String,
    latest: Option<ParseOutcome>,
    capacity: usize,
}

impl Default for StreamAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamAccumulator {
    /// Creates an accumulator with [`DEFAULT_BUFFER_CAPACITY`].
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    /// Creates an accumulator with an explicit byte ceiling.
    #[inline]
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: String::new(),
            latest: None,
            capacity,
        }
    }

    /// Appends a chunk and re-parses the entire buffer.
    ///
    /// The returned outcome is also cached for [`finalize`](Self::finalize)
    /// to fall back on.
    pub fn append(&mut self, chunk: &str) -> Result<ParseOutcome, AccumulateError> {
        if self.buffer.len() + chunk.len() > self.capacity {
            return Err(AccumulateError::CapacityExceeded {
                limit: self.capacity,
            });
        }
        self.buffer.push_str(chunk);
        let outcome = parse(&self.buffer);
        self.latest = Some(outcome.clone());
        Ok(outcome)
    }

    /// Strict-parses the full buffer, falling back to the last cached
    /// partial result. `None` when neither ever produced a value.
    #[must_use]
    pub fn finalize(&self) -> Option<Value> {
        serde_json::from_str(&self.buffer)
            .ok()
            .or_else(|| self.latest.as_ref().and_then(|o| o.parsed.clone()))
    }

    /// Clears the buffer and the cached outcome.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.latest = None;
    }

    /// The raw accumulated text.
    #[inline]
    #[must_use]
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// True when nothing has been appended since creation or reset.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn two_chunk_scenario() {
        let mut acc = StreamAccumulator::new();

        let first = acc.append(r#"{"type":"A","x":1,"y":"#).unwrap();
        assert!(!first.is_complete);
        assert_eq!(first.available_keys, vec!["type", "x"]);

        let second = acc.append("2}").unwrap();
        assert!(second.is_complete);
        assert_eq!(second.progress, 100);
        assert_eq!(second.parsed, Some(json!({"type": "A", "x": 1, "y": 2})));
    }

    #[test]
    fn finalize_prefers_strict_parse() {
        let mut acc = StreamAccumulator::new();
        acc.append(r#"{"a": 1}"#).unwrap();
        assert_eq!(acc.finalize(), Some(json!({"a": 1})));
    }

    #[test]
    fn finalize_falls_back_to_partial() {
        let mut acc = StreamAccumulator::new();
        acc.append(r#"{"a": 1, "b": [2,"#).unwrap();
        assert_eq!(acc.finalize(), Some(json!({"a": 1, "b": [2]})));
    }

    #[test]
    fn finalize_empty_is_none() {
        let acc = StreamAccumulator::new();
        assert_eq!(acc.finalize(), None);

        let mut acc = StreamAccumulator::new();
        acc.append("not json at all }{").unwrap();
        assert_eq!(acc.finalize(), None);
    }

    #[test]
    fn reset_clears_state() {
        let mut acc = StreamAccumulator::new();
        acc.append(r#"{"a": 1"#).unwrap();
        acc.reset();
        assert!(acc.is_empty());
        assert_eq!(acc.finalize(), None);
    }

    #[test]
    fn capacity_is_enforced() {
        let mut acc = StreamAccumulator::with_capacity(8);
        acc.append(r#"{"a":1"#).unwrap();
        let err = acc.append(r#", "b":2}"#).unwrap_err();
        assert_eq!(err, AccumulateError::CapacityExceeded { limit: 8 });
    }
}
