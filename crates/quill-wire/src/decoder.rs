//! Frame decoder state machine
//!
//! Splits raw chunks into protocol frames and classifies each payload as a
//! display delta or a batch of tool-call fragments. Tool-call argument text
//! is reassembled per call index through a bounded
//! [`StreamAccumulator`]; an instruction is emitted the moment its
//! accumulated arguments parse strictly (a strict parse of an object can
//! only succeed once all of its text has arrived), or at stream end for
//! calls finished by the sentinel.
//!
//! The decoder is synchronous; the owning task feeds it chunks and routes
//! the returned events.

use std::collections::BTreeMap;

use quill_repair::{AccumulateError, StreamAccumulator, DEFAULT_BUFFER_CAPACITY};
use serde_json::{Map, Value};

use crate::frame::{classify_payload, Payload, ToolCallDelta, FRAME_TAG, STREAM_END_SENTINEL};
use crate::instruction::Instruction;

/// Buffer ceilings for one decoded stream.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Ceiling for the pending (not yet line-terminated) byte buffer.
    pub max_pending_bytes: usize,
    /// Ceiling for one tool call's accumulated argument text.
    pub max_argument_bytes: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_pending_bytes: DEFAULT_BUFFER_CAPACITY,
            max_argument_bytes: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

/// Ordered output of the decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Display text for the external renderer, in arrival order.
    Delta(String),
    /// Fully-parsed instructions ready for dispatch.
    Instructions(Vec<Instruction>),
    /// The stream completed (sentinel frame or transport closure).
    Done,
}

/// Stream-fatal decoding failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// A buffer ceiling was exceeded; the stream cannot continue.
    #[error("frame buffer exceeded {limit} bytes")]
    BufferOverflow {
        /// The configured ceiling in bytes.
        limit: usize,
    },
}

enum LineAction {
    Continue,
    PutBack(String),
    Finished,
}

#[derive(Debug)]
struct ToolCallSlot {
    id: Option<String>,
    name: Option<String>,
    arguments: StreamAccumulator,
    emitted: bool,
}

impl ToolCallSlot {
    fn new(capacity: usize) -> Self {
        Self {
            id: None,
            name: None,
            arguments: StreamAccumulator::with_capacity(capacity),
            emitted: false,
        }
    }

    fn instruction(&self, index: usize, arguments: Map<String, Value>) -> Instruction {
        Instruction {
            id: self
                .id
                .clone()
                .unwrap_or_else(|| format!("call-{index}")),
            name: self.name.clone().unwrap_or_default(),
            arguments,
        }
    }

    /// Builds the instruction from whatever the accumulator can still
    /// produce. Used at stream end for calls never strictly completed.
    fn into_instruction(self, index: usize) -> Option<Instruction> {
        if self.emitted {
            return None;
        }
        if self.name.is_none() {
            if !self.arguments.is_empty() {
                tracing::warn!("tool call {index} has arguments but no name; dropping");
            }
            return None;
        }
        let Some(value) = self.arguments.finalize() else {
            tracing::warn!("tool call {index} arguments never parsed; dropping");
            return None;
        };
        let arguments = into_argument_map(index, value);
        Some(self.instruction(index, arguments))
    }
}

fn into_argument_map(index: usize, value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => {
            tracing::warn!("tool call {index} arguments are not an object: {other}");
            Map::new()
        }
    }
}

/// Decoder over one event stream.
#[derive(Debug)]
pub struct FrameDecoder {
    config: DecoderConfig,
    pending: String,
    calls: BTreeMap<usize, ToolCallSlot>,
    done: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DecoderConfig::default())
    }
}

impl FrameDecoder {
    /// Creates a decoder with the given buffer ceilings.
    #[must_use]
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            config,
            pending: String::new(),
            calls: BTreeMap::new(),
            done: false,
        }
    }

    /// True once the sentinel was observed or [`finish`](Self::finish) ran.
    #[inline]
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Consumes one raw chunk and returns the events it completed.
    ///
    /// Chunks arriving after stream end are ignored.
    pub fn feed(&mut self, chunk: &str) -> Result<Vec<StreamEvent>, DecodeError> {
        let mut events = Vec::new();
        if self.done {
            tracing::debug!("ignoring {} bytes after stream end", chunk.len());
            return Ok(events);
        }
        if self.pending.len().saturating_add(chunk.len()) > self.config.max_pending_bytes {
            return Err(DecodeError::BufferOverflow {
                limit: self.config.max_pending_bytes,
            });
        }
        self.pending.push_str(chunk);

        while let Some(newline) = self.pending.find('\n') {
            let mut line: String = self.pending.drain(..=newline).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
            match self.process_line(&line, &mut events, false)? {
                LineAction::Continue => {}
                LineAction::PutBack(payload) => {
                    // The payload may have been split mid-object; re-prefix
                    // it and wait for more data instead of discarding it.
                    let mut rebuilt = String::with_capacity(
                        FRAME_TAG.len() + 1 + payload.len() + self.pending.len(),
                    );
                    rebuilt.push_str(FRAME_TAG);
                    rebuilt.push(' ');
                    rebuilt.push_str(&payload);
                    rebuilt.push_str(&self.pending);
                    self.pending = rebuilt;
                    break;
                }
                LineAction::Finished => {
                    self.complete_stream(&mut events);
                    break;
                }
            }
        }
        Ok(events)
    }

    /// Flushes remaining buffered lines (transport closed without a
    /// sentinel) and finalizes pending tool calls. Idempotent after the
    /// sentinel.
    pub fn finish(&mut self) -> Result<Vec<StreamEvent>, DecodeError> {
        let mut events = Vec::new();
        if self.done {
            return Ok(events);
        }
        let remainder = std::mem::take(&mut self.pending);
        for mut line in remainder.split('\n') {
            if self.done {
                break;
            }
            if let Some(stripped) = line.strip_suffix('\r') {
                line = stripped;
            }
            if let LineAction::Finished = self.process_line(line, &mut events, true)? {
                self.complete_stream(&mut events);
            }
        }
        if !self.done {
            self.complete_stream(&mut events);
        }
        Ok(events)
    }

    fn complete_stream(&mut self, events: &mut Vec<StreamEvent>) {
        self.done = true;
        let finalized = self.finalize_calls();
        if !finalized.is_empty() {
            events.push(StreamEvent::Instructions(finalized));
        }
        events.push(StreamEvent::Done);
    }

    fn finalize_calls(&mut self) -> Vec<Instruction> {
        let calls = std::mem::take(&mut self.calls);
        calls
            .into_iter()
            .filter_map(|(index, slot)| slot.into_instruction(index))
            .collect()
    }

    fn process_line(
        &mut self,
        line: &str,
        events: &mut Vec<StreamEvent>,
        at_end: bool,
    ) -> Result<LineAction, DecodeError> {
        if line.is_empty() || line.starts_with(':') {
            return Ok(LineAction::Continue);
        }
        let Some(payload) = line.strip_prefix(FRAME_TAG) else {
            tracing::debug!("discarding frame with unexpected tag");
            return Ok(LineAction::Continue);
        };
        let payload = payload.trim_start();
        if payload == STREAM_END_SENTINEL {
            return Ok(LineAction::Finished);
        }
        match classify_payload(payload) {
            Ok(Payload::ToolCalls(calls)) => {
                let mut completed = Vec::new();
                for call in &calls {
                    self.absorb_tool_call(call, &mut completed)?;
                }
                if !completed.is_empty() {
                    events.push(StreamEvent::Instructions(completed));
                }
                Ok(LineAction::Continue)
            }
            Ok(Payload::Delta(text)) => {
                events.push(StreamEvent::Delta(text));
                Ok(LineAction::Continue)
            }
            Ok(Payload::Unrecognized) => {
                tracing::debug!("frame payload carries neither tool calls nor a delta");
                Ok(LineAction::Continue)
            }
            Err(err) => {
                if at_end {
                    tracing::warn!("dropping frame payload that never became valid JSON: {err}");
                    Ok(LineAction::Continue)
                } else {
                    Ok(LineAction::PutBack(payload.to_string()))
                }
            }
        }
    }

    fn absorb_tool_call(
        &mut self,
        call: &ToolCallDelta,
        completed: &mut Vec<Instruction>,
    ) -> Result<(), DecodeError> {
        let slot = self
            .calls
            .entry(call.index)
            .or_insert_with(|| ToolCallSlot::new(self.config.max_argument_bytes));
        if let Some(id) = &call.id {
            slot.id = Some(id.clone());
        }
        if let Some(name) = &call.name {
            slot.name = Some(name.clone());
        }
        let Some(fragment) = &call.arguments else {
            return Ok(());
        };
        if slot.emitted {
            tracing::warn!("argument fragment for completed tool call {}; ignoring", call.index);
            return Ok(());
        }
        let outcome = slot.arguments.append(fragment).map_err(
            |AccumulateError::CapacityExceeded { limit }| DecodeError::BufferOverflow { limit },
        )?;
        if outcome.is_complete && slot.name.is_some() {
            let arguments = match outcome.parsed {
                Some(Value::Object(map)) => map,
                other => {
                    tracing::warn!(
                        "tool call {} arguments are not an object: {:?}",
                        call.index,
                        other
                    );
                    Map::new()
                }
            };
            let instruction = slot.instruction(call.index, arguments);
            slot.emitted = true;
            completed.push(instruction);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn delta_frame(text: &str) -> String {
        format!("data: {}\n", json!({ "delta": text }))
    }

    fn call_frame(index: usize, id: Option<&str>, name: Option<&str>, args: &str) -> String {
        let mut call = serde_json::Map::new();
        call.insert("index".to_string(), json!(index));
        if let Some(id) = id {
            call.insert("id".to_string(), json!(id));
        }
        if let Some(name) = name {
            call.insert("name".to_string(), json!(name));
        }
        call.insert("arguments".to_string(), json!(args));
        format!("data: {}\n", json!({ "tool_calls": [call] }))
    }

    #[test]
    fn delta_frames_are_forwarded_in_order() {
        let mut decoder = FrameDecoder::default();
        let chunk = format!("{}{}", delta_frame("Hel"), delta_frame("lo"));
        let events = decoder.feed(&chunk).unwrap();
        assert_eq!(
            events,
            vec![
                StreamEvent::Delta("Hel".to_string()),
                StreamEvent::Delta("lo".to_string()),
            ]
        );
    }

    #[test]
    fn line_split_across_chunks_waits_for_terminator() {
        let mut decoder = FrameDecoder::default();
        let frame = delta_frame("hello");
        let (head, tail) = frame.split_at(12);

        assert!(decoder.feed(head).unwrap().is_empty());
        let events = decoder.feed(tail).unwrap();
        assert_eq!(events, vec![StreamEvent::Delta("hello".to_string())]);
    }

    #[test]
    fn comments_blanks_and_foreign_tags_are_skipped() {
        let mut decoder = FrameDecoder::default();
        let chunk = format!(": keepalive\n\nevent: noise\n{}", delta_frame("ok"));
        let events = decoder.feed(&chunk).unwrap();
        assert_eq!(events, vec![StreamEvent::Delta("ok".to_string())]);
    }

    #[test]
    fn carriage_returns_are_trimmed() {
        let mut decoder = FrameDecoder::default();
        let events = decoder
            .feed("data: {\"delta\": \"crlf\"}\r\n")
            .unwrap();
        assert_eq!(events, vec![StreamEvent::Delta("crlf".to_string())]);
    }

    #[test]
    fn sentinel_completes_and_stops_processing() {
        let mut decoder = FrameDecoder::default();
        let chunk = format!("data: [DONE]\n{}", delta_frame("after"));
        let events = decoder.feed(&chunk).unwrap();
        assert_eq!(events, vec![StreamEvent::Done]);
        assert!(decoder.is_done());

        // Later chunks are ignored outright.
        assert!(decoder.feed(&delta_frame("late")).unwrap().is_empty());
        assert!(decoder.finish().unwrap().is_empty());
    }

    #[test]
    fn single_frame_tool_call_is_emitted_immediately() {
        let mut decoder = FrameDecoder::default();
        let args = json!({"field_path": "clientName", "new_value": "Acme"}).to_string();
        let events = decoder
            .feed(&call_frame(0, Some("call_1"), Some("update_document_field"), &args))
            .unwrap();

        assert_eq!(events.len(), 1);
        let StreamEvent::Instructions(instructions) = &events[0] else {
            panic!("expected instruction batch, got {events:?}");
        };
        assert_eq!(instructions.len(), 1);
        assert_eq!(instructions[0].id, "call_1");
        assert_eq!(instructions[0].name, "update_document_field");
        assert_eq!(
            instructions[0].arguments.get("new_value"),
            Some(&json!("Acme"))
        );
    }

    #[test]
    fn fragmented_arguments_accumulate_until_complete() {
        let mut decoder = FrameDecoder::default();
        let args = json!({"field_path": "clientName", "new_value": "Acme"}).to_string();
        let (first, rest) = args.split_at(14);
        let (second, third) = rest.split_at(11);

        let events = decoder
            .feed(&call_frame(0, Some("call_1"), Some("update_document_field"), first))
            .unwrap();
        assert!(events.is_empty());

        let events = decoder.feed(&call_frame(0, None, None, second)).unwrap();
        assert!(events.is_empty());

        let events = decoder.feed(&call_frame(0, None, None, third)).unwrap();
        let StreamEvent::Instructions(instructions) = &events[0] else {
            panic!("expected instruction batch, got {events:?}");
        };
        assert_eq!(
            instructions[0].arguments.get("field_path"),
            Some(&json!("clientName"))
        );
    }

    #[test]
    fn incomplete_arguments_fall_back_to_repair_at_finish() {
        let mut decoder = FrameDecoder::default();
        decoder
            .feed(&call_frame(
                0,
                Some("call_1"),
                Some("update_document_field"),
                "{\"field_path\": \"clientName\", \"new_value\":",
            ))
            .unwrap();

        let events = decoder.finish().unwrap();
        assert_eq!(events.len(), 2);
        let StreamEvent::Instructions(instructions) = &events[0] else {
            panic!("expected instruction batch, got {events:?}");
        };
        // The dangling key was stripped by repair; the rest survives.
        assert_eq!(
            instructions[0].arguments.get("field_path"),
            Some(&json!("clientName"))
        );
        assert!(!instructions[0].arguments.contains_key("new_value"));
        assert_eq!(events[1], StreamEvent::Done);
    }

    #[test]
    fn multiple_calls_finalize_in_index_order() {
        let mut decoder = FrameDecoder::default();
        // Neither call's arguments ever complete strictly; both finalize at
        // stream end, and order must follow indices, not arrival.
        decoder
            .feed(&call_frame(1, Some("call_b"), Some("update_document_field"), "{\"field_path\": \"b\""))
            .unwrap();
        decoder
            .feed(&call_frame(0, Some("call_a"), Some("update_document_field"), "{\"field_path\": \"a\""))
            .unwrap();

        let events = decoder.finish().unwrap();
        let StreamEvent::Instructions(instructions) = &events[0] else {
            panic!("expected instruction batch, got {events:?}");
        };
        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions[0].id, "call_a");
        assert_eq!(instructions[1].id, "call_b");
        assert_eq!(events[1], StreamEvent::Done);
    }

    #[test]
    fn completed_calls_are_not_emitted_twice() {
        let mut decoder = FrameDecoder::default();
        let args = json!({"field_path": "a", "new_value": "1"}).to_string();
        let events = decoder
            .feed(&call_frame(0, Some("call_a"), Some("update_document_field"), &args))
            .unwrap();
        assert!(matches!(events[0], StreamEvent::Instructions(_)));

        let events = decoder.finish().unwrap();
        assert_eq!(events, vec![StreamEvent::Done]);
    }

    #[test]
    fn put_back_recovers_payload_split_despite_terminator() {
        let mut decoder = FrameDecoder::default();
        let events = decoder.feed("data: {\"del\n").unwrap();
        assert!(events.is_empty());

        let events = decoder.feed("ta\": \"patched\"}\n").unwrap();
        assert_eq!(events, vec![StreamEvent::Delta("patched".to_string())]);
    }

    #[test]
    fn malformed_payload_is_dropped_at_finish() {
        let mut decoder = FrameDecoder::default();
        decoder.feed("data: {not json\n").unwrap();
        let events = decoder.finish().unwrap();
        assert_eq!(events, vec![StreamEvent::Done]);
    }

    #[test]
    fn final_unterminated_fragment_is_flushed_at_finish() {
        let mut decoder = FrameDecoder::default();
        decoder.feed("data: {\"delta\": \"done\"}").unwrap();
        let events = decoder.finish().unwrap();
        assert_eq!(
            events,
            vec![StreamEvent::Delta("done".to_string()), StreamEvent::Done]
        );
    }

    #[test]
    fn pending_buffer_overflow_fails_the_stream() {
        let mut decoder = FrameDecoder::new(DecoderConfig {
            max_pending_bytes: 16,
            max_argument_bytes: 16,
        });
        let err = decoder.feed("data: {\"delta\": \"far too long\"}").unwrap_err();
        assert_eq!(err, DecodeError::BufferOverflow { limit: 16 });
    }

    #[test]
    fn argument_buffer_overflow_fails_the_stream() {
        let mut decoder = FrameDecoder::new(DecoderConfig {
            max_pending_bytes: 4096,
            max_argument_bytes: 8,
        });
        let err = decoder
            .feed(&call_frame(0, Some("c"), Some("update_document_field"), "{\"field_path\": \"x\""))
            .unwrap_err();
        assert_eq!(err, DecodeError::BufferOverflow { limit: 8 });
    }

    #[test]
    fn unrecognized_payload_is_ignored() {
        let mut decoder = FrameDecoder::default();
        let events = decoder.feed("data: {\"usage\": {\"tokens\": 12}}\n").unwrap();
        assert!(events.is_empty());
    }
}
