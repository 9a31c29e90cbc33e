//! Frame vocabulary and payload classification
//!
//! Frame boundaries are defined solely by the line terminator; a payload may
//! be cut across chunk boundaries and must not be assumed complete until a
//! terminator is observed.

use serde::Deserialize;
use serde_json::Value;

/// Tag prefixing every meaningful frame line.
pub const FRAME_TAG: &str = "data:";

/// Distinguished payload signaling stream completion.
pub const STREAM_END_SENTINEL: &str = "[DONE]";

/// One tool-call fragment inside an instruction-batch payload.
///
/// `id` and `name` arrive with the first fragment for an index; `arguments`
/// carries a fragment of JSON text that accumulates across frames.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToolCallDelta {
    /// Position of the call within the batch; also the accumulation key.
    #[serde(default)]
    pub index: usize,
    /// Call identifier, first fragment only.
    #[serde(default)]
    pub id: Option<String>,
    /// Instruction name, first fragment only.
    #[serde(default)]
    pub name: Option<String>,
    /// Fragment of the argument JSON text.
    #[serde(default)]
    pub arguments: Option<String>,
}

/// A strictly parsed frame payload, classified by its carried field.
#[derive(Debug)]
pub(crate) enum Payload {
    /// Display text to append to the visible response.
    Delta(String),
    /// A batch of tool-call fragments.
    ToolCalls(Vec<ToolCallDelta>),
    /// Valid JSON carrying neither recognized field.
    Unrecognized,
}

/// Strict-parses one payload. The instruction-batch field wins when both are
/// present. `Err` means the payload is not (yet) valid JSON.
pub(crate) fn classify_payload(payload: &str) -> Result<Payload, serde_json::Error> {
    let value: Value = serde_json::from_str(payload)?;
    if let Some(calls) = value.get("tool_calls") {
        if let Ok(calls) = serde_json::from_value::<Vec<ToolCallDelta>>(calls.clone()) {
            return Ok(Payload::ToolCalls(calls));
        }
        tracing::debug!("tool_calls field is not a well-formed batch");
        return Ok(Payload::Unrecognized);
    }
    if let Some(text) = value.get("delta").and_then(Value::as_str) {
        return Ok(Payload::Delta(text.to_string()));
    }
    Ok(Payload::Unrecognized)
}
