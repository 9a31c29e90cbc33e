//! Line-delimited assistant event protocol
//!
//! Frames are lines of the form `data: <payload>` terminated by `\n`, with
//! `: comment` lines and blank lines discarded and the distinguished payload
//! `[DONE]` marking stream end. A payload is one complete JSON object
//! carrying either a display-text delta or a batch of tool-call fragments;
//! tool-call argument text may span many frames and is reassembled through
//! [`quill_repair::StreamAccumulator`].
//!
//! The decoder here is a synchronous state machine; the async loop that owns
//! the transport lives in `quill-core`.

pub mod decoder;
pub mod frame;
pub mod instruction;
pub mod transport;

pub use decoder::{DecodeError, DecoderConfig, FrameDecoder, StreamEvent};
pub use frame::{FRAME_TAG, STREAM_END_SENTINEL};
pub use instruction::{Instruction, InstructionError, InstructionKind};
pub use transport::{Transport, TransportError};
