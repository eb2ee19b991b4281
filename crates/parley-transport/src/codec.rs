//! Frame codec: length-prefixed JSON events.

use std::io;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use parley_core::event::{Event, EventData, EventId};

/// Size of the length prefix in bytes.
pub const FRAME_HEADER_LEN: usize = 4;

/// Errors produced while encoding or decoding a frame payload.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The payload bytes are not UTF-8.
    #[error("frame payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// The payload is not a well-formed event.
    #[error("frame payload is not a valid event: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload is well formed but carries a discriminator this build
    /// does not know.
    #[error("unknown event type: {0}")]
    UnknownType(String),

    /// The encoded event does not fit in a 32-bit length prefix.
    #[error("event payload of {0} bytes does not fit a frame header")]
    PayloadTooLarge(usize),
}

/// One frame read from the stream.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    /// A complete payload.
    Payload(Vec<u8>),
    /// A frame longer than the configured limit; its bytes were discarded.
    Oversized(usize),
}

#[derive(Deserialize)]
struct Envelope {
    event_id: EventId,
    #[serde(default)]
    response_to_event_id: Option<EventId>,
    data: Value,
}

/// Encodes `event` into a complete frame, header included.
///
/// # Errors
///
/// Returns `CodecError::Json` if serialization fails and
/// `CodecError::PayloadTooLarge` if the payload exceeds `u32::MAX` bytes.
pub fn encode_frame(event: &Event) -> Result<Vec<u8>, CodecError> {
    let payload = serde_json::to_vec(event)?;
    let len = u32::try_from(payload.len()).map_err(|_| CodecError::PayloadTooLarge(payload.len()))?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decodes a frame payload into an event.
///
/// Decoding is two-stage so that an unknown discriminator is reported as
/// `CodecError::UnknownType` rather than as malformed JSON.
///
/// # Errors
///
/// Returns `CodecError` if the payload is not UTF-8, not an event envelope,
/// or carries an unknown or malformed `data` object.
pub fn decode_event(payload: &[u8]) -> Result<Event, CodecError> {
    let text = std::str::from_utf8(payload)?;
    let envelope: Envelope = serde_json::from_str(text)?;

    let event_type = envelope
        .data
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_owned);

    match serde_json::from_value::<EventData>(envelope.data) {
        Ok(data) => Ok(Event {
            event_id: envelope.event_id,
            response_to_event_id: envelope.response_to_event_id,
            data,
        }),
        Err(err) => match event_type {
            Some(t) if !EventData::is_known_type(&t) => Err(CodecError::UnknownType(t)),
            _ => Err(CodecError::Json(err)),
        },
    }
}

/// Reads the next frame from `reader`.
///
/// Returns `Ok(None)` when the stream ends before a new header. Frames longer
/// than `max_len` are drained and reported as [`Frame::Oversized`] so the
/// stream stays in sync.
///
/// # Errors
///
/// Returns an I/O error if the stream fails or ends inside a frame.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> io::Result<Option<Frame>>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err),
    };

    if len > max_len {
        let skipped = tokio::io::copy(&mut (&mut *reader).take(len as u64), &mut tokio::io::sink()).await?;
        if skipped < len as u64 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        return Ok(Some(Frame::Oversized(len)));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(Frame::Payload(payload)))
}
