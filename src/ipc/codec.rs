//! Length-prefixed MessagePack codec for tokio I/O.
//!
//! Framing: `[4 bytes: payload length, big-endian u32][N bytes: MessagePack payload]`

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::protocol::{MAX_PAYLOAD_SIZE, Message, RawEnvelope};

/// Codec error type.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("payload too large: {0} bytes (max {MAX_PAYLOAD_SIZE})")]
    PayloadTooLarge(usize),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("MessagePack encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("MessagePack decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// Frame-level codec: handles only the length prefix.
///
/// Yields raw payloads without deserializing. The daemon's connection
/// tasks use it for two-phase decode via [`decode_frame`].
#[derive(Debug, Default)]
pub struct FrameCodec {
    /// Length of the frame being read, once its header is consumed.
    pending_len: Option<usize>,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self { pending_len: None }
    }
}

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let payload_len = match self.pending_len {
            Some(len) => len,
            None => {
                if src.len() < 4 {
                    return Ok(None);
                }
                let len = src.get_u32() as usize;
                if len > MAX_PAYLOAD_SIZE {
                    return Err(CodecError::PayloadTooLarge(len));
                }
                self.pending_len = Some(len);
                len
            }
        };

        if src.len() < payload_len {
            src.reserve(payload_len - src.len());
            return Ok(None);
        }

        self.pending_len = None;
        Ok(Some(src.split_to(payload_len)))
    }
}

impl Encoder<Message> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = rmp_serde::to_vec_named(&item)?;
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(CodecError::PayloadTooLarge(payload.len()));
        }
        dst.reserve(4 + payload.len());
        dst.put_u32(payload.len() as u32);
        dst.extend_from_slice(&payload);
        Ok(())
    }
}

/// Message-level codec for clients: frames plus MessagePack in one step.
#[derive(Debug, Default)]
pub struct MessageCodec {
    frames: FrameCodec,
}

impl MessageCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.frames.decode(src)? {
            Some(payload) => Ok(Some(rmp_serde::from_slice(&payload)?)),
            None => Ok(None),
        }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.frames.encode(item, dst)
    }
}

/// Result of attempting to decode a raw frame into a protocol message.
#[derive(Debug)]
pub enum DecodeResult {
    /// A known message variant.
    Ok(Message),
    /// Unknown type; the envelope carries the id to echo.
    UnknownType(RawEnvelope),
    /// Could not even extract `{type, id}`.
    Malformed(rmp_serde::decode::Error),
}

/// Two-phase decode: try [`Message`], fall back to [`RawEnvelope`].
pub fn decode_frame(payload: &[u8]) -> DecodeResult {
    match rmp_serde::from_slice::<Message>(payload) {
        Ok(msg) => DecodeResult::Ok(msg),
        Err(_) => match rmp_serde::from_slice::<RawEnvelope>(payload) {
            Ok(envelope) => DecodeResult::UnknownType(envelope),
            Err(e) => DecodeResult::Malformed(e),
        },
    }
}
