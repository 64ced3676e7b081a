//! Protocol codec for encoding/decoding wire messages
//!
//! Handles serialization and framing of protocol messages.

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use thiserror::Error;

use super::{WireMessage, MAGIC_BYTES};

/// Maximum message size (1 MiB)
const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Header size: magic(4) + type(1) + length(4) + sequence(4) = 13 bytes
const HEADER_SIZE: usize = 13;

/// Codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Invalid magic bytes")]
    InvalidMagic,

    #[error("Message too large: {0} bytes (max: {1})")]
    MessageTooLarge(usize, usize),

    #[error("Message type mismatch: header says {header:#x}, payload is {payload:#x}")]
    TypeMismatch { header: u8, payload: u8 },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Message frame with metadata
#[derive(Debug, Clone)]
pub struct Frame {
    /// Sequence number pairing a reply with its request
    pub sequence: u32,
    /// The actual message
    pub message: WireMessage,
}

impl Frame {
    pub fn new(sequence: u32, message: WireMessage) -> Self {
        Self { sequence, message }
    }
}

/// Encodes messages into the wire format
pub struct Encoder {
    sequence: u32,
}

impl Encoder {
    pub fn new() -> Self {
        Self { sequence: 0 }
    }

    /// Encode a message with the next sequence number, returning that number
    pub fn encode(&mut self, message: &WireMessage, buf: &mut BytesMut) -> Result<u32, CodecError> {
        let sequence = self.sequence;
        self.encode_with_sequence(message, sequence, buf)?;
        self.sequence = self.sequence.wrapping_add(1);
        Ok(sequence)
    }

    /// Encode a message under an explicit sequence number (used for replies)
    pub fn encode_with_sequence(
        &mut self,
        message: &WireMessage,
        sequence: u32,
        buf: &mut BytesMut,
    ) -> Result<(), CodecError> {
        let payload = serde_json::to_vec(message)?;

        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(CodecError::MessageTooLarge(payload.len(), MAX_MESSAGE_SIZE));
        }

        buf.reserve(HEADER_SIZE + payload.len());
        buf.put_slice(&MAGIC_BYTES);
        buf.put_u8(message.type_id());
        buf.put_u32(payload.len() as u32);
        buf.put_u32(sequence);
        buf.put_slice(&payload);

        Ok(())
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decodes messages from the wire format
pub struct Decoder {
    state: DecodeState,
}

#[derive(Default)]
enum DecodeState {
    #[default]
    Header,
    Payload {
        message_type: u8,
        length: usize,
        sequence: u32,
    },
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            state: DecodeState::Header,
        }
    }

    /// Attempt to decode a frame from the buffer
    /// Returns Ok(None) if more data is needed
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, CodecError> {
        loop {
            match self.state {
                DecodeState::Header => {
                    if buf.len() < HEADER_SIZE {
                        return Ok(None);
                    }

                    if buf[0..4] != MAGIC_BYTES {
                        return Err(CodecError::InvalidMagic);
                    }

                    let message_type = buf[4];
                    let length = u32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]) as usize;
                    let sequence = u32::from_be_bytes([buf[9], buf[10], buf[11], buf[12]]);

                    if length > MAX_MESSAGE_SIZE {
                        return Err(CodecError::MessageTooLarge(length, MAX_MESSAGE_SIZE));
                    }

                    buf.advance(HEADER_SIZE);

                    self.state = DecodeState::Payload {
                        message_type,
                        length,
                        sequence,
                    };
                }
                DecodeState::Payload {
                    message_type,
                    length,
                    sequence,
                } => {
                    if buf.len() < length {
                        return Ok(None);
                    }

                    let payload = buf.split_to(length);
                    self.state = DecodeState::Header;

                    let message: WireMessage = serde_json::from_slice(&payload)?;
                    if message.type_id() != message_type {
                        return Err(CodecError::TypeMismatch {
                            header: message_type,
                            payload: message.type_id(),
                        });
                    }

                    return Ok(Some(Frame::new(sequence, message)));
                }
            }
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Envelope, Request, Response, Sender};

    #[test]
    fn test_request_frame_decodes() {
        let mut encoder = Encoder::new();
        let mut decoder = Decoder::new();
        let mut buf = BytesMut::new();

        let envelope = Envelope::new(
            Sender::new(3, 9, "https://example.org"),
            Request::ToggleFullscreen {
                enter_fullscreen: false,
            },
        );
        encoder
            .encode(&WireMessage::Request { envelope }, &mut buf)
            .unwrap();

        let frame = decoder.decode(&mut buf).unwrap().unwrap();
        match frame.message {
            WireMessage::Request { envelope } => {
                assert_eq!(envelope.sender.window_id, 9);
                assert_eq!(
                    envelope.request,
                    Request::ToggleFullscreen {
                        enter_fullscreen: false
                    }
                );
            }
            other => panic!("Wrong message type: {:?}", other),
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn test_partial_frame_waits_for_more_data() {
        let mut encoder = Encoder::new();
        let mut decoder = Decoder::new();
        let mut full = BytesMut::new();
        encoder
            .encode(
                &WireMessage::Reply {
                    response: Some(Response::Focus { is_active: true }),
                },
                &mut full,
            )
            .unwrap();

        let mut buf = full.split_to(HEADER_SIZE + 2);
        assert!(decoder.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&full);
        let frame = decoder.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(
            frame.message,
            WireMessage::Reply {
                response: Some(Response::Focus { is_active: true })
            }
        ));
    }

    #[test]
    fn test_sequences_increment_and_replies_keep_theirs() {
        let mut encoder = Encoder::new();
        let mut decoder = Decoder::new();
        let mut buf = BytesMut::new();

        assert_eq!(
            encoder
                .encode(&WireMessage::Reply { response: None }, &mut buf)
                .unwrap(),
            0
        );
        assert_eq!(
            encoder
                .encode(&WireMessage::Reply { response: None }, &mut buf)
                .unwrap(),
            1
        );
        encoder
            .encode_with_sequence(&WireMessage::Reply { response: None }, 42, &mut buf)
            .unwrap();

        let sequences: Vec<u32> = std::iter::from_fn(|| decoder.decode(&mut buf).unwrap())
            .map(|frame| frame.sequence)
            .collect();
        assert_eq!(sequences, vec![0, 1, 42]);
    }

    #[test]
    fn test_invalid_magic_rejected() {
        let mut decoder = Decoder::new();
        let mut buf = BytesMut::from(&[0u8; HEADER_SIZE][..]);
        assert!(matches!(
            decoder.decode(&mut buf),
            Err(CodecError::InvalidMagic)
        ));
    }
}
