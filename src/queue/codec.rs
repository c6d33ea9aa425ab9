//! MessagePack codec for [`Message`] values
//!
//! MessagePack carries its own structure, so consecutive values can be
//! decoded back to back from one connection without a length prefix: the
//! decoder simply tries to read one value from the buffered bytes and asks
//! for more data when the value is incomplete.

use crate::queue::error::QueueError;
use crate::queue::message::Message;
use bytes::{Buf, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

/// Largest encoded message the decoder buffers while waiting for the rest
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct MessageCodec {
    max_message_size: usize,
}

impl MessageCodec {
    pub fn new() -> Self {
        Self::with_max_message_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    pub fn with_max_message_size(max_message_size: usize) -> Self {
        Self { max_message_size }
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// True when decoding failed only because the buffer ended early
fn is_incomplete(error: &rmp_serde::decode::Error) -> bool {
    use rmp_serde::decode::Error;

    match error {
        Error::InvalidMarkerRead(e) | Error::InvalidDataRead(e) => {
            e.kind() == io::ErrorKind::UnexpectedEof
        }
        _ => false,
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = QueueError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, QueueError> {
        if src.is_empty() {
            return Ok(None);
        }

        let mut cursor = io::Cursor::new(&src[..]);
        match rmp_serde::from_read::<_, Message>(&mut cursor) {
            Ok(message) => {
                let consumed = cursor.position() as usize;
                src.advance(consumed);
                Ok(Some(message))
            }
            Err(error) if is_incomplete(&error) => {
                if src.len() > self.max_message_size {
                    return Err(QueueError::validation(format!(
                        "message exceeds {} bytes",
                        self.max_message_size
                    )));
                }
                Ok(None)
            }
            Err(error) => Err(QueueError::validation(error.to_string())),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Message>, QueueError> {
        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None if src.is_empty() => Ok(None),
            None => Err(QueueError::disconnected(format!(
                "stream ended inside a message ({} bytes pending)",
                src.len()
            ))),
        }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = QueueError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), QueueError> {
        let encoded =
            rmp_serde::to_vec_named(&item).map_err(|e| QueueError::validation(e.to_string()))?;
        dst.extend_from_slice(&encoded);
        Ok(())
    }
}
