//! IRC message codec for tokio.
//!
//! This module provides a codec that encodes and decodes IRC [`Message`] types
//! using the tokio codec framework.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{self, MessageParseError};
use crate::line::LineCodec;
use crate::message::Message;

/// Tokio codec for encoding/decoding IRC messages.
///
/// Wraps [`LineCodec`] and parses lines into [`Message`] types. A line that
/// fails to parse is yielded as `Err(MessageParseError)`; only I/O failures
/// end the stream.
#[derive(Debug, Default)]
pub struct IrcCodec {
    inner: LineCodec,
}

impl IrcCodec {
    /// Create a codec with the standard 512-byte line limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec with custom max line length.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            inner: LineCodec::with_max_len(max_len),
        }
    }

    /// Serialize a message and check it against the outgoing rules without
    /// writing anything.
    pub fn render(&self, msg: &Message) -> error::Result<String> {
        let line = msg.to_string();
        self.inner.validate_outgoing(&line)?;
        Ok(line)
    }
}

impl Decoder for IrcCodec {
    type Item = Result<Message, MessageParseError>;
    type Error = error::ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> error::Result<Option<Self::Item>> {
        Ok(self
            .inner
            .decode(src)?
            .map(|line| line.and_then(|line| line.parse::<Message>())))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> error::Result<Option<Self::Item>> {
        Ok(self
            .inner
            .decode_eof(src)?
            .map(|line| line.and_then(|line| line.parse::<Message>())))
    }
}

impl Encoder<Message> for IrcCodec {
    type Error = error::ProtocolError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> error::Result<()> {
        self.inner.encode(msg.to_string().as_str(), dst)
    }
}
