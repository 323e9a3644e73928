//! CRLF line codec for tokio.
//!
//! Decoding yields one item per line. A line that is too long is dropped
//! and reported as an `Err` *item*; the decoder itself only fails on I/O, so
//! a `FramedRead` built on it keeps going after bad input.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{self, MessageParseError, ProtocolError};
use crate::MAX_LINE_LEN;

/// Line-based codec for `\r\n`-terminated frames (bare `\n` accepted on input).
#[derive(Debug)]
pub struct LineCodec {
    /// Index of next byte to check for newline
    next_index: usize,
    /// Maximum line length, terminator included
    max_len: usize,
    /// Bytes dropped so far from an over-long line, while waiting for its end
    discarding: Option<usize>,
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::with_max_len(MAX_LINE_LEN)
    }
}

impl LineCodec {
    /// Create a codec with the standard 512-byte limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec with a custom max line length.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
            discarding: None,
        }
    }

    /// The configured line limit.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Check an outgoing line: no embedded CR, LF or NUL, and it must fit.
    pub fn validate_outgoing(&self, line: &str) -> error::Result<()> {
        if let Some(ch) = line.chars().find(|c| matches!(c, '\r' | '\n' | '\0')) {
            return Err(ProtocolError::IllegalOutgoingChar(ch));
        }
        let actual = line.len() + crate::LINE_TERMINATOR.len();
        if actual > self.max_len {
            return Err(ProtocolError::OutgoingTooLong {
                actual,
                limit: self.max_len,
            });
        }
        Ok(())
    }
}

impl Decoder for LineCodec {
    type Item = Result<String, MessageParseError>;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> error::Result<Option<Self::Item>> {
        loop {
            let newline = src[self.next_index..].iter().position(|b| *b == b'\n');

            if let Some(dropped) = self.discarding {
                match newline {
                    Some(offset) => {
                        src.advance(offset + 1);
                        self.discarding = None;
                        self.next_index = 0;
                        return Ok(Some(Err(MessageParseError::LineTooLong {
                            actual: dropped + offset + 1,
                            limit: self.max_len,
                        })));
                    }
                    None => {
                        self.discarding = Some(dropped + src.len());
                        src.clear();
                        self.next_index = 0;
                        return Ok(None);
                    }
                }
            }

            let Some(offset) = newline else {
                if src.len() > self.max_len {
                    self.discarding = Some(src.len());
                    src.clear();
                    self.next_index = 0;
                } else {
                    self.next_index = src.len();
                }
                return Ok(None);
            };

            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if line.len() > self.max_len {
                return Ok(Some(Err(MessageParseError::LineTooLong {
                    actual: line.len(),
                    limit: self.max_len,
                })));
            }

            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches(['\r', '\n']);
            if text.is_empty() {
                // Blank keep-alive lines carry nothing.
                continue;
            }
            return Ok(Some(Ok(text.to_string())));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> error::Result<Option<Self::Item>> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None => {
                // A partial line at EOF can never complete.
                src.clear();
                self.discarding = None;
                self.next_index = 0;
                Ok(None)
            }
        }
    }
}

impl Encoder<&str> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, line: &str, dst: &mut BytesMut) -> error::Result<()> {
        self.validate_outgoing(line)?;
        dst.reserve(line.len() + crate::LINE_TERMINATOR.len());
        dst.extend_from_slice(line.as_bytes());
        dst.extend_from_slice(crate::LINE_TERMINATOR.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_complete_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("PING :test\r\n");

        let result = codec.decode(&mut buf).unwrap();
        assert_eq!(result, Some(Ok("PING :test".to_string())));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_partial_then_complete() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("PING :");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b"abc\r\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Ok("PING :abc".to_string()))
        );
    }

    #[test]
    fn test_bare_lf_and_blank_lines() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("\r\n\nPING :x\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Ok("PING :x".to_string()))
        );
    }

    #[test]
    fn test_too_long_is_an_item_and_recovers() {
        let mut codec = LineCodec::with_max_len(10);
        let mut buf = BytesMut::from("this is way too long");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b" still\r\nPING :ok\r\n");
        assert!(matches!(
            codec.decode(&mut buf).unwrap(),
            Some(Err(MessageParseError::LineTooLong { limit: 10, .. }))
        ));
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Ok("PING :ok".to_string()))
        );
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"PRIVMSG #x :caf\xe9\r\n"[..]);
        let line = codec.decode(&mut buf).unwrap().unwrap().unwrap();
        assert!(line.starts_with("PRIVMSG #x :caf"));
    }

    #[test]
    fn test_encode_appends_crlf() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        codec.encode("PONG :test", &mut buf).unwrap();
        assert_eq!(&buf[..], b"PONG :test\r\n");
    }

    #[test]
    fn test_encode_rejects_embedded_newline() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        let err = codec.encode("PRIVMSG #x :a\r\nQUIT", &mut buf).unwrap_err();
        assert!(matches!(err, ProtocolError::IllegalOutgoingChar('\r')));
        assert!(buf.is_empty());
    }
}
