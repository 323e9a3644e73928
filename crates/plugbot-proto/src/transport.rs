//! Async line transport.
//!
//! [`Transport`] owns one boxed byte stream. Splitting it gives a framed
//! reader and writer that can be locked and driven independently, so a task
//! blocked on the next inbound line never holds up an outbound write.

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, trace, warn};

use crate::error::{MessageParseError, ProtocolError};
use crate::irc::IrcCodec;
use crate::Message;

/// Any bidirectional byte stream usable as an IRC connection.
pub trait IrcStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> IrcStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

type BoxedStream = Box<dyn IrcStream>;

/// Framed read half yielding one parse result per line.
pub type LineReader = FramedRead<ReadHalf<BoxedStream>, IrcCodec>;

/// Framed write half accepting [`Message`]s.
pub type LineWriter = FramedWrite<WriteHalf<BoxedStream>, IrcCodec>;

/// An unsplit connection.
pub struct Transport {
    stream: BoxedStream,
    max_len: usize,
}

impl Transport {
    /// Wrap an arbitrary stream.
    pub fn new(stream: Box<dyn IrcStream>) -> Self {
        Self {
            stream,
            max_len: crate::MAX_LINE_LEN,
        }
    }

    /// Wrap a connected TCP stream.
    pub fn tcp(stream: TcpStream) -> Self {
        if let Err(e) = stream.set_nodelay(true) {
            warn!(error = %e, "failed to set TCP_NODELAY");
        }
        Self::new(Box::new(stream))
    }

    /// Override the line limit applied in both directions.
    #[must_use]
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    /// Split into independently owned framed halves.
    pub fn split(self) -> (LineReader, LineWriter) {
        let (read, write) = tokio::io::split(self.stream);
        (
            FramedRead::new(read, IrcCodec::with_max_len(self.max_len)),
            FramedWrite::new(write, IrcCodec::with_max_len(self.max_len)),
        )
    }
}

/// Outcome of one read from a [`LineReader`].
#[derive(Debug)]
pub enum ReadOutcome {
    /// A well-formed message.
    Message(Message),
    /// A line that could not be parsed; the stream is still usable.
    Malformed(MessageParseError),
    /// The peer closed the connection.
    Closed,
}

/// Read the next line, folding the codec's nested results into one value.
pub async fn read_message(reader: &mut LineReader) -> Result<ReadOutcome, ProtocolError> {
    match reader.next().await {
        Some(Ok(Ok(msg))) => {
            trace!(line = %msg, "recv");
            Ok(ReadOutcome::Message(msg))
        }
        Some(Ok(Err(e))) => {
            debug!(error = %e, "malformed line");
            Ok(ReadOutcome::Malformed(e))
        }
        Some(Err(e)) => Err(e),
        None => Ok(ReadOutcome::Closed),
    }
}

/// Write and flush one message.
pub async fn write_message(writer: &mut LineWriter, msg: Message) -> Result<(), ProtocolError> {
    trace!(line = %msg, "send");
    writer.send(msg).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Command;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_split_roundtrip_over_duplex() {
        let (client, mut server) = tokio::io::duplex(1024);
        let (mut reader, mut writer) = Transport::new(Box::new(client)).split();

        write_message(&mut writer, Message::from(Command::NICK("bot".into())))
            .await
            .unwrap();
        let mut buf = [0u8; 64];
        let n = server.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"NICK bot\r\n");

        server.write_all(b"12 nonsense\r\nPING :t\r\n").await.unwrap();
        assert!(matches!(
            read_message(&mut reader).await.unwrap(),
            ReadOutcome::Malformed(_)
        ));
        match read_message(&mut reader).await.unwrap() {
            ReadOutcome::Message(msg) => assert_eq!(msg.command, Command::PING("t".into())),
            other => panic!("expected message, got {other:?}"),
        }

        drop(server);
        assert!(matches!(
            read_message(&mut reader).await.unwrap(),
            ReadOutcome::Closed
        ));
    }
}
