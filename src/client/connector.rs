//! How the client opens its byte stream.

use std::io;

use async_trait::async_trait;
use plugbot_proto::Transport;
use tokio::net::TcpStream;
use tracing::debug;

/// Opens a transport to `host:port`. Swapped out in tests for in-memory
/// streams.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, host: &str, port: u16) -> io::Result<Transport>;
}

/// Plain TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, host: &str, port: u16) -> io::Result<Transport> {
        let stream = TcpStream::connect((host, port)).await?;
        debug!(host = %host, port, peer = ?stream.peer_addr().ok(), "tcp connected");
        Ok(Transport::tcp(stream))
    }
}
