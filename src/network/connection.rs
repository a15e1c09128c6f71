use crate::messages::wire::{FramedMessage, WireConfig, WireProtocolError};
use serde::Serialize;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Connecting to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Wire protocol error: {0}")]
    WireProtocol(WireProtocolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<WireProtocolError> for ConnectionError {
    fn from(error: WireProtocolError) -> Self {
        if error.is_closed() {
            ConnectionError::ConnectionClosed
        } else {
            ConnectionError::WireProtocol(error)
        }
    }
}

/// A TCP stream carrying length-prefixed JSON text frames
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    peer_addr: SocketAddr,
    framed: FramedMessage,
}

impl Connection {
    pub fn new(stream: TcpStream, config: WireConfig) -> Result<Self, ConnectionError> {
        let peer_addr = stream.peer_addr()?;
        // Frames are small and latency-sensitive.
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            peer_addr,
            framed: FramedMessage::new(config),
        })
    }

    /// Open a connection, giving up after `timeout`
    #[instrument(skip(config), fields(addr = %addr))]
    pub async fn connect(
        addr: &str,
        config: WireConfig,
        timeout: Duration,
    ) -> Result<Self, ConnectionError> {
        let stream = match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(ConnectionError::Connect {
                    addr: addr.to_string(),
                    source,
                })
            }
            Err(_elapsed) => {
                return Err(ConnectionError::ConnectTimeout {
                    addr: addr.to_string(),
                    timeout,
                })
            }
        };
        debug!("Connected to {}", addr);
        Self::new(stream, config)
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Split into independently owned read and write halves
    pub fn into_split(self) -> (ConnectionReader, ConnectionWriter) {
        let (read_half, write_half) = self.stream.into_split();
        (
            ConnectionReader {
                half: read_half,
                framed: self.framed.clone(),
            },
            ConnectionWriter {
                half: write_half,
                framed: self.framed,
            },
        )
    }
}

#[derive(Debug)]
pub struct ConnectionReader {
    half: OwnedReadHalf,
    framed: FramedMessage,
}

impl ConnectionReader {
    /// Next text frame; `ConnectionClosed` once the peer hangs up between frames
    pub async fn receive_text(&mut self) -> Result<String, ConnectionError> {
        Ok(self.framed.read_text(&mut self.half).await?)
    }

    pub fn max_message_size(&self) -> usize {
        self.framed.max_message_size()
    }
}

#[derive(Debug)]
pub struct ConnectionWriter {
    half: OwnedWriteHalf,
    framed: FramedMessage,
}

impl ConnectionWriter {
    pub async fn send_text(&mut self, text: &str) -> Result<(), ConnectionError> {
        Ok(self
            .framed
            .write_frame_with_timeout(&mut self.half, text.as_bytes())
            .await?)
    }

    pub async fn send_json<T: Serialize>(&mut self, message: &T) -> Result<(), ConnectionError> {
        Ok(self.framed.write_json(&mut self.half, message).await?)
    }

    /// Flush and half-close the write side
    pub async fn shutdown(&mut self) -> Result<(), ConnectionError> {
        self.half.shutdown().await?;
        Ok(())
    }
}
