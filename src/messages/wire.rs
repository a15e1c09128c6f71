use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, instrument, trace, warn};

// Wire protocol constants
pub const MAX_MESSAGE_SIZE: usize = 4096; // relay ceiling for a single JSON message
pub const LENGTH_PREFIX_SIZE: usize = 4; // 4 bytes for u32 length prefix
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);
pub const CLIENT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for framing: size ceiling and write timeout
#[derive(Debug, Clone)]
pub struct WireConfig {
    pub max_message_size: usize,
    pub write_timeout: Duration,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            max_message_size: MAX_MESSAGE_SIZE,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

impl WireConfig {
    pub fn new(max_message_size: usize, write_timeout: Duration) -> Self {
        Self {
            max_message_size,
            write_timeout,
        }
    }

    /// Create a WireConfig with custom message size and the default timeout
    pub fn with_max_message_size(max_message_size: usize) -> Self {
        Self {
            max_message_size,
            ..Self::default()
        }
    }
}

/// Errors raised while reading or writing frames
#[derive(Error, Debug)]
pub enum WireProtocolError {
    #[error("Message too large: {size} bytes exceeds maximum of {max_size} bytes")]
    MessageTooLarge { size: usize, max_size: usize },

    #[error("Invalid length prefix: {length}")]
    InvalidLength { length: u32 },

    #[error("Write operation timed out after {timeout:?}")]
    WriteTimeout { timeout: Duration },

    #[error("Frame is not valid UTF-8")]
    InvalidUtf8,

    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("Unexpected end of file while reading {operation}")]
    UnexpectedEof { operation: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WireProtocolError {
    /// True for the orderly end of a stream between frames
    pub fn is_closed(&self) -> bool {
        matches!(self, WireProtocolError::ConnectionClosed)
    }
}

/// Length-prefixed framing for JSON text messages.
///
/// Each frame is a big-endian `u32` byte length followed by that many bytes
/// of UTF-8 JSON. Frames larger than the configured ceiling are rejected
/// before the body is read.
#[derive(Debug, Clone, Default)]
pub struct FramedMessage {
    config: WireConfig,
}

impl FramedMessage {
    pub fn new(config: WireConfig) -> Self {
        Self { config }
    }

    pub fn with_max_message_size(max_message_size: usize) -> Self {
        Self::new(WireConfig::with_max_message_size(max_message_size))
    }

    pub fn config(&self) -> &WireConfig {
        &self.config
    }

    pub fn max_message_size(&self) -> usize {
        self.config.max_message_size
    }

    /// Validate a length prefix against the configured ceiling
    #[instrument(level = "trace", skip(self), fields(max_size = self.config.max_message_size))]
    fn validate_length(&self, length: u32) -> Result<usize, WireProtocolError> {
        if length == 0 {
            warn!("Received zero-length message prefix");
            return Err(WireProtocolError::InvalidLength { length });
        }

        let size = length as usize;
        if size > self.config.max_message_size {
            warn!(
                size = size,
                max_size = self.config.max_message_size,
                "Message size exceeds maximum allowed size"
            );
            return Err(WireProtocolError::MessageTooLarge {
                size,
                max_size: self.config.max_message_size,
            });
        }

        Ok(size)
    }

    /// Fill `buffer` completely, distinguishing a clean close from a truncated frame
    async fn read_exact_with_recovery(
        reader: &mut (impl AsyncRead + Unpin),
        buffer: &mut [u8],
        operation: &str,
    ) -> Result<(), WireProtocolError> {
        let mut total_read = 0;
        while total_read < buffer.len() {
            match reader.read(&mut buffer[total_read..]).await? {
                0 if total_read == 0 && operation == "length prefix" => {
                    return Err(WireProtocolError::ConnectionClosed);
                }
                0 => {
                    error!(
                        total_read = total_read,
                        expected = buffer.len(),
                        "Unexpected EOF while reading {}",
                        operation
                    );
                    return Err(WireProtocolError::UnexpectedEof {
                        operation: operation.to_string(),
                    });
                }
                read => {
                    total_read += read;
                    trace!(read = read, total_read = total_read, "Partial read completed");
                }
            }
        }
        Ok(())
    }

    /// Write one frame containing `payload`
    #[instrument(level = "debug", skip(self, writer, payload), fields(size = payload.len()))]
    pub async fn write_frame(
        &self,
        writer: &mut (impl AsyncWrite + Unpin),
        payload: &[u8],
    ) -> Result<(), WireProtocolError> {
        if payload.len() > self.config.max_message_size {
            return Err(WireProtocolError::MessageTooLarge {
                size: payload.len(),
                max_size: self.config.max_message_size,
            });
        }
        let length_prefix = (payload.len() as u32).to_be_bytes();

        writer.write_all(&length_prefix).await?;
        writer.write_all(payload).await?;
        writer.flush().await?;

        debug!("Wrote {} byte frame", payload.len());
        Ok(())
    }

    /// Write one frame, failing with `WriteTimeout` if the peer stops draining
    pub async fn write_frame_with_timeout(
        &self,
        writer: &mut (impl AsyncWrite + Unpin),
        payload: &[u8],
    ) -> Result<(), WireProtocolError> {
        let timeout = self.config.write_timeout;
        match tokio::time::timeout(timeout, self.write_frame(writer, payload)).await {
            Ok(result) => result,
            Err(_elapsed) => {
                error!(timeout = ?timeout, "Write operation timed out");
                Err(WireProtocolError::WriteTimeout { timeout })
            }
        }
    }

    /// Serialize `message` as JSON and write it as one frame
    pub async fn write_json<T: Serialize>(
        &self,
        writer: &mut (impl AsyncWrite + Unpin),
        message: &T,
    ) -> Result<(), WireProtocolError> {
        let payload = serde_json::to_vec(message)?;
        self.write_frame_with_timeout(writer, &payload).await
    }

    /// Read one frame body
    #[instrument(level = "debug", skip(self, reader))]
    pub async fn read_frame(
        &self,
        reader: &mut (impl AsyncRead + Unpin),
    ) -> Result<Vec<u8>, WireProtocolError> {
        let mut length_buffer = [0u8; LENGTH_PREFIX_SIZE];
        Self::read_exact_with_recovery(reader, &mut length_buffer, "length prefix").await?;

        let length = self.validate_length(u32::from_be_bytes(length_buffer))?;
        let mut body = vec![0u8; length];
        Self::read_exact_with_recovery(reader, &mut body, "message body").await?;

        debug!("Read {} byte frame", length);
        Ok(body)
    }

    /// Read one frame and decode it as UTF-8 text
    pub async fn read_text(
        &self,
        reader: &mut (impl AsyncRead + Unpin),
    ) -> Result<String, WireProtocolError> {
        let body = self.read_frame(reader).await?;
        String::from_utf8(body).map_err(|_| WireProtocolError::InvalidUtf8)
    }
}
