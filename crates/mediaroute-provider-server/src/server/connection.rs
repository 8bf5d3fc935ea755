// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Framed client connection.
//!
//! Frames are a 4-byte big-endian payload length followed by JSON. The read
//! and write halves are split so a pending read never races an outbound
//! message.

use mediaroute::remote::codec::{decode_payload, encode_frame, payload_len};
use mediaroute::remote::{ClientMessage, ServiceMessage};
use mediaroute::ProtocolError;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// A connected client.
pub struct ClientConnection {
    stream: TcpStream,
    peer_addr: SocketAddr,
    max_message_size: usize,
}

impl ClientConnection {
    /// Create a new client connection.
    pub fn new(stream: TcpStream, peer_addr: SocketAddr, max_message_size: usize) -> Self {
        Self {
            stream,
            peer_addr,
            max_message_size,
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Split into independent read and write halves.
    pub fn into_split(self) -> (FrameReader, FrameWriter) {
        self.stream.set_nodelay(true).ok();
        let (read, write) = self.stream.into_split();
        (
            FrameReader {
                stream: read,
                max_message_size: self.max_message_size,
                read_buffer: Vec::with_capacity(4096),
            },
            FrameWriter {
                stream: write,
                max_message_size: self.max_message_size,
            },
        )
    }
}

/// Inbound half of a connection.
pub struct FrameReader {
    stream: OwnedReadHalf,
    max_message_size: usize,
    read_buffer: Vec<u8>,
}

impl FrameReader {
    /// Read a message from the client.
    ///
    /// Returns `Ok(None)` if the connection is closed gracefully.
    pub async fn read_message(&mut self) -> Result<Option<ClientMessage>, ConnectionError> {
        let mut len_buf = [0u8; 4];
        match self.stream.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(None);
            }
            Err(e) => return Err(ConnectionError::Io(e.to_string())),
        }

        let len = payload_len(len_buf, self.max_message_size)?;
        if len == 0 {
            return Err(ConnectionError::Protocol("Empty message".into()));
        }

        self.read_buffer.clear();
        self.read_buffer.resize(len, 0);
        self.stream
            .read_exact(&mut self.read_buffer)
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        Ok(Some(decode_payload(&self.read_buffer)?))
    }
}

/// Outbound half of a connection.
pub struct FrameWriter {
    stream: OwnedWriteHalf,
    max_message_size: usize,
}

impl FrameWriter {
    /// Send a message to the client.
    pub async fn send_message(&mut self, msg: &ServiceMessage) -> Result<(), ConnectionError> {
        let frame = encode_frame(msg, self.max_message_size)?;
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Shutdown the write side.
    pub async fn shutdown(&mut self) -> Result<(), ConnectionError> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

/// Connection error types.
#[derive(Debug)]
pub enum ConnectionError {
    Io(String),
    Protocol(String),
}

impl std::fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(s) => write!(f, "I/O error: {}", s),
            Self::Protocol(s) => write!(f, "Protocol error: {}", s),
        }
    }
}

impl std::error::Error for ConnectionError {}

impl From<ProtocolError> for ConnectionError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::Io(e) => Self::Io(e.to_string()),
            other => Self::Protocol(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ConnectionError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaroute::remote::{ClientOp, ServiceOp};
    use tokio::net::TcpListener;

    async fn pair(max: usize) -> (ClientConnection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, peer) = listener.accept().await.unwrap();
        (ClientConnection::new(server, peer, max), client)
    }

    #[test]
    fn test_connection_error_display() {
        let err = ConnectionError::Io("test".into());
        assert!(err.to_string().contains("I/O"));

        let err = ConnectionError::Protocol("invalid".into());
        assert!(err.to_string().contains("Protocol"));
    }

    #[tokio::test]
    async fn test_read_and_write_frames() {
        let (conn, mut client) = pair(4096).await;
        let (mut reader, mut writer) = conn.into_split();

        let register = ClientMessage {
            request_id: 1,
            arg: 2,
            op: ClientOp::Register,
        };
        let frame = encode_frame(&register, 4096).unwrap();
        client.write_all(&frame).await.unwrap();
        assert_eq!(reader.read_message().await.unwrap(), Some(register));

        writer
            .send_message(&ServiceMessage::generic_success(1))
            .await
            .unwrap();
        let mut header = [0u8; 4];
        client.read_exact(&mut header).await.unwrap();
        let mut payload = vec![0u8; u32::from_be_bytes(header) as usize];
        client.read_exact(&mut payload).await.unwrap();
        let reply: ServiceMessage = decode_payload(&payload).unwrap();
        assert_eq!(reply.op, ServiceOp::GenericSuccess);

        drop(client);
        assert_eq!(reader.read_message().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rejects_bad_frames() {
        let (conn, mut client) = pair(64).await;
        let (mut reader, _writer) = conn.into_split();

        client.write_all(&1000u32.to_be_bytes()).await.unwrap();
        let err = reader.read_message().await.unwrap_err();
        assert!(matches!(err, ConnectionError::Protocol(_)));

        let (conn, mut client) = pair(64).await;
        let (mut reader, _writer) = conn.into_split();
        client.write_all(&0u32.to_be_bytes()).await.unwrap();
        let err = reader.read_message().await.unwrap_err();
        assert_eq!(err.to_string(), "Protocol error: Empty message");

        let (conn, mut client) = pair(64).await;
        let (mut reader, _writer) = conn.into_split();
        client.write_all(&3u32.to_be_bytes()).await.unwrap();
        client.write_all(b"{x}").await.unwrap();
        let err = reader.read_message().await.unwrap_err();
        assert!(matches!(err, ConnectionError::Protocol(_)));
    }
}
