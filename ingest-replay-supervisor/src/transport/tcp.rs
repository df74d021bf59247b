//! TCP transport carrying newline-delimited JSON

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::{EventSender, Handshake, Transport, TransportEvent};
use crate::error::{CODE_UNKNOWN, TransportError};
use ingest_replay_core::config::IntakeConfig;
use ingest_replay_core::writer::JsonLinesWriter;

/// Session to a collector over a plain TCP socket
#[derive(Debug)]
pub struct TcpTransport {
    address: String,
    writer: JsonLinesWriter,
    stream: Option<OwnedWriteHalf>,
    reader: Option<JoinHandle<()>>,
}

impl TcpTransport {
    /// Transport to `address` (`host:port`) with a write buffer of `buffer_size` bytes
    pub fn new(address: impl Into<String>, buffer_size: usize) -> Self {
        Self {
            address: address.into(),
            writer: JsonLinesWriter::with_capacity(buffer_size),
            stream: None,
            reader: None,
        }
    }

    /// Transport for the `intake` config section
    pub fn from_config(config: &IntakeConfig) -> Self {
        Self::new(config.address(), config.buffer_size)
    }

    /// Whether a socket is open
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn drop_session(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.stream = None;
        self.writer.discard();
    }
}

/// Watch the read side for the peer going away; anything it sends is ignored
async fn watch_socket(mut read: OwnedReadHalf, events: EventSender) {
    let mut buf = [0u8; 1024];
    loop {
        match read.read(&mut buf).await {
            Ok(0) => {
                debug!("collector closed the connection");
                let _ = events.send(TransportEvent::Closed);
                return;
            }
            Ok(n) => trace!("ignoring {} bytes from collector", n),
            Err(e) => {
                let code = e.raw_os_error().unwrap_or(CODE_UNKNOWN);
                debug!("socket read failed: {}", e);
                let _ = events.send(TransportEvent::Error(code));
                return;
            }
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    type Writer = JsonLinesWriter;

    fn peer(&self) -> String {
        self.address.clone()
    }

    async fn connect(&mut self, events: EventSender) -> Result<Handshake, TransportError> {
        self.drop_session();

        let stream = TcpStream::connect(&self.address)
            .await
            .map_err(|source| TransportError::Connect {
                address: self.address.clone(),
                source,
            })?;
        if let Err(e) = stream.set_nodelay(true) {
            warn!("could not disable Nagle on {}: {}", self.address, e);
        }

        let (read, write) = stream.into_split();
        self.reader = Some(tokio::spawn(watch_socket(read, events)));
        self.stream = Some(write);
        Ok(Handshake::Complete)
    }

    async fn flush(&mut self) -> Result<(), TransportError> {
        if self.writer.pending_bytes() == 0 {
            return Ok(());
        }
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        let buffer = self.writer.take_buffer();
        stream.write_all(&buffer).await?;
        trace!("flushed {} bytes to {}", buffer.len(), self.address);
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        self.drop_session();
    }

    fn writer(&mut self) -> &mut JsonLinesWriter {
        &mut self.writer
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::event_channel;
    use ingest_replay_core::writer::IngestWriter;
    use tokio::io::AsyncBufReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_flush_sends_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut lines = tokio::io::BufReader::new(socket).lines();
            let mut received = Vec::new();
            while let Some(line) = lines.next_line().await.unwrap() {
                received.push(line);
                if received.len() == 2 {
                    break;
                }
            }
            received
        });

        let (tx, _rx) = event_channel();
        let mut transport = TcpTransport::new(address, 1024);
        assert_eq!(transport.connect(tx).await.unwrap(), Handshake::Complete);
        transport.writer().tcp_syn_timeout(1);
        transport.writer().tcp_syn_timeout(2);
        transport.flush().await.unwrap();

        let received = server.await.unwrap();
        assert_eq!(received.len(), 2);
        assert!(received[0].contains("\"tcp_syn_timeout\""));
        assert_eq!(transport.writer().pending_bytes(), 0);
    }

    #[tokio::test]
    async fn test_peer_close_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let (tx, mut rx) = event_channel();
        let mut transport = TcpTransport::new(address, 1024);
        transport.connect(tx).await.unwrap();
        server.await.unwrap();

        assert_eq!(rx.recv().await, Some(TransportEvent::Closed));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let (tx, _rx) = event_channel();
        let mut transport = TcpTransport::new(address, 1024);
        let err = transport.connect(tx).await.unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_flush_without_session() {
        let mut transport = TcpTransport::new("127.0.0.1:9", 64);
        assert!(transport.flush().await.is_ok());

        transport.writer().cgroup_close(3);
        assert!(matches!(
            transport.flush().await,
            Err(TransportError::NotConnected)
        ));
    }
}
