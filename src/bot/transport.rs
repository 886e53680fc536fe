//! Socket ownership: connecting, sending and receiving framed lines.

use crate::proto::{CodecError, LineCodec};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(#[source] std::io::Error),
    #[error("timed out")]
    Timeout,
    #[error("connection closed by server")]
    Disconnected,
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("oversized line from server")]
    FrameTooLong,
}

impl From<CodecError> for TransportError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::Io(e) => TransportError::Io(e),
            CodecError::LineTooLong => TransportError::FrameTooLong,
        }
    }
}

/// One framed TCP connection to the server.
#[derive(Debug)]
pub struct Transport {
    framed: Framed<TcpStream, LineCodec>,
}

impl Transport {
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, TransportError> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(TransportError::Connect)?;
        Ok(Self {
            framed: Framed::new(stream, LineCodec),
        })
    }

    pub async fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        debug!(">> {line}");
        self.framed.send(line.to_owned()).await.map_err(Into::into)
    }

    /// Split into halves so the session can select over inbound traffic and
    /// the outbound queue at the same time.
    pub fn split(self) -> (LineSink, LineStream) {
        let (sink, stream) = self.framed.split();
        (LineSink { inner: sink }, LineStream { inner: stream })
    }
}

pub struct LineSink {
    inner: SplitSink<Framed<TcpStream, LineCodec>, String>,
}

impl LineSink {
    pub async fn send_line(&mut self, line: String) -> Result<(), TransportError> {
        debug!(">> {line}");
        self.inner.send(line).await.map_err(Into::into)
    }
}

pub struct LineStream {
    inner: SplitStream<Framed<TcpStream, LineCodec>>,
}

impl LineStream {
    pub async fn next_line(&mut self) -> Result<String, TransportError> {
        match self.inner.next().await {
            Some(Ok(line)) => {
                debug!("<< {line}");
                Ok(line)
            }
            Some(Err(e)) => Err(e.into()),
            None => Err(TransportError::Disconnected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connect_send_and_receive() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let accept = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read, mut write) = stream.into_split();
            let mut lines = BufReader::new(read).lines();
            assert_eq!(lines.next_line().await.unwrap().unwrap(), "NICK modbot");
            write.write_all(b"PING :token\r\n").await.unwrap();
        });

        let mut transport = Transport::connect("127.0.0.1", port, Duration::from_secs(5))
            .await
            .unwrap();
        transport.send_line("NICK modbot").await.unwrap();
        let (_sink, mut stream) = transport.split();
        assert_eq!(stream.next_line().await.unwrap(), "PING :token");

        accept.await.unwrap();
        // The server half is gone now; the next read reports the disconnect.
        assert!(matches!(
            stream.next_line().await,
            Err(TransportError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn connect_to_a_closed_port_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = Transport::connect("127.0.0.1", port, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Connect(_)));
    }
}
