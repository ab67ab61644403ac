//! Byte transport for SIP2 messages.

use std::time::Duration;

use async_trait::async_trait;
use stacks_core::config::Sip2Config;
use stacks_core::error::{Result, StacksError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

/// Messages are terminated by a carriage return.
const TERMINATOR: u8 = b'\r';

/// One open SIP2 session. Each call sends a message and waits for the reply.
#[async_trait]
pub trait Sip2Transport: Send {
    async fn exchange(&mut self, message: &str) -> Result<String>;
    async fn close(&mut self) -> Result<()>;
}

/// Opens SIP2 sessions.
#[async_trait]
pub trait Sip2Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn Sip2Transport>>;
}

pub struct TcpTransport {
    stream: BufReader<TcpStream>,
    read_timeout: Option<Duration>,
}

impl TcpTransport {
    pub async fn connect(host: &str, port: u16, read_timeout: Option<Duration>) -> Result<Self> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| StacksError::Backend(format!("SIP2 connect to {host}:{port} failed: {e}")))?;
        debug!(host = %host, port, "SIP2 connection opened");
        Ok(Self {
            stream: BufReader::new(stream),
            read_timeout,
        })
    }

    async fn read_message(&mut self) -> Result<String> {
        let mut buf = Vec::new();
        let read = self.stream.read_until(TERMINATOR, &mut buf);
        let n = match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| StacksError::Backend("SIP2 read timed out".into()))??,
            None => read.await?,
        };
        if n == 0 {
            return Err(StacksError::Backend(
                "SIP2 server closed the connection".into(),
            ));
        }
        let text = String::from_utf8_lossy(&buf);
        Ok(text.trim_matches(|c| c == '\r' || c == '\n').to_string())
    }
}

#[async_trait]
impl Sip2Transport for TcpTransport {
    async fn exchange(&mut self, message: &str) -> Result<String> {
        let stream = self.stream.get_mut();
        stream.write_all(message.as_bytes()).await?;
        stream.write_all(&[TERMINATOR]).await?;
        stream.flush().await?;
        self.read_message().await
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.get_mut().shutdown().await?;
        debug!("SIP2 connection closed");
        Ok(())
    }
}

/// Connects to the SIP2 server named in the settings.
pub struct TcpConnector {
    host: String,
    port: u16,
    read_timeout: Option<Duration>,
}

impl TcpConnector {
    pub fn new(config: &Sip2Config) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            read_timeout: config.read_timeout_secs.map(Duration::from_secs),
        }
    }
}

#[async_trait]
impl Sip2Connector for TcpConnector {
    async fn connect(&self) -> Result<Box<dyn Sip2Transport>> {
        let transport = TcpTransport::connect(&self.host, self.port, self.read_timeout).await?;
        Ok(Box::new(transport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn exchange_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut socket = BufReader::new(socket);
            let mut request = Vec::new();
            socket.read_until(b'\r', &mut request).await.unwrap();
            socket
                .get_mut()
                .write_all(b"98YYYYNN60000320240305    0907012.00AOMAIN|\r\n")
                .await
                .unwrap();
            let mut rest = Vec::new();
            socket.read_to_end(&mut rest).await.unwrap();
            (String::from_utf8(request).unwrap(), rest.is_empty())
        });

        let mut transport = TcpTransport::connect("127.0.0.1", port, Some(Duration::from_secs(5)))
            .await
            .unwrap();
        let reply = transport.exchange("9900802.00").await.unwrap();
        assert!(reply.starts_with("98YYYYNN"));
        assert!(reply.ends_with("AOMAIN|"));
        transport.close().await.unwrap();

        let (request, nothing_more) = server.await.unwrap();
        assert_eq!(request, "9900802.00\r");
        assert!(nothing_more);
    }

    #[tokio::test]
    async fn connect_failure_is_backend_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let err = TcpTransport::connect("127.0.0.1", port, None)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, StacksError::Backend(_)));
    }

    #[tokio::test]
    async fn read_timeout_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_millis(500)).await;
            drop(socket);
        });

        let mut transport =
            TcpTransport::connect("127.0.0.1", port, Some(Duration::from_millis(50)))
                .await
                .unwrap();
        let err = transport.exchange("9900802.00").await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
        server.await.unwrap();
    }
}
