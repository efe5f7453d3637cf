use std::io;

use async_trait::async_trait;
#[cfg(test)] use mockall::automock;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

use crate::client::client_config::ClientConfig;

/// A bidirectional byte stream to the server
pub trait ByteStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}
impl <T: AsyncRead + AsyncWrite + Unpin + Send + 'static> ByteStream for T {}

/// Opens a fresh transport to the server for every connection attempt
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    fn server_addr(&self) -> String;

    async fn connect(&self) -> io::Result<Box<dyn ByteStream>>;
}

pub struct TcpConnector {
    host: String,
    port: u16,
}
impl TcpConnector {
    pub fn new(config: &ClientConfig) -> TcpConnector {
        TcpConnector {
            host: config.server_host.clone(),
            port: config.server_port,
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    async fn connect(&self) -> io::Result<Box<dyn ByteStream>> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        stream.set_nodelay(true)?;
        debug!(local_addr = ?stream.local_addr().ok(), "tcp connection established");
        Ok(Box::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_connector() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1];
            stream.read_exact(&mut buf).await.unwrap();
            buf[0]
        });

        let connector = TcpConnector::new(&ClientConfig::new("127.0.0.1", port));
        assert_eq!(connector.server_addr(), format!("127.0.0.1:{}", port));

        let mut stream = connector.connect().await.unwrap();
        stream.write_all(&[9]).await.unwrap();

        assert_eq!(server.await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_tcp_connector_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let connector = TcpConnector::new(&ClientConfig::new("127.0.0.1", port));
        assert!(connector.connect().await.is_err());
    }
}
