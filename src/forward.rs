use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)] use mockall::automock;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time;
use tracing::{debug, warn};

pub struct ForwardConfig {
    pub target_host: String,
    pub target_port: u16,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

#[derive(Debug, Error)]
#[error("delivery to {host}:{port} failed after {attempts} attempts: {source}")]
pub struct ForwardError {
    pub host: String,
    pub port: u16,
    pub attempts: u32,
    #[source]
    pub source: std::io::Error,
}

/// Delivers a chunk of the recovered byte stream to the real destination
/// service. Failure here is a separate failure domain from the covert
/// channel: the reassembly window acknowledges and advances regardless.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Forwarder: Send + Sync + 'static {
    async fn forward(&self, data: &[u8]) -> Result<(), ForwardError>;
}

/// Opens a fresh TCP connection to the destination per chunk and writes the
/// chunk out, retrying a bounded number of times with a fixed delay.
pub struct TcpForwarder {
    config: Arc<ForwardConfig>,
}

impl TcpForwarder {
    pub fn new(config: Arc<ForwardConfig>) -> TcpForwarder {
        TcpForwarder { config }
    }

    async fn try_forward(&self, data: &[u8]) -> std::io::Result<()> {
        let mut stream = TcpStream::connect((self.config.target_host.as_str(), self.config.target_port)).await?;
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl Forwarder for TcpForwarder {
    async fn forward(&self, data: &[u8]) -> Result<(), ForwardError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_forward(data).await {
                Ok(()) => {
                    debug!("forwarded {} bytes to {}:{}", data.len(), self.config.target_host, self.config.target_port);
                    return Ok(());
                }
                Err(e) if attempt < self.config.max_attempts => {
                    warn!("error forwarding to {}:{} - retrying ({}/{}): {}",
                        self.config.target_host, self.config.target_port, attempt, self.config.max_attempts, e);
                    time::sleep(self.config.retry_delay).await;
                }
                Err(e) => {
                    return Err(ForwardError {
                        host: self.config.target_host.clone(),
                        port: self.config.target_port,
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use super::*;

    #[rstest]
    #[tokio::test]
    async fn test_forward_delivers_bytes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let accept_task = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            stream.read_to_end(&mut received).await.unwrap();
            received
        });

        let forwarder = TcpForwarder::new(Arc::new(ForwardConfig {
            target_host: "127.0.0.1".to_string(),
            target_port: port,
            max_attempts: 3,
            retry_delay: Duration::from_millis(10),
        }));
        forwarder.forward(b"hello world").await.unwrap();

        assert_eq!(accept_task.await.unwrap(), b"hello world");
    }

    #[rstest]
    #[tokio::test]
    async fn test_forward_reports_exhausted_retries() {
        // bind and drop to get a port nothing listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let forwarder = TcpForwarder::new(Arc::new(ForwardConfig {
            target_host: "127.0.0.1".to_string(),
            target_port: port,
            max_attempts: 2,
            retry_delay: Duration::from_millis(1),
        }));

        let err = forwarder.forward(b"doomed").await.unwrap_err();
        assert_eq!(err.attempts, 2);
        assert_eq!(err.port, port);
    }
}
