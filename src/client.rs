use bytes::{Bytes, BytesMut};
use std::io;
use strum_macros::Display;
use thiserror::Error as ThisError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use crate::config::{ClientConfig, ConfigError};

/// The socket operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Op {
    Dial,
    Read,
    Write,
}

#[derive(Debug, ThisError)]
pub enum ClientError {
    #[error("connection closed by server")]
    EndOfStream,
    #[error("connection is closed")]
    Closed,
    #[error("{op} timed out after {timeout:?}")]
    Timeout { op: Op, timeout: Duration },
    #[error("{op} failed: {source}")]
    Io {
        op: Op,
        #[source]
        source: io::Error,
    },
    #[error("response too large; must be smaller than {limit} bytes")]
    ResponseTooLarge { limit: usize },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// Whether the error means the connection itself is unusable. Only these are worth a
    /// reconnect and a retry.
    pub fn is_connection_error(&self) -> bool {
        match self {
            ClientError::EndOfStream
            | ClientError::Closed
            | ClientError::Timeout { .. }
            | ClientError::Io { .. } => true,
            ClientError::ResponseTooLarge { .. } | ClientError::Config(_) => false,
        }
    }
}

/// A client holding a single connection to the server. Each `send` writes one request and waits
/// for exactly one response. When the connection turns out to be broken the client redials the
/// original address and retries the request once.
///
/// A client is not meant to be shared between concurrent callers.
pub struct Client {
    stream: Option<TcpStream>,
    address: String,
    idle_timeout: Duration,
    buffer: BytesMut,
}

impl Client {
    pub async fn connect(config: &ClientConfig) -> Result<Client, ClientError> {
        config.validate()?;

        let address = config.network.address.clone();
        let idle_timeout = config.network.idle_timeout;
        let stream = dial(&address, idle_timeout).await?;
        info!("Connected to {}", address);

        Ok(Client {
            stream: Some(stream),
            address,
            idle_timeout,
            buffer: BytesMut::zeroed(config.buffer_size()),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub async fn send(&mut self, request: &[u8]) -> Result<Bytes, ClientError> {
        match self.exchange(request).await {
            Err(err) if err.is_connection_error() => {
                warn!("Connection to {} failed: {}; reconnecting", self.address, err);
                self.reconnect().await?;
                self.exchange(request).await
            }
            result => result,
        }
    }

    /// Closes the connection. Closing an already closed client does nothing.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        match self.stream.take() {
            Some(mut stream) => stream
                .shutdown()
                .await
                .map_err(|source| ClientError::Io {
                    op: Op::Write,
                    source,
                }),
            None => Ok(()),
        }
    }

    async fn reconnect(&mut self) -> Result<(), ClientError> {
        if let Err(e) = self.close().await {
            debug!("Failed to close stale connection: {}", e);
        }

        let stream = dial(&self.address, self.idle_timeout).await?;
        self.stream = Some(stream);
        info!("Reconnected to {}", self.address);

        Ok(())
    }

    async fn exchange(&mut self, request: &[u8]) -> Result<Bytes, ClientError> {
        let idle_timeout = self.idle_timeout;
        let stream = self.stream.as_mut().ok_or(ClientError::Closed)?;

        timeout(idle_timeout, stream.write_all(request))
            .await
            .map_err(|_| ClientError::Timeout {
                op: Op::Write,
                timeout: idle_timeout,
            })?
            .map_err(|source| ClientError::Io {
                op: Op::Write,
                source,
            })?;

        let n = timeout(idle_timeout, stream.read(&mut self.buffer[..]))
            .await
            .map_err(|_| ClientError::Timeout {
                op: Op::Read,
                timeout: idle_timeout,
            })?
            .map_err(|source| ClientError::Io {
                op: Op::Read,
                source,
            })?;

        if n == 0 {
            return Err(ClientError::EndOfStream);
        }

        if n == self.buffer.len() {
            // The rest of the response is still in flight; the connection cannot be reused.
            warn!("Response from {} exceeds {} bytes, dropping connection", self.address, n);
            self.stream = None;
            return Err(ClientError::ResponseTooLarge {
                limit: self.buffer.len(),
            });
        }

        Ok(Bytes::copy_from_slice(&self.buffer[..n]))
    }
}

async fn dial(address: &str, dial_timeout: Duration) -> Result<TcpStream, ClientError> {
    timeout(dial_timeout, TcpStream::connect(address))
        .await
        .map_err(|_| ClientError::Timeout {
            op: Op::Dial,
            timeout: dial_timeout,
        })?
        .map_err(|source| ClientError::Io {
            op: Op::Dial,
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_errors_are_retryable() {
        let errors = [
            ClientError::EndOfStream,
            ClientError::Closed,
            ClientError::Timeout {
                op: Op::Read,
                timeout: Duration::from_secs(1),
            },
            ClientError::Io {
                op: Op::Write,
                source: io::Error::from(io::ErrorKind::BrokenPipe),
            },
            ClientError::Io {
                op: Op::Read,
                source: io::Error::from(io::ErrorKind::ConnectionReset),
            },
            ClientError::Io {
                op: Op::Dial,
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            },
        ];

        for err in errors {
            assert!(err.is_connection_error(), "{err} should be retryable");
        }
    }

    #[test]
    fn other_errors_are_not_retryable() {
        assert!(!ClientError::ResponseTooLarge { limit: 8 }.is_connection_error());
        assert!(
            !ClientError::Config(ConfigError::Invalid("bad".to_string())).is_connection_error()
        );
    }

    #[test]
    fn error_messages() {
        let err = ClientError::Timeout {
            op: Op::Dial,
            timeout: Duration::from_secs(2),
        };
        assert_eq!(err.to_string(), "dial timed out after 2s");

        let err = ClientError::Io {
            op: Op::Write,
            source: io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"),
        };
        assert_eq!(err.to_string(), "write failed: broken pipe");
    }
}
