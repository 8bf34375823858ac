use bytes::BytesMut;
use std::io;
use std::net::SocketAddr;
use thiserror::Error as ThisError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use uuid::Uuid;

use crate::frame::Frame;

#[derive(Debug, ThisError)]
pub enum ConnectionError {
    #[error("no request received within {0:?}")]
    IdleTimeout(Duration),
    #[error("response not written within {0:?}")]
    WriteTimeout(Duration),
    #[error("request too large; must be smaller than {limit} bytes")]
    TooLarge { limit: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// One accepted client socket. Every request must arrive in a single read, and the buffer is
/// sized once at construction.
pub struct Connection {
    pub id: Uuid,
    pub client_address: SocketAddr,
    stream: TcpStream,
    // A read that fills the whole buffer is treated as an oversized request.
    buffer: BytesMut,
    idle_timeout: Duration,
}

impl Connection {
    pub fn new(
        stream: TcpStream,
        client_address: SocketAddr,
        buffer_size: usize,
        idle_timeout: Duration,
    ) -> Connection {
        Connection {
            id: Uuid::new_v4(),
            client_address,
            stream,
            buffer: BytesMut::zeroed(buffer_size),
            idle_timeout,
        }
    }

    /// Waits up to the idle timeout for the next request.
    ///
    /// Returns `None` when the peer closed the connection cleanly.
    pub async fn read_request(&mut self) -> Result<Option<&[u8]>, ConnectionError> {
        let n = timeout(self.idle_timeout, self.stream.read(&mut self.buffer[..]))
            .await
            .map_err(|_| ConnectionError::IdleTimeout(self.idle_timeout))??;

        if n == 0 {
            return Ok(None);
        }

        if n == self.buffer.len() {
            return Err(ConnectionError::TooLarge {
                limit: self.buffer.len(),
            });
        }

        Ok(Some(&self.buffer[..n]))
    }

    pub async fn write_frame(&mut self, frame: &Frame) -> Result<(), ConnectionError> {
        let bytes = frame.serialize();

        timeout(self.idle_timeout, self.stream.write_all(&bytes))
            .await
            .map_err(|_| ConnectionError::WriteTimeout(self.idle_timeout))??;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn connection_pair(buffer_size: usize, idle_timeout: Duration) -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let local_addr = listener.local_addr().unwrap();

        let client = TcpStream::connect(local_addr).await.unwrap();
        let (socket, client_address) = listener.accept().await.unwrap();

        (
            Connection::new(socket, client_address, buffer_size, idle_timeout),
            client,
        )
    }

    #[tokio::test]
    async fn read_single_request() {
        let (mut conn, mut client) = connection_pair(64, Duration::from_secs(5)).await;

        client.write_all(b"GET foo\n").await.unwrap();

        let request = conn.read_request().await.unwrap();
        assert_eq!(request, Some(&b"GET foo\n"[..]));
    }

    #[tokio::test]
    async fn peer_close_is_clean() {
        let (mut conn, client) = connection_pair(64, Duration::from_secs(5)).await;

        drop(client);

        assert!(matches!(conn.read_request().await, Ok(None)));
    }

    #[tokio::test]
    async fn full_buffer_is_too_large() {
        let (mut conn, mut client) = connection_pair(8, Duration::from_secs(5)).await;

        client.write_all(b"SET a bc").await.unwrap();

        assert!(matches!(
            conn.read_request().await,
            Err(ConnectionError::TooLarge { limit: 8 })
        ));
    }

    #[tokio::test]
    async fn idle_timeout() {
        let (mut conn, _client) = connection_pair(64, Duration::from_millis(50)).await;

        assert!(matches!(
            conn.read_request().await,
            Err(ConnectionError::IdleTimeout(_))
        ));
    }

    #[tokio::test]
    async fn write_frame() {
        let (mut conn, mut client) = connection_pair(64, Duration::from_secs(5)).await;

        conn.write_frame(&Frame::Ok("bar".to_string())).await.unwrap();

        let mut buf = [0u8; 16];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"bar\n");
    }
}
