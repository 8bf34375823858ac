use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::str;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{watch, Semaphore};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

use crate::codec;
use crate::commands;
use crate::config::ServerConfig;
use crate::connection::{Connection, ConnectionError};
use crate::frame::Frame;
use crate::store::Engine;

/// Lifecycle of a listening server. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Created,
    Running,
    Draining,
    Stopped,
}

/// A TCP server that serves at most `max_connections` clients at once and drains cooperatively
/// on shutdown: in-flight connections end on their own through peer close or idle timeout.
pub struct Server {
    listener: TcpListener,
    engine: Arc<dyn Engine>,
    // One permit per connection slot. Permits are acquired without waiting on accept and
    // released when the connection task ends.
    limit_connections: Arc<Semaphore>,
    idle_timeout: Duration,
    buffer_size: usize,
    state: watch::Sender<State>,
}

impl Server {
    pub async fn bind(config: &ServerConfig, engine: Arc<dyn Engine>) -> crate::Result<Server> {
        config.validate()?;

        let listener = TcpListener::bind(&config.network.address).await?;
        let (state, _) = watch::channel(State::Created);

        Ok(Server {
            listener,
            engine,
            limit_connections: Arc::new(Semaphore::new(config.network.max_connections)),
            idle_timeout: config.network.idle_timeout,
            buffer_size: config.buffer_size(),
            state,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn state(&self) -> watch::Receiver<State> {
        self.state.subscribe()
    }

    /// Accepts connections until `shutdown` resolves, then waits for every admitted connection to
    /// finish before returning.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let Server {
            listener,
            engine,
            limit_connections,
            idle_timeout,
            buffer_size,
            state,
        } = self;

        let tracker = TaskTracker::new();
        let draining = CancellationToken::new();

        state.send_replace(State::Running);
        if let Ok(addr) = listener.local_addr() {
            info!("Server listening on {}", addr);
        }

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => break,

                result = listener.accept() => {
                    let (socket, client_address) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            continue;
                        }
                    };

                    let permit = match limit_connections.clone().try_acquire_owned() {
                        Ok(permit) => permit,
                        Err(_) => {
                            warn!("Connection limit reached, rejecting connection from {}", client_address);
                            drop(socket);
                            continue;
                        }
                    };

                    let conn = Connection::new(socket, client_address, buffer_size, idle_timeout);
                    let engine = engine.clone();
                    let draining = draining.clone();

                    tracker.spawn(async move {
                        match handle_connection(conn, engine, draining).await {
                            Ok(()) => {}
                            Err(ConnectionError::IdleTimeout(timeout)) => {
                                info!("Closing idle connection from {} after {:?}", client_address, timeout);
                            }
                            Err(e) => warn!("Connection from {} closed: {}", client_address, e),
                        }
                        drop(permit);
                    });
                }
            }
        }

        state.send_replace(State::Draining);
        info!(
            "Shutdown requested, waiting for {} connection(s) to finish",
            tracker.len()
        );

        drop(listener);
        draining.cancel();
        tracker.close();
        tracker.wait().await;

        state.send_replace(State::Stopped);
        info!("Server stopped");
    }
}

#[instrument(
    name = "connection",
    skip(conn, engine, draining),
    fields(connection_id, client_address)
)]
async fn handle_connection(
    mut conn: Connection,
    engine: Arc<dyn Engine>,
    draining: CancellationToken,
) -> Result<(), ConnectionError> {
    tracing::Span::current()
        .record("connection_id", conn.id.to_string())
        .record("client_address", conn.client_address.to_string());

    info!("Accepted connection");

    // Requests are strictly sequential: the response is written before the next read.
    while let Some(request) = conn.read_request().await? {
        debug!("Received request: {:?}", String::from_utf8_lossy(request));
        let frame = handle_request(request, engine.as_ref());
        debug!("Sending response: {}", frame);

        conn.write_frame(&frame).await?;

        if draining.is_cancelled() {
            info!("Server is draining, closing connection");
            return Ok(());
        }
    }

    info!("Connection closed");
    Ok(())
}

/// Runs one request line through the codec and the dispatcher. Protocol and domain errors become
/// error frames and never end the connection.
pub fn handle_request(request: &[u8], engine: &dyn Engine) -> Frame {
    let line = match str::from_utf8(request) {
        Ok(line) => line,
        Err(_) => return Frame::error("protocol error; invalid UTF-8 string"),
    };

    codec::parse(line)
        .map_err(Frame::error)
        .and_then(|cmd| commands::dispatch(&cmd, engine).map_err(Frame::error))
        .unwrap_or_else(|frame| frame)
}
