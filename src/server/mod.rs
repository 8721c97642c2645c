//! Async TCP server on Tokio.
//!
//! Accepts connections, parses HTTP/1.1 requests, and dispatches each to a
//! handler function — normally [`App::dispatch`](crate::App::dispatch) via
//! [`App::listen`](crate::App::listen). Persistent connections
//! (keep-alive) are the default; optional read/write/idle timeouts come
//! from [`ServerConfig`].

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::http::{Method, Request, Response, StatusCode, request::RequestError};

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Maximum buffered size of one request before it is rejected with 413 (8 MiB).
const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

/// Initial per-connection read buffer capacity.
const INITIAL_BUF_SIZE: usize = 4096;

/// Listener-level configuration: optional timeouts, all unlimited by
/// default.
///
/// - `read_timeout` bounds each read while a request is arriving.
/// - `write_timeout` bounds each response write.
/// - `idle_timeout` bounds the wait for the next request on a kept-alive
///   connection; it falls back to `read_timeout` when unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerConfig {
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub idle_timeout: Option<Duration>,
}

/// The TCP accept loop.
///
/// One Tokio task is spawned per accepted connection; the handler is
/// shared across tasks behind an [`Arc`].
///
/// # Examples
///
/// ```no_run
/// use swerve::{Response, StatusCode};
/// use swerve::server::Server;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = Server::bind("127.0.0.1:8080").await?;
///     server.run(|_req| async {
///         Response::new(StatusCode::Ok).body("Hello!")
///     }).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: ServerConfig,
}

impl Server {
    /// Binds to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] when the address cannot be bound
    /// (port in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            config: ServerConfig::default(),
        })
    }

    /// Applies a [`ServerConfig`].
    #[must_use]
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the bound local address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections and dispatches requests to `handler` until the
    /// process terminates or the listener fails.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn run<H, F>(self, handler: H) -> Result<(), ServerError>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let config = self.config;
        info!(address = %self.local_addr, "listening");

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let handler = Arc::clone(&handler);

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, config, handler).await {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// Reads from the stream, honoring the applicable timeout. Returns
/// `Ok(0)` on peer close and `Err` on I/O failure or timeout.
async fn read_some(
    stream: &mut TcpStream,
    buf: &mut BytesMut,
    timeout: Option<Duration>,
) -> std::io::Result<usize> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, stream.read_buf(buf))
            .await
            .map_err(|_| std::io::Error::from(std::io::ErrorKind::TimedOut))?,
        None => stream.read_buf(buf).await,
    }
}

/// Writes the full response, honoring the write timeout.
async fn write_all(
    stream: &mut TcpStream,
    bytes: &[u8],
    timeout: Option<Duration>,
) -> std::io::Result<()> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, stream.write_all(bytes))
            .await
            .map_err(|_| std::io::Error::from(std::io::ErrorKind::TimedOut))?,
        None => stream.write_all(bytes).await,
    }
}

/// Drives one connection for its whole life: one request per loop
/// iteration until the peer closes, errors, or asks for `Connection:
/// close`.
async fn handle_connection<H, F>(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    config: ServerConfig,
    handler: Arc<H>,
) -> Result<(), std::io::Error>
where
    H: Fn(Request) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        // Between requests the connection is idle; mid-request the read
        // timeout applies.
        let timeout = if buf.is_empty() {
            config.idle_timeout.or(config.read_timeout)
        } else {
            config.read_timeout
        };
        let bytes_read = read_some(&mut stream, &mut buf, timeout).await?;

        if bytes_read == 0 {
            debug!(peer = %peer_addr, "connection closed by peer");
            break;
        }

        if buf.len() > MAX_REQUEST_SIZE {
            warn!(peer = %peer_addr, "request too large, sending 413");
            let response = Response::new(StatusCode::PayloadTooLarge)
                .body("Request entity too large")
                .keep_alive(false);
            write_all(&mut stream, &response.into_bytes(), config.write_timeout).await?;
            break;
        }

        let (mut request, body_offset) = match Request::parse(&buf) {
            Ok(pair) => pair,
            Err(RequestError::Incomplete) => {
                // Head not fully received; keep reading.
                continue;
            }
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "bad request, sending 400");
                let response = Response::new(StatusCode::BadRequest)
                    .body(format!("Bad Request: {e}"))
                    .keep_alive(false);
                write_all(&mut stream, &response.into_bytes(), config.write_timeout).await?;
                break;
            }
        };

        // Wait for the whole body when Content-Length says more is coming.
        let content_length = request.content_length().unwrap_or(0);
        let total_needed = body_offset + content_length;
        if buf.len() < total_needed {
            continue;
        }

        request.set_peer_addr(peer_addr);
        let keep_alive = request.is_keep_alive();
        let is_head = request.method() == &Method::Head;

        debug!(
            peer = %peer_addr,
            method = %request.method(),
            path = %request.path(),
            "dispatching request"
        );

        let response = handler(request).await;
        // HEAD answers with the GET route's status and headers but no
        // body bytes on the wire.
        let bytes = if is_head {
            response.into_head_bytes()
        } else {
            response.into_bytes()
        };
        write_all(&mut stream, &bytes, config.write_timeout).await?;
        stream.flush().await?;

        let _ = buf.split_to(total_needed);

        if !keep_alive {
            debug!(peer = %peer_addr, "connection: close, shutting down");
            break;
        }
    }

    Ok(())
}
