//! Connection server.
//!
//! # Responsibilities
//! - Bind the listener and run the accept loop on its own task
//! - Spawn one task per connection (no pool, no cap)
//! - Parse one request, hand a bound writer to the handler, close
//! - Stop accepting on `close` without touching in-flight connections

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::config::{ListenerConfig, ParserConfig, ServerConfig};
use crate::http::request::{Request, RequestParser};
use crate::http::response::{ResponseError, ResponseWriter};
use crate::lifecycle::Shutdown;
use crate::net::connection::ConnectionTracker;
use crate::net::listener::{Listener, ListenerError};
use crate::observability::metrics;

/// Writer bound to the write half of an accepted connection.
pub type ConnectionWriter = ResponseWriter<OwnedWriteHalf>;

/// Error type for starting a server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("handler function cannot be absent")]
    MissingHandler,
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Handles one parsed request by driving the writer to completion.
///
/// Implemented for every `Fn(ConnectionWriter, Request) -> impl Future`.
/// The connection is closed once the returned future resolves.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, writer: ConnectionWriter, request: Request) -> BoxFuture<'static, Result<(), ResponseError>>;
}

impl<F, Fut> Handler for F
where
    F: Fn(ConnectionWriter, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ResponseError>> + Send + 'static,
{
    fn call(&self, writer: ConnectionWriter, request: Request) -> BoxFuture<'static, Result<(), ResponseError>> {
        Box::pin(self(writer, request))
    }
}

/// Builder for [`Server`].
#[derive(Default)]
pub struct ServerBuilder {
    listener: ListenerConfig,
    parser: ParserConfig,
    handler: Option<Arc<dyn Handler>>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take listener and parser settings from a loaded configuration.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            listener: config.listener.clone(),
            parser: config.parser.clone(),
            handler: None,
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.listener.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.listener.port = port;
        self
    }

    pub fn initial_buffer_size(mut self, size: usize) -> Self {
        self.parser.initial_buffer_size = size;
        self
    }

    pub fn handler<H: Handler>(mut self, handler: H) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Bind and start accepting. Returns as soon as the listener is bound.
    pub async fn serve(self) -> Result<Server, ServerError> {
        let handler = self.handler.ok_or(ServerError::MissingHandler)?;
        let listener = Listener::bind(&self.listener).await?;
        let local_addr = listener.local_addr().map_err(|source| ListenerError::Bind {
            address: self.listener.address(),
            source,
        })?;

        let closed = Arc::new(AtomicBool::new(false));
        let shutdown = Shutdown::new();
        let tracker = ConnectionTracker::new();
        let context = Arc::new(ConnectionContext {
            handler,
            tracker: tracker.clone(),
            buffer_size: self.parser.initial_buffer_size,
        });

        tokio::spawn(accept_loop(
            listener,
            context,
            Arc::clone(&closed),
            shutdown.subscribe(),
        ));

        tracing::info!(address = %local_addr, "Server started");

        Ok(Server {
            local_addr,
            closed,
            shutdown,
            tracker,
        })
    }
}

/// Handle to a running server.
///
/// [`Server::close`] is the only way to stop accepting. Dropping the handle
/// detaches the accept loop, which then runs until the runtime shuts down.
#[derive(Debug)]
pub struct Server {
    local_addr: SocketAddr,
    closed: Arc<AtomicBool>,
    shutdown: Shutdown,
    tracker: ConnectionTracker,
}

impl Server {
    /// Bind `0.0.0.0:<port>` and serve every connection with `handler`.
    pub async fn serve<H: Handler>(port: u16, handler: H) -> Result<Self, ServerError> {
        ServerBuilder::new().port(port).handler(handler).serve().await
    }

    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Connections accepted but not yet closed.
    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop accepting new connections.
    ///
    /// Returns `true` for the call that actually closed the server. In-flight
    /// connections keep running and are not waited on.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.shutdown.trigger();
        tracing::info!(address = %self.local_addr, "Server closed");
        true
    }
}

struct ConnectionContext {
    handler: Arc<dyn Handler>,
    tracker: ConnectionTracker,
    buffer_size: usize,
}

async fn accept_loop(
    listener: Listener,
    context: Arc<ConnectionContext>,
    closed: Arc<AtomicBool>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut detached = false;
    loop {
        if closed.load(Ordering::SeqCst) {
            break;
        }

        let accepted = tokio::select! {
            signal = shutdown.recv(), if !detached => match signal {
                // the handle was dropped without closing
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!("Server handle dropped, accept loop detached");
                    detached = true;
                    continue;
                }
                _ => break,
            },
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer_addr)) => {
                metrics::record_accept();
                let guard = context.tracker.track();
                let span = tracing::info_span!(
                    "connection",
                    connection_id = %guard.id(),
                    peer_addr = %peer_addr
                );
                let context = Arc::clone(&context);
                tokio::spawn(
                    async move {
                        handle_connection(stream, &context).await;
                        drop(guard);
                    }
                    .instrument(span),
                );
            }
            Err(e) if closed.load(Ordering::SeqCst) => {
                tracing::debug!(error = %e, "Accept failed after close");
                break;
            }
            Err(e) => {
                metrics::record_accept_error();
                tracing::error!(error = %e, "Error accepting connection");
            }
        }
    }

    tracing::debug!("Accept loop stopped");
}

async fn handle_connection(stream: TcpStream, context: &ConnectionContext) {
    let (mut reader, writer) = stream.into_split();

    let parser = RequestParser::with_capacity(context.buffer_size);
    let request = match parser.parse_from(&mut reader).await {
        Ok(Some(request)) => request,
        Ok(None) => {
            tracing::debug!("Peer closed before sending a request");
            return;
        }
        Err(e) => {
            // no response is synthesized for malformed requests
            metrics::record_parse_failure();
            tracing::warn!(error = %e, "Failed to read request");
            return;
        }
    };

    metrics::record_request(request.method());
    tracing::debug!(
        method = %request.method(),
        target = %request.target(),
        body_len = request.body.len(),
        "Request received"
    );

    if let Err(e) = context.handler.call(ResponseWriter::new(writer), request).await {
        tracing::warn!(error = %e, "Handler failed to write response");
    }
}
