//! TCP listener.
//!
//! # Responsibilities
//! - Bind to the configured host and port
//! - Accept incoming TCP connections
//! - Tag accept failures so the accept loop can tell them from bind failures

use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },
    /// Failed to accept connection.
    #[error("failed to accept: {0}")]
    Accept(std::io::Error),
}

/// A bound TCP listener.
///
/// There is no admission limit: every accepted connection is handed out
/// immediately.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    /// Bind to `config.host:config.port`.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let address = config.address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ListenerError::Bind {
                address: address.clone(),
                source,
            })?;

        let local_addr = listener
            .local_addr()
            .map_err(|source| ListenerError::Bind { address, source })?;

        tracing::info!(address = %local_addr, "Listener bound");

        Ok(Self { inner: listener })
    }

    /// Accept a new connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ListenerError> {
        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        tracing::debug!(peer_addr = %addr, "Connection accepted");
        Ok((stream, addr))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }
}
