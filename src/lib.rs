//! HTTP/1.1 over raw TCP.
//!
//! An incremental request parser, a header container, an order-enforcing
//! response writer and a one-task-per-connection server, built directly on
//! Tokio byte streams.

pub mod config;
pub mod handlers;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::schema::ServerConfig;
pub use http::{Request, ResponseWriter, Server};
pub use lifecycle::Shutdown;
