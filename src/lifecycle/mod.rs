//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Server::close → trigger → accept loop drops the listener
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → main calls Server::close
//! ```
//!
//! # Design Decisions
//! - Closing stops accepting; in-flight connections are left to finish
//! - No drain deadline

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
