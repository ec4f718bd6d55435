//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind, accept)
//!     → connection.rs (connection id, in-flight count)
//!     → Hand off to http::server
//! ```
//!
//! # Design Decisions
//! - No accept queue or connection cap: one task per connection
//! - Connection ids exist for log correlation only

pub mod connection;
pub mod listener;
