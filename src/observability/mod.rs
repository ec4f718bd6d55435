//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! net, http::server
//!     → logging.rs (structured tracing events, connection_id field)
//!     → metrics.rs (counters, gauges; optional Prometheus endpoint)
//! ```

pub mod logging;
pub mod metrics;
