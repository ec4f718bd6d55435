//! HTTP/1.1 protocol engine.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → request.rs (arena + request-line/headers/body state machine)
//!     → headers.rs (case-insensitive, folding header container)
//!     → handler (caller supplied)
//!     → response.rs (status line → headers → body/chunks → trailers)
//!     → connection closed by server.rs
//! ```

pub mod headers;
pub mod request;
pub mod response;
pub mod server;

pub use headers::{HeaderError, Headers};
pub use request::{ParseError, Request, RequestLine, RequestParser};
pub use response::{default_headers, ResponseError, ResponseWriter, StatusCode, WriterState};
pub use server::{ConnectionWriter, Handler, Server, ServerBuilder, ServerError};
