//! Response serialization.
//!
//! # Responsibilities
//! - Enforce status line → headers → body → done ordering
//! - Serialize plain bodies and chunked bodies with optional trailers
//! - Drain every serialized buffer to the sink before returning
//!
//! # Design Decisions
//! - A writer serves exactly one response and is never reused
//! - Out-of-order calls fail before any byte is written
//! - Trailers are only accepted when the header block announced them

use std::fmt;

use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::headers::{title_case, HeaderError, Headers};

const CRLF: &[u8] = b"\r\n";
const LAST_CHUNK: &[u8] = b"0\r\n";

/// HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(200);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);

    /// Reason phrase for the supported codes, empty for everything else.
    pub fn reason(&self) -> &'static str {
        match self.0 {
            200 => "OK",
            400 => "Bad Request",
            500 => "Internal Server Error",
            _ => "",
        }
    }

    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        StatusCode(code)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where the writer is in the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    StatusLine,
    Headers,
    Body,
    /// Last chunk sent, announced trailers still owed.
    Trailers,
    Done,
}

impl fmt::Display for WriterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriterState::StatusLine => "status line",
            WriterState::Headers => "headers",
            WriterState::Body => "body",
            WriterState::Trailers => "trailers",
            WriterState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Error returned by [`ResponseWriter`] operations.
#[derive(Debug, Error)]
pub enum ResponseError {
    /// The operation was called in the wrong state; nothing was written.
    #[error("it is not time to write {operation} - current write state is {state}")]
    OutOfOrder {
        operation: &'static str,
        state: WriterState,
    },
    /// A header handed to the writer's caller was rejected.
    #[error(transparent)]
    Header(#[from] HeaderError),
    /// The sink failed; a prefix of the output may already be on the wire.
    #[error("failed to write response: {0}")]
    Io(#[from] std::io::Error),
}

/// Headers every simple response starts from.
pub fn default_headers(content_length: usize) -> Headers {
    Headers::from_trusted([
        ("content-length", content_length.to_string()),
        ("content-type", "text/plain".to_owned()),
        ("connection", "close".to_owned()),
    ])
}

/// Writes one response onto `W`, enforcing the order of its parts.
#[derive(Debug)]
pub struct ResponseWriter<W> {
    state: WriterState,
    chunked: bool,
    trailers_announced: bool,
    sink: W,
}

impl<W> ResponseWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(sink: W) -> Self {
        Self {
            state: WriterState::StatusLine,
            chunked: false,
            trailers_announced: false,
            sink,
        }
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    /// Give back the underlying sink.
    pub fn into_inner(self) -> W {
        self.sink
    }

    /// `HTTP/1.1 <code> <reason>\r\n`
    pub async fn write_status_line(&mut self, status: StatusCode) -> Result<(), ResponseError> {
        self.expect_state(WriterState::StatusLine, "status line")?;
        let line = format!("HTTP/1.1 {} {}\r\n", status, status.reason());
        self.sink.write_all(line.as_bytes()).await?;
        self.state = WriterState::Headers;
        Ok(())
    }

    /// Every header as `Title-Case: value\r\n`, then the blank line.
    pub async fn write_headers(&mut self, headers: &Headers) -> Result<(), ResponseError> {
        self.expect_state(WriterState::Headers, "headers")?;
        self.sink.write_all(&serialize_fields(headers)).await?;
        self.trailers_announced = headers.contains("trailer") || headers.contains("trailers");
        self.state = WriterState::Body;
        Ok(())
    }

    /// Write `body` verbatim and finish the response.
    pub async fn write_body(&mut self, body: &[u8]) -> Result<usize, ResponseError> {
        if self.chunked {
            return Err(self.out_of_order("body"));
        }
        self.expect_state(WriterState::Body, "body")?;
        self.sink.write_all(body).await?;
        self.state = WriterState::Done;
        Ok(body.len())
    }

    /// Write one `<hex-len>\r\n<bytes>\r\n` chunk. May be called repeatedly.
    ///
    /// An empty `chunk` writes nothing, since a zero-length chunk would end
    /// the body.
    pub async fn write_chunked_body(&mut self, chunk: &[u8]) -> Result<usize, ResponseError> {
        self.expect_state(WriterState::Body, "chunked body")?;
        self.chunked = true;
        if chunk.is_empty() {
            return Ok(0);
        }

        let mut frame = Vec::with_capacity(chunk.len() + 12);
        frame.extend_from_slice(format!("{:x}", chunk.len()).as_bytes());
        frame.extend_from_slice(CRLF);
        frame.extend_from_slice(chunk);
        frame.extend_from_slice(CRLF);
        self.sink.write_all(&frame).await?;
        Ok(frame.len())
    }

    /// Write the terminating zero-length chunk.
    ///
    /// Without announced trailers this is `0\r\n\r\n` and the response is
    /// done. With them only `0\r\n` is written and [`write_trailers`] must
    /// follow.
    ///
    /// [`write_trailers`]: ResponseWriter::write_trailers
    pub async fn write_chunked_body_done(&mut self) -> Result<usize, ResponseError> {
        self.expect_state(WriterState::Body, "chunked body")?;
        self.chunked = true;

        self.sink.write_all(LAST_CHUNK).await?;
        if self.trailers_announced {
            self.state = WriterState::Trailers;
            return Ok(LAST_CHUNK.len());
        }
        self.sink.write_all(CRLF).await?;
        self.state = WriterState::Done;
        Ok(LAST_CHUNK.len() + CRLF.len())
    }

    /// Write the trailer fields and the final blank line.
    pub async fn write_trailers(&mut self, trailers: &Headers) -> Result<(), ResponseError> {
        self.expect_state(WriterState::Trailers, "trailers")?;
        self.sink.write_all(&serialize_fields(trailers)).await?;
        self.state = WriterState::Done;
        Ok(())
    }

    fn expect_state(&self, expected: WriterState, operation: &'static str) -> Result<(), ResponseError> {
        if self.state != expected {
            return Err(self.out_of_order(operation));
        }
        Ok(())
    }

    fn out_of_order(&self, operation: &'static str) -> ResponseError {
        ResponseError::OutOfOrder {
            operation,
            state: self.state,
        }
    }
}

fn serialize_fields(headers: &Headers) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, value) in headers.iter() {
        out.extend_from_slice(title_case(name).as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(CRLF);
    }
    out.extend_from_slice(CRLF);
    out
}
