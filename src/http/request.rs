//! Incremental request parsing.
//!
//! # Responsibilities
//! - Buffer bytes from the connection in a growable arena
//! - Drive the request-line → headers → body state machine
//! - Enforce `Content-Length` framing of the body
//!
//! # Design Decisions
//! - Each state consumes a whole syntactic unit or nothing at all
//! - Only the unconsumed suffix of the arena is ever handed to a consumer
//! - The arena doubles when a read would not fit

use bytes::{Buf, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::http::headers::{find_crlf, is_token, HeaderError, Headers};

/// Default starting capacity of the parser's read arena.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

const SUPPORTED_VERSION: &str = "HTTP/1.1";

/// Terminal failure while reading a request.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("request line must have exactly 3 parts, got {0}")]
    RequestLineParts(usize),
    #[error("HTTP method {0:?} must be an upper-case token")]
    InvalidMethod(String),
    #[error("HTTP version must be 'HTTP/1.1', got {0:?}")]
    UnsupportedVersion(String),
    #[error(transparent)]
    Header(#[from] HeaderError),
    #[error("invalid Content-Length {0:?}")]
    InvalidContentLength(String),
    #[error("body longer than declared Content-Length ({received} > {declared})")]
    BodyTooLong { declared: usize, received: usize },
    #[error("body shorter than declared Content-Length ({received} < {declared})")]
    BodyTooShort { declared: usize, received: usize },
    #[error("connection closed before the request was complete")]
    Incomplete,
    #[error("failed to read request: {0}")]
    Io(#[from] std::io::Error),
}

/// `<METHOD> <TARGET> HTTP/1.1`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    /// Taken verbatim, no decoding. Bytes that are not UTF-8 become U+FFFD.
    pub target: String,
    /// Version number without the `HTTP/` prefix.
    pub http_version: String,
}

impl RequestLine {
    /// Parse one CRLF-terminated request line from the front of `data`.
    ///
    /// Returns the line and the bytes consumed, or `None` if no CRLF has
    /// arrived yet.
    pub fn parse(data: &[u8]) -> Result<Option<(Self, usize)>, ParseError> {
        let Some(end) = find_crlf(data) else {
            return Ok(None);
        };
        let parts: Vec<&[u8]> = data[..end].split(|&b| b == b' ').collect();
        let &[method, target, version] = parts.as_slice() else {
            return Err(ParseError::RequestLineParts(parts.len()));
        };
        if version != SUPPORTED_VERSION.as_bytes() {
            return Err(ParseError::UnsupportedVersion(
                String::from_utf8_lossy(version).into_owned(),
            ));
        }
        if !is_token(method) || method.iter().any(u8::is_ascii_lowercase) {
            return Err(ParseError::InvalidMethod(
                String::from_utf8_lossy(method).into_owned(),
            ));
        }

        let request_line = Self {
            method: String::from_utf8_lossy(method).into_owned(),
            target: String::from_utf8_lossy(target).into_owned(),
            http_version: SUPPORTED_VERSION.trim_start_matches("HTTP/").to_owned(),
        };
        Ok(Some((request_line, end + 2)))
    }
}

/// A fully parsed request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub request_line: RequestLine,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl Request {
    /// Read one request from `reader` using the default arena size.
    ///
    /// Returns `Ok(None)` if the peer closed the stream before sending any
    /// byte of a request.
    pub async fn from_reader<R>(reader: &mut R) -> Result<Option<Self>, ParseError>
    where
        R: AsyncRead + Unpin,
    {
        RequestParser::new().parse_from(reader).await
    }

    pub fn method(&self) -> &str {
        &self.request_line.method
    }

    pub fn target(&self) -> &str {
        &self.request_line.target
    }
}

/// Parser progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    Initialized,
    ParsingHeaders,
    ParsingBody,
    Done,
}

impl std::fmt::Display for ParserState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ParserState::Initialized => "initialized",
            ParserState::ParsingHeaders => "parsing headers",
            ParserState::ParsingBody => "parsing body",
            ParserState::Done => "done",
        };
        f.write_str(name)
    }
}

/// State machine that assembles a [`Request`] from a byte stream.
#[derive(Debug)]
pub struct RequestParser {
    state: ParserState,
    request: Request,
    content_length: usize,
    buffer: BytesMut,
    min_capacity: usize,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestParser {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    /// Create a parser whose arena starts at `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: ParserState::Initialized,
            request: Request::default(),
            content_length: 0,
            buffer: BytesMut::with_capacity(capacity.max(1)),
            min_capacity: capacity.max(1),
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Read from `reader` until a request is complete or the stream fails.
    pub async fn parse_from<R>(mut self, reader: &mut R) -> Result<Option<Request>, ParseError>
    where
        R: AsyncRead + Unpin,
    {
        while self.state != ParserState::Done {
            if self.buffer.len() == self.buffer.capacity() {
                let grow = self.buffer.capacity().max(self.min_capacity);
                self.buffer.reserve(grow);
            }

            let read = reader.read_buf(&mut self.buffer).await?;

            let consumed = self.feed_buffered()?;
            self.buffer.advance(consumed);

            if read == 0 && self.state != ParserState::Done {
                return match self.state {
                    ParserState::ParsingBody => Err(ParseError::BodyTooShort {
                        declared: self.content_length,
                        received: self.request.body.len(),
                    }),
                    ParserState::Initialized if self.buffer.is_empty() => Ok(None),
                    _ => Err(ParseError::Incomplete),
                };
            }
        }

        tracing::trace!(
            method = %self.request.request_line.method,
            target = %self.request.request_line.target,
            body_len = self.request.body.len(),
            "Request parsed"
        );
        Ok(self.into_request())
    }

    /// Feed bytes that are already in memory.
    ///
    /// Returns how many bytes of `data` were consumed; the caller keeps the
    /// rest and offers it again together with newly arrived bytes.
    pub fn feed(&mut self, data: &[u8]) -> Result<usize, ParseError> {
        let mut read = 0;
        loop {
            let rest = &data[read..];
            if rest.is_empty() {
                break;
            }
            let consumed = match self.state {
                ParserState::Initialized => match RequestLine::parse(rest)? {
                    Some((line, n)) => {
                        self.request.request_line = line;
                        self.state = ParserState::ParsingHeaders;
                        n
                    }
                    None => 0,
                },
                ParserState::ParsingHeaders => {
                    let (n, done) = self.request.headers.parse_line(rest)?;
                    if done {
                        self.finish_headers()?;
                    }
                    n
                }
                ParserState::ParsingBody => {
                    let received = self.request.body.len() + rest.len();
                    if received > self.content_length {
                        return Err(ParseError::BodyTooLong {
                            declared: self.content_length,
                            received,
                        });
                    }
                    self.request.body.extend_from_slice(rest);
                    if received == self.content_length {
                        self.state = ParserState::Done;
                    }
                    rest.len()
                }
                ParserState::Done => 0,
            };
            if consumed == 0 {
                break;
            }
            read += consumed;
        }
        Ok(read)
    }

    /// Take the request once the parser has reached [`ParserState::Done`].
    pub fn into_request(self) -> Option<Request> {
        (self.state == ParserState::Done).then_some(self.request)
    }

    fn feed_buffered(&mut self) -> Result<usize, ParseError> {
        let buffered = std::mem::take(&mut self.buffer);
        let result = self.feed(&buffered);
        self.buffer = buffered;
        result
    }

    fn finish_headers(&mut self) -> Result<(), ParseError> {
        self.content_length = match self.request.headers.content_length() {
            None => 0,
            Some(Ok(n)) => usize::try_from(n).unwrap_or(0),
            Some(Err(raw)) => return Err(ParseError::InvalidContentLength(raw.to_owned())),
        };
        self.state = if self.content_length > 0 {
            ParserState::ParsingBody
        } else {
            ParserState::Done
        };
        Ok(())
    }
}
