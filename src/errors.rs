use std::error::Error as StdError;
use std::fmt;
use std::io;

use http::StatusCode;

/// Result type used throughout the crate.
pub type HttpResult<T> = std::result::Result<T, HttpError>;

/// Error kinds of the server core.
///
/// Errors raised while parsing a request are turned into a 4xx reply and
/// close the connection; errors raised from a pipeline handler are caught
/// by the exception handler at position 0 and turned into a 500 reply.
#[derive(Debug)]
pub enum HttpError {
    /// Malformed HTTP received from the client. Fatal for the connection.
    Protocol(&'static str),
    /// Socket read/write failure. Fatal for the connection.
    Io(io::Error),
    /// Invariant violated in core code (e.g. write to null stream).
    Logic(&'static str),
    /// Arithmetic or size overflow.
    Overflow(&'static str),
    /// A length limit was exceeded.
    Length(&'static str),
    /// Invalid format of a value (listen address, config entry, ...).
    Format(String),
    /// Requested feature is not implemented.
    NotImplemented(&'static str),
    /// Filesystem access failure surfaced by a handler.
    FileSystem(io::Error),
    /// Failed to parse a value (string to integer, ...).
    Parse(&'static str),
    /// Error surfaced from a pipeline handler.
    Handler(Box<dyn StdError>),
    /// The server is stopping; the pending suspension was resolved early.
    Cancelled,
}

impl HttpError {
    /// Wrap an arbitrary handler failure.
    pub fn handler<E: Into<Box<dyn StdError>>>(e: E) -> HttpError {
        HttpError::Handler(e.into())
    }

    /// The status code a client-visible reply for this error should carry.
    pub fn status_code(&self) -> StatusCode {
        match self {
            HttpError::Protocol(_) => StatusCode::BAD_REQUEST,
            HttpError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            HttpError::Logic(_) => StatusCode::INTERNAL_SERVER_ERROR,
            HttpError::Overflow(_) => StatusCode::INTERNAL_SERVER_ERROR,
            HttpError::Length(_) => StatusCode::PAYLOAD_TOO_LARGE,
            HttpError::Format(_) => StatusCode::BAD_REQUEST,
            HttpError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            HttpError::FileSystem(_) => StatusCode::INTERNAL_SERVER_ERROR,
            HttpError::Parse(_) => StatusCode::BAD_REQUEST,
            HttpError::Handler(_) => StatusCode::INTERNAL_SERVER_ERROR,
            HttpError::Cancelled => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this error came from socket I/O (read/write error counters).
    pub fn is_io(&self) -> bool {
        matches!(self, HttpError::Io(_))
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HttpError::Protocol(msg) => write!(f, "protocol error: {}", msg),
            HttpError::Io(e) => write!(f, "i/o error: {}", e),
            HttpError::Logic(msg) => write!(f, "logic error: {}", msg),
            HttpError::Overflow(msg) => write!(f, "overflow error: {}", msg),
            HttpError::Length(msg) => write!(f, "length error: {}", msg),
            HttpError::Format(msg) => write!(f, "format error: {}", msg),
            HttpError::NotImplemented(msg) => write!(f, "not implemented: {}", msg),
            HttpError::FileSystem(e) => write!(f, "filesystem error: {}", e),
            HttpError::Parse(msg) => write!(f, "parse error: {}", msg),
            HttpError::Handler(e) => write!(f, "handler error: {}", e),
            HttpError::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl StdError for HttpError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            HttpError::Io(e) => Some(e),
            HttpError::FileSystem(e) => Some(e),
            HttpError::Handler(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for HttpError {
    fn from(e: io::Error) -> Self {
        HttpError::Io(e)
    }
}
