//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (client or backend)
//!     → body.rs (head reading, framing rules, chunked decoding)
//!     → request.rs (parse client request, serialize toward backend)
//!     → response.rs (parse backend response per request method, annotate, relay)
//!     → server.rs (accept loop, one proxy session per connection)
//! ```
//!
//! # Design Decisions
//! - Content-Length bodies are streamed to the client once the head is relayed
//! - Chunked and close-delimited bodies are read fully first, since their size
//!   is only known at the end
//! - Chunked bodies are decoded on read and re-chunked on write
//! - Head sizes and buffered body sizes are bounded by `LimitsConfig`

pub mod body;
pub mod request;
pub mod response;
pub mod server;

pub use body::{Framing, RelayError};
pub use request::{read_request, Request};
pub use response::{read_response, read_response_body, read_response_head, Response};
pub use server::HttpServer;

/// Errors produced while reading or writing HTTP/1.x messages.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed in the middle of a message")]
    UnexpectedEof,

    #[error("malformed message head: {0}")]
    Parse(#[from] httparse::Error),

    #[error("message head is incomplete")]
    IncompleteHead,

    #[error("message head exceeds {0} bytes")]
    HeadTooLarge(usize),

    #[error("message body exceeds {0} bytes")]
    BodyTooLarge(usize),

    #[error("invalid Content-Length")]
    InvalidContentLength,

    #[error("invalid chunked encoding")]
    InvalidChunk,

    #[error("unsupported transfer coding")]
    UnsupportedTransferCoding,

    #[error("invalid request target {0:?}")]
    InvalidTarget(String),

    #[error("invalid method")]
    InvalidMethod,

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("unsupported HTTP version")]
    UnsupportedVersion,
}

impl HttpError {
    /// True when the peer went away rather than sending bad data.
    pub fn is_disconnect(&self) -> bool {
        match self {
            HttpError::UnexpectedEof => true,
            HttpError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}
