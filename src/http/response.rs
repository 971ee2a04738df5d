//! Response handling and transformation.
//!
//! # Responsibilities
//! - Parse one backend response, framed according to the request method
//! - Expose the byte count used for stats
//! - Set headers (the stats annotation) and relay to the client
//!
//! # Design Decisions
//! - HEAD, 1xx, 204 and 304 responses never carry a body
//! - A HEAD response counts the Content-Length it declares
//! - Interim 1xx responses (other than 101) are skipped
//! - Close-delimited bodies are relayed with an explicit Content-Length

use axum::http::header::CONTENT_LENGTH;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Version};
use bytes::Bytes;
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};

use crate::config::LimitsConfig;
use crate::http::body::{self, Framing};
use crate::http::HttpError;

/// An HTTP/1.x response. `body` is empty until the body has been read.
#[derive(Debug, Clone)]
pub struct Response {
    pub version: Version,
    pub status: StatusCode,
    pub reason: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    framing: Framing,
}

impl Response {
    /// Decoded body length in bytes.
    pub fn body_len(&self) -> u64 {
        self.body.len() as u64
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Parsed `Content-Length` header, if present and valid.
    pub fn declared_length(&self) -> Option<u64> {
        self.headers
            .get(CONTENT_LENGTH)?
            .to_str()
            .ok()?
            .trim()
            .parse()
            .ok()
    }

    /// Bytes this response adds to its path's total.
    ///
    /// A HEAD response counts the length it declares (0 without one). A
    /// length-framed body counts its declared size whether or not it has
    /// been read yet; other bodies count their decoded length.
    pub fn byte_count(&self, method: &Method) -> u64 {
        if *method == Method::HEAD {
            return self.declared_length().unwrap_or(0);
        }
        match self.framing {
            Framing::Length(len) => len,
            _ => self.body_len(),
        }
    }

    /// Insert or overwrite a header.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Whether the backend connection can carry another exchange after this
    /// response.
    pub fn keeps_alive(&self) -> bool {
        self.framing != Framing::CloseDelimited
            && self.status != StatusCode::SWITCHING_PROTOCOLS
            && !body::wants_close(self.version, &self.headers)
    }

    fn encode_head(&self) -> Vec<u8> {
        let mut head = Vec::with_capacity(256);
        head.extend_from_slice(body::version_str(self.version).as_bytes());
        head.push(b' ');
        head.extend_from_slice(self.status.as_str().as_bytes());
        head.push(b' ');
        head.extend_from_slice(self.reason.as_bytes());
        head.extend_from_slice(b"\r\n");
        body::encode_headers(&mut head, &self.headers);
        head
    }

    /// Serialize head and buffered body onto `writer` and flush.
    pub async fn write_to<W>(&self, writer: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        body::write_message(writer, &self.encode_head(), self.framing, &self.body).await
    }

    /// Write only the status line and headers. Not flushed; the body follows.
    pub async fn write_head<W>(&self, writer: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(&self.encode_head()).await
    }
}

fn has_no_body(method: &Method, status: StatusCode) -> bool {
    *method == Method::HEAD
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
}

/// Read one response to a request made with `method`, body included.
///
/// End-of-stream before the status line is `HttpError::UnexpectedEof`: the
/// backend owes a response for every request sent.
pub async fn read_response<R>(
    reader: &mut R,
    method: &Method,
    limits: &LimitsConfig,
) -> Result<Response, HttpError>
where
    R: AsyncBufRead + Unpin,
{
    let mut response = read_response_head(reader, method, limits).await?;
    read_response_body(reader, &mut response, limits).await?;
    Ok(response)
}

/// Read the status line and headers, leaving the body on `reader`.
pub async fn read_response_head<R>(
    reader: &mut R,
    method: &Method,
    limits: &LimitsConfig,
) -> Result<Response, HttpError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let head = body::read_head(reader, limits)
            .await?
            .ok_or(HttpError::UnexpectedEof)?;

        let mut raw_headers = vec![httparse::EMPTY_HEADER; limits.max_headers];
        let mut parsed = httparse::Response::new(&mut raw_headers);
        if parsed.parse(&head)?.is_partial() {
            return Err(HttpError::IncompleteHead);
        }

        let code = parsed.code.ok_or(HttpError::IncompleteHead)?;
        let status = StatusCode::from_u16(code).map_err(|_| HttpError::IncompleteHead)?;
        let version = body::parse_version(parsed.version)?;
        let reason = match parsed.reason {
            Some(reason) if !reason.is_empty() => reason.to_string(),
            _ => status.canonical_reason().unwrap_or_default().to_string(),
        };
        let mut headers = body::collect_headers(parsed.headers)?;

        if status.is_informational() && status != StatusCode::SWITCHING_PROTOCOLS {
            tracing::trace!(status = %status, "Skipping interim response");
            continue;
        }

        let declared = body::declared_framing(&mut headers)?;
        let framing = if has_no_body(method, status) {
            Framing::Empty
        } else {
            declared.unwrap_or(Framing::CloseDelimited)
        };

        return Ok(Response {
            version,
            status,
            reason,
            headers,
            body: Bytes::new(),
            framing,
        });
    }
}

/// Buffer the body of a response returned by `read_response_head`.
pub async fn read_response_body<R>(
    reader: &mut R,
    response: &mut Response,
    limits: &LimitsConfig,
) -> Result<(), HttpError>
where
    R: AsyncBufRead + Unpin,
{
    response.body = body::read_body(reader, response.framing, limits).await?;
    if response.framing == Framing::CloseDelimited {
        response
            .headers
            .insert(CONTENT_LENGTH, HeaderValue::from(response.body.len()));
    }
    Ok(())
}
