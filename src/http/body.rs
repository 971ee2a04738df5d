//! Message framing shared by requests and responses.
//!
//! # Responsibilities
//! - Read a message head (start line + headers) up to the blank line
//! - Decide how the body is delimited (length, chunked, connection close)
//! - Read and decode bodies, write them back out in the same framing
//! - Relay length-framed bodies straight through without buffering them

use axum::http::header::{CONNECTION, CONTENT_LENGTH, TRANSFER_ENCODING};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Version};
use bytes::Bytes;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::LimitsConfig;
use crate::http::HttpError;

/// Upper bound on a single chunk-size or trailer line.
const MAX_CHUNK_LINE: u64 = 4096;

/// How a message body is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// No body at all (HEAD, 204, 304, 1xx, or a request without length).
    Empty,
    /// Exactly this many bytes.
    Length(u64),
    /// `Transfer-Encoding: chunked`.
    Chunked,
    /// Body runs until the peer closes. Only valid for responses.
    CloseDelimited,
}

/// Read one message head, including the terminating blank line.
///
/// Returns `Ok(None)` if the stream ends before any byte of a new head.
/// Blank lines ahead of the start line are skipped.
pub(crate) async fn read_head<R>(
    reader: &mut R,
    limits: &LimitsConfig,
) -> Result<Option<Vec<u8>>, HttpError>
where
    R: AsyncBufRead + Unpin,
{
    let max = limits.max_head_bytes;
    let mut head = Vec::with_capacity(512);

    loop {
        let line_start = head.len();
        let remaining = (max + 1).saturating_sub(line_start) as u64;
        if remaining == 0 {
            return Err(HttpError::HeadTooLarge(max));
        }

        let n = (&mut *reader).take(remaining).read_until(b'\n', &mut head).await?;
        if n == 0 {
            return if head.is_empty() {
                Ok(None)
            } else {
                Err(HttpError::UnexpectedEof)
            };
        }
        if !head.ends_with(b"\n") {
            return if head.len() > max {
                Err(HttpError::HeadTooLarge(max))
            } else {
                Err(HttpError::UnexpectedEof)
            };
        }

        let line = &head[line_start..];
        if line == b"\r\n" || line == b"\n" {
            if line_start == 0 {
                head.clear();
                continue;
            }
            return Ok(Some(head));
        }
    }
}

/// Convert parsed httparse headers into a `HeaderMap`, keeping repeats.
pub(crate) fn collect_headers(raw: &[httparse::Header<'_>]) -> Result<HeaderMap, HttpError> {
    let mut headers = HeaderMap::with_capacity(raw.len());
    for header in raw {
        let name = HeaderName::from_bytes(header.name.as_bytes())
            .map_err(|_| HttpError::InvalidHeader(header.name.to_string()))?;
        let value = HeaderValue::from_bytes(header.value)
            .map_err(|_| HttpError::InvalidHeader(header.name.to_string()))?;
        headers.append(name, value);
    }
    Ok(headers)
}

pub(crate) fn parse_version(minor: Option<u8>) -> Result<Version, HttpError> {
    match minor {
        Some(0) => Ok(Version::HTTP_10),
        Some(1) => Ok(Version::HTTP_11),
        _ => Err(HttpError::UnsupportedVersion),
    }
}

pub(crate) fn version_str(version: Version) -> &'static str {
    if version == Version::HTTP_10 {
        "HTTP/1.0"
    } else {
        "HTTP/1.1"
    }
}

/// Whether a comma-separated header contains `token` (case-insensitive).
pub(crate) fn has_token(headers: &HeaderMap, name: &HeaderName, token: &str) -> bool {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|t| t.trim().eq_ignore_ascii_case(token))
}

/// Persistent-connection rules of RFC 9112 §9.3.
pub(crate) fn wants_close(version: Version, headers: &HeaderMap) -> bool {
    if has_token(headers, &CONNECTION, "close") {
        return true;
    }
    version == Version::HTTP_10 && !has_token(headers, &CONNECTION, "keep-alive")
}

/// Framing from `Transfer-Encoding` / `Content-Length`, if either is present.
///
/// When both are present the length is dropped from `headers`; chunked wins.
pub(crate) fn declared_framing(headers: &mut HeaderMap) -> Result<Option<Framing>, HttpError> {
    if headers.contains_key(TRANSFER_ENCODING) {
        let last = headers
            .get_all(TRANSFER_ENCODING)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .last()
            .map(str::to_ascii_lowercase);
        if last.as_deref() != Some("chunked") {
            return Err(HttpError::UnsupportedTransferCoding);
        }
        headers.remove(CONTENT_LENGTH);
        return Ok(Some(Framing::Chunked));
    }

    let mut length: Option<u64> = None;
    for value in headers.get_all(CONTENT_LENGTH) {
        let value = value.to_str().map_err(|_| HttpError::InvalidContentLength)?;
        for part in value.split(',') {
            let n: u64 = part
                .trim()
                .parse()
                .map_err(|_| HttpError::InvalidContentLength)?;
            match length {
                Some(prev) if prev != n => return Err(HttpError::InvalidContentLength),
                _ => length = Some(n),
            }
        }
    }
    Ok(length.map(Framing::Length))
}

fn map_eof(err: std::io::Error) -> HttpError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        HttpError::UnexpectedEof
    } else {
        HttpError::Io(err)
    }
}

/// Read a body according to `framing`, returning the decoded bytes.
pub(crate) async fn read_body<R>(
    reader: &mut R,
    framing: Framing,
    limits: &LimitsConfig,
) -> Result<Bytes, HttpError>
where
    R: AsyncBufRead + Unpin,
{
    let max = limits.max_body_bytes;
    match framing {
        Framing::Empty => Ok(Bytes::new()),
        Framing::Length(len) => {
            if len > max as u64 {
                return Err(HttpError::BodyTooLarge(max));
            }
            let mut body = vec![0u8; len as usize];
            reader.read_exact(&mut body).await.map_err(map_eof)?;
            Ok(Bytes::from(body))
        }
        Framing::Chunked => read_chunked(reader, max).await,
        Framing::CloseDelimited => {
            let mut body = Vec::new();
            (&mut *reader)
                .take(max as u64 + 1)
                .read_to_end(&mut body)
                .await?;
            if body.len() > max {
                return Err(HttpError::BodyTooLarge(max));
            }
            Ok(Bytes::from(body))
        }
    }
}

async fn read_chunk_line<R>(reader: &mut R, line: &mut Vec<u8>) -> Result<(), HttpError>
where
    R: AsyncBufRead + Unpin,
{
    line.clear();
    let n = (&mut *reader).take(MAX_CHUNK_LINE).read_until(b'\n', line).await?;
    if n == 0 {
        return Err(HttpError::UnexpectedEof);
    }
    if !line.ends_with(b"\n") {
        return Err(HttpError::InvalidChunk);
    }
    Ok(())
}

async fn read_chunked<R>(reader: &mut R, max: usize) -> Result<Bytes, HttpError>
where
    R: AsyncBufRead + Unpin,
{
    let mut body = Vec::new();
    let mut line = Vec::with_capacity(32);

    loop {
        read_chunk_line(reader, &mut line).await?;
        let text = std::str::from_utf8(&line).map_err(|_| HttpError::InvalidChunk)?;
        let size_text = text.split(';').next().unwrap_or_default().trim();
        let size = u64::from_str_radix(size_text, 16).map_err(|_| HttpError::InvalidChunk)?;

        if size == 0 {
            // Trailer section; fields are dropped.
            loop {
                read_chunk_line(reader, &mut line).await?;
                if line == b"\r\n" || line == b"\n" {
                    return Ok(Bytes::from(body));
                }
            }
        }

        if body.len() as u64 + size > max as u64 {
            return Err(HttpError::BodyTooLarge(max));
        }
        let start = body.len();
        body.resize(start + size as usize, 0);
        reader.read_exact(&mut body[start..]).await.map_err(map_eof)?;

        let mut crlf = [0u8; 2];
        reader.read_exact(&mut crlf).await.map_err(map_eof)?;
        if &crlf != b"\r\n" {
            return Err(HttpError::InvalidChunk);
        }
    }
}

/// Which side failed while relaying a body.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("failed to read body from source: {0}")]
    Source(#[source] HttpError),

    #[error("failed to write body to sink: {0}")]
    Sink(#[source] std::io::Error),
}

/// Copy exactly `len` body bytes from `reader` to `writer`, then flush.
///
/// Memory use is bounded by the reader's buffer, so `max_body_bytes` does not
/// apply. End-of-stream before `len` bytes is `HttpError::UnexpectedEof`.
pub(crate) async fn relay_length<R, W>(
    reader: &mut R,
    writer: &mut W,
    len: u64,
) -> Result<(), RelayError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut remaining = len;
    while remaining > 0 {
        let chunk = reader
            .fill_buf()
            .await
            .map_err(|e| RelayError::Source(HttpError::Io(e)))?;
        if chunk.is_empty() {
            return Err(RelayError::Source(HttpError::UnexpectedEof));
        }
        let n = chunk
            .len()
            .min(usize::try_from(remaining).unwrap_or(usize::MAX));
        writer.write_all(&chunk[..n]).await.map_err(RelayError::Sink)?;
        reader.consume(n);
        remaining -= n as u64;
    }
    writer.flush().await.map_err(RelayError::Sink)
}

/// Append `name: value` lines for every header.
pub(crate) fn encode_headers(buf: &mut Vec<u8>, headers: &HeaderMap) {
    for (name, value) in headers {
        buf.extend_from_slice(name.as_str().as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    buf.extend_from_slice(b"\r\n");
}

/// Write an encoded head followed by the body in `framing`, then flush.
pub(crate) async fn write_message<W>(
    writer: &mut W,
    head: &[u8],
    framing: Framing,
    body: &[u8],
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(head).await?;
    match framing {
        Framing::Empty => {}
        Framing::Length(_) | Framing::CloseDelimited => writer.write_all(body).await?,
        Framing::Chunked => {
            if !body.is_empty() {
                writer
                    .write_all(format!("{:x}\r\n", body.len()).as_bytes())
                    .await?;
                writer.write_all(body).await?;
                writer.write_all(b"\r\n").await?;
            }
            writer.write_all(b"0\r\n\r\n").await?;
        }
    }
    writer.flush().await
}
