//! Request parsing and serialization.
//!
//! # Responsibilities
//! - Parse one HTTP/1.x request off a buffered client stream
//! - Extract the URL path used as the stats key
//! - Serialize the request toward the backend in its original framing
//!
//! # Design Decisions
//! - Clean end-of-stream between requests is `Ok(None)`, not an error
//! - The request target is forwarded verbatim; only the path is interpreted

use axum::http::{HeaderMap, Method, Uri, Version};
use bytes::Bytes;
use tokio::io::{AsyncBufRead, AsyncWrite};

use crate::config::LimitsConfig;
use crate::http::body::{self, Framing};
use crate::http::HttpError;

/// A fully-read HTTP/1.x request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Request target exactly as received (origin-form or absolute-form).
    pub target: String,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
    framing: Framing,
}

impl Request {
    /// URL path without the query string. This is the stats key.
    pub fn path(&self) -> &str {
        match self.uri.path() {
            "" => "/",
            path => path,
        }
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Whether the client asked to close the connection after this exchange.
    pub fn wants_close(&self) -> bool {
        body::wants_close(self.version, &self.headers)
    }

    /// Serialize onto `writer` and flush.
    pub async fn write_to<W>(&self, writer: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut head = Vec::with_capacity(256);
        head.extend_from_slice(self.method.as_str().as_bytes());
        head.push(b' ');
        head.extend_from_slice(self.target.as_bytes());
        head.push(b' ');
        head.extend_from_slice(body::version_str(self.version).as_bytes());
        head.extend_from_slice(b"\r\n");
        body::encode_headers(&mut head, &self.headers);

        body::write_message(writer, &head, self.framing, &self.body).await
    }
}

/// Read one request. Returns `Ok(None)` when the client closed cleanly
/// before starting a new request.
pub async fn read_request<R>(
    reader: &mut R,
    limits: &LimitsConfig,
) -> Result<Option<Request>, HttpError>
where
    R: AsyncBufRead + Unpin,
{
    let Some(head) = body::read_head(reader, limits).await? else {
        return Ok(None);
    };

    let mut raw_headers = vec![httparse::EMPTY_HEADER; limits.max_headers];
    let mut parsed = httparse::Request::new(&mut raw_headers);
    if parsed.parse(&head)?.is_partial() {
        return Err(HttpError::IncompleteHead);
    }

    let method = parsed
        .method
        .ok_or(HttpError::IncompleteHead)
        .and_then(|m| Method::from_bytes(m.as_bytes()).map_err(|_| HttpError::InvalidMethod))?;
    let target = parsed.path.ok_or(HttpError::IncompleteHead)?.to_string();
    let uri: Uri = target
        .parse()
        .map_err(|_| HttpError::InvalidTarget(target.clone()))?;
    let version = body::parse_version(parsed.version)?;
    let mut headers = body::collect_headers(parsed.headers)?;

    let framing = body::declared_framing(&mut headers)?.unwrap_or(Framing::Empty);
    let body = body::read_body(reader, framing, limits).await?;

    Ok(Some(Request {
        method,
        target,
        uri,
        version,
        headers,
        body,
        framing,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    async fn parse(raw: &[u8]) -> Result<Option<Request>, HttpError> {
        let mut reader = BufReader::new(raw);
        read_request(&mut reader, &LimitsConfig::default()).await
    }

    #[tokio::test]
    async fn parses_a_simple_get() {
        let req = parse(b"GET /foo?x=1 HTTP/1.1\r\nHost: example\r\n\r\n")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(req.method, Method::GET);
        assert_eq!(req.target, "/foo?x=1");
        assert_eq!(req.path(), "/foo");
        assert_eq!(req.version, Version::HTTP_11);
        assert_eq!(req.headers["host"], "example");
        assert!(req.body.is_empty());
        assert!(!req.wants_close());
    }

    #[tokio::test]
    async fn absolute_form_targets_key_by_path() {
        let req = parse(b"GET http://example.com/bar/baz?q HTTP/1.1\r\n\r\n")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(req.path(), "/bar/baz");
    }

    #[tokio::test]
    async fn reads_content_length_body() {
        let req = parse(b"POST /up HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&req.body[..], b"hello");
        assert_eq!(req.framing(), Framing::Length(5));
    }

    #[tokio::test]
    async fn clean_eof_is_none() {
        assert!(parse(b"").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn garbage_is_a_parse_error() {
        let err = parse(b"\x01\x02 not http\r\n\r\n").await.unwrap_err();
        assert!(matches!(err, HttpError::Parse(_) | HttpError::InvalidMethod));
        assert!(!err.is_disconnect());
    }

    #[tokio::test]
    async fn too_many_headers_is_rejected() {
        let mut raw = String::from("GET / HTTP/1.1\r\n");
        for i in 0..100 {
            raw.push_str(&format!("X-H{i}: v\r\n"));
        }
        raw.push_str("\r\n");
        let err = parse(raw.as_bytes()).await.unwrap_err();
        assert!(matches!(err, HttpError::Parse(httparse::Error::TooManyHeaders)));
    }

    #[tokio::test]
    async fn reads_sequential_requests_from_one_stream() {
        let raw = b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n";
        let mut reader = BufReader::new(&raw[..]);
        let limits = LimitsConfig::default();
        let a = read_request(&mut reader, &limits).await.unwrap().unwrap();
        let b = read_request(&mut reader, &limits).await.unwrap().unwrap();
        assert_eq!((a.path(), b.path()), ("/a", "/b"));
        assert!(read_request(&mut reader, &limits).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn chunked_request_is_rechunked_on_write() {
        let req = parse(b"POST /c HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n0\r\n\r\n")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&req.body[..], b"abc");

        let mut out = Vec::new();
        req.write_to(&mut out).await.unwrap();
        assert_eq!(
            out,
            b"POST /c HTTP/1.1\r\ntransfer-encoding: chunked\r\n\r\n3\r\nabc\r\n0\r\n\r\n"
        );
    }

    #[tokio::test]
    async fn http10_without_keep_alive_wants_close() {
        let req = parse(b"GET / HTTP/1.0\r\n\r\n").await.unwrap().unwrap();
        assert!(req.wants_close());
    }
}
