//! The intercepted request handed to matchers.

use std::io::{self, Cursor, Read};

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::{HeaderMap, Method, Request, Uri};
use tracing::debug;

use crate::cookie::{request_cookies, Cookie};

#[derive(Debug, Clone)]
enum BodyState {
    Collected(Bytes),
    /// Collection was interrupted; every read reports this message.
    Failed(String),
}

/// An outbound request captured by the interception layer.
///
/// The body is collected once; every call to [`InterceptedRequest::body`]
/// returns a fresh reader, so each matcher in a composition sees an
/// unconsumed stream.
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: BodyState,
}

impl InterceptedRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            method,
            uri,
            headers,
            body: BodyState::Collected(body.into()),
        }
    }

    /// A request whose body cannot be read.
    pub fn with_unreadable_body(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            method,
            uri,
            headers,
            body: BodyState::Failed(reason.into()),
        }
    }

    /// Capture a request, collecting its body.
    ///
    /// A body that fails mid-stream is kept as a read failure rather than
    /// returned, so matchers see it as a non-match.
    pub async fn from_http<B>(req: Request<B>) -> Self
    where
        B: hyper::body::Body,
        B::Error: std::fmt::Display,
    {
        let (parts, body) = req.into_parts();
        let body = match body.collect().await {
            Ok(collected) => BodyState::Collected(collected.to_bytes()),
            Err(e) => {
                debug!("Failed to collect intercepted request body: {}", e);
                BodyState::Failed(e.to_string())
            }
        };
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// A fresh reader over the request body.
    pub fn body(&self) -> BodyReader {
        BodyReader {
            inner: match &self.body {
                BodyState::Collected(bytes) => Ok(Cursor::new(bytes.clone())),
                BodyState::Failed(reason) => Err(reason.clone()),
            },
        }
    }

    /// Cookies sent in the request's `Cookie` headers.
    pub fn cookies(&self) -> Vec<Cookie> {
        request_cookies(&self.headers)
    }
}

impl<B: Into<Bytes>> From<Request<B>> for InterceptedRequest {
    fn from(req: Request<B>) -> Self {
        let (parts, body) = req.into_parts();
        Self::new(parts.method, parts.uri, parts.headers, body)
    }
}

/// Single-use reader over an intercepted body.
#[derive(Debug)]
pub struct BodyReader {
    inner: Result<Cursor<Bytes>, String>,
}

impl BodyReader {
    /// Read the whole remaining body.
    pub fn read_all(mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl Read for BodyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            Ok(cursor) => cursor.read(buf),
            Err(reason) => Err(io::Error::other(reason.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::{Full, StreamBody};
    use hyper::body::Frame;
    use hyper::header::{HeaderValue, COOKIE};

    fn get(body: &'static str) -> InterceptedRequest {
        Request::builder()
            .method(Method::POST)
            .uri("http://example.com/api")
            .body(Bytes::from_static(body.as_bytes()))
            .unwrap()
            .into()
    }

    #[test]
    fn test_body_is_readable_repeatedly() {
        let req = get("42 test");
        assert_eq!(req.body().read_all().unwrap(), b"42 test");
        assert_eq!(req.body().read_all().unwrap(), b"42 test");
    }

    #[test]
    fn test_unreadable_body() {
        let req = InterceptedRequest::with_unreadable_body(
            Method::GET,
            Uri::from_static("/"),
            HeaderMap::new(),
            "connection reset",
        );
        let err = req.body().read_all().unwrap_err();
        assert_eq!(err.to_string(), "connection reset");
    }

    #[test]
    fn test_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("first=1; second=2"));
        let req = InterceptedRequest::new(Method::GET, Uri::from_static("/"), headers, "");

        let names: Vec<_> = req.cookies().into_iter().map(|c| c.name).collect();
        assert_eq!(names, ["first", "second"]);
    }

    #[tokio::test]
    async fn test_from_http_collects_body() {
        let req = Request::builder()
            .method(Method::PUT)
            .uri("/items/1")
            .header("x-custom", "YES")
            .body(Full::new(Bytes::from_static(b"{\"id\":1}")))
            .unwrap();

        let req = InterceptedRequest::from_http(req).await;
        assert_eq!(req.method(), Method::PUT);
        assert_eq!(req.uri().path(), "/items/1");
        assert_eq!(req.headers()["x-custom"], "YES");
        assert_eq!(req.body().read_all().unwrap(), b"{\"id\":1}");
    }

    #[tokio::test]
    async fn test_from_http_keeps_collection_failure() {
        let chunks: Vec<Result<Frame<Bytes>, io::Error>> = vec![
            Ok(Frame::data(Bytes::from_static(b"partial"))),
            Err(io::Error::other("stream broke")),
        ];
        let stream = futures::stream::iter(chunks);
        let req = Request::builder()
            .uri("/")
            .body(StreamBody::new(stream))
            .unwrap();

        let req = InterceptedRequest::from_http(req).await;
        let err = req.body().read_all().unwrap_err();
        assert!(err.to_string().contains("stream broke"));
    }
}
