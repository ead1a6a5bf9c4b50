//! Incoming HTTP request type.

use std::net::SocketAddr;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};

/// An incoming HTTP request, already parsed by the transport.
///
/// The body is fully buffered before routing.
#[derive(Clone, Debug)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Option<String>,
    pub(crate) host: Option<String>,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) remote_addr: Option<SocketAddr>,
}

impl Request {
    /// Starts an in-memory request, mostly useful with
    /// [`TestClient`](crate::testing::TestClient).
    ///
    /// ```rust
    /// use bough::{Method, Request};
    ///
    /// let req = Request::builder(Method::POST, "/users?notify=1")
    ///     .host("api.example.com")
    ///     .header("content-type", "application/json")
    ///     .body(r#"{"name":"alice"}"#)
    ///     .build();
    /// assert_eq!(req.path(), "/users");
    /// assert_eq!(req.query(), Some("notify=1"));
    /// ```
    pub fn builder(method: Method, uri: &str) -> RequestBuilder {
        let (path, query) = match uri.split_once('?') {
            Some((p, q)) => (p.to_owned(), Some(q.to_owned())),
            None => (uri.to_owned(), None),
        };
        RequestBuilder {
            inner: Request {
                method,
                path,
                query,
                host: None,
                headers: HeaderMap::new(),
                body: Bytes::new(),
                remote_addr: None,
            },
        }
    }

    /// Builds a request from what hyper parsed off the wire.
    pub(crate) fn from_parts(parts: http::request::Parts, body: Bytes, remote_addr: SocketAddr) -> Self {
        Self {
            method: parts.method,
            path: parts.uri.path().to_owned(),
            query: parts.uri.query().map(str::to_owned),
            // Absolute-form and HTTP/2 requests carry the host in the URI.
            host: parts.uri.authority().map(|a| a.as_str().to_owned()),
            headers: parts.headers,
            body,
            remote_addr: Some(remote_addr),
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn query(&self) -> Option<&str> { self.query.as_deref() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// The host the request was addressed to: the URI authority, else the
    /// `Host` header.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref().or_else(|| self.header("host"))
    }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn set_body(&mut self, body: impl Into<Bytes>) { self.body = body.into(); }
}

/// Builder returned by [`Request::builder`].
pub struct RequestBuilder {
    inner: Request,
}

impl RequestBuilder {
    pub fn host(mut self, host: &str) -> Self {
        self.inner.host = Some(host.to_owned());
        self
    }

    /// Adds a header. Invalid names or values are ignored.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.inner.headers.append(name, value);
        }
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.inner.body = body.into();
        self
    }

    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.inner.remote_addr = Some(addr);
        self
    }

    pub fn build(self) -> Request {
        self.inner
    }
}
