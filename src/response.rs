//! Outgoing HTTP response type and the conversion traits handlers rely on.
//!
//! Build a [`Response`] in your handler and return it, or return anything
//! that implements [`HandlerOutput`]: a `String`, a [`StatusCode`], a
//! [`Json`] value, or a `Result` of any of those.

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use serde::Serialize;

use crate::error::HandlerError;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`ResponseBuilder::bytes`].
pub enum ContentType {
    Css,
    Html,
    Json,
    OctetStream,
    Text,
    Xml,
}

impl ContentType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Css         => "text/css",
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
        }
    }
}

// ── Response ──────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// # Shortcuts (200 OK)
///
/// ```rust
/// use bough::{Response, StatusCode};
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::text("hello");
/// Response::html("<h1>hello</h1>");
/// Response::status(StatusCode::NO_CONTENT);
/// ```
///
/// # Builder
///
/// ```rust
/// use bough::{ContentType, Response, StatusCode};
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/users/42")
///     .json(br#"{"id":42}"#.to_vec());
///
/// Response::builder().bytes(ContentType::Xml, b"<ok/>".to_vec());
/// ```
#[derive(Debug)]
pub struct Response {
    pub(crate) body: Bytes,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) status: StatusCode,
}

impl Response {
    /// `200 OK`, `application/json`.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::builder().finish("application/json", body.into())
    }

    /// `200 OK`, `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// `200 OK`, `text/html; charset=utf-8`.
    pub fn html(body: impl Into<String>) -> Self {
        Self::builder().bytes(ContentType::Html, body.into().into_bytes())
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self { body: Bytes::new(), headers: Vec::new(), status: code }
    }

    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Vec::new(), status: StatusCode::OK }
    }

    /// The minimal response sent when nobody handles an error: the status
    /// line repeated as plain text.
    pub(crate) fn for_status(status: StatusCode) -> Self {
        let reason = status.canonical_reason().unwrap_or("");
        Self::builder()
            .status(status)
            .text(format!("{} {reason}", status.as_u16()).trim_end().to_owned())
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }

    /// The body as UTF-8 text, lossily.
    pub fn text_body(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Replaces every header called `name` with one `name: value`.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_owned(), value.into()));
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Converts into the `http` type handed to hyper. Headers that are not
    /// valid HTTP are dropped with a warning.
    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(self.body));
        *res.status_mut() = self.status;
        let headers = res.headers_mut();
        for (name, value) in self.headers {
            match (
                http::HeaderName::from_bytes(name.as_bytes()),
                http::HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => tracing::warn!(header = %name, "dropping invalid response header"),
            }
        }
        res
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`. Terminated by a
/// typed body method.
pub struct ResponseBuilder {
    headers: Vec<(String, String)>,
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Terminate with a JSON body (`application/json`).
    pub fn json(self, body: impl Into<Bytes>) -> Response {
        self.finish("application/json", body.into())
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8`).
    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish("text/plain; charset=utf-8", Bytes::from(body.into()))
    }

    /// Terminate with a typed body.
    pub fn bytes(self, content_type: ContentType, body: impl Into<Bytes>) -> Response {
        self.finish(content_type.as_str(), body.into())
    }

    /// Terminate with no body.
    pub fn no_body(self) -> Response {
        Response { body: Bytes::new(), headers: self.headers, status: self.status }
    }

    fn finish(self, content_type: &str, body: Bytes) -> Response {
        let mut headers = vec![("content-type".to_owned(), content_type.to_owned())];
        headers.extend(self.headers);
        Response { body, headers, status: self.status }
    }
}

// ── Json ──────────────────────────────────────────────────────────────────────

/// Serialises `T` with serde_json into an `application/json` response.
///
/// A serialisation failure is a handler failure and ends up in the 500
/// error handler.
///
/// ```rust
/// use bough::{Json, RequestContext};
///
/// #[derive(serde::Serialize)]
/// struct User { id: i64, name: &'static str }
///
/// async fn show(_ctx: RequestContext) -> Json<User> {
///     Json(User { id: 1, name: "alice" })
/// }
/// ```
pub struct Json<T>(pub T);

impl<T: Serialize> HandlerOutput for Json<T> {
    fn into_outcome(self) -> Result<Response, HandlerError> {
        let bytes = serde_json::to_vec(&self.0)?;
        Ok(Response::json(bytes))
    }
}

// ── Conversions ───────────────────────────────────────────────────────────────

/// Infallible conversion into an HTTP [`Response`].
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a status directly from a handler: `return StatusCode::NO_CONTENT`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

/// `(status, body)` pairs, like `(StatusCode::CREATED, "made")`.
impl<B: Into<String>> IntoResponse for (StatusCode, B) {
    fn into_response(self) -> Response {
        Response::builder().status(self.0).text(self.1)
    }
}

/// What a handler or error handler may return.
///
/// Implemented for every [`IntoResponse`] type in this crate, for [`Json`],
/// and for `Result<T, E>` where `T` is one of those and `E` converts into a
/// [`HandlerError`]. An `Err` moves the request into error handling.
pub trait HandlerOutput {
    fn into_outcome(self) -> Result<Response, HandlerError>;
}

macro_rules! output_via_into_response {
    ($($ty:ty),* $(,)?) => {
        $(
            impl HandlerOutput for $ty {
                fn into_outcome(self) -> Result<Response, HandlerError> {
                    Ok(self.into_response())
                }
            }
        )*
    };
}

output_via_into_response!(Response, &'static str, String, StatusCode);

impl<B: Into<String>> HandlerOutput for (StatusCode, B) {
    fn into_outcome(self) -> Result<Response, HandlerError> {
        Ok(self.into_response())
    }
}

impl<T, E> HandlerOutput for Result<T, E>
where
    T: HandlerOutput,
    E: Into<HandlerError>,
{
    fn into_outcome(self) -> Result<Response, HandlerError> {
        self.map_err(Into::into)?.into_outcome()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_response_names_the_status() {
        let res = Response::for_status(StatusCode::NOT_FOUND);
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(res.text_body(), "404 Not Found");
    }

    #[test]
    fn set_header_replaces_case_insensitively() {
        let mut res = Response::builder().header("X-Thing", "a").no_body();
        res.set_header("x-thing", "b");
        assert_eq!(res.headers().len(), 1);
        assert_eq!(res.header("X-THING"), Some("b"));
    }

    #[test]
    fn json_wrapper_serialises() {
        let res = Json(vec![1, 2, 3]).into_outcome().unwrap();
        assert_eq!(res.body(), b"[1,2,3]");
        assert_eq!(res.header("content-type"), Some("application/json"));
    }

    #[test]
    fn results_propagate_failures() {
        let out: Result<&'static str, HandlerError> = Err(HandlerError::msg("boom"));
        assert!(out.into_outcome().is_err());
    }

    #[test]
    fn invalid_headers_are_dropped_on_conversion() {
        let res = Response::builder().header("bad header", "x").header("ok", "y").no_body();
        let inner = res.into_inner();
        assert_eq!(inner.headers().len(), 1);
        assert_eq!(inner.headers()["ok"], "y");
    }
}
