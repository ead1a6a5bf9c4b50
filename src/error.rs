//! Error types.
//!
//! Three families live here:
//!
//! - [`ConfigurationError`]: the tree was assembled wrong. Raised while
//!   registering routes and blueprints, fatal at startup.
//! - [`HttpError`] and [`HandlerError`]: what hooks and handlers fail with at
//!   request time. These never reach the transport; the pipeline turns them
//!   into responses through the error-handler chain.
//! - [`Error`]: infrastructure failures (binding a port, loading settings).

use std::fmt;

use http::{Method, StatusCode};

use crate::settings::SettingsError;

/// A type-erased error returned by user code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by bough's fallible infrastructure operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("invalid socket address `{0}`")]
    InvalidAddress(String),
}

// ── Registration ──────────────────────────────────────────────────────────────

/// The routing tree could not be assembled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("blueprint `{parent}` already has a child named `{name}`")]
    DuplicateBlueprint { parent: String, name: String },

    #[error("invalid blueprint name `{name}`: names must be non-empty and must not contain `.`")]
    InvalidName { name: String },

    #[error("invalid url prefix `{prefix}` on blueprint `{blueprint}`: {reason}")]
    InvalidPrefix {
        blueprint: String,
        prefix: String,
        reason: &'static str,
    },

    #[error("invalid host `{host}` on blueprint `{blueprint}`")]
    InvalidHost { blueprint: String, host: String },

    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("route pattern `{pattern}` was registered without any method")]
    EmptyMethods { pattern: String },

    #[error("route `{method} {pattern}` on blueprint `{blueprint}` is ambiguous: {detail}")]
    AmbiguousRoute {
        blueprint: String,
        pattern: String,
        method: Method,
        detail: String,
    },

    #[error("endpoint `{endpoint}` is registered more than once")]
    DuplicateEndpoint { endpoint: String },

    #[error("no blueprint at `{path}`")]
    UnknownBlueprint { path: String },
}

// ── Request time ──────────────────────────────────────────────────────────────

/// A recognised HTTP status signal.
///
/// Return it (or `?` it) from a hook or handler to have the request answered
/// by the error handler registered for `status`.
///
/// ```rust
/// use bough::{HandlerError, HttpError, RequestContext, Response};
///
/// async fn show(ctx: RequestContext) -> Result<Response, HandlerError> {
///     let Some(id) = ctx.param("id") else {
///         return Err(HttpError::bad_request().into());
///     };
///     Ok(Response::text(format!("user {id}")))
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    status: StatusCode,
    message: Option<String>,
    allowed: Vec<Method>,
}

impl HttpError {
    pub fn new(status: StatusCode) -> Self {
        Self { status, message: None, allowed: Vec::new() }
    }

    pub fn bad_request() -> Self { Self::new(StatusCode::BAD_REQUEST) }
    pub fn forbidden() -> Self { Self::new(StatusCode::FORBIDDEN) }
    pub fn not_found() -> Self { Self::new(StatusCode::NOT_FOUND) }
    pub fn internal() -> Self { Self::new(StatusCode::INTERNAL_SERVER_ERROR) }

    /// `405 Method Not Allowed`, remembering which methods would have matched.
    pub fn method_not_allowed(allowed: Vec<Method>) -> Self {
        Self { status: StatusCode::METHOD_NOT_ALLOWED, message: None, allowed }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn code(&self) -> u16 { self.status.as_u16() }
    pub fn message(&self) -> Option<&str> { self.message.as_deref() }
    pub fn allowed(&self) -> &[Method] { &self.allowed }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

impl std::error::Error for HttpError {}

impl From<StatusCode> for HttpError {
    fn from(status: StatusCode) -> Self {
        Self::new(status)
    }
}

/// Failure of a hook, handler or error handler.
///
/// Any `std::error::Error` converts into it, so `?` works on foreign errors.
/// An [`HttpError`] keeps its status; everything else is answered with
/// `500 Internal Server Error`.
///
/// `HandlerError` deliberately does not implement `std::error::Error`
/// itself, otherwise the blanket `From` impl below would overlap with
/// `From<T> for T`.
pub enum HandlerError {
    Http(HttpError),
    Internal(BoxError),
}

impl HandlerError {
    /// An internal failure carrying only a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Internal(message.into().into())
    }

    /// The status this failure is answered with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Http(e) => e.status(),
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Collapses the failure into the signal error handlers receive.
    pub(crate) fn into_http(self) -> HttpError {
        match self {
            Self::Http(e) => e,
            Self::Internal(_) => HttpError::internal(),
        }
    }
}

impl<E> From<E> for HandlerError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(e: E) -> Self {
        let boxed: BoxError = Box::new(e);
        match boxed.downcast::<HttpError>() {
            Ok(http) => Self::Http(*http),
            Err(other) => Self::Internal(other),
        }
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => f.debug_tuple("Http").field(e).finish(),
            Self::Internal(e) => f.debug_tuple("Internal").field(e).finish(),
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => e.fmt(f),
            Self::Internal(e) => write!(f, "internal error: {e}"),
        }
    }
}

/// A URL could not be built for an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlBuildError {
    #[error("unknown endpoint `{0}`")]
    UnknownEndpoint(String),

    #[error("endpoint `{endpoint}` has no pattern accepting {method}")]
    NoMatchingPattern { endpoint: String, method: Method },

    #[error("missing value for parameter `{0}`")]
    MissingParameter(String),

    #[error("value `{value}` is not valid for parameter `{name}`")]
    InvalidParameter { name: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_errors_survive_question_mark() {
        fn fails() -> Result<(), HandlerError> {
            let denied: Result<(), HttpError> = Err(HttpError::forbidden());
            denied?;
            Ok(())
        }

        match fails() {
            Err(HandlerError::Http(e)) => assert_eq!(e.code(), 403),
            other => panic!("expected an http error, got {other:?}"),
        }
    }

    #[test]
    fn foreign_errors_become_internal() {
        let err: HandlerError = "x".parse::<i64>().unwrap_err().into();
        assert!(matches!(err, HandlerError::Internal(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.into_http().code(), 500);
    }
}
