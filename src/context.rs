//! Per-request context handed to hooks, handlers and error handlers.

use std::fmt;
use std::sync::Arc;

use http::Extensions;

use crate::error::UrlBuildError;
use crate::pattern::{Params, Value};
use crate::request::Request;
use crate::tree::RoutingTree;

/// Everything a hook or handler knows about the request being served.
///
/// Cloning is cheap: the request itself sits behind an `Arc` and is only
/// copied when a hook asks for [`request_mut`](Self::request_mut).
///
/// Hooks pass typed data down the chain through the extensions:
///
/// ```rust
/// use bough::{HandlerError, RequestContext};
///
/// #[derive(Clone)]
/// struct UserId(i64);
///
/// async fn authenticate(mut ctx: RequestContext) -> Result<RequestContext, HandlerError> {
///     ctx.extensions_mut().insert(UserId(7));
///     Ok(ctx)
/// }
/// ```
#[derive(Clone)]
pub struct RequestContext {
    request: Arc<Request>,
    params: Params,
    endpoint: Option<Arc<str>>,
    blueprint: Arc<str>,
    tree: Arc<RoutingTree>,
    extensions: Extensions,
}

impl RequestContext {
    pub(crate) fn new(request: Request, tree: Arc<RoutingTree>, blueprint: Arc<str>) -> Self {
        Self {
            request: Arc::new(request),
            params: Params::default(),
            endpoint: None,
            blueprint,
            tree,
            extensions: Extensions::new(),
        }
    }

    pub(crate) fn matched(&mut self, params: Params, endpoint: Arc<str>, blueprint: Arc<str>) {
        self.params = params;
        self.endpoint = Some(endpoint);
        self.blueprint = blueprint;
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Mutable access to the request, copying it first if another clone of
    /// this context still shares it.
    pub fn request_mut(&mut self) -> &mut Request {
        Arc::make_mut(&mut self.request)
    }

    /// A converted path parameter.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// The matched endpoint, `None` while handling a routing failure.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Name of the blueprint that matched, or that anchors error handling.
    pub fn blueprint(&self) -> &str {
        &self.blueprint
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Builds the path of `endpoint`, see [`RoutingTree::url_for`].
    pub fn url_for(&self, endpoint: &str, values: &[(&str, &str)]) -> Result<String, UrlBuildError> {
        self.tree.url_for(endpoint, None, values)
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", self.request.method())
            .field("path", &self.request.path())
            .field("params", &self.params)
            .field("endpoint", &self.endpoint)
            .field("blueprint", &self.blueprint)
            .finish_non_exhaustive()
    }
}
