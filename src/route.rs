//! Route descriptors.
//!
//! A [`Route`] binds one handler to one or more `(pattern, methods)` pairs.
//! It is a plain builder; patterns are parsed and checked for ambiguity when
//! the route is added to a [`Blueprint`](crate::Blueprint).

use std::sync::Arc;

use http::Method;

use crate::handler::{BoxedHandler, BoxedPostHook, BoxedPreHook, Handler, PostHook, PreHook};
use crate::pattern::Pattern;

/// A handler and the patterns it answers.
///
/// ```rust
/// use bough::{Method, RequestContext, Response, Route};
///
/// async fn show(_ctx: RequestContext) -> Response { Response::text("") }
///
/// // GET and HEAD on both patterns, exact matching, custom endpoint name.
/// let route = Route::get("/users/<id:int>", show)
///     .path("/people/<id:int>", [Method::GET, Method::HEAD])
///     .endpoint("users.show")
///     .exact();
/// ```
pub struct Route {
    pub(crate) bindings: Vec<(String, Vec<Method>)>,
    pub(crate) handler: BoxedHandler,
    pub(crate) handler_name: &'static str,
    pub(crate) endpoint: Option<String>,
    pub(crate) exact: bool,
    pub(crate) convert: bool,
    pub(crate) run_hooks: bool,
    pub(crate) pre_hooks: Vec<BoxedPreHook>,
    pub(crate) post_hooks: Vec<BoxedPostHook>,
}

impl Route {
    /// A route answering `methods` on `pattern`.
    pub fn new(pattern: &str, methods: impl IntoIterator<Item = Method>, handler: impl Handler) -> Self {
        let handler_name = handler.name();
        Self {
            bindings: vec![(pattern.to_owned(), dedup(methods))],
            handler: handler.into_boxed_handler(),
            handler_name,
            endpoint: None,
            exact: false,
            convert: true,
            run_hooks: true,
            pre_hooks: Vec::new(),
            post_hooks: Vec::new(),
        }
    }

    /// `GET` and `HEAD`, the default method set.
    pub fn get(pattern: &str, handler: impl Handler) -> Self {
        Self::new(pattern, [Method::GET, Method::HEAD], handler)
    }

    pub fn post(pattern: &str, handler: impl Handler) -> Self {
        Self::new(pattern, [Method::POST], handler)
    }

    pub fn put(pattern: &str, handler: impl Handler) -> Self {
        Self::new(pattern, [Method::PUT], handler)
    }

    pub fn patch(pattern: &str, handler: impl Handler) -> Self {
        Self::new(pattern, [Method::PATCH], handler)
    }

    pub fn delete(pattern: &str, handler: impl Handler) -> Self {
        Self::new(pattern, [Method::DELETE], handler)
    }

    /// Adds another pattern with its own method set.
    pub fn path(mut self, pattern: &str, methods: impl IntoIterator<Item = Method>) -> Self {
        self.bindings.push((pattern.to_owned(), dedup(methods)));
        self
    }

    /// Overrides the default `<blueprint>.<handler>` endpoint name.
    pub fn endpoint(mut self, name: &str) -> Self {
        self.endpoint = Some(name.to_owned());
        self
    }

    /// Requires the whole remaining path to match. Without this, a pattern
    /// matches any path that starts with its segments.
    pub fn exact(mut self) -> Self {
        self.exact = true;
        self
    }

    /// Turns automatic conversion of typed parameters on or off (default on).
    /// When off, typed parameters accept any segment and stay strings.
    pub fn convert_args(mut self, convert: bool) -> Self {
        self.convert = convert;
        self
    }

    /// Skips every pre and post hook, blueprint and route-local.
    pub fn skip_hooks(mut self) -> Self {
        self.run_hooks = false;
        self
    }

    /// A pre hook that only runs for this route, after the blueprint chain.
    pub fn before(mut self, hook: impl PreHook) -> Self {
        self.pre_hooks.push(hook.into_boxed_pre_hook());
        self
    }

    /// A post hook that only runs for this route, before the blueprint chain.
    pub fn after(mut self, hook: impl PostHook) -> Self {
        self.post_hooks.push(hook.into_boxed_post_hook());
        self
    }
}

fn dedup(methods: impl IntoIterator<Item = Method>) -> Vec<Method> {
    let mut out: Vec<Method> = Vec::new();
    for m in methods {
        if !out.contains(&m) {
            out.push(m);
        }
    }
    out
}

// ── Registered form ───────────────────────────────────────────────────────────

/// One `(pattern, methods)` pair of a registered route.
#[derive(Clone)]
pub(crate) struct Binding {
    pub(crate) pattern: Pattern,
    pub(crate) methods: Vec<Method>,
    /// Position in the tree's registration order, set when the tree is
    /// built; lower wins ties.
    pub(crate) ordinal: u64,
}

/// A route after it was accepted by a blueprint.
#[derive(Clone)]
pub(crate) struct RegisteredRoute {
    pub(crate) bindings: Vec<Binding>,
    pub(crate) endpoint: Arc<str>,
    pub(crate) handler: BoxedHandler,
    pub(crate) exact: bool,
    pub(crate) convert: bool,
    pub(crate) run_hooks: bool,
    pub(crate) pre_hooks: Arc<[BoxedPreHook]>,
    pub(crate) post_hooks: Arc<[BoxedPostHook]>,
}
