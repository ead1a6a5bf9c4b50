//! Blueprints: the nodes of the routing tree, in their mutable builder form.
//!
//! A blueprint carries a name, a URL prefix, an optional host, request hooks,
//! error handlers, routes and child blueprints. Children inherit everything
//! but the routes from their ancestors. Build the tree bottom-up at startup
//! and hand the root to [`App::new`](crate::App::new), which freezes it into
//! a [`RoutingTree`](crate::RoutingTree).
//!
//! ```rust
//! use bough::{App, Blueprint, HttpError, RequestContext, Response, Route, StatusCode};
//!
//! async fn show(ctx: RequestContext) -> Response {
//!     Response::text(format!("user {}", ctx.param("id").map(|v| v.to_string()).unwrap_or_default()))
//! }
//!
//! async fn not_found(_ctx: RequestContext, _err: HttpError) -> (StatusCode, &'static str) {
//!     (StatusCode::NOT_FOUND, "no such user")
//! }
//!
//! # fn main() -> Result<(), bough::ConfigurationError> {
//! let mut users = Blueprint::new("users").prefix("/users");
//! users.add_route(Route::get("/<id:int>", show).exact())?;
//! users.error_handler(404, not_found);
//!
//! let mut root = Blueprint::new("app");
//! root.register_child(users)?;
//!
//! let app = App::new(root)?;
//! assert_eq!(app.url_for("users.show", &[("id", "7")]).unwrap(), "/users/7");
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;

use crate::error::ConfigurationError;
use crate::handler::{BoxedErrorHandler, BoxedPostHook, BoxedPreHook, ErrorHandler, PostHook, PreHook};
use crate::pattern::Pattern;
use crate::route::{Binding, RegisteredRoute, Route};

// ── Error handler registry ────────────────────────────────────────────────────

/// The status codes an error handler answers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StatusKey {
    /// Exactly this code.
    Code(u16),
    /// Every code in `start..end`.
    Range(u16, u16),
}

impl StatusKey {
    pub fn contains(self, code: u16) -> bool {
        match self {
            Self::Code(c) => c == code,
            Self::Range(start, end) => (start..end).contains(&code),
        }
    }
}

impl From<u16> for StatusKey {
    fn from(code: u16) -> Self { Self::Code(code) }
}

impl From<StatusCode> for StatusKey {
    fn from(code: StatusCode) -> Self { Self::Code(code.as_u16()) }
}

impl From<Range<u16>> for StatusKey {
    fn from(range: Range<u16>) -> Self { Self::Range(range.start, range.end) }
}

/// Error handlers of one node, oldest first.
#[derive(Clone, Default)]
pub(crate) struct ErrorHandlers(Vec<(StatusKey, BoxedErrorHandler)>);

impl ErrorHandlers {
    /// Registering a key again replaces the old entry and makes it the newest.
    fn insert(&mut self, key: StatusKey, handler: BoxedErrorHandler) {
        self.0.retain(|(k, _)| *k != key);
        self.0.push((key, handler));
    }

    /// The most recently registered handler whose key covers `code`.
    pub(crate) fn find(&self, code: u16) -> Option<&BoxedErrorHandler> {
        self.0.iter().rev().find(|(k, _)| k.contains(code)).map(|(_, h)| h)
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }
}

// ── Blueprint ─────────────────────────────────────────────────────────────────

/// A named node of the routing tree, under construction.
pub struct Blueprint {
    pub(crate) name: String,
    pub(crate) prefix: String,
    pub(crate) host: Option<String>,
    pub(crate) reverse_hooks: Option<bool>,
    pub(crate) routes: Vec<RegisteredRoute>,
    pub(crate) pre_hooks: Vec<BoxedPreHook>,
    pub(crate) post_hooks: Vec<BoxedPostHook>,
    pub(crate) error_handlers: ErrorHandlers,
    pub(crate) children: Vec<Blueprint>,
    /// One matchit tree per method, holding every pattern registered here.
    /// Only used to reject ambiguous registrations.
    index: HashMap<Method, MatchitRouter<()>>,
}

impl Blueprint {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            prefix: String::new(),
            host: None,
            reverse_hooks: None,
            routes: Vec::new(),
            pre_hooks: Vec::new(),
            post_hooks: Vec::new(),
            error_handlers: ErrorHandlers::default(),
            children: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Sets this node's own URL prefix. Ancestors' prefixes are prepended when
    /// the tree is built. A prefix is empty, or starts with `/` and does not
    /// end with one.
    pub fn prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_owned();
        self
    }

    /// Restricts this subtree to one host. Unset, the nearest ancestor's host
    /// applies.
    pub fn host(mut self, host: &str) -> Self {
        self.host = Some(host.to_owned());
        self
    }

    /// Runs the inherited hook chains in reverse order for requests matched
    /// in this subtree.
    pub fn reverse_hooks(mut self, reverse: bool) -> Self {
        self.reverse_hooks = Some(reverse);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url_prefix(&self) -> &str {
        &self.prefix
    }

    pub fn children(&self) -> &[Blueprint] {
        &self.children
    }

    /// Attaches `child` below this blueprint.
    pub fn register_child(&mut self, child: Blueprint) -> Result<&mut Self, ConfigurationError> {
        child.validate()?;
        if self.children.iter().any(|c| c.name == child.name) {
            return Err(ConfigurationError::DuplicateBlueprint {
                parent: self.name.clone(),
                name: child.name,
            });
        }
        self.children.push(child);
        Ok(self)
    }

    /// Registers a route. Every pattern is parsed and checked against the
    /// patterns already registered here for the same methods; on any error
    /// nothing is registered.
    pub fn add_route(&mut self, route: Route) -> Result<&mut Self, ConfigurationError> {
        let mut staged = self.index.clone();
        let mut parsed = Vec::with_capacity(route.bindings.len());

        for (source, methods) in &route.bindings {
            let pattern = Pattern::parse(source)?;
            if methods.is_empty() {
                return Err(ConfigurationError::EmptyMethods { pattern: source.clone() });
            }

            let template = pattern.template();
            for method in methods {
                staged
                    .entry(method.clone())
                    .or_default()
                    .insert(template.clone(), ())
                    .map_err(|e| ConfigurationError::AmbiguousRoute {
                        blueprint: self.name.clone(),
                        pattern: source.clone(),
                        method: method.clone(),
                        detail: e.to_string(),
                    })?;
            }
            parsed.push((pattern, methods.clone()));
        }

        let bindings = parsed
            .into_iter()
            .map(|(pattern, methods)| Binding { pattern, methods, ordinal: 0 })
            .collect();

        let taken = |name: &str| self.routes.iter().any(|r| &*r.endpoint == name);
        let endpoint = match route.endpoint {
            Some(name) if taken(&name) => {
                return Err(ConfigurationError::DuplicateEndpoint { endpoint: name });
            }
            Some(name) => name,
            None => {
                // Closures have no usable name; fall back to their first pattern.
                let handler = if route.handler_name.contains("{{closure}}") {
                    route.bindings.first().map_or("", |(p, _)| p.as_str())
                } else {
                    route.handler_name
                };
                let base = format!("{}.{handler}", self.name);
                // A handler reused within this blueprint gets `_2`, `_3`, ...
                let mut name = base.clone();
                let mut n = 1;
                while taken(&name) {
                    n += 1;
                    name = format!("{base}_{n}");
                }
                name
            }
        };

        self.index = staged;
        self.routes.push(RegisteredRoute {
            bindings,
            endpoint: Arc::from(endpoint),
            handler: route.handler,
            exact: route.exact,
            convert: route.convert,
            run_hooks: route.run_hooks,
            pre_hooks: route.pre_hooks.into(),
            post_hooks: route.post_hooks.into(),
        });
        Ok(self)
    }

    /// Appends a hook that runs before the handler of every route in this
    /// subtree.
    pub fn before_request(&mut self, hook: impl PreHook) -> &mut Self {
        self.pre_hooks.push(hook.into_boxed_pre_hook());
        self
    }

    /// Appends a hook that runs after the handler of every route in this
    /// subtree.
    pub fn after_request(&mut self, hook: impl PostHook) -> &mut Self {
        self.post_hooks.push(hook.into_boxed_post_hook());
        self
    }

    /// Registers an error handler for one code (`404`, `StatusCode::NOT_FOUND`)
    /// or a half-open range (`400..500`). Registering the same key again
    /// replaces the earlier handler.
    pub fn error_handler(&mut self, key: impl Into<StatusKey>, handler: impl ErrorHandler) -> &mut Self {
        self.error_handlers.insert(key.into(), handler.into_boxed_error_handler());
        self
    }

    /// Checks name, prefix and host.
    pub(crate) fn validate(&self) -> Result<(), ConfigurationError> {
        if self.name.is_empty() || self.name.contains('.') {
            return Err(ConfigurationError::InvalidName { name: self.name.clone() });
        }

        let bad_prefix = |reason| ConfigurationError::InvalidPrefix {
            blueprint: self.name.clone(),
            prefix: self.prefix.clone(),
            reason,
        };
        if !self.prefix.is_empty() {
            if !self.prefix.starts_with('/') {
                return Err(bad_prefix("must start with `/`"));
            }
            if self.prefix.ends_with('/') {
                return Err(bad_prefix("must not end with `/`"));
            }
            if self.prefix.contains(['<', '>']) || self.prefix.contains("//") {
                return Err(bad_prefix("must be a plain path"));
            }
        }

        if let Some(host) = &self.host {
            if host.is_empty() || host.contains(['/', ' ', '\t']) {
                return Err(ConfigurationError::InvalidHost {
                    blueprint: self.name.clone(),
                    host: host.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RequestContext, Response};

    async fn a(_: RequestContext) -> Response { Response::text("a") }
    async fn b(_: RequestContext) -> Response { Response::text("b") }

    #[test]
    fn identical_pattern_and_method_is_ambiguous() {
        let mut bp = Blueprint::new("bp");
        bp.add_route(Route::get("/users/<id:int>", a)).unwrap();

        let err = bp.add_route(Route::new("/users/<uid:int>", [Method::GET], b)).err();
        assert!(matches!(err, Some(ConfigurationError::AmbiguousRoute { .. })));
        assert_eq!(bp.routes.len(), 1);
    }

    #[test]
    fn disjoint_methods_share_a_pattern() {
        let mut bp = Blueprint::new("bp");
        bp.add_route(Route::get("/users", a)).unwrap();
        bp.add_route(Route::post("/users", b)).unwrap();
        assert_eq!(bp.routes.len(), 2);
    }

    #[test]
    fn failed_route_leaves_no_trace() {
        let mut bp = Blueprint::new("bp");
        bp.add_route(Route::post("/x", a)).unwrap();

        // the first binding is fine, the second collides
        let route = Route::get("/fresh", b).path("/x", [Method::POST]);
        assert!(bp.add_route(route).is_err());

        // so `/fresh` must still be free
        bp.add_route(Route::get("/fresh", b).endpoint("bp.fresh")).unwrap();
    }

    #[test]
    fn reused_handler_gets_a_distinct_default_endpoint() {
        let mut bp = Blueprint::new("bp");
        bp.add_route(Route::get("/one", a)).unwrap();
        bp.add_route(Route::get("/two", a)).unwrap();
        bp.add_route(Route::post("/one", a)).unwrap();
        let names: Vec<&str> = bp.routes.iter().map(|r| &*r.endpoint).collect();
        assert_eq!(names, ["bp.a", "bp.a_2", "bp.a_3"]);
    }

    #[test]
    fn explicit_endpoint_clash_fails_on_registration() {
        let mut bp = Blueprint::new("bp");
        bp.add_route(Route::get("/one", a).endpoint("same")).unwrap();
        let err = bp.add_route(Route::get("/two", b).endpoint("same")).err();
        assert_eq!(err, Some(ConfigurationError::DuplicateEndpoint { endpoint: "same".into() }));
        assert_eq!(bp.routes.len(), 1);
        // the failed route left nothing in the ambiguity index either
        bp.add_route(Route::get("/two", b)).unwrap();
    }

    #[test]
    fn default_endpoint_is_blueprint_dot_handler() {
        let mut bp = Blueprint::new("users");
        bp.add_route(Route::get("/", a)).unwrap();
        assert_eq!(&*bp.routes[0].endpoint, "users.a");
    }

    #[test]
    fn sibling_names_must_differ() {
        let mut root = Blueprint::new("root");
        root.register_child(Blueprint::new("api")).unwrap();
        let err = root.register_child(Blueprint::new("api")).err();
        assert!(matches!(err, Some(ConfigurationError::DuplicateBlueprint { .. })));
    }

    #[test]
    fn prefixes_are_validated() {
        for bad in ["api", "/api/", "/", "/a//b", "/<id>"] {
            let mut root = Blueprint::new("root");
            let err = root.register_child(Blueprint::new("child").prefix(bad)).err();
            assert!(
                matches!(err, Some(ConfigurationError::InvalidPrefix { .. })),
                "{bad} should be rejected",
            );
        }
        assert!(matches!(
            Blueprint::new("a.b").validate(),
            Err(ConfigurationError::InvalidName { .. }),
        ));
    }

    #[test]
    fn later_error_handler_registration_wins() {
        async fn first(_: RequestContext, _: crate::HttpError) -> &'static str { "first" }
        async fn second(_: RequestContext, _: crate::HttpError) -> &'static str { "second" }

        let mut bp = Blueprint::new("bp");
        bp.error_handler(404, first);
        bp.error_handler(400..500, second);
        bp.error_handler(404, first);
        // the exact key was re-registered last
        assert_eq!(bp.error_handlers.len(), 2);
        assert!(bp.error_handlers.find(404).is_some());
        assert!(bp.error_handlers.find(499).is_some());
        assert!(bp.error_handlers.find(500).is_none());
    }
}
