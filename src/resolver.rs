//! Request resolution against a [`RoutingTree`].
//!
//! The walk is depth-first from the root. A subtree is skipped when its
//! effective prefix does not lead the request path on a segment boundary,
//! or, with host matching on, when its effective host differs from the
//! request host. Every surviving node tries each of its route patterns on
//! what is left of the path.
//!
//! A pattern that matches with the wrong method does not end the walk: the
//! same path may be served for another method by a route elsewhere in the
//! tree, so those allowed methods are only collected. The verdict is made
//! once the whole tree was visited:
//!
//! 1. any match with the right method wins, lowest registration ordinal
//!    first;
//! 2. otherwise, if some pattern matched, `405` with the union of the
//!    allowed methods, anchored at the lowest common ancestor of the nodes
//!    that contributed them;
//! 3. otherwise `404`, anchored at the lowest common ancestor of the
//!    deepest nodes whose prefix matched.

use std::sync::Arc;

use http::Method;
use tracing::trace;

use crate::handler::{BoxedPostHook, BoxedPreHook};
use crate::pattern::{Params, Pattern};
use crate::route::RegisteredRoute;
use crate::tree::{Node, NodeId, RoutingTree};

/// Outcome of [`RoutingTree::resolve`].
#[derive(Debug)]
pub enum Resolution<'t> {
    Matched(RouteMatch<'t>),
    NotFound {
        /// Where the error-handler search starts.
        anchor: NodeId,
    },
    MethodNotAllowed {
        /// Every method some matching pattern accepts, in registration order.
        allowed: Vec<Method>,
        anchor: NodeId,
    },
}

impl Resolution<'_> {
    /// The node error handling starts from.
    pub fn anchor(&self) -> NodeId {
        match self {
            Self::Matched(m) => m.node_id,
            Self::NotFound { anchor } | Self::MethodNotAllowed { anchor, .. } => *anchor,
        }
    }
}

/// A successful resolution.
pub struct RouteMatch<'t> {
    pub(crate) node_id: NodeId,
    pub(crate) node: &'t Node,
    pub(crate) route: &'t RegisteredRoute,
    pub(crate) pattern: &'t Pattern,
    pub(crate) params: Params,
    ordinal: u64,
}

impl<'t> RouteMatch<'t> {
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn node(&self) -> &'t Node {
        self.node
    }

    pub fn endpoint(&self) -> &'t str {
        &self.route.endpoint
    }

    pub fn pattern(&self) -> &'t Pattern {
        self.pattern
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }

    /// Pre hooks to run, in order: the inherited chain, then the route's own.
    pub(crate) fn pre_hooks(&self) -> impl Iterator<Item = &'t BoxedPreHook> + use<'t> {
        let (node, route) = (self.node, self.route);
        let run = route.run_hooks;
        node.pre_chain
            .iter()
            .chain(route.pre_hooks.iter())
            .filter(move |_| run)
    }

    /// Post hooks to run, in order: the route's own, then the inherited chain.
    pub(crate) fn post_hooks(&self) -> impl Iterator<Item = &'t BoxedPostHook> + use<'t> {
        let (node, route) = (self.node, self.route);
        let run = route.run_hooks;
        route
            .post_hooks
            .iter()
            .chain(node.post_chain.iter())
            .filter(move |_| run)
    }

    pub(crate) fn route(&self) -> &'t RegisteredRoute {
        self.route
    }

    pub(crate) fn blueprint(&self) -> Arc<str> {
        self.node.name.clone()
    }
}

impl std::fmt::Debug for RouteMatch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteMatch")
            .field("node", &self.node.name)
            .field("endpoint", &self.route.endpoint)
            .field("pattern", &self.pattern.as_str())
            .field("params", &self.params)
            .field("ordinal", &self.ordinal)
            .finish()
    }
}

// ── Walk ──────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Walk<'t> {
    best: Option<RouteMatch<'t>>,
    allowed: Vec<Method>,
    contributors: Vec<NodeId>,
    /// Prefix-matching nodes, with whether any child of theirs also matched.
    visited: Vec<(NodeId, bool)>,
}

impl RoutingTree {
    /// Finds the route serving `method path` on `host`.
    ///
    /// `host` is ignored unless host matching is on. The request port is
    /// disregarded unless a blueprint host names one.
    pub fn resolve(&self, method: &Method, path: &str, host: Option<&str>) -> Resolution<'_> {
        let mut walk = Walk::default();
        self.visit(self.root(), method, path, host, &mut walk);

        if let Some(found) = walk.best {
            trace!(
                endpoint = %found.route.endpoint,
                blueprint = %found.node.name,
                ordinal = found.ordinal,
                "resolved"
            );
            return Resolution::Matched(found);
        }

        if !walk.allowed.is_empty() {
            let anchor = self.lowest_common_ancestor(&walk.contributors);
            return Resolution::MethodNotAllowed { allowed: walk.allowed, anchor };
        }

        let deepest: Vec<NodeId> = walk
            .visited
            .iter()
            .filter(|(_, has_matching_child)| !has_matching_child)
            .map(|(id, _)| *id)
            .collect();
        Resolution::NotFound { anchor: self.lowest_common_ancestor(&deepest) }
    }

    /// Returns whether `id` itself survived pruning.
    fn visit<'t>(
        &'t self,
        id: NodeId,
        method: &Method,
        path: &str,
        host: Option<&str>,
        walk: &mut Walk<'t>,
    ) -> bool {
        let node = self.node(id);
        if self.host_matching && !host_matches(node.effective_host(), host) {
            return false;
        }
        let Some(remainder) = strip_prefix(path, &node.effective_prefix) else {
            return false;
        };

        let slot = walk.visited.len();
        walk.visited.push((id, false));

        for route in &node.routes {
            for binding in &route.bindings {
                let Some(params) = binding.pattern.matches(remainder, route.exact, route.convert) else {
                    continue;
                };

                if binding.methods.contains(method) {
                    if walk.best.as_ref().is_none_or(|b| binding.ordinal < b.ordinal) {
                        walk.best = Some(RouteMatch {
                            node_id: id,
                            node,
                            route,
                            pattern: &binding.pattern,
                            params,
                            ordinal: binding.ordinal,
                        });
                    }
                } else {
                    for m in &binding.methods {
                        if !walk.allowed.contains(m) {
                            walk.allowed.push(m.clone());
                        }
                    }
                    if !walk.contributors.contains(&id) {
                        walk.contributors.push(id);
                    }
                }
            }
        }

        let mut any_child = false;
        for child in &node.children {
            any_child |= self.visit(*child, method, path, host, walk);
        }
        walk.visited[slot].1 = any_child;
        true
    }
}

/// Strips `prefix` from `path` on a segment boundary: `/api` leads
/// `/api` and `/api/x` but not `/apix`.
pub(crate) fn strip_prefix<'p>(path: &'p str, prefix: &str) -> Option<&'p str> {
    let rest = path.strip_prefix(prefix)?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}

/// Case-insensitive host comparison. The request port is dropped unless the
/// blueprint host carries one itself.
pub(crate) fn host_matches(expected: Option<&str>, actual: Option<&str>) -> bool {
    let Some(expected) = expected else {
        return true;
    };
    let Some(actual) = actual else {
        return false;
    };
    let actual = if has_port(expected) {
        actual
    } else {
        strip_port(actual)
    };
    expected.eq_ignore_ascii_case(actual)
}

/// `[::1]` has no port, `[::1]:80` and `localhost:80` do.
fn has_port(host: &str) -> bool {
    if host.starts_with('[') {
        host.contains("]:")
    } else {
        host.contains(':')
    }
}

fn strip_port(host: &str) -> &str {
    // `[::1]:8080`
    if let Some(end) = host.find(']') {
        return &host[..=end];
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::RoutingSettings;
    use crate::{Blueprint, RequestContext, Response, Route};

    async fn h(_: RequestContext) -> Response { Response::text("") }

    fn tree(root: Blueprint) -> RoutingTree {
        RoutingTree::build(root, &RoutingSettings::default()).unwrap()
    }

    fn endpoint<'a>(res: &'a Resolution<'a>) -> Option<&'a str> {
        match res {
            Resolution::Matched(m) => Some(m.endpoint()),
            _ => None,
        }
    }

    #[test]
    fn prefix_stripping_respects_segments() {
        assert_eq!(strip_prefix("/api/users", "/api"), Some("/users"));
        assert_eq!(strip_prefix("/api", "/api"), Some(""));
        assert_eq!(strip_prefix("/apix", "/api"), None);
        assert_eq!(strip_prefix("/anything", ""), Some("/anything"));
    }

    #[test]
    fn hosts_compare_without_port_and_case() {
        assert!(host_matches(None, None));
        assert!(host_matches(Some("api.example.com"), Some("API.example.com:8080")));
        assert!(!host_matches(Some("api.example.com"), Some("www.example.com")));
        assert!(!host_matches(Some("api.example.com"), None));
        assert!(host_matches(Some("localhost:8080"), Some("localhost:8080")));
        assert!(!host_matches(Some("localhost:8080"), Some("localhost:9090")));
        assert!(host_matches(Some("[::1]"), Some("[::1]:4444")));
        assert!(host_matches(Some("[::1]:4444"), Some("[::1]:4444")));
        assert!(!host_matches(Some("[::1]:4444"), Some("[::1]:5555")));
        assert!(!host_matches(Some("[::1]"), Some("[::2]:4444")));
    }

    #[test]
    fn typed_segment_failure_is_not_found() {
        let mut numeric = Blueprint::new("numeric").prefix("/numeric");
        numeric.add_route(Route::get("/<n:int>", h)).unwrap();
        let mut root = Blueprint::new("app");
        root.register_child(numeric).unwrap();
        let tree = tree(root);

        assert!(matches!(tree.resolve(&Method::GET, "/numeric/12", None), Resolution::Matched(_)));
        match tree.resolve(&Method::GET, "/numeric/abc", None) {
            Resolution::NotFound { anchor } => assert_eq!(anchor, tree.find("numeric").unwrap()),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn sibling_with_the_method_beats_method_not_allowed() {
        let mut reader = Blueprint::new("reader");
        reader.add_route(Route::new("/users/<id:int>", [Method::GET], h)).unwrap();
        let mut root = Blueprint::new("app");
        root.register_child(reader).unwrap();

        let before = tree(root);
        match before.resolve(&Method::POST, "/users/1", None) {
            Resolution::MethodNotAllowed { allowed, anchor } => {
                assert_eq!(allowed, [Method::GET]);
                assert_eq!(anchor, before.find("reader").unwrap());
            }
            other => panic!("expected 405, got {other:?}"),
        }

        let mut reader = Blueprint::new("reader");
        reader.add_route(Route::new("/users/<id:int>", [Method::GET], h)).unwrap();
        let mut writer = Blueprint::new("writer");
        writer
            .add_route(Route::new("/users/<id:int>", [Method::POST], h).endpoint("writer.create"))
            .unwrap();
        let mut root = Blueprint::new("app");
        root.register_child(reader).unwrap();
        root.register_child(writer).unwrap();

        let after = tree(root);
        assert_eq!(endpoint(&after.resolve(&Method::POST, "/users/1", None)), Some("writer.create"));
    }

    #[test]
    fn method_not_allowed_anchors_at_common_ancestor() {
        let mut a = Blueprint::new("a");
        a.add_route(Route::new("/x", [Method::GET], h).endpoint("a.x")).unwrap();
        let mut b = Blueprint::new("b");
        b.add_route(Route::new("/x", [Method::PUT], h).endpoint("b.x")).unwrap();
        let mut api = Blueprint::new("api").prefix("/api");
        api.register_child(a).unwrap();
        api.register_child(b).unwrap();
        let mut root = Blueprint::new("app");
        root.register_child(api).unwrap();
        let tree = tree(root);

        match tree.resolve(&Method::DELETE, "/api/x", None) {
            Resolution::MethodNotAllowed { allowed, anchor } => {
                assert_eq!(allowed, [Method::GET, Method::PUT]);
                assert_eq!(anchor, tree.find("api").unwrap());
            }
            other => panic!("expected 405, got {other:?}"),
        }
    }

    #[test]
    fn earlier_attached_blueprint_wins_ties() {
        let mut first = Blueprint::new("first");
        first.add_route(Route::get("/same", h).endpoint("first")).unwrap();
        let mut second = Blueprint::new("second");
        second.add_route(Route::get("/same", h).endpoint("second")).unwrap();
        let mut root = Blueprint::new("app");
        // creation order does not count, attach order does
        root.register_child(second).unwrap();
        root.register_child(first).unwrap();
        let tree = tree(root);

        for _ in 0..3 {
            assert_eq!(endpoint(&tree.resolve(&Method::GET, "/same", None)), Some("second"));
        }
    }

    #[test]
    fn host_prunes_subtrees() {
        let mut api = Blueprint::new("api").host("api.example.com");
        api.add_route(Route::get("/status", h).endpoint("api.status")).unwrap();
        let mut www = Blueprint::new("www");
        www.add_route(Route::get("/status", h).endpoint("www.status")).unwrap();
        let mut root = Blueprint::new("app");
        root.register_child(api).unwrap();
        root.register_child(www).unwrap();
        let tree = tree(root);

        assert_eq!(
            endpoint(&tree.resolve(&Method::GET, "/status", Some("api.example.com"))),
            Some("api.status"),
        );
        assert_eq!(
            endpoint(&tree.resolve(&Method::GET, "/status", Some("www.example.com"))),
            Some("www.status"),
        );
    }

    #[test]
    fn unknown_path_anchors_at_root() {
        let mut api = Blueprint::new("api").prefix("/api");
        api.add_route(Route::get("/x", h)).unwrap();
        let mut root = Blueprint::new("app");
        root.register_child(api).unwrap();
        let tree = tree(root);

        assert!(matches!(
            tree.resolve(&Method::GET, "/nowhere", None),
            Resolution::NotFound { anchor } if anchor == tree.root()
        ));
    }
}
