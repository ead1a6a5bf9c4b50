//! The frozen routing tree.
//!
//! [`RoutingTree::build`] flattens a [`Blueprint`] hierarchy into an arena:
//! nodes live in one `Vec`, parents own their children by index and every
//! child keeps a plain [`NodeId`] back to its parent. Ancestor walks are
//! O(depth) and there are no reference cycles.
//!
//! Everything a request needs is computed here once: effective prefixes and
//! hosts, the inherited hook chains, and the endpoint table for URL building.
//! After that the tree is only read, so requests share it without locking.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::Method;
use tracing::info;

use crate::blueprint::{Blueprint, ErrorHandlers};
use crate::error::{ConfigurationError, UrlBuildError};
use crate::handler::{BoxedErrorHandler, BoxedPostHook, BoxedPreHook};
use crate::route::RegisteredRoute;
use crate::settings::RoutingSettings;

/// Index of a node in a [`RoutingTree`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId(pub(crate) usize);

/// One blueprint after the tree was built.
#[derive(Clone)]
pub struct Node {
    pub(crate) name: Arc<str>,
    pub(crate) effective_prefix: String,
    pub(crate) host: Option<String>,
    pub(crate) effective_host: Option<String>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) depth: usize,
    pub(crate) tree_path: Vec<Arc<str>>,
    own_reverse: Option<bool>,
    pub(crate) reverse_hooks: bool,
    pub(crate) routes: Vec<RegisteredRoute>,
    pre_hooks: Vec<BoxedPreHook>,
    post_hooks: Vec<BoxedPostHook>,
    pub(crate) error_handlers: ErrorHandlers,
    /// Inherited pre hooks, in execution order.
    pub(crate) pre_chain: Arc<[BoxedPreHook]>,
    /// Inherited post hooks, in execution order.
    pub(crate) post_chain: Arc<[BoxedPostHook]>,
}

impl Node {
    pub fn name(&self) -> &str { &self.name }
    pub fn effective_prefix(&self) -> &str { &self.effective_prefix }
    /// The host set on this blueprint itself.
    pub fn own_host(&self) -> Option<&str> { self.host.as_deref() }
    /// The host inherited down the tree; `None` accepts any host.
    pub fn effective_host(&self) -> Option<&str> { self.effective_host.as_deref() }
    pub fn parent(&self) -> Option<NodeId> { self.parent }
    pub fn children(&self) -> &[NodeId] { &self.children }
    pub fn depth(&self) -> usize { self.depth }
    pub fn reverse_hooks(&self) -> bool { self.reverse_hooks }
    pub fn route_count(&self) -> usize { self.routes.len() }

    /// Names from the root down to this node.
    pub fn tree_path(&self) -> impl Iterator<Item = &str> {
        self.tree_path.iter().map(|s| &**s)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("effective_prefix", &self.effective_prefix)
            .field("effective_host", &self.effective_host)
            .field("depth", &self.depth)
            .field("routes", &self.routes.len())
            .finish_non_exhaustive()
    }
}

/// The immutable blueprint tree requests are resolved against.
#[derive(Clone, Debug)]
pub struct RoutingTree {
    pub(crate) nodes: Vec<Node>,
    /// Configured explicitly, or implied by any node declaring a host.
    pub(crate) host_matching: bool,
    configured_host_matching: bool,
    default_reverse_hooks: bool,
    endpoints: HashMap<Arc<str>, (NodeId, usize)>,
    /// Next registration ordinal; nodes are numbered in attach order, each
    /// node's routes in the order they were added.
    next_ordinal: u64,
}

impl RoutingTree {
    /// Freezes `root` and its descendants.
    pub fn build(root: Blueprint, settings: &RoutingSettings) -> Result<Self, ConfigurationError> {
        let mut tree = Self {
            nodes: Vec::new(),
            host_matching: settings.host_matching,
            configured_host_matching: settings.host_matching,
            default_reverse_hooks: settings.reverse_hooks,
            endpoints: HashMap::new(),
            next_ordinal: 0,
        };
        tree.insert(None, root)?;
        tree.refresh();

        info!(
            nodes = tree.nodes.len(),
            routes = tree.nodes.iter().map(|n| n.routes.len()).sum::<usize>(),
            host_matching = tree.host_matching,
            "built routing tree"
        );
        Ok(tree)
    }

    /// Returns a copy of this tree with `child` attached below `parent`,
    /// and the new node's id. `self` is never modified.
    pub(crate) fn attach(&self, parent: NodeId, child: Blueprint) -> Result<(Self, NodeId), ConfigurationError> {
        let mut next = self.clone();
        let id = next.insert(Some(parent), child)?;
        next.refresh();
        Ok((next, id))
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn host_matching(&self) -> bool {
        self.host_matching
    }

    /// Looks a node up by its dotted path below the root: `""` is the root,
    /// `"api.v1"` is the `v1` child of the `api` child of the root.
    pub fn find(&self, path: &str) -> Option<NodeId> {
        let mut current = self.root();
        if path.is_empty() {
            return Some(current);
        }
        for name in path.split('.') {
            current = *self
                .node(current)
                .children
                .iter()
                .find(|c| &*self.node(**c).name == name)?;
        }
        Some(current)
    }

    /// `id` followed by its ancestors up to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(id), |n| self.node(*n).parent)
    }

    /// The deepest node that is an ancestor of (or equal to) every node in
    /// `ids`. The root for an empty set.
    pub fn lowest_common_ancestor(&self, ids: &[NodeId]) -> NodeId {
        let mut ids = ids.iter().copied();
        let Some(first) = ids.next() else {
            return self.root();
        };
        ids.fold(first, |a, b| self.lca_pair(a, b))
    }

    fn lca_pair(&self, mut a: NodeId, mut b: NodeId) -> NodeId {
        let up = |n: NodeId| self.node(n).parent.unwrap_or(NodeId(0));
        while self.node(a).depth > self.node(b).depth {
            a = up(a);
        }
        while self.node(b).depth > self.node(a).depth {
            b = up(b);
        }
        while a != b {
            a = up(a);
            b = up(b);
        }
        a
    }

    /// Walks from `anchor` to the root and returns the first error handler
    /// covering `code`, with the node that registered it.
    pub(crate) fn find_error_handler(&self, anchor: NodeId, code: u16) -> Option<(NodeId, &BoxedErrorHandler)> {
        self.ancestors(anchor)
            .find_map(|id| self.node(id).error_handlers.find(code).map(|h| (id, h)))
    }

    /// Builds the path for `endpoint`, filling in `values`.
    ///
    /// With `method`, only patterns accepting that method are considered;
    /// otherwise the route's first pattern is used.
    pub fn url_for(
        &self,
        endpoint: &str,
        method: Option<&Method>,
        values: &[(&str, &str)],
    ) -> Result<String, UrlBuildError> {
        let &(id, index) = self
            .endpoints
            .get(endpoint)
            .ok_or_else(|| UrlBuildError::UnknownEndpoint(endpoint.to_owned()))?;
        let node = self.node(id);
        let route = &node.routes[index];

        let binding = route
            .bindings
            .iter()
            .find(|b| method.is_none_or(|m| b.methods.contains(m)))
            .ok_or_else(|| UrlBuildError::NoMatchingPattern {
                endpoint: endpoint.to_owned(),
                method: method.cloned().unwrap_or_default(),
            })?;

        let suffix = binding.pattern.build(values)?;
        Ok(format!("{}{suffix}", node.effective_prefix))
    }

    // ── Construction ──────────────────────────────────────────────────────────

    fn insert(&mut self, parent: Option<NodeId>, bp: Blueprint) -> Result<NodeId, ConfigurationError> {
        bp.validate()?;

        let Blueprint {
            name,
            prefix,
            host,
            reverse_hooks,
            mut routes,
            pre_hooks,
            post_hooks,
            error_handlers,
            children,
            ..
        } = bp;

        let name: Arc<str> = Arc::from(name);
        let (effective_prefix, effective_host, depth, mut tree_path) = match parent {
            Some(p) => {
                let parent_node = self.node(p);
                if parent_node.children.iter().any(|c| self.node(*c).name == name) {
                    return Err(ConfigurationError::DuplicateBlueprint {
                        parent: parent_node.name.to_string(),
                        name: name.to_string(),
                    });
                }
                (
                    format!("{}{prefix}", parent_node.effective_prefix),
                    host.clone().or_else(|| parent_node.effective_host.clone()),
                    parent_node.depth + 1,
                    parent_node.tree_path.clone(),
                )
            }
            None => (prefix, host.clone(), 0, Vec::new()),
        };
        tree_path.push(name.clone());

        for binding in routes.iter_mut().flat_map(|r| r.bindings.iter_mut()) {
            binding.ordinal = self.next_ordinal;
            self.next_ordinal += 1;
        }

        let id = NodeId(self.nodes.len());
        for (index, route) in routes.iter().enumerate() {
            if self.endpoints.contains_key(&route.endpoint) {
                return Err(ConfigurationError::DuplicateEndpoint {
                    endpoint: route.endpoint.to_string(),
                });
            }
            self.endpoints.insert(route.endpoint.clone(), (id, index));
        }

        self.nodes.push(Node {
            name,
            effective_prefix,
            host,
            effective_host,
            parent,
            children: Vec::new(),
            depth,
            tree_path,
            own_reverse: reverse_hooks,
            reverse_hooks: false,
            routes,
            pre_hooks,
            post_hooks,
            error_handlers,
            pre_chain: Arc::from(Vec::new()),
            post_chain: Arc::from(Vec::new()),
        });
        if let Some(p) = parent {
            self.nodes[p.0].children.push(id);
        }

        for child in children {
            self.insert(Some(id), child)?;
        }
        Ok(id)
    }

    /// Recomputes everything derived from the whole tree: host matching,
    /// inherited reverse flags and hook chains.
    fn refresh(&mut self) {
        self.host_matching =
            self.configured_host_matching || self.nodes.iter().any(|n| n.host.is_some());

        // Parents always precede their children in the arena.
        for i in 0..self.nodes.len() {
            let reverse = match (self.nodes[i].own_reverse, self.nodes[i].parent) {
                (Some(own), _) => own,
                (None, Some(p)) => self.nodes[p.0].reverse_hooks,
                (None, None) => self.default_reverse_hooks,
            };
            self.nodes[i].reverse_hooks = reverse;
        }

        for i in 0..self.nodes.len() {
            let lineage: Vec<NodeId> = self.ancestors(NodeId(i)).collect();

            // root → node
            let mut pre: Vec<BoxedPreHook> = lineage
                .iter()
                .rev()
                .flat_map(|id| self.node(*id).pre_hooks.iter().cloned())
                .collect();
            // node → root
            let mut post: Vec<BoxedPostHook> = lineage
                .iter()
                .flat_map(|id| self.node(*id).post_hooks.iter().cloned())
                .collect();

            if self.nodes[i].reverse_hooks {
                pre.reverse();
                post.reverse();
            }
            self.nodes[i].pre_chain = pre.into();
            self.nodes[i].post_chain = post.into();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RequestContext, Response, Route};

    async fn h(_: RequestContext) -> Response { Response::text("") }

    fn build(root: Blueprint) -> RoutingTree {
        RoutingTree::build(root, &RoutingSettings::default()).unwrap()
    }

    #[test]
    fn prefixes_and_hosts_are_inherited() {
        let mut api = Blueprint::new("api").prefix("/api").host("api.example.com");
        api.register_child(Blueprint::new("v1").prefix("/v1")).unwrap();
        let mut root = Blueprint::new("app");
        root.register_child(api).unwrap();

        let tree = build(root);
        let v1 = tree.node(tree.find("api.v1").unwrap());
        assert_eq!(v1.effective_prefix(), "/api/v1");
        assert_eq!(v1.effective_host(), Some("api.example.com"));
        assert_eq!(v1.own_host(), None);
        assert_eq!(v1.depth(), 2);
        assert_eq!(v1.tree_path().collect::<Vec<_>>(), ["app", "api", "v1"]);
        assert!(tree.host_matching());
    }

    #[test]
    fn lca_of_siblings_is_their_parent() {
        let mut api = Blueprint::new("api").prefix("/api");
        api.register_child(Blueprint::new("a")).unwrap();
        api.register_child(Blueprint::new("b")).unwrap();
        let mut root = Blueprint::new("app");
        root.register_child(api).unwrap();
        root.register_child(Blueprint::new("other")).unwrap();

        let tree = build(root);
        let a = tree.find("api.a").unwrap();
        let b = tree.find("api.b").unwrap();
        let other = tree.find("other").unwrap();

        assert_eq!(tree.lowest_common_ancestor(&[a, b]), tree.find("api").unwrap());
        assert_eq!(tree.lowest_common_ancestor(&[a, other]), tree.root());
        assert_eq!(tree.lowest_common_ancestor(&[b]), b);
        assert_eq!(tree.lowest_common_ancestor(&[]), tree.root());
    }

    #[test]
    fn duplicate_endpoints_are_rejected() {
        let mut a = Blueprint::new("a");
        a.add_route(Route::get("/x", h).endpoint("same")).unwrap();
        let mut b = Blueprint::new("b");
        b.add_route(Route::get("/y", h).endpoint("same")).unwrap();
        let mut root = Blueprint::new("app");
        root.register_child(a).unwrap();
        root.register_child(b).unwrap();

        let err = RoutingTree::build(root, &RoutingSettings::default()).err();
        assert_eq!(err, Some(ConfigurationError::DuplicateEndpoint { endpoint: "same".into() }));
    }

    #[test]
    fn attach_is_all_or_nothing() {
        let mut root = Blueprint::new("app");
        root.add_route(Route::get("/x", h).endpoint("taken")).unwrap();
        let tree = build(root);

        let mut bad = Blueprint::new("late");
        bad.add_route(Route::get("/y", h).endpoint("taken")).unwrap();
        assert!(tree.attach(tree.root(), bad).is_err());

        let mut good = Blueprint::new("late").prefix("/late");
        good.add_route(Route::get("/y", h).endpoint("late.y")).unwrap();
        let (next, id) = tree.attach(tree.root(), good).unwrap();
        assert_eq!(next.find("late"), Some(id));
        assert_eq!(next.url_for("late.y", None, &[]).unwrap(), "/late/y");

        // the source tree is untouched either way
        assert_eq!(tree.len(), 1);
        assert!(tree.find("late").is_none());
    }

    #[test]
    fn ordinals_follow_tree_order() {
        let ordinals = |tree: &RoutingTree, node: NodeId| -> Vec<u64> {
            tree.node(node)
                .routes
                .iter()
                .flat_map(|r| r.bindings.iter().map(|b| b.ordinal))
                .collect()
        };

        // `late` is created first but attached second
        let mut late = Blueprint::new("late");
        late.add_route(Route::get("/l", h).endpoint("late.l")).unwrap();
        let mut early = Blueprint::new("early");
        early.add_route(Route::get("/e", h).path("/e2", [Method::GET]).endpoint("early.e")).unwrap();
        let mut root = Blueprint::new("app");
        root.add_route(Route::get("/r", h).endpoint("root")).unwrap();
        root.register_child(early).unwrap();
        root.register_child(late).unwrap();
        let tree = build(root);

        assert_eq!(ordinals(&tree, tree.root()), [0]);
        assert_eq!(ordinals(&tree, tree.find("early").unwrap()), [1, 2]);
        assert_eq!(ordinals(&tree, tree.find("late").unwrap()), [3]);

        let mut mounted = Blueprint::new("mounted");
        mounted.add_route(Route::get("/m", h).endpoint("mounted.m")).unwrap();
        let (next, id) = tree.attach(tree.root(), mounted).unwrap();
        assert_eq!(ordinals(&next, id), [4]);
    }

    #[test]
    fn url_for_filters_by_method() {
        let mut root = Blueprint::new("app");
        root.add_route(
            Route::get("/read/<id:int>", h)
                .path("/write/<id:int>", [Method::POST])
                .endpoint("item"),
        )
        .unwrap();
        let tree = build(root);

        assert_eq!(tree.url_for("item", None, &[("id", "3")]).unwrap(), "/read/3");
        assert_eq!(
            tree.url_for("item", Some(&Method::POST), &[("id", "3")]).unwrap(),
            "/write/3",
        );
        assert!(matches!(
            tree.url_for("item", Some(&Method::DELETE), &[("id", "3")]),
            Err(UrlBuildError::NoMatchingPattern { .. }),
        ));
        assert!(matches!(
            tree.url_for("nope", None, &[]),
            Err(UrlBuildError::UnknownEndpoint(_)),
        ));
    }
}
