//! The application: a frozen routing tree plus the request pipeline.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tracing::info;

use crate::blueprint::Blueprint;
use crate::error::{ConfigurationError, UrlBuildError};
use crate::pipeline::{self, PipelineOptions};
use crate::request::Request;
use crate::response::Response;
use crate::settings::Settings;
use crate::tree::{NodeId, RoutingTree};

/// A built application. Cheap to clone; all clones serve the same tree.
///
/// Requests load the current tree once and keep it until they finish, so a
/// [`mount`](Self::mount) never changes the routing of an in-flight request.
#[derive(Clone)]
pub struct App {
    inner: Arc<Inner>,
}

struct Inner {
    tree: ArcSwap<RoutingTree>,
    /// Serialises mounts; readers never take it.
    mount_lock: Mutex<()>,
    options: PipelineOptions,
}

impl App {
    /// Freezes `root` with default settings.
    pub fn new(root: Blueprint) -> Result<Self, ConfigurationError> {
        Self::with_settings(root, &Settings::default())
    }

    pub fn with_settings(root: Blueprint, settings: &Settings) -> Result<Self, ConfigurationError> {
        let tree = RoutingTree::build(root, &settings.routing)?;
        Ok(Self {
            inner: Arc::new(Inner {
                tree: ArcSwap::from_pointee(tree),
                mount_lock: Mutex::new(()),
                options: PipelineOptions {
                    auto_options: settings.routing.auto_options,
                    server_header: settings.server.server_header,
                },
            }),
        })
    }

    /// A snapshot of the current routing tree.
    pub fn tree(&self) -> Arc<RoutingTree> {
        self.inner.tree.load_full()
    }

    /// Serves one request.
    pub async fn handle(&self, request: Request) -> Response {
        pipeline::handle(self.tree(), self.inner.options, request).await
    }

    /// See [`RoutingTree::url_for`].
    pub fn url_for(&self, endpoint: &str, values: &[(&str, &str)]) -> Result<String, UrlBuildError> {
        self.inner.tree.load().url_for(endpoint, None, values)
    }

    /// Attaches `blueprint` below the node at the dotted path `parent` (`""`
    /// for the root) while the app is serving.
    ///
    /// The new tree is built on the side and swapped in whole; on error the
    /// running tree is untouched.
    pub async fn mount(&self, parent: &str, blueprint: Blueprint) -> Result<NodeId, ConfigurationError> {
        let _guard = self.inner.mount_lock.lock().await;

        let current = self.inner.tree.load_full();
        let parent_id = current
            .find(parent)
            .ok_or_else(|| ConfigurationError::UnknownBlueprint { path: parent.to_owned() })?;

        let (next, id) = current.attach(parent_id, blueprint)?;
        let node = next.node(id);
        info!(
            blueprint = %node.name(),
            prefix = %node.effective_prefix(),
            nodes = next.len(),
            "mounted blueprint"
        );

        self.inner.tree.store(Arc::new(next));
        Ok(id)
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("nodes", &self.inner.tree.load().len())
            .field("options", &self.inner.options)
            .finish()
    }
}
