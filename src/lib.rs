//! # bough
//!
//! A small async HTTP framework built around a tree of blueprints.
//!
//! A [`Blueprint`] is a named node carrying a URL prefix, an optional host,
//! routes, request hooks and error handlers. Blueprints nest; a child
//! inherits its ancestors' prefix, host, hooks and error handlers. The tree
//! is assembled at startup, frozen into a [`RoutingTree`], and then shared
//! read-only by every request.
//!
//! Per request:
//!
//! - the resolver walks the tree, pruning subtrees by prefix and host, and
//!   picks the matching route with the lowest registration ordinal;
//! - inherited pre hooks run root first, then the handler, then post hooks
//!   innermost first;
//! - any failure is answered by the nearest error handler for its status,
//!   searched from the matched node (or, for `404`/`405`, the lowest common
//!   ancestor of the candidate nodes) up to the root.
//!
//! What the transport owns is left to hyper: HTTP/1.1 and HTTP/2 parsing,
//! keep-alive, chunking. TLS belongs to the proxy in front.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use bough::{App, Blueprint, HandlerError, HttpError, RequestContext, Response, Route, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), bough::Error> {
//!     let mut users = Blueprint::new("users").prefix("/users");
//!     users.add_route(Route::get("/<id:int>", show_user).exact())?;
//!     users.before_request(require_token);
//!
//!     let mut root = Blueprint::new("app");
//!     root.register_child(users)?;
//!
//!     Server::bind("0.0.0.0:3000")?.serve(App::new(root)?).await
//! }
//!
//! async fn show_user(ctx: RequestContext) -> Result<Response, HttpError> {
//!     let id = ctx.param("id").and_then(|v| v.as_int()).ok_or_else(HttpError::bad_request)?;
//!     Ok(Response::text(format!("user {id}")))
//! }
//!
//! async fn require_token(ctx: RequestContext) -> Result<RequestContext, HandlerError> {
//!     if ctx.request().header("authorization").is_none() {
//!         return Err(HttpError::forbidden().into());
//!     }
//!     Ok(ctx)
//! }
//! ```

mod app;
mod blueprint;
mod context;
mod error;
mod handler;
mod pattern;
mod pipeline;
mod request;
mod resolver;
mod response;
mod route;
mod server;
mod settings;
mod tree;

pub mod logging;
pub mod testing;

pub use app::App;
pub use blueprint::{Blueprint, StatusKey};
pub use context::RequestContext;
pub use error::{BoxError, ConfigurationError, Error, HandlerError, HttpError, UrlBuildError};
pub use handler::{ErrorHandler, Handler, PostHook, PreHook};
pub use pattern::{Converter, Params, Pattern, Value};
pub use request::{Request, RequestBuilder};
pub use resolver::{Resolution, RouteMatch};
pub use response::{ContentType, HandlerOutput, IntoResponse, Json, Response, ResponseBuilder};
pub use route::Route;
pub use server::{Server, shutdown_signal};
pub use settings::{LogFormat, LogSettings, RoutingSettings, ServerSettings, Settings, SettingsError};
pub use tree::{Node, NodeId, RoutingTree};

pub use http::{Method, StatusCode};
