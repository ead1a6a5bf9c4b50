//! The per-request pipeline: resolve, run hooks and handler, fall back to
//! the error-handler chain.
//!
//! Every request gets exactly one [`Response`]. Failures of user code,
//! panics included, stay inside this module.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use http::{Method, StatusCode};
use tracing::{debug, error, info, warn};

use crate::context::RequestContext;
use crate::error::{HandlerError, HttpError};
use crate::request::Request;
use crate::resolver::{Resolution, RouteMatch};
use crate::response::Response;
use crate::tree::{NodeId, RoutingTree};

const SERVER_NAME: &str = concat!("bough/", env!("CARGO_PKG_VERSION"));

/// Behaviour switches taken from the settings at startup.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PipelineOptions {
    pub(crate) auto_options: bool,
    pub(crate) server_header: bool,
}

/// Where in the route a failure happened.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Stage {
    PreHooks,
    Handler,
    PostHooks,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PreHooks => "pre hook",
            Self::Handler => "handler",
            Self::PostHooks => "post hook",
        })
    }
}

/// A failed route run, with the context as the failing step last saw it.
struct Failure {
    ctx: RequestContext,
    stage: Stage,
    error: HandlerError,
}

/// Logs requests that are dropped before a response was produced, such as
/// when the client disconnects mid-handler.
struct InFlight {
    method: Method,
    path: String,
    done: bool,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.done {
            warn!(method = %self.method, path = %self.path, "request cancelled");
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

pub(crate) async fn handle(tree: Arc<RoutingTree>, options: PipelineOptions, request: Request) -> Response {
    let started = Instant::now();
    let mut in_flight = InFlight {
        method: request.method().clone(),
        path: request.path().to_owned(),
        done: false,
    };

    let mut response = dispatch(&tree, options, request).await;
    if options.server_header {
        response.set_header("server", SERVER_NAME);
        response.set_header("x-powered-by", SERVER_NAME);
    }

    info!(
        method = %in_flight.method,
        path = %in_flight.path,
        status = response.status_code().as_u16(),
        elapsed_us = started.elapsed().as_micros() as u64,
        "request"
    );
    in_flight.done = true;
    response
}

async fn dispatch(tree: &Arc<RoutingTree>, options: PipelineOptions, request: Request) -> Response {
    let resolution = tree.resolve(request.method(), request.path(), request.host());

    match resolution {
        Resolution::Matched(m) => {
            let anchor = m.node_id();
            let blueprint = m.blueprint();
            let mut ctx = RequestContext::new(request, Arc::clone(tree), blueprint.clone());
            ctx.matched(m.params().clone(), m.route().endpoint.clone(), blueprint);
            let fallback = ctx.clone();

            match AssertUnwindSafe(run_route(&m, ctx)).catch_unwind().await {
                Ok(Ok(response)) => response,
                Ok(Err(Failure { ctx, stage, error })) => {
                    match &error {
                        HandlerError::Http(e) => {
                            debug!(endpoint = %m.endpoint(), %stage, status = e.code(), "route signalled http error");
                        }
                        HandlerError::Internal(e) => {
                            error!(endpoint = %m.endpoint(), %stage, error = %e, "route failed");
                        }
                    }
                    handle_error(tree, anchor, ctx, error.into_http()).await
                }
                Err(panic) => {
                    error!(endpoint = %m.endpoint(), panic = panic_message(&*panic), "route panicked");
                    handle_error(tree, anchor, fallback, HttpError::internal()).await
                }
            }
        }

        Resolution::NotFound { anchor } => {
            debug!(path = %request.path(), anchor = %tree.node(anchor).name(), "no route");
            let ctx = RequestContext::new(request, Arc::clone(tree), tree.node(anchor).name.clone());
            handle_error(tree, anchor, ctx, HttpError::not_found()).await
        }

        Resolution::MethodNotAllowed { mut allowed, anchor } => {
            if options.auto_options && request.method() == Method::OPTIONS {
                allowed.push(Method::OPTIONS);
                let mut response = Response::status(StatusCode::NO_CONTENT);
                response.set_header("allow", allow_header(&allowed));
                return response;
            }
            debug!(
                method = %request.method(),
                path = %request.path(),
                allowed = %allow_header(&allowed),
                "method not allowed"
            );
            let ctx = RequestContext::new(request, Arc::clone(tree), tree.node(anchor).name.clone());
            handle_error(tree, anchor, ctx, HttpError::method_not_allowed(allowed)).await
        }
    }
}

/// Runs the pre hooks, the handler and the post hooks of a matched route.
async fn run_route(m: &RouteMatch<'_>, mut ctx: RequestContext) -> Result<Response, Failure> {
    for hook in m.pre_hooks() {
        ctx = match hook.call(ctx.clone()).await {
            Ok(next) => next,
            Err(error) => return Err(Failure { ctx, stage: Stage::PreHooks, error }),
        };
    }

    let mut response = match m.route().handler.call(ctx.clone()).await {
        Ok(response) => response,
        Err(error) => return Err(Failure { ctx, stage: Stage::Handler, error }),
    };

    for hook in m.post_hooks() {
        response = match hook.call(ctx.clone(), response).await {
            Ok(next) => next,
            Err(error) => return Err(Failure { ctx, stage: Stage::PostHooks, error }),
        };
    }
    Ok(response)
}

// ── Error handling ────────────────────────────────────────────────────────────

/// Answers `err` with the nearest error handler at or above `anchor`.
///
/// An error handler that fails is never routed through error handling
/// again: the request gets a bare `500`.
async fn handle_error(tree: &RoutingTree, anchor: NodeId, ctx: RequestContext, err: HttpError) -> Response {
    let status = err.status();
    let allow = (!err.allowed().is_empty()).then(|| allow_header(err.allowed()));

    let mut response = match tree.find_error_handler(anchor, status.as_u16()) {
        None => Response::for_status(status),
        Some((owner, handler)) => {
            let owner = tree.node(owner).name();
            debug!(status = status.as_u16(), blueprint = %owner, "running error handler");

            match AssertUnwindSafe(handler.call(ctx, err)).catch_unwind().await {
                Ok(Ok(response)) => {
                    if response.status_code() != status {
                        warn!(
                            blueprint = %owner,
                            expected = status.as_u16(),
                            returned = response.status_code().as_u16(),
                            "error handler answered with a different status"
                        );
                    }
                    response
                }
                Ok(Err(e)) => {
                    error!(blueprint = %owner, status = status.as_u16(), error = %e, "error handler failed");
                    Response::for_status(StatusCode::INTERNAL_SERVER_ERROR)
                }
                Err(panic) => {
                    error!(
                        blueprint = %owner,
                        status = status.as_u16(),
                        panic = panic_message(&*panic),
                        "error handler panicked"
                    );
                    Response::for_status(StatusCode::INTERNAL_SERVER_ERROR)
                }
            }
        }
    };

    if let Some(allow) = allow {
        if response.status_code() == StatusCode::METHOD_NOT_ALLOWED && response.header("allow").is_none() {
            response.set_header("allow", allow);
        }
    }
    response
}

fn allow_header(methods: &[Method]) -> String {
    methods.iter().map(Method::as_str).collect::<Vec<_>>().join(", ")
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic>")
}
