//! Handler, hook and error-handler traits, and their type erasure.
//!
//! # How async callables are stored
//!
//! A blueprint holds callables of *different* concrete types in one place, so
//! every callable is hidden behind a trait object and stored uniformly as an
//! `Arc<dyn Erased…>`. The chain for a route handler is:
//!
//! ```text
//! async fn show(ctx: RequestContext) -> Response { … }   ← user writes this
//!        ↓ Route::get("/users/<id:int>", show)
//! show.into_boxed_handler()                               ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(show))                               ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(ctx) at request time                       ← one vtable dispatch
//! ```
//!
//! Hooks and error handlers follow the same shape with their own signatures:
//!
//! | Trait            | Signature                                                          |
//! |------------------|--------------------------------------------------------------------|
//! | [`Handler`]      | `async fn(RequestContext) -> impl HandlerOutput`                   |
//! | [`PreHook`]      | `async fn(RequestContext) -> Result<RequestContext, HandlerError>` |
//! | [`PostHook`]     | `async fn(RequestContext, Response) -> Result<Response, HandlerError>` |
//! | [`ErrorHandler`] | `async fn(RequestContext, HttpError) -> impl HandlerOutput`        |
//!
//! A pre hook that wants to leave the context alone simply hands it back.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::{HandlerError, HttpError};
use crate::response::{HandlerOutput, Response};

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future.
///
/// `Send + 'static` let tokio move the future across threads.
pub(crate) type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, ctx: RequestContext) -> BoxFuture<Result<Response, HandlerError>>;
}

#[doc(hidden)]
pub trait ErasedPreHook {
    fn call(&self, ctx: RequestContext) -> BoxFuture<Result<RequestContext, HandlerError>>;
}

#[doc(hidden)]
pub trait ErasedPostHook {
    fn call(&self, ctx: RequestContext, res: Response) -> BoxFuture<Result<Response, HandlerError>>;
}

#[doc(hidden)]
pub trait ErasedErrorHandler {
    fn call(&self, ctx: RequestContext, err: HttpError) -> BoxFuture<Result<Response, HandlerError>>;
}

#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;
#[doc(hidden)]
pub type BoxedPreHook = Arc<dyn ErasedPreHook + Send + Sync + 'static>;
#[doc(hidden)]
pub type BoxedPostHook = Arc<dyn ErasedPostHook + Send + Sync + 'static>;
#[doc(hidden)]
pub type BoxedErrorHandler = Arc<dyn ErasedErrorHandler + Send + Sync + 'static>;

// ── Public traits ─────────────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is satisfied by any
/// `async fn(RequestContext) -> impl HandlerOutput`.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;

    /// The last path segment of the function's type name, used for default
    /// endpoint names (`users.show`).
    #[doc(hidden)]
    fn name(&self) -> &'static str {
        short_type_name::<Self>()
    }
}

/// Implemented for every valid pre-request hook.
pub trait PreHook: private::SealedPre + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_pre_hook(self) -> BoxedPreHook;
}

/// Implemented for every valid post-request hook.
pub trait PostHook: private::SealedPost + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_post_hook(self) -> BoxedPostHook;
}

/// Implemented for every valid error handler.
pub trait ErrorHandler: private::SealedError + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_error_handler(self) -> BoxedErrorHandler;
}

mod private {
    pub trait Sealed {}
    pub trait SealedPre {}
    pub trait SealedPost {}
    pub trait SealedError {}
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    // Generic arguments carry `::` too; only look before the first `<`.
    let head = full.split('<').next().unwrap_or(full);
    head.rsplit("::").next().unwrap_or(head)
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: HandlerOutput + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: HandlerOutput + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

impl<F, Fut> private::SealedPre for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<RequestContext, HandlerError>> + Send + 'static,
{
}

impl<F, Fut> PreHook for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<RequestContext, HandlerError>> + Send + 'static,
{
    fn into_boxed_pre_hook(self) -> BoxedPreHook {
        Arc::new(FnPreHook(self))
    }
}

impl<F, Fut> private::SealedPost for F
where
    F: Fn(RequestContext, Response) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, HandlerError>> + Send + 'static,
{
}

impl<F, Fut> PostHook for F
where
    F: Fn(RequestContext, Response) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, HandlerError>> + Send + 'static,
{
    fn into_boxed_post_hook(self) -> BoxedPostHook {
        Arc::new(FnPostHook(self))
    }
}

impl<F, Fut, R> private::SealedError for F
where
    F: Fn(RequestContext, HttpError) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: HandlerOutput + Send + 'static,
{
}

impl<F, Fut, R> ErrorHandler for F
where
    F: Fn(RequestContext, HttpError) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: HandlerOutput + Send + 'static,
{
    fn into_boxed_error_handler(self) -> BoxedErrorHandler {
        Arc::new(FnErrorHandler(self))
    }
}

// ── Concrete wrappers ─────────────────────────────────────────────────────────

struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: HandlerOutput + Send + 'static,
{
    fn call(&self, ctx: RequestContext) -> BoxFuture<Result<Response, HandlerError>> {
        let fut = (self.0)(ctx);
        Box::pin(async move { fut.await.into_outcome() })
    }
}

struct FnPreHook<F>(F);

impl<F, Fut> ErasedPreHook for FnPreHook<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<RequestContext, HandlerError>> + Send + 'static,
{
    fn call(&self, ctx: RequestContext) -> BoxFuture<Result<RequestContext, HandlerError>> {
        Box::pin((self.0)(ctx))
    }
}

struct FnPostHook<F>(F);

impl<F, Fut> ErasedPostHook for FnPostHook<F>
where
    F: Fn(RequestContext, Response) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, HandlerError>> + Send + 'static,
{
    fn call(&self, ctx: RequestContext, res: Response) -> BoxFuture<Result<Response, HandlerError>> {
        Box::pin((self.0)(ctx, res))
    }
}

struct FnErrorHandler<F>(F);

impl<F, Fut, R> ErasedErrorHandler for FnErrorHandler<F>
where
    F: Fn(RequestContext, HttpError) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: HandlerOutput + Send + 'static,
{
    fn call(&self, ctx: RequestContext, err: HttpError) -> BoxFuture<Result<Response, HandlerError>> {
        let fut = (self.0)(ctx, err);
        Box::pin(async move { fut.await.into_outcome() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn show_user(_ctx: RequestContext) -> Response {
        Response::text("")
    }

    #[test]
    fn handler_names_are_short() {
        assert_eq!(show_user.name(), "show_user");
    }
}
