//! Render handler trait, type erasure, and the bridging [`RequestHandler`].
//!
//! # How a render handler is stored
//!
//! ```text
//! async fn render(req: Request, ctx: Option<Context>) -> Result<Response, E>
//!        ↓ create_request_handler(render, options)
//! render.into_boxed_handler()                ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(render))                ← stored as BoxedHandler
//!        ↓
//! handler.call(req, ctx)  per request        ← one vtable dispatch
//! ```
//!
//! # One bridged call
//!
//! [`RequestHandler::handle`] runs a call from idle to a terminal state:
//!
//! 1. load context computed from the outer request and response;
//! 2. inner [`Request`] built, with its abort signal wired to the outer
//!    connection's close event;
//! 3. global context computed from the inner request;
//! 4. render handler invoked and its [`Response`] translated onto the outer
//!    sink, both inside the global-context scope.
//!
//! Any failure along the way, including a panic in the render handler, is
//! handed to `next` exactly once instead of propagating to the caller.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::debug;

use crate::context::{self, Context};
use crate::error::{BoxError, Error};
use crate::mode::Mode;
use crate::outer::{OuterRequest, OuterResponse};
use crate::request::{Request, RequestOptions};
use crate::response::{IntoResponse, Response, send_response};

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased render future.
pub(crate) type BoxFuture = futures_util::future::BoxFuture<'static, Result<Response, BoxError>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request, ctx: Option<Context>) -> BoxFuture;
}

/// A type-erased render handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid render handler.
///
/// You never implement this yourself. It is satisfied by any function or
/// closure with the shape:
///
/// ```text
/// async fn name(req: Request, load_context: Option<Context>) -> Result<impl IntoResponse, impl Into<BoxError>>
/// ```
///
/// The trait is sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R, E> private::Sealed for F
where
    F: Fn(Request, Option<Context>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: IntoResponse + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
}

impl<F, Fut, R, E> Handler for F
where
    F: Fn(Request, Option<Context>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: IntoResponse + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Newtype holding a concrete handler `F`, bridging it to [`ErasedHandler`].
struct FnHandler<F>(F);

impl<F, Fut, R, E> ErasedHandler for FnHandler<F>
where
    F: Fn(Request, Option<Context>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: IntoResponse + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    fn call(&self, req: Request, ctx: Option<Context>) -> BoxFuture {
        let fut = (self.0)(req, ctx);
        Box::pin(async move { fut.await.map(IntoResponse::into_response).map_err(Into::into) })
    }
}

// ── Options ───────────────────────────────────────────────────────────────────

type LoadContextFn =
    Box<dyn Fn(&OuterRequest, &dyn OuterResponse) -> Result<Context, BoxError> + Send + Sync>;
type GlobalContextFn = Box<dyn Fn(&Request) -> Result<Context, BoxError> + Send + Sync>;

/// Configuration for [`create_request_handler`].
///
/// Every hook is optional. Without a `mode`, [`Mode::from_env`] decides.
///
/// ```rust
/// use ssr_bridge::{Context, HandlerOptions, Mode};
///
/// struct Db;
///
/// let options = HandlerOptions::new()
///     .mode(Mode::Development)
///     .trust_proxy(true)
///     .load_context(|req, _res| Ok(Context::new(req.original_url().to_owned())))
///     .global_context(|_req| Ok(Context::new(Db)));
/// ```
pub struct HandlerOptions {
    load_context: Option<LoadContextFn>,
    global_context: Option<GlobalContextFn>,
    mode: Mode,
    trust_proxy: bool,
}

impl HandlerOptions {
    pub fn new() -> Self {
        Self { load_context: None, global_context: None, mode: Mode::from_env(), trust_proxy: false }
    }

    /// Computes the request-scoped context passed to the render handler.
    pub fn load_context<F>(mut self, f: F) -> Self
    where
        F: Fn(&OuterRequest, &dyn OuterResponse) -> Result<Context, BoxError> + Send + Sync + 'static,
    {
        self.load_context = Some(Box::new(f));
        self
    }

    /// Computes the value published to [`global_context`](crate::global_context)
    /// while the render handler runs.
    pub fn global_context<F>(mut self, f: F) -> Self
    where
        F: Fn(&Request) -> Result<Context, BoxError> + Send + Sync + 'static,
    {
        self.global_context = Some(Box::new(f));
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Honour `X-Forwarded-Proto` / `X-Forwarded-Host` when building the
    /// request URL. Enable only behind a proxy that sets them.
    pub fn trust_proxy(mut self, trust: bool) -> Self {
        self.trust_proxy = trust;
        self
    }
}

impl Default for HandlerOptions {
    fn default() -> Self { Self::new() }
}

// ── RequestHandler ────────────────────────────────────────────────────────────

/// Builds a [`RequestHandler`] around the render handler `build`.
pub fn create_request_handler(build: impl Handler, options: HandlerOptions) -> RequestHandler {
    let HandlerOptions { load_context, global_context, mode, trust_proxy } = options;
    RequestHandler {
        inner: Arc::new(Inner {
            build: build.into_boxed_handler(),
            load_context,
            global_context,
            request: RequestOptions { mode, trust_proxy },
        }),
    }
}

/// Adapts outer requests to the render handler. Cheap to clone.
#[derive(Clone)]
pub struct RequestHandler {
    inner: Arc<Inner>,
}

struct Inner {
    build: BoxedHandler,
    load_context: Option<LoadContextFn>,
    global_context: Option<GlobalContextFn>,
    request: RequestOptions,
}

impl RequestHandler {
    pub fn mode(&self) -> Mode {
        self.inner.request.mode
    }

    /// Bridges one request.
    ///
    /// On success the rendered response has been written to `res` and ended.
    /// On failure `next` receives the error and nothing further is written;
    /// status, headers or chunks already flushed stay flushed.
    pub async fn handle<R, N>(&self, req: OuterRequest, res: &mut R, next: N)
    where
        R: OuterResponse,
        N: FnOnce(Error),
    {
        if let Err(err) = self.try_handle(req, res).await {
            debug!(error = %err, "bridged call failed");
            next(err);
        }
    }

    async fn try_handle<R: OuterResponse>(&self, req: OuterRequest, res: &mut R) -> Result<(), Error> {
        let load_context = match &self.inner.load_context {
            Some(f) => {
                let sink: &dyn OuterResponse = &*res;
                Some(f(&req, sink).map_err(Error::Context)?)
            }
            None => None,
        };

        let (request, controller) = Request::from_outer(req, self.inner.request)?;
        let url = request.url().clone();
        debug!(method = %request.method(), %url, "bridging request");

        let global = self
            .inner
            .global_context
            .as_ref()
            .map(|f| f(&request))
            .transpose()
            .map_err(Error::Context)?;

        let closed = res.closed();
        let work = context::scope(global, async {
            let response = self.invoke(request, load_context).await?;
            send_response(response, &mut *res).await
        });
        tokio::pin!(work);

        // Only a disconnect while `work` is still pending fires the signal.
        // Close is polled first: a dead connection also fails the next write,
        // and that failure must not win over the abort.
        tokio::select! {
            biased;
            () = closed => {
                if controller.abort() {
                    debug!(%url, "connection closed before response finished, request aborted");
                }
                work.await
            }
            result = &mut work => result,
        }
    }

    /// Calls the render handler, turning a panic into [`Error::Panic`].
    async fn invoke(&self, req: Request, ctx: Option<Context>) -> Result<Response, Error> {
        let build = Arc::clone(&self.inner.build);
        // The call itself happens on first poll so a panic before the
        // handler returns its future is caught too.
        let call = async move { build.call(req, ctx).await };
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(result) => result.map_err(Error::Handler),
            Err(payload) => Err(Error::Panic(panic_message(payload.as_ref()))),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&'static str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_reads_string_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    #[test]
    fn explicit_mode_wins_over_env() {
        async fn render(_req: Request, _ctx: Option<Context>) -> Result<Response, BoxError> {
            Ok(Response::text("ok"))
        }
        let handler = create_request_handler(render, HandlerOptions::new().mode(Mode::Test));
        assert_eq!(handler.mode(), Mode::Test);
    }
}
