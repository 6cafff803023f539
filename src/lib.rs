//! # ssr-bridge
//!
//! Glue between a hyper-hosted HTTP layer and a server-side rendering
//! handler. Nothing more. Nothing less.
//!
//! ## The contract
//!
//! The outer layer owns sockets, routing and error pages. The render handler
//! owns loaders, actions and markup. The bridge only translates between them:
//!
//! - **Request** — method, absolute URL (`{protocol}://{host}{path}`),
//!   headers, and the body stream moved across unbuffered (none for GET/HEAD)
//! - **Abort signal** — fires when the client disconnects before the response
//!   has been delivered
//! - **Response** — status, reason phrase, every header value (repeated
//!   `set-cookie` lines stay separate), and the body streamed chunk by chunk
//! - **Context** — a per-request value passed to the handler, and a global
//!   value readable through [`global_context`] while the handler runs
//! - **Errors** — handed to the outer layer's `next`, never raised across it
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use ssr_bridge::{BoxError, Context, HandlerOptions, Request, Response, Server, create_request_handler};
//!
//! #[tokio::main]
//! async fn main() {
//!     let handler = create_request_handler(render, HandlerOptions::new());
//!     Server::bind("0.0.0.0:3000").serve(handler).await.unwrap();
//! }
//!
//! async fn render(req: Request, _ctx: Option<Context>) -> Result<Response, BoxError> {
//!     Ok(Response::html(format!("<h1>{}</h1>", req.url().path())))
//! }
//! ```

mod body;
mod context;
mod error;
mod handler;
mod headers;
mod mode;
mod outer;
mod request;
mod response;
mod server;
mod signal;

pub use body::{Body, Sender, boxed, channel, empty, full};
pub use context::{Context, global_context, global_context_as};
pub use error::{BoxError, Error};
pub use handler::{Handler, HandlerOptions, RequestHandler, create_request_handler};
pub use headers::{HeaderEntry, OuterHeaders};
pub use mode::{MODE_ENV, Mode};
pub use outer::{OuterRequest, OuterResponse};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use server::{HyperResponse, ResponseBody, Server};
pub use signal::{AbortController, AbortSignal};
