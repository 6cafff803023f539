//! Minimal ssr-bridge example: a streaming "render" handler behind hyper.
//!
//! Run with:
//!   RUST_LOG=debug SSR_BRIDGE_MODE=development cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/users/42
//!   curl -i -H 'x-tenant: acme' http://localhost:3000/
//!   curl -i -X POST http://localhost:3000/echo -d 'hello'

use http::StatusCode;
use http_body_util::BodyExt;
use ssr_bridge::{
    BoxError, Context, HandlerOptions, Request, Response, Server, create_request_handler,
    global_context_as,
};

/// Process-wide value every render can reach via `global_context_as`.
struct Tenant(String);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let options = HandlerOptions::new()
        .trust_proxy(true)
        .load_context(|req, _res| Ok(Context::new(req.original_url().to_owned())))
        .global_context(|req| {
            let tenant = req.header("x-tenant").unwrap_or("public").to_owned();
            Ok(Context::new(Tenant(tenant)))
        });

    let handler = create_request_handler(render, options);

    Server::bind("0.0.0.0:3000")
        .serve(handler)
        .await
        .expect("server error");
}

async fn render(mut req: Request, ctx: Option<Context>) -> Result<Response, BoxError> {
    if req.url().path() == "/echo" {
        let Some(body) = req.take_body() else {
            return Ok(Response::status(StatusCode::BAD_REQUEST));
        };
        let bytes = body.collect().await?.to_bytes();
        return Ok(Response::text(String::from_utf8_lossy(&bytes).into_owned()));
    }

    let tenant = global_context_as::<Tenant>().map_or_else(|| "nobody".to_owned(), |t| t.0.clone());
    let original = ctx
        .as_ref()
        .and_then(|c| c.downcast_ref::<String>())
        .cloned()
        .unwrap_or_default();

    // Stream the page in pieces; the bridge forwards each chunk as it comes.
    let (tx, body) = ssr_bridge::channel(4);
    let signal = req.signal().clone();
    tokio::spawn(async move {
        for part in [
            "<!doctype html><html><body>".to_owned(),
            format!("<h1>Hello, {tenant}</h1>"),
            format!("<p>you asked for {original}</p>"),
            "</body></html>".to_owned(),
        ] {
            if signal.aborted() || tx.send(part).await.is_err() {
                break;
            }
        }
    });

    Ok(Response::builder()
        .header("content-type", "text/html; charset=utf-8")
        .stream(body))
}
