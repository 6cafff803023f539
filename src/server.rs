//! hyper host for a [`RequestHandler`], with graceful shutdown.
//!
//! This is the outer layer for real traffic: every request becomes an
//! [`OuterRequest`], and a [`HyperResponse`] sink streams whatever the bridge
//! writes back through hyper. Errors the bridge forwards end up in this
//! module's error channel, which logs them and answers `500` if nothing was
//! sent yet.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or Ctrl-C the server:
//! 1. Immediately stops `listener.accept()` — no new connections are made.
//! 2. Lets every in-flight connection task run to completion.
//! 3. Waits for every bridge task still rendering, including those whose
//!    client already went away.
//! 4. Returns from [`Server::serve`], which lets `main` exit cleanly.

use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use hyper::body::{Frame, Incoming, SizeHint};
use hyper::ext::ReasonPhrase;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_util::sync::{CancellationToken, DropGuard};
use tokio_util::task::TaskTracker;
use tracing::{error, info};

use crate::body::{self, Body};
use crate::error::{BoxError, Error};
use crate::handler::RequestHandler;
use crate::outer::{OuterRequest, OuterResponse};

/// Chunks queued between the bridge and hyper before `write` waits.
const BODY_BUFFER: usize = 16;

/// The HTTP server.
pub struct Server {
    listener: Listener,
}

enum Listener {
    Addr(SocketAddr),
    Bound(TcpListener),
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    ///
    /// ```rust,no_run
    /// use ssr_bridge::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self { listener: Listener::Addr(addr) }
    }

    /// Serves on an already bound listener.
    pub fn from_listener(listener: TcpListener) -> Self {
        Self { listener: Listener::Bound(listener) }
    }

    /// Starts accepting connections and bridging them through `handler`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, handler: RequestHandler) -> Result<(), Error> {
        self.serve_with_shutdown(handler, shutdown_signal()).await
    }

    /// Like [`serve`](Server::serve), but stops accepting once `shutdown`
    /// resolves instead of waiting for a process signal.
    pub async fn serve_with_shutdown(
        self,
        handler: RequestHandler,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let listener = match self.listener {
            Listener::Addr(addr) => TcpListener::bind(addr).await?,
            Listener::Bound(listener) => listener,
        };
        let addr = listener.local_addr()?;

        info!(%addr, mode = %handler.mode(), "ssr-bridge listening");

        let mut tasks = tokio::task::JoinSet::new();
        let bridges = TaskTracker::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Check shutdown first so a SIGTERM immediately stops
                // accepting new connections, even if more are queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let handler = handler.clone();
                    let bridges = bridges.clone();
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            dispatch(handler.clone(), bridges.clone(), req, remote_addr)
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}
        bridges.close();
        bridges.wait().await;

        info!("ssr-bridge stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Bridges one hyper request.
///
/// The bridge runs on its own task and keeps writing the body after the head
/// has been handed to hyper. The returned body carries a guard that marks the
/// connection closed if hyper drops it before the end of the stream. A
/// response hyper never sends a body for (HEAD, `204`, `304`) counts as
/// delivered once its head is out.
async fn dispatch(
    handler: RequestHandler,
    bridges: TaskTracker,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<ResponseBody>, Infallible> {
    let closed = CancellationToken::new();
    // Dropped with this future if hyper gives up before the head is ready.
    let guard = closed.clone().drop_guard();

    let discard_body = *req.method() == Method::HEAD;
    let (mut res, head) = HyperResponse::new(closed, discard_body);
    let outer = OuterRequest::from_hyper(req, "http");

    bridges.spawn(async move {
        let mut forwarded = None;
        handler.handle(outer, &mut res, |err| forwarded = Some(err)).await;
        if let Some(err) = forwarded {
            res.fail(err, remote_addr).await;
        }
    });

    let response = head.await.unwrap_or_else(|_| {
        error!(peer = %remote_addr, "bridge task ended without a response");
        internal_error()
    });
    let guard = if skips_body(discard_body, response.status()) {
        let _ = guard.disarm();
        None
    } else {
        Some(guard)
    };
    Ok(response.map(|body| ResponseBody { body, guard }))
}

/// Whether hyper drops the body of this response unread.
fn skips_body(head_request: bool, status: StatusCode) -> bool {
    head_request
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
}

fn internal_error() -> http::Response<Body> {
    let mut res = http::Response::new(body::full("Internal Server Error"));
    *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    res.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    res
}

// ── HyperResponse ─────────────────────────────────────────────────────────────

/// [`OuterResponse`] backed by a hyper response.
///
/// The head is buffered until the first `write` or `end` and then handed to
/// hyper; body chunks follow over a bounded channel.
pub struct HyperResponse {
    status: StatusCode,
    reason: Option<String>,
    headers: HeaderMap,
    head_tx: Option<oneshot::Sender<http::Response<Body>>>,
    body_tx: Option<body::Sender>,
    discard_body: bool,
    closed: CancellationToken,
}

impl HyperResponse {
    /// Creates a sink and the receiver its head will be delivered to.
    ///
    /// `closed` must be cancelled by the owner once the connection can no
    /// longer take the response. With `discard_body` (HEAD requests) chunks
    /// are accepted and dropped, as they are for `204` and `304` responses.
    pub fn new(
        closed: CancellationToken,
        discard_body: bool,
    ) -> (Self, oneshot::Receiver<http::Response<Body>>) {
        let (head_tx, head_rx) = oneshot::channel();
        let res = Self {
            status: StatusCode::OK,
            reason: None,
            headers: HeaderMap::new(),
            head_tx: Some(head_tx),
            body_tx: None,
            discard_body,
            closed,
        };
        (res, head_rx)
    }

    fn send_head(&mut self) -> Result<(), Error> {
        let Some(head_tx) = self.head_tx.take() else {
            return Ok(());
        };

        // hyper drops the body of these unread; chunks would hit a closed
        // channel.
        self.discard_body = skips_body(self.discard_body, self.status);

        let (body_tx, body) = body::channel(BODY_BUFFER);
        let mut response = http::Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = std::mem::take(&mut self.headers);
        if let Some(reason) = self.reason.take().filter(|r| !r.is_empty()) {
            if let Ok(reason) = ReasonPhrase::try_from(reason) {
                response.extensions_mut().insert(reason);
            }
        }

        head_tx
            .send(response)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected"))?;
        self.body_tx = Some(body_tx);
        Ok(())
    }

    /// Default error channel: logs `err`, then answers `500` if the head is
    /// still unsent, or cuts the body stream so hyper resets the connection.
    async fn fail(&mut self, err: Error, remote_addr: SocketAddr) {
        error!(peer = %remote_addr, error = %err, "request failed");

        if let Some(head_tx) = self.head_tx.take() {
            let _ = head_tx.send(internal_error());
        } else if let Some(body_tx) = self.body_tx.take() {
            body_tx.abort(BoxError::from(err.to_string())).await;
        }
    }
}

impl OuterResponse for HyperResponse {
    fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn set_status_message(&mut self, message: &str) {
        self.reason = Some(message.to_owned());
    }

    fn append_header(&mut self, name: &HeaderName, value: &HeaderValue) {
        self.headers.append(name.clone(), value.clone());
    }

    fn headers_sent(&self) -> bool {
        self.head_tx.is_none()
    }

    fn write(&mut self, chunk: Bytes) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(async move {
            self.send_head()?;
            if self.discard_body {
                return Ok(());
            }
            match &self.body_tx {
                Some(tx) => tx.send(chunk).await,
                None => Err(Error::body("write after end")),
            }
        })
    }

    fn end(&mut self) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(async move {
            self.send_head()?;
            // Dropping the sender ends the body stream.
            self.body_tx = None;
            Ok(())
        })
    }

    fn closed(&self) -> BoxFuture<'static, ()> {
        let token = self.closed.clone();
        Box::pin(async move { token.cancelled().await })
    }
}

// ── ResponseBody ──────────────────────────────────────────────────────────────

/// Response body handed to hyper. Marks the connection closed when dropped
/// before its last frame.
pub struct ResponseBody {
    // Dropped before `body` so the close is visible to whoever the dropped
    // receiver wakes.
    guard: Option<DropGuard>,
    body: Body,
}

impl hyper::body::Body for ResponseBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, BoxError>>> {
        let poll = hyper::body::Body::poll_frame(Pin::new(&mut self.body), cx);
        let finished = match &poll {
            Poll::Ready(None) => true,
            Poll::Ready(Some(Ok(_))) => hyper::body::Body::is_end_stream(&self.body),
            _ => false,
        };
        if finished {
            if let Some(guard) = self.guard.take() {
                let _ = guard.disarm();
            }
        }
        poll
    }

    fn is_end_stream(&self) -> bool {
        hyper::body::Body::is_end_stream(&self.body)
    }

    fn size_hint(&self) -> SizeHint {
        hyper::body::Body::size_hint(&self.body)
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or Ctrl-C (Ctrl-C only on non-Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn head_is_sent_on_first_write_with_reason() {
        let (mut res, head) = HyperResponse::new(CancellationToken::new(), false);
        res.set_status(StatusCode::NOT_FOUND);
        res.set_status_message("Nothing Here");
        res.append_header(&HeaderName::from_static("set-cookie"), &HeaderValue::from_static("a=1"));
        res.append_header(&HeaderName::from_static("set-cookie"), &HeaderValue::from_static("b=2"));
        assert!(!res.headers_sent());

        let writer = tokio::spawn(async move {
            res.write(Bytes::from_static(b"missing")).await.unwrap();
            res.end().await.unwrap();
            res
        });

        let response = head.await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.extensions().get::<ReasonPhrase>().map(|r| r.as_bytes()),
            Some(&b"Nothing Here"[..])
        );
        assert_eq!(response.headers().get_all("set-cookie").iter().count(), 2);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"missing");
        assert!(writer.await.unwrap().headers_sent());
    }

    #[tokio::test]
    async fn write_after_end_fails() {
        let (mut res, _head) = HyperResponse::new(CancellationToken::new(), false);
        res.end().await.unwrap();
        assert!(matches!(res.write(Bytes::from_static(b"x")).await, Err(Error::Body(_))));
    }

    #[tokio::test]
    async fn head_requests_discard_chunks() {
        let (mut res, head) = HyperResponse::new(CancellationToken::new(), true);
        res.write(Bytes::from_static(b"ignored")).await.unwrap();
        res.end().await.unwrap();

        let bytes = head.await.unwrap().into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn no_content_discards_chunks() {
        let (mut res, head) = HyperResponse::new(CancellationToken::new(), false);
        res.set_status(StatusCode::NO_CONTENT);
        res.write(Bytes::from_static(b"ignored")).await.unwrap();
        drop(head);
        // The receiver is gone, yet the chunk is never sent to it.
        res.write(Bytes::from_static(b"still ignored")).await.unwrap();
        res.end().await.unwrap();
    }

    #[test]
    fn bodiless_responses() {
        assert!(skips_body(true, StatusCode::OK));
        assert!(skips_body(false, StatusCode::NO_CONTENT));
        assert!(skips_body(false, StatusCode::NOT_MODIFIED));
        assert!(!skips_body(false, StatusCode::OK));
        assert!(!skips_body(false, StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn body_drained_to_the_end_is_not_a_close() {
        let token = CancellationToken::new();
        let body = ResponseBody { body: body::full("done"), guard: Some(token.clone().drop_guard()) };
        let bytes = body.collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"done");
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn body_dropped_early_is_a_close() {
        let token = CancellationToken::new();
        let (_tx, rx) = body::channel(1);
        let body = ResponseBody { body: rx, guard: Some(token.clone().drop_guard()) };
        drop(body);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn fail_before_head_answers_500() {
        let (mut res, head) = HyperResponse::new(CancellationToken::new(), false);
        res.fail(Error::Panic("boom".to_owned()), "127.0.0.1:1".parse().unwrap()).await;
        assert_eq!(head.await.unwrap().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn closed_follows_token() {
        let token = CancellationToken::new();
        let (res, _head) = HyperResponse::new(token.clone(), false);
        let closed = res.closed();
        token.cancel();
        closed.await;
    }
}
