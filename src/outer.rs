//! The outer (middleware-layer) side of the bridge.
//!
//! [`OuterRequest`] is what the hosting layer hands in; [`OuterResponse`] is
//! the sink the bridge writes the rendered result to. The hyper host in
//! [`server`](crate::Server) provides both, and tests can provide their own
//! response sink.

use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::header::{HeaderName, HeaderValue};
use http::{Extensions, Method};

use crate::body::{self, Body};
use crate::error::Error;
use crate::headers::{HeaderEntry, OuterHeaders};

/// An incoming request as the middleware layer sees it.
pub struct OuterRequest {
    pub(crate) method: Method,
    pub(crate) protocol: String,
    pub(crate) original_url: String,
    pub(crate) headers: OuterHeaders,
    pub(crate) body: Body,
    pub(crate) extensions: Extensions,
}

impl OuterRequest {
    /// A request for `original_url` (path and query) over plain `http`, with
    /// no headers and an empty body.
    pub fn new(method: Method, original_url: impl Into<String>) -> Self {
        Self {
            method,
            protocol: "http".to_owned(),
            original_url: original_url.into(),
            headers: OuterHeaders::new(),
            body: body::empty(),
            extensions: Extensions::new(),
        }
    }

    /// Adapts a hyper request.
    ///
    /// `protocol` is the scheme the client used to reach the host, normally
    /// `"http"` behind a TLS-terminating proxy. When the request carries no
    /// `host` header (HTTP/2), the URI authority stands in for it.
    pub fn from_hyper<B>(req: http::Request<B>, protocol: &str) -> Self
    where
        B: hyper::body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<crate::error::BoxError>,
    {
        let (parts, incoming) = req.into_parts();
        let mut headers = OuterHeaders::from_header_map(&parts.headers);
        if headers.get("host").is_none() {
            if let Some(authority) = parts.uri.authority() {
                headers.push("host", authority.as_str());
            }
        }
        let original_url = parts
            .uri
            .path_and_query()
            .map_or("/", |pq| pq.as_str())
            .to_owned();

        Self {
            method: parts.method,
            protocol: protocol.to_owned(),
            original_url,
            headers,
            body: body::boxed(incoming),
            extensions: parts.extensions,
        }
    }

    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, entry: impl Into<HeaderEntry>) -> Self {
        self.headers.push(name, entry);
        self
    }

    pub fn headers(mut self, headers: OuterHeaders) -> Self {
        self.headers = headers;
        self
    }

    pub fn body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn scheme(&self) -> &str { &self.protocol }
    pub fn original_url(&self) -> &str { &self.original_url }
    pub fn header_entries(&self) -> &OuterHeaders { &self.headers }
    pub fn extensions(&self) -> &Extensions { &self.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }

    /// First value of header `name`, case-insensitive.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(HeaderEntry::first)
    }
}

/// The response sink of the middleware layer.
///
/// Status and headers are buffered until the first [`write`](Self::write) or
/// [`end`](Self::end), after which [`headers_sent`](Self::headers_sent)
/// reports `true` and further head changes have no effect.
pub trait OuterResponse: Send {
    fn set_status(&mut self, status: http::StatusCode);

    /// Sets the reason phrase sent with the status line.
    fn set_status_message(&mut self, message: &str);

    /// Adds one header value, keeping any values already present.
    fn append_header(&mut self, name: &HeaderName, value: &HeaderValue);

    fn headers_sent(&self) -> bool;

    /// Sends one body chunk, flushing the head first if needed.
    fn write(&mut self, chunk: Bytes) -> BoxFuture<'_, Result<(), Error>>;

    /// Finishes the response.
    fn end(&mut self) -> BoxFuture<'_, Result<(), Error>>;

    /// Resolves when the underlying connection closes, whether or not the
    /// response was finished first.
    fn closed(&self) -> BoxFuture<'static, ()>;
}
