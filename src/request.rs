//! Inner request handed to the render handler.

use http::{HeaderMap, Method};
use url::Url;

use crate::body::Body;
use crate::error::Error;
use crate::mode::Mode;
use crate::outer::OuterRequest;
use crate::signal::{AbortController, AbortSignal};

/// Settings that shape how an inner request is built.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct RequestOptions {
    pub(crate) mode: Mode,
    pub(crate) trust_proxy: bool,
}

/// The request seen by the render handler.
pub struct Request {
    pub(crate) url: Url,
    pub(crate) method: Method,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<Body>,
    pub(crate) signal: AbortSignal,
    pub(crate) mode: Mode,
}

impl Request {
    /// Builds the inner request from the outer one.
    ///
    /// The URL is the outer path joined onto `{protocol}://{host}`. The body
    /// is moved across untouched, except for GET and HEAD which never carry
    /// one. The returned controller owns the request's abort signal.
    pub(crate) fn from_outer(
        outer: OuterRequest,
        options: RequestOptions,
    ) -> Result<(Self, AbortController), Error> {
        let (protocol, host) = origin_parts(&outer, options.trust_proxy);
        let origin = format!("{protocol}://{host}");
        let url = Url::parse(&origin)
            .and_then(|base| base.join(&outer.original_url))
            .map_err(|source| Error::InvalidUrl {
                url: format!("{origin}{}", outer.original_url),
                source,
            })?;

        let headers = outer.headers.to_header_map()?;
        let body = match outer.method {
            Method::GET | Method::HEAD => None,
            _ => Some(outer.body),
        };

        let controller = AbortController::new();
        let req = Self {
            url,
            method: outer.method,
            headers,
            body,
            signal: controller.signal(),
            mode: options.mode,
        };
        Ok((req, controller))
    }

    pub fn url(&self) -> &Url { &self.url }
    pub fn method(&self) -> &Method { &self.method }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn signal(&self) -> &AbortSignal { &self.signal }
    pub fn mode(&self) -> Mode { self.mode }

    /// Case-insensitive header lookup. Returns the first value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Takes the body stream, leaving `None` behind.
    pub fn take_body(&mut self) -> Option<Body> {
        self.body.take()
    }
}

/// Protocol and host the origin is built from.
///
/// With `trust_proxy`, `X-Forwarded-Proto` (first hop) and
/// `X-Forwarded-Host` take precedence over the connection's own values.
fn origin_parts(outer: &OuterRequest, trust_proxy: bool) -> (&str, &str) {
    let forwarded = move |name: &'static str| {
        trust_proxy
            .then(|| outer.header_value(name))
            .flatten()
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    let protocol = forwarded("x-forwarded-proto").unwrap_or(&outer.protocol);
    let host = forwarded("x-forwarded-host")
        .or_else(|| outer.header_value("host"))
        .unwrap_or_default();
    (protocol, host)
}
