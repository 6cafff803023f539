//! Inner response type, the [`IntoResponse`] conversion trait, and the
//! translation of an inner response onto the outer sink.
//!
//! Render handlers build a [`Response`] and return it. The bridge copies the
//! status line and every header value across, then streams the body.

use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use http_body_util::BodyExt;

use crate::body::{self, Body};
use crate::error::Error;
use crate::outer::OuterResponse;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`ResponseBuilder::bytes`].
pub enum ContentType {
    EventStream,  // text/event-stream  (SSE)
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    OctetStream,  // application/octet-stream
    Text,         // text/plain; charset=utf-8
}

impl ContentType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::EventStream => "text/event-stream",
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// A response produced by the render handler.
///
/// # Shortcuts (200 OK)
///
/// ```rust
/// use ssr_bridge::Response;
/// use http::StatusCode;
///
/// Response::html("<h1>hello</h1>");
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::status(StatusCode::NO_CONTENT);
/// ```
///
/// # Builder
///
/// ```rust
/// use ssr_bridge::{ContentType, Response};
/// use http::StatusCode;
///
/// Response::builder()
///     .status(StatusCode::NOT_FOUND)
///     .status_text("Nothing Here")
///     .header("set-cookie", "a=1")
///     .header("set-cookie", "b=2")
///     .bytes(ContentType::Html, b"<p>missing</p>".to_vec());
/// ```
pub struct Response {
    pub(crate) status: StatusCode,
    pub(crate) status_text: Option<String>,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<Body>,
}

impl Response {
    /// `200 OK` — `text/html; charset=utf-8`.
    pub fn html(body: impl Into<String>) -> Self {
        Self::builder().bytes(ContentType::Html, body.into().into_bytes())
    }

    /// `200 OK` — `application/json`.
    pub fn json(body: Vec<u8>) -> Self {
        Self::builder().bytes(ContentType::Json, body)
    }

    /// `200 OK` — `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().bytes(ContentType::Text, body.into().into_bytes())
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self { status: code, status_text: None, headers: HeaderMap::new(), body: None }
    }

    /// Builder for responses that need a custom status, reason or headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { status: StatusCode::OK, status_text: None, headers: HeaderMap::new() }
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn has_body(&self) -> bool { self.body.is_some() }

    /// The reason phrase: the one set explicitly, else the canonical one
    /// for the status code, else empty.
    pub fn status_text(&self) -> &str {
        self.status_text
            .as_deref()
            .or_else(|| self.status.canonical_reason())
            .unwrap_or("")
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`.
/// Terminated by a body method — or [`no_body`](Self::no_body).
pub struct ResponseBuilder {
    status: StatusCode,
    status_text: Option<String>,
    headers: HeaderMap,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    /// Overrides the canonical reason phrase.
    pub fn status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = Some(text.into());
        self
    }

    /// Appends a header value. Repeated names keep every value.
    ///
    /// # Panics
    ///
    /// Panics if `name` or `value` is not a valid header name / value.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        let name = HeaderName::from_bytes(name.as_bytes())
            .unwrap_or_else(|e| panic!("invalid header name `{name}`: {e}"));
        let value = HeaderValue::from_str(value)
            .unwrap_or_else(|e| panic!("invalid value for header `{name}`: {e}"));
        self.headers.append(name, value);
        self
    }

    /// Terminate with a typed, fully buffered body.
    pub fn bytes(mut self, content_type: ContentType, body: Vec<u8>) -> Response {
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type.as_str()));
        self.finish(Some(body::full(body)))
    }

    /// Terminate with a streaming body. Set `content-type` via [`header`](Self::header).
    pub fn stream(self, body: Body) -> Response {
        self.finish(Some(body))
    }

    /// Terminate with no body (e.g. `204 No Content`, redirects).
    pub fn no_body(self) -> Response {
        self.finish(None)
    }

    fn finish(self, body: Option<Body>) -> Response {
        Response { status: self.status, status_text: self.status_text, headers: self.headers, body }
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into a [`Response`].
///
/// Implement on your own types to return them directly from render handlers.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::html(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::html(self) }
}

/// Return a bare status from a handler: `return Ok(StatusCode::NOT_FOUND)`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

// ── Translation onto the outer sink ───────────────────────────────────────────

/// Copies `res` onto `outer` and drains its body into it.
///
/// Every header value is appended on its own, so repeated headers such as
/// `set-cookie` reach the client as separate lines. A response without a
/// body is ended right away with nothing written.
///
/// Every non-empty data frame becomes one `write`. Empty data frames carry
/// nothing for the client and are skipped, as are trailers.
pub(crate) async fn send_response<R>(res: Response, outer: &mut R) -> Result<(), Error>
where
    R: OuterResponse + ?Sized,
{
    outer.set_status(res.status);
    outer.set_status_message(res.status_text());
    for (name, value) in &res.headers {
        outer.append_header(name, value);
    }

    if let Some(mut body) = res.body {
        while let Some(frame) = body.frame().await {
            if let Ok(chunk) = frame.map_err(Error::Body)?.into_data() {
                if !chunk.is_empty() {
                    outer.write(chunk).await?;
                }
            }
        }
    }

    outer.end().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text_defaults_to_canonical_reason() {
        assert_eq!(Response::status(StatusCode::NOT_FOUND).status_text(), "Not Found");
        let custom = Response::builder().status_text("Gone Fishing").no_body();
        assert_eq!(custom.status_text(), "Gone Fishing");
    }

    #[test]
    fn builder_keeps_repeated_headers() {
        let res = Response::builder()
            .header("set-cookie", "a=1")
            .header("set-cookie", "b=2")
            .no_body();
        let cookies: Vec<_> = res.headers().get_all("set-cookie").iter().collect();
        assert_eq!(cookies, ["a=1", "b=2"]);
        assert!(!res.has_body());
    }

    #[test]
    fn shortcuts_set_content_type() {
        let res = Response::html("<p>hi</p>");
        assert_eq!(res.headers()[CONTENT_TYPE], "text/html; charset=utf-8");
        assert_eq!(res.status_code(), StatusCode::OK);
        assert!(res.has_body());
    }

    #[test]
    #[should_panic(expected = "invalid header name")]
    fn builder_rejects_bad_header_name() {
        let _ = Response::builder().header("bad name", "v");
    }
}
