//! Recording outer response shared by the integration tests.

#![allow(dead_code)]

use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::StatusCode;
use http::header::{HeaderName, HeaderValue};
use ssr_bridge::{Error, OuterResponse};
use tokio_util::sync::CancellationToken;

/// Remembers everything the bridge did to it.
#[derive(Default)]
pub struct MockResponse {
    pub status: Option<StatusCode>,
    pub message: Option<String>,
    pub headers: Vec<(String, String)>,
    pub chunks: Vec<Bytes>,
    pub ended: bool,
    pub closed: CancellationToken,
    /// Makes `write` fail once `closed` is cancelled, like a dead socket.
    pub fail_writes_after_close: bool,
}

impl MockResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values of header `name`, in the order they were appended.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn body(&self) -> Vec<u8> {
        self.chunks.concat()
    }

    /// `true` if the bridge never touched this response.
    pub fn untouched(&self) -> bool {
        self.status.is_none()
            && self.message.is_none()
            && self.headers.is_empty()
            && self.chunks.is_empty()
            && !self.ended
    }
}

impl OuterResponse for MockResponse {
    fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    fn set_status_message(&mut self, message: &str) {
        self.message = Some(message.to_owned());
    }

    fn append_header(&mut self, name: &HeaderName, value: &HeaderValue) {
        self.headers
            .push((name.as_str().to_owned(), value.to_str().unwrap().to_owned()));
    }

    fn headers_sent(&self) -> bool {
        !self.chunks.is_empty() || self.ended
    }

    fn write(&mut self, chunk: Bytes) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(async move {
            if self.fail_writes_after_close && self.closed.is_cancelled() {
                return Err(Error::Body("connection closed".into()));
            }
            self.chunks.push(chunk);
            Ok(())
        })
    }

    fn end(&mut self) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(async move {
            self.ended = true;
            Ok(())
        })
    }

    fn closed(&self) -> BoxFuture<'static, ()> {
        let token = self.closed.clone();
        Box::pin(async move { token.cancelled().await })
    }
}
