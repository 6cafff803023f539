//! Streaming body shared by the inner request and response.
//!
//! Bodies are never buffered by the bridge. An outer request body is moved
//! into the inner request as-is, and an inner response body is drained frame
//! by frame into the outer sink.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::{Frame, SizeHint};
use tokio::sync::mpsc;

use crate::error::{BoxError, Error};

/// A type-erased body stream of [`Bytes`] chunks.
pub type Body = UnsyncBoxBody<Bytes, BoxError>;

/// Boxes any `http_body::Body` into a [`Body`].
pub fn boxed<B>(body: B) -> Body
where
    B: hyper::body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    body.map_err(Into::into).boxed_unsync()
}

/// A body holding `bytes` in a single frame.
pub fn full(bytes: impl Into<Bytes>) -> Body {
    boxed(Full::new(bytes.into()))
}

pub fn empty() -> Body {
    boxed(Empty::<Bytes>::new())
}

/// Creates a streaming body fed through the returned [`Sender`].
///
/// The body ends when every `Sender` is dropped. `buffer` bounds how many
/// chunks may be queued before [`Sender::send`] waits for the reader.
pub fn channel(buffer: usize) -> (Sender, Body) {
    let (tx, rx) = mpsc::channel(buffer);
    (Sender { tx }, boxed(ChannelBody { rx }))
}

/// Write half of a [`channel`] body.
#[derive(Clone, Debug)]
pub struct Sender {
    tx: mpsc::Sender<Result<Bytes, BoxError>>,
}

impl Sender {
    /// Queues one chunk. Fails once the reading side is gone.
    pub async fn send(&self, chunk: impl Into<Bytes>) -> Result<(), Error> {
        self.tx
            .send(Ok(chunk.into()))
            .await
            .map_err(|_| Error::body("body receiver dropped"))
    }

    /// Terminates the stream with an error instead of a clean end.
    pub async fn abort(&self, err: impl Into<BoxError>) {
        let _ = self.tx.send(Err(err.into())).await;
    }

    /// Resolves when the reading side has been dropped.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

struct ChannelBody {
    rx: mpsc::Receiver<Result<Bytes, BoxError>>,
}

impl hyper::body::Body for ChannelBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, BoxError>>> {
        self.rx
            .poll_recv(cx)
            .map(|chunk| chunk.map(|res| res.map(Frame::data)))
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::default()
    }
}
