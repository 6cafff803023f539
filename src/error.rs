//! Unified error type.

/// Opaque error crossing the handler boundary.
///
/// Render handlers and context hooks return whatever error type suits them;
/// the bridge only needs to carry it to the outer error channel.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Everything that can abort a bridged call.
///
/// None of these are retried. Every variant ends the current invocation and
/// is handed to the outer layer's `next` callback.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The origin synthesised from protocol and host, or the path joined onto
    /// it, did not form a valid absolute URL.
    #[error("invalid request url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid header `{name}`")]
    InvalidHeader { name: String },

    /// A `load_context` or `global_context` hook failed.
    #[error("context: {0}")]
    Context(#[source] BoxError),

    /// The render handler returned an error.
    #[error("handler: {0}")]
    Handler(#[source] BoxError),

    /// The render handler panicked. The payload is kept when it was a string.
    #[error("handler panicked: {0}")]
    Panic(String),

    /// Reading the inner response body failed, or the outer sink rejected a chunk.
    #[error("body: {0}")]
    Body(#[source] BoxError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn body(e: impl Into<BoxError>) -> Self {
        Self::Body(e.into())
    }
}
