//! One-shot abort signal tied to the client connection.
//!
//! The bridge owns the [`AbortController`]; the render handler only sees the
//! [`AbortSignal`] on its [`Request`](crate::Request). Once aborted a signal
//! stays aborted. Halting in-flight work is up to whoever observes it.

use tokio_util::sync::CancellationToken;

/// Fires the signal of one inner request.
#[derive(Debug, Default)]
pub struct AbortController {
    token: CancellationToken,
}

impl AbortController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) -> AbortSignal {
        AbortSignal { token: self.token.clone() }
    }

    /// Aborts the signal. Returns `true` only for the call that performed
    /// the transition.
    pub fn abort(&self) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.token.cancel();
        true
    }
}

/// Observer side of an [`AbortController`].
#[derive(Clone, Debug)]
pub struct AbortSignal {
    token: CancellationToken,
}

impl AbortSignal {
    pub fn aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the signal is aborted. Never resolves otherwise.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// A child token for handing the signal to `tokio_util`-aware code.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}
