//! Request-scoped and process-wide context values.
//!
//! Both kinds are plain [`Context`] values. The difference is delivery:
//!
//! - the **load context** is handed to the render handler as an argument;
//! - the **global context** is published in a tokio task-local for exactly
//!   the duration of one handler future and read back with
//!   [`global_context`] from anywhere inside it.
//!
//! ```rust
//! use ssr_bridge::{Context, global_context_as};
//!
//! struct Tenant(&'static str);
//!
//! # async fn render() {
//! // somewhere deep inside a render handler:
//! if let Some(tenant) = global_context_as::<Tenant>() {
//!     println!("rendering for {}", tenant.0);
//! }
//! # }
//! # let _ = Context::new(Tenant("acme"));
//! ```
//!
//! The task-local is tied to the handler future, not to a thread. Two
//! requests interleaved on the same worker never see each other's value.
//! Work moved onto another task with `tokio::spawn` does not inherit it.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A type-erased, cheaply clonable value.
#[derive(Clone)]
pub struct Context(Arc<dyn Any + Send + Sync>);

impl Context {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Borrows the value if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Returns a shared handle to the value if it is a `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.0).downcast::<T>().ok()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Context(..)")
    }
}

tokio::task_local! {
    static GLOBAL_CONTEXT: Option<Context>;
}

/// The global context published for the handler currently running, if any.
///
/// Returns `None` outside a bridged handler, and inside one when no
/// `global_context` hook was configured.
pub fn global_context() -> Option<Context> {
    GLOBAL_CONTEXT.try_with(|ctx| ctx.clone()).ok().flatten()
}

/// [`global_context`] downcast to `T`.
pub fn global_context_as<T: Any + Send + Sync>() -> Option<Arc<T>> {
    global_context()?.downcast::<T>()
}

/// Runs `fut` with `value` published as the global context.
///
/// A `None` value still opens a scope, hiding any value published further
/// up the same task.
pub(crate) async fn scope<F: Future>(value: Option<Context>, fut: F) -> F::Output {
    GLOBAL_CONTEXT.scope(value, fut).await
}
