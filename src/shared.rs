//! Thread-safe handle around a [`GraphRuntime`].

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::GraphError;
use crate::key::NodeId;
use crate::revision::LogicalTime;
use crate::runtime::{GraphRuntime, Polled};

/// A cloneable handle that serializes every call to one [`GraphRuntime`].
///
/// The runtime itself is single-threaded. This handle holds it behind a single
/// mutex, so each `set_input` or `get_value` runs to completion before the next
/// one starts, whichever thread issues it.
///
/// This is cheap to clone - the runtime is behind `Arc`.
///
/// # Example
///
/// ```
/// use layer_flow::{GraphRuntime, SharedGraphRuntime};
///
/// let runtime = SharedGraphRuntime::new(
///     GraphRuntime::builder()
///         .source::<i64>("N")
///         .derived("SQUARE", |ctx, key| {
///             let n = *ctx.get_value::<i64>("N", key)?;
///             Ok(n * n)
///         })
///         .build(),
/// );
///
/// runtime.set_input("N", "a", 7i64).unwrap();
/// let handle = runtime.clone();
/// let square = std::thread::spawn(move || *handle.get_value::<i64>("SQUARE", "a").unwrap())
///     .join()
///     .unwrap();
/// assert_eq!(square, 49);
/// ```
#[derive(Clone, Debug)]
pub struct SharedGraphRuntime {
    inner: Arc<Mutex<GraphRuntime>>,
}

impl SharedGraphRuntime {
    /// Wrap a runtime.
    pub fn new(runtime: GraphRuntime) -> Self {
        Self {
            inner: Arc::new(Mutex::new(runtime)),
        }
    }

    /// See [`GraphRuntime::set_input`].
    pub fn set_input<V: Send + Sync + 'static>(
        &self,
        layer: &str,
        key: &str,
        value: V,
    ) -> Result<(), GraphError> {
        self.inner.lock().set_input(layer, key, value)
    }

    /// See [`GraphRuntime::get_value`].
    pub fn get_value<V: Send + Sync + 'static>(
        &self,
        layer: &str,
        key: &str,
    ) -> Result<Arc<V>, GraphError> {
        self.inner.lock().get_value(layer, key)
    }

    /// See [`GraphRuntime::poll`].
    pub fn poll<V: Send + Sync + 'static>(
        &self,
        layer: &str,
        key: &str,
    ) -> Result<Polled<Arc<V>>, GraphError> {
        self.inner.lock().poll(layer, key)
    }

    /// See [`GraphRuntime::now`].
    pub fn now(&self) -> LogicalTime {
        self.inner.lock().now()
    }

    /// See [`GraphRuntime::dependencies`].
    pub fn dependencies(&self, layer: &str, key: &str) -> Option<Vec<NodeId>> {
        self.inner.lock().dependencies(layer, key)
    }

    /// Run several operations under one lock acquisition.
    pub fn with<R>(&self, f: impl FnOnce(&mut GraphRuntime) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

impl From<GraphRuntime> for SharedGraphRuntime {
    fn from(runtime: GraphRuntime) -> Self {
        Self::new(runtime)
    }
}
