//! Database trait for reading graph values.

use std::sync::Arc;

use crate::GraphError;

/// Anything that can read a value by layer and key.
///
/// This trait is implemented by both [`GraphRuntime`](crate::GraphRuntime) and
/// [`RuleContext`](crate::RuleContext), allowing helpers to work with either.
///
/// - `GraphRuntime::get_value()`: No dependency tracking
/// - `RuleContext::get_value()`: With dependency tracking
///
/// # Example
///
/// ```
/// use layer_flow::{Db, GraphError, GraphRuntime};
///
/// fn line_count(db: &mut impl Db, file: &str) -> Result<usize, GraphError> {
///     Ok(db.get_value::<String>("FILE", file)?.lines().count())
/// }
///
/// let mut runtime = GraphRuntime::builder()
///     .source::<String>("FILE")
///     .derived("LINES", |ctx, key| line_count(ctx, key))
///     .build();
///
/// runtime.set_input("FILE", "a.txt", "one\ntwo".to_string()).unwrap();
/// assert_eq!(line_count(&mut runtime, "a.txt").unwrap(), 2);
/// assert_eq!(*runtime.get_value::<usize>("LINES", "a.txt").unwrap(), 2);
/// ```
pub trait Db {
    /// Resolve `(layer, key)` and return its value.
    fn get_value<V: Send + Sync + 'static>(
        &mut self,
        layer: &str,
        key: &str,
    ) -> Result<Arc<V>, GraphError>;
}
