//! Value equality functions for layers.
//!
//! Early cutoff compares a freshly computed value against the cached one with the
//! layer's equality function. By default that is `PartialEq::eq`. The helpers here
//! can be passed to [`GraphRuntimeBuilder::source_with_eq`] or
//! [`GraphRuntimeBuilder::derived_with_eq`] when the value type is `Result<T, E>`
//! and `E` does not implement `PartialEq`.
//!
//! [`GraphRuntimeBuilder::source_with_eq`]: crate::GraphRuntimeBuilder::source_with_eq
//! [`GraphRuntimeBuilder::derived_with_eq`]: crate::GraphRuntimeBuilder::derived_with_eq

use std::any::Any;
use std::sync::Arc;

/// Function type for comparing two values of a layer.
pub type ValueEq<V> = fn(&V, &V) -> bool;

/// Type-erased equality stored in the layer registry.
pub(crate) type ErasedEq = Arc<dyn Fn(&dyn Any, &dyn Any) -> bool + Send + Sync>;

/// Erase a typed equality function. Values of a different type never compare equal.
pub(crate) fn erase<V: 'static>(eq: ValueEq<V>) -> ErasedEq {
    Arc::new(move |old: &dyn Any, new: &dyn Any| {
        match (old.downcast_ref::<V>(), new.downcast_ref::<V>()) {
            (Some(old), Some(new)) => eq(old, new),
            _ => false,
        }
    })
}

/// Compare with `PartialEq`. This is the default for every layer.
pub fn partial_eq<V: PartialEq>(a: &V, b: &V) -> bool {
    a == b
}

/// Compare only the `Ok` values. Returns `false` for any `Err` case,
/// causing downstream rules to be re-run.
///
/// # Example
/// ```
/// use layer_flow::{output_eq, GraphRuntime};
///
/// let runtime = GraphRuntime::builder()
///     .source::<String>("TEXT")
///     .derived_with_eq(
///         "PARSED",
///         |ctx, key| {
///             let text = ctx.get_value::<String>("TEXT", key)?;
///             Ok(text.trim().parse::<i64>())
///         },
///         output_eq::ok_or_invalidate,
///     )
///     .build();
/// # let _ = runtime;
/// ```
pub fn ok_or_invalidate<T: PartialEq, E>(a: &Result<T, E>, b: &Result<T, E>) -> bool {
    match (a, b) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Compare `Ok` values for equality, treat all `Err` as equal.
///
/// Use this when you want to suppress downstream recomputation if both values are
/// errors, regardless of the error content.
pub fn ignore_err<T: PartialEq, E>(a: &Result<T, E>, b: &Result<T, E>) -> bool {
    match (a, b) {
        (Ok(a), Ok(b)) => a == b,
        (Err(_), Err(_)) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_erased_eq_compares_structurally() {
        let eq = erase::<Vec<String>>(partial_eq);
        let a = vec!["x".to_string(), "y".to_string()];
        let b = vec!["x".to_string(), "y".to_string()];
        let c = vec!["x".to_string()];
        assert!(eq(&a, &b));
        assert!(!eq(&a, &c));
    }

    #[test]
    fn test_erased_eq_rejects_other_types() {
        let eq = erase::<i64>(partial_eq);
        assert!(!eq(&1i64, &1i32));
    }

    #[test]
    fn test_result_helpers() {
        let ok1: Result<i32, String> = Ok(1);
        let err_a: Result<i32, String> = Err("a".into());
        let err_b: Result<i32, String> = Err("b".into());

        assert!(ok_or_invalidate(&ok1, &Ok(1)));
        assert!(!ok_or_invalidate(&err_a, &err_a.clone()));
        assert!(ignore_err(&err_a, &err_b));
        assert!(!ignore_err(&ok1, &err_a));
    }
}
