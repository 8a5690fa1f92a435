//! Tracer trait for observing graph evaluation.
//!
//! This module defines the [`Tracer`] trait and related types for observing
//! input writes and rule execution. The default [`NoopTracer`] discards
//! every event.
//!
//! Diagnostic logging goes through the `tracing` crate independently of the
//! tracer; install a subscriber to see it.
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use layer_flow::{GraphRuntime, NodeId, Tracer};
//!
//! #[derive(Default)]
//! struct RuleLog(Mutex<Vec<String>>);
//!
//! impl Tracer for RuleLog {
//!     fn on_rule_start(&self, node: &NodeId) {
//!         self.0.lock().unwrap().push(node.to_string());
//!     }
//! }
//!
//! let log = Arc::new(RuleLog::default());
//! let mut runtime = GraphRuntime::builder()
//!     .source::<i64>("N")
//!     .derived("DOUBLE", |ctx, key| Ok(*ctx.get_value::<i64>("N", key)? * 2))
//!     .tracer(log.clone())
//!     .build();
//!
//! runtime.set_input("N", "a", 21i64).unwrap();
//! assert_eq!(*runtime.get_value::<i64>("DOUBLE", "a").unwrap(), 42);
//! assert_eq!(*log.0.lock().unwrap(), vec!["DOUBLE(a)".to_string()]);
//! ```

use std::sync::Arc;

use crate::key::NodeId;

/// Rule execution result classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// The rule produced a value different from the cached one, or the node is new.
    Changed,
    /// The rule ran but its value is equal to the cached one (early cutoff applied).
    Unchanged,
    /// The rule failed; the node was left untouched.
    Error {
        /// Display of the error.
        message: String,
    },
}

/// Tracer trait for observing graph evaluation.
///
/// All methods have default empty implementations, so you only need to override
/// the events you're interested in.
///
/// Implementations must be `Send + Sync` so the runtime stays `Send`.
pub trait Tracer: Send + Sync + 'static {
    /// Called after `set_input`, with whether the write changed the stored value.
    #[inline]
    fn on_input_set(&self, _node: &NodeId, _changed: bool) {}

    /// Called right before a rule is invoked for `node`.
    #[inline]
    fn on_rule_start(&self, _node: &NodeId) {}

    /// Called when a rule invocation returns.
    #[inline]
    fn on_rule_end(&self, _node: &NodeId, _result: ExecutionResult) {}

    /// Called when an existing derived node has been checked against its dependencies.
    ///
    /// `valid` is `true` when the cached value is reused without running the rule.
    #[inline]
    fn on_cache_check(&self, _node: &NodeId, _valid: bool) {}

    /// Called when a re-run value is compared against the cached one.
    #[inline]
    fn on_early_cutoff_check(&self, _node: &NodeId, _output_changed: bool) {}

    /// Called when a rule reads another node.
    #[inline]
    fn on_dependency_registered(&self, _parent: &NodeId, _dependency: &NodeId) {}
}

/// Tracer that discards all events.
///
/// This is the default tracer for [`GraphRuntime`](crate::GraphRuntime).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {}

impl<T: Tracer + ?Sized> Tracer for Arc<T> {
    fn on_input_set(&self, node: &NodeId, changed: bool) {
        (**self).on_input_set(node, changed)
    }

    fn on_rule_start(&self, node: &NodeId) {
        (**self).on_rule_start(node)
    }

    fn on_rule_end(&self, node: &NodeId, result: ExecutionResult) {
        (**self).on_rule_end(node, result)
    }

    fn on_cache_check(&self, node: &NodeId, valid: bool) {
        (**self).on_cache_check(node, valid)
    }

    fn on_early_cutoff_check(&self, node: &NodeId, output_changed: bool) {
        (**self).on_early_cutoff_check(node, output_changed)
    }

    fn on_dependency_registered(&self, parent: &NodeId, dependency: &NodeId) {
        (**self).on_dependency_registered(parent, dependency)
    }
}
