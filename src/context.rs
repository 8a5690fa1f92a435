//! Rule context: the tracked reader handed to rules.

use std::sync::Arc;

use crate::db::Db;
use crate::error::GraphError;
use crate::key::NodeId;
use crate::runtime::GraphRuntime;

/// Context passed to a rule while it executes.
///
/// Every read through [`RuleContext::get_value`] is appended to the trace, in
/// order and with duplicates, before it is resolved. When the rule returns `Ok`,
/// the trace becomes the node's dependency list. A rule only ever sees this
/// context, never the runtime behind it.
pub struct RuleContext<'a> {
    runtime: &'a mut GraphRuntime,
    node: &'a NodeId,
    trace: Vec<NodeId>,
}

impl<'a> RuleContext<'a> {
    pub(crate) fn new(runtime: &'a mut GraphRuntime, node: &'a NodeId) -> Self {
        Self {
            runtime,
            node,
            trace: Vec::new(),
        }
    }

    /// Read a value, recording the dependency.
    ///
    /// # Errors
    ///
    /// Any error from resolving the read node, most commonly
    /// [`GraphError::UnsetInput`]. Propagate it with `?` to fail the rule.
    pub fn get_value<V: Send + Sync + 'static>(
        &mut self,
        layer: &str,
        key: &str,
    ) -> Result<Arc<V>, GraphError> {
        let dependency = self.runtime.node_id(layer, key)?;
        self.runtime
            .tracer()
            .on_dependency_registered(self.node, &dependency);
        self.trace.push(dependency.clone());
        self.runtime.read(&dependency)
    }

    /// The node this rule is computing.
    pub fn node(&self) -> &NodeId {
        self.node
    }

    /// The key this rule is computing.
    pub fn key(&self) -> &str {
        self.node.key()
    }

    /// The reads recorded so far.
    pub fn trace(&self) -> &[NodeId] {
        &self.trace
    }

    pub(crate) fn into_trace(self) -> Vec<NodeId> {
        self.trace
    }
}

impl Db for RuleContext<'_> {
    fn get_value<V: Send + Sync + 'static>(
        &mut self,
        layer: &str,
        key: &str,
    ) -> Result<Arc<V>, GraphError> {
        RuleContext::get_value(self, layer, key)
    }
}
