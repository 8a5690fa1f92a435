//! Graph runtime: input mutation, evaluation and validation.

use std::ops::Deref;
use std::sync::Arc;

use slab::Slab;

use crate::context::RuleContext;
use crate::db::Db;
use crate::error::GraphError;
use crate::key::{LayerName, NodeId};
use crate::layer::{Layer, LayerKind, LayerRegistry, Rule, Value};
use crate::output_eq::{self, ValueEq};
use crate::revision::LogicalTime;
use crate::tracer::{ExecutionResult, NoopTracer, Tracer};

/// How an existing derived node is checked before its cached value is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationStrategy {
    /// Resolve every recorded dependency in order, stopping at the first one
    /// that changed after the node was last verified.
    #[default]
    Full,
    /// First compare the node's flattened set of transitive source inputs.
    /// If none of them changed since the node was last verified, reuse the
    /// value without touching the intermediate derived nodes; otherwise fall
    /// back to [`ValidationStrategy::Full`].
    ///
    /// Rule invocations and results are the same as with `Full`; only the
    /// amount of validation work differs.
    SourcesFirst,
}

/// Result of polling a node, containing the value and the time it last changed.
///
/// Returned by [`GraphRuntime::poll`]. Compare `changed_at` with a previously
/// stored time to detect changes.
#[derive(Debug, Clone)]
pub struct Polled<T> {
    /// The value.
    pub value: T,
    /// The logical time at which this value last changed.
    pub changed_at: LogicalTime,
}

impl<T: Deref> Deref for Polled<T> {
    type Target = T::Target;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

/// Cached state of one `(layer, key)`.
struct Node {
    value: Value,
    changed_at: LogicalTime,
    verified_at: LogicalTime,
    /// Reads of the last successful rule execution, in order. Empty for sources.
    dependencies: Arc<[NodeId]>,
    /// Slots of the transitively reachable source nodes, sorted.
    /// `None` when unknown or when the strategy does not use it.
    sources: Option<Arc<[usize]>>,
}

/// The graph runtime manages layers, cached nodes and the logical clock.
///
/// All state lives inside this value. Entry points take `&mut self`; wrap the
/// runtime in a [`SharedGraphRuntime`](crate::SharedGraphRuntime) to call it
/// from several threads.
///
/// # Example
///
/// ```
/// use layer_flow::GraphRuntime;
///
/// let mut runtime = GraphRuntime::builder()
///     .source::<String>("TEXT")
///     .derived("WORDS", |ctx, key| {
///         Ok(ctx.get_value::<String>("TEXT", key)?.split_whitespace().count())
///     })
///     .build();
///
/// runtime.set_input("TEXT", "a", "hello incremental world".to_string())?;
/// assert_eq!(*runtime.get_value::<usize>("WORDS", "a")?, 3);
/// # Ok::<(), layer_flow::GraphError>(())
/// ```
pub struct GraphRuntime {
    registry: LayerRegistry,
    nodes: Slab<Node>,
    now: LogicalTime,
    validation: ValidationStrategy,
    tracer: Arc<dyn Tracer>,
}

impl std::fmt::Debug for GraphRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphRuntime")
            .field("layers", &self.registry.names().collect::<Vec<_>>())
            .field("nodes", &self.nodes.len())
            .field("now", &self.now)
            .field("validation", &self.validation)
            .finish()
    }
}

impl GraphRuntime {
    /// Create a builder for registering layers and settings.
    pub fn builder() -> GraphRuntimeBuilder {
        GraphRuntimeBuilder::new()
    }

    /// Current reading of the logical clock.
    pub fn now(&self) -> LogicalTime {
        self.now
    }

    /// The validation strategy this runtime was built with.
    pub fn validation_strategy(&self) -> ValidationStrategy {
        self.validation
    }

    /// Names of all registered layers, in registration order.
    pub fn layer_names(&self) -> Vec<LayerName> {
        self.registry.names().cloned().collect()
    }

    /// Write a source value.
    ///
    /// The first write of a key always counts as a change. Later writes are
    /// compared with the layer's equality: an equal value is a no-op, a
    /// different one advances the clock by one tick. Nothing is recomputed
    /// eagerly.
    ///
    /// # Errors
    ///
    /// - `GraphError::UnknownLayer` - `layer` is not registered
    /// - `GraphError::NotSourceLayer` - `layer` is a derived layer
    /// - `GraphError::TypeMismatch` - `V` is not the layer's value type
    pub fn set_input<V: Send + Sync + 'static>(
        &mut self,
        layer: &str,
        key: &str,
        value: V,
    ) -> Result<(), GraphError> {
        let layer_index = self.registry.index_of(layer)?;
        let layer = &self.registry[layer_index];
        if !layer.is_source() {
            return Err(GraphError::NotSourceLayer {
                layer: layer.name.clone(),
            });
        }
        layer.check_type::<V>()?;

        let id = NodeId::new(layer.name.clone(), key);
        let value: Value = Arc::new(value);

        let track_sources = self.validation == ValidationStrategy::SourcesFirst;

        let changed = match layer.nodes.get(key).copied() {
            None => {
                let now = self.now.tick();
                let entry = self.nodes.vacant_entry();
                let slot = entry.key();
                entry.insert(Node {
                    value,
                    changed_at: now,
                    verified_at: now,
                    dependencies: Arc::from([]),
                    sources: track_sources.then(|| Arc::from([slot])),
                });
                self.registry[layer_index]
                    .nodes
                    .insert(id.key_arc().clone(), slot);
                true
            }
            Some(slot) => {
                let node = &mut self.nodes[slot];
                if (layer.eq)(&*node.value, &*value) {
                    false
                } else {
                    let now = self.now.tick();
                    node.value = value;
                    node.changed_at = now;
                    node.verified_at = now;
                    true
                }
            }
        };

        if changed {
            tracing::debug!(node = %id, now = %self.now, "input changed");
        } else {
            tracing::trace!(node = %id, "input unchanged");
        }
        self.tracer.on_input_set(&id, changed);
        Ok(())
    }

    /// Resolve `(layer, key)` and return its value.
    ///
    /// Source values are returned as stored. Derived values are computed on
    /// first access and afterwards re-validated against their dependencies,
    /// re-running the rule only when one of them changed. Querying never
    /// advances the clock.
    ///
    /// # Errors
    ///
    /// - `GraphError::UnsetInput` - a source read (directly or by a rule) was never set
    /// - `GraphError::Rule` - a rule failed; the failing node keeps its previous state
    /// - `GraphError::UnknownLayer` / `GraphError::TypeMismatch` - misconfigured call
    pub fn get_value<V: Send + Sync + 'static>(
        &mut self,
        layer: &str,
        key: &str,
    ) -> Result<Arc<V>, GraphError> {
        let id = self.node_id(layer, key)?;
        self.read(&id)
    }

    /// Resolve `(layer, key)` and return its value with the time it last changed.
    ///
    /// # Example
    ///
    /// ```
    /// use layer_flow::GraphRuntime;
    ///
    /// let mut runtime = GraphRuntime::builder()
    ///     .source::<i64>("N")
    ///     .derived("SIGN", |ctx, key| Ok(ctx.get_value::<i64>("N", key)?.signum()))
    ///     .build();
    ///
    /// runtime.set_input("N", "x", 3i64)?;
    /// let first = runtime.poll::<i64>("SIGN", "x")?;
    ///
    /// runtime.set_input("N", "x", 5i64)?;
    /// let second = runtime.poll::<i64>("SIGN", "x")?;
    /// assert_eq!(*second, 1);
    /// // Same sign, so the derived value did not change.
    /// assert_eq!(first.changed_at, second.changed_at);
    /// # Ok::<(), layer_flow::GraphError>(())
    /// ```
    pub fn poll<V: Send + Sync + 'static>(
        &mut self,
        layer: &str,
        key: &str,
    ) -> Result<Polled<Arc<V>>, GraphError> {
        let id = self.node_id(layer, key)?;
        let (slot, value) = self.read_slot::<V>(&id)?;
        Ok(Polled {
            value,
            changed_at: self.nodes[slot].changed_at,
        })
    }

    /// Time at which the cached value of `(layer, key)` last changed, without evaluating.
    ///
    /// Returns `None` if the node was never observed.
    pub fn changed_at(&self, layer: &str, key: &str) -> Option<LogicalTime> {
        self.lookup(layer, key).map(|node| node.changed_at)
    }

    /// Time at which `(layer, key)` was last confirmed consistent, without evaluating.
    pub fn verified_at(&self, layer: &str, key: &str) -> Option<LogicalTime> {
        self.lookup(layer, key).map(|node| node.verified_at)
    }

    /// Reads recorded by the last successful rule execution of `(layer, key)`.
    ///
    /// Source nodes have no dependencies. Returns `None` if the node was never observed.
    pub fn dependencies(&self, layer: &str, key: &str) -> Option<Vec<NodeId>> {
        self.lookup(layer, key)
            .map(|node| node.dependencies.to_vec())
    }

    /// All keys observed in a layer, sorted.
    pub fn keys(&self, layer: &str) -> Result<Vec<Arc<str>>, GraphError> {
        let mut keys: Vec<Arc<str>> = self.registry.get(layer)?.nodes.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    pub(crate) fn tracer(&self) -> &dyn Tracer {
        &*self.tracer
    }

    /// Build a node id for a registered layer, sharing its name.
    pub(crate) fn node_id(&self, layer: &str, key: &str) -> Result<NodeId, GraphError> {
        let layer = self.registry.get(layer)?;
        Ok(NodeId::new(layer.name.clone(), key))
    }

    /// Resolve a node and downcast its value.
    pub(crate) fn read<V: Send + Sync + 'static>(
        &mut self,
        id: &NodeId,
    ) -> Result<Arc<V>, GraphError> {
        self.read_slot(id).map(|(_, value)| value)
    }

    fn read_slot<V: Send + Sync + 'static>(
        &mut self,
        id: &NodeId,
    ) -> Result<(usize, Arc<V>), GraphError> {
        let layer_index = self.registry.index_of(id.layer().as_str())?;
        self.registry[layer_index].check_type::<V>()?;
        let slot = self.resolve(id)?;
        let value = self.nodes[slot]
            .value
            .clone()
            .downcast::<V>()
            .map_err(|_| self.registry[layer_index].type_mismatch::<V>())?;
        Ok((slot, value))
    }

    fn lookup(&self, layer: &str, key: &str) -> Option<&Node> {
        let layer = self.registry.get(layer).ok()?;
        layer.nodes.get(key).map(|&slot| &self.nodes[slot])
    }

    fn slot_of(&self, id: &NodeId) -> Option<usize> {
        let layer = self.registry.get(id.layer().as_str()).ok()?;
        layer.nodes.get(id.key()).copied()
    }

    fn is_source(&self, id: &NodeId) -> bool {
        self.registry
            .get(id.layer().as_str())
            .is_ok_and(|layer| layer.is_source())
    }

    /// Bring a node up to date with the current time and return its slot.
    fn resolve(&mut self, id: &NodeId) -> Result<usize, GraphError> {
        let layer_index = self.registry.index_of(id.layer().as_str())?;
        let layer = &self.registry[layer_index];
        let existing = layer.nodes.get(id.key()).copied();

        let rule = match &layer.kind {
            LayerKind::Source => {
                return existing.ok_or_else(|| GraphError::UnsetInput {
                    layer: layer.name.clone(),
                    key: id.key_arc().clone(),
                });
            }
            LayerKind::Derived(rule) => rule.clone(),
        };

        match existing {
            None => self.compute_new(layer_index, id, &rule),
            Some(slot) => self.revalidate(layer_index, slot, id, &rule),
        }
    }

    /// First evaluation of a derived node.
    fn compute_new(
        &mut self,
        layer_index: usize,
        id: &NodeId,
        rule: &Rule,
    ) -> Result<usize, GraphError> {
        let now = self.now;
        let (value, dependencies) = self.execute(id, rule)?;
        let sources = self.collect_sources(&dependencies);

        let slot = self.nodes.insert(Node {
            value,
            changed_at: now,
            verified_at: now,
            dependencies: dependencies.into(),
            sources,
        });
        self.registry[layer_index]
            .nodes
            .insert(id.key_arc().clone(), slot);

        self.tracer.on_rule_end(id, ExecutionResult::Changed);
        Ok(slot)
    }

    /// Validate an existing derived node, re-running its rule if a dependency changed.
    fn revalidate(
        &mut self,
        layer_index: usize,
        slot: usize,
        id: &NodeId,
        rule: &Rule,
    ) -> Result<usize, GraphError> {
        let now = self.now;
        if self.nodes[slot].verified_at == now {
            tracing::trace!(node = %id, "already verified at {}", now);
            return Ok(slot);
        }

        if self.validation == ValidationStrategy::SourcesFirst && self.sources_unchanged(slot) {
            tracing::trace!(node = %id, "no source input changed");
            self.nodes[slot].verified_at = now;
            self.tracer.on_cache_check(id, true);
            return Ok(slot);
        }

        if !self.dependencies_changed(slot)? {
            tracing::trace!(node = %id, "dependencies unchanged");
            if self.validation == ValidationStrategy::SourcesFirst {
                let dependencies = self.nodes[slot].dependencies.clone();
                self.nodes[slot].sources = self.collect_sources(&dependencies);
            }
            self.nodes[slot].verified_at = now;
            self.tracer.on_cache_check(id, true);
            return Ok(slot);
        }
        self.tracer.on_cache_check(id, false);

        let (value, dependencies) = self.execute(id, rule)?;
        let sources = self.collect_sources(&dependencies);

        let eq = &self.registry[layer_index].eq;
        let node = &mut self.nodes[slot];
        let output_changed = !eq(&*node.value, &*value);
        if output_changed {
            node.value = value;
            node.changed_at = now;
        }
        node.dependencies = dependencies.into();
        node.sources = sources;
        node.verified_at = now;

        tracing::trace!(node = %id, output_changed, "early cutoff check");
        self.tracer.on_early_cutoff_check(id, output_changed);
        self.tracer.on_rule_end(
            id,
            if output_changed {
                ExecutionResult::Changed
            } else {
                ExecutionResult::Unchanged
            },
        );
        Ok(slot)
    }

    /// Resolve recorded dependencies in order until one changed after the node was verified.
    fn dependencies_changed(&mut self, slot: usize) -> Result<bool, GraphError> {
        let verified_at = self.nodes[slot].verified_at;
        let dependencies = self.nodes[slot].dependencies.clone();

        for dependency in dependencies.iter() {
            let dependency_slot = match self.resolve(dependency) {
                Ok(dependency_slot) => dependency_slot,
                // The rule tolerated a missing input, which is still missing.
                Err(GraphError::UnsetInput { .. }) if self.is_source(dependency) => continue,
                Err(err) => return Err(err),
            };
            if self.nodes[dependency_slot].changed_at > verified_at {
                tracing::trace!(dependency = %dependency, "dependency changed");
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn sources_unchanged(&self, slot: usize) -> bool {
        let node = &self.nodes[slot];
        node.sources.as_ref().is_some_and(|sources| {
            sources
                .iter()
                .all(|&source| self.nodes[source].changed_at <= node.verified_at)
        })
    }

    /// Flatten the source sets of resolved dependencies.
    ///
    /// Returns `None` if any dependency has no node (a tolerated unset input)
    /// or an unknown source set, so the node always takes the full path.
    fn collect_sources(&self, dependencies: &[NodeId]) -> Option<Arc<[usize]>> {
        if self.validation != ValidationStrategy::SourcesFirst {
            return None;
        }
        let mut sources = Vec::new();
        for dependency in dependencies {
            let slot = self.slot_of(dependency)?;
            sources.extend_from_slice(self.nodes[slot].sources.as_deref()?);
        }
        sources.sort_unstable();
        sources.dedup();
        Some(sources.into())
    }

    /// Run a rule through a fresh context, returning its value and trace.
    fn execute(&mut self, id: &NodeId, rule: &Rule) -> Result<(Value, Vec<NodeId>), GraphError> {
        tracing::debug!(node = %id, now = %self.now, "running rule");
        self.tracer.on_rule_start(id);

        let mut ctx = RuleContext::new(self, id);
        let result = rule(&mut ctx, id.key());
        let trace = ctx.into_trace();

        match result {
            Ok(value) => Ok((value, trace)),
            Err(err) => {
                tracing::debug!(node = %id, error = %err, "rule failed");
                self.tracer.on_rule_end(
                    id,
                    ExecutionResult::Error {
                        message: err.to_string(),
                    },
                );
                Err(err)
            }
        }
    }
}

impl Db for GraphRuntime {
    fn get_value<V: Send + Sync + 'static>(
        &mut self,
        layer: &str,
        key: &str,
    ) -> Result<Arc<V>, GraphError> {
        GraphRuntime::get_value(self, layer, key)
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`GraphRuntime`]: the layer specification plus settings.
///
/// Registering a layer name twice replaces the earlier registration. The set
/// of layers is fixed once [`build`](GraphRuntimeBuilder::build) is called.
///
/// # Example
///
/// ```
/// use layer_flow::{GraphRuntime, ValidationStrategy};
///
/// let runtime = GraphRuntime::builder()
///     .source::<String>("CONTENTS")
///     .derived("LIST", |ctx, key| {
///         let contents = ctx.get_value::<String>("CONTENTS", key)?;
///         Ok(contents.split(',').map(str::to_string).collect::<Vec<_>>())
///     })
///     .validation(ValidationStrategy::SourcesFirst)
///     .build();
/// assert_eq!(runtime.layer_names().len(), 2);
/// ```
pub struct GraphRuntimeBuilder {
    layers: Vec<Layer>,
    tracer: Arc<dyn Tracer>,
    validation: ValidationStrategy,
}

impl Default for GraphRuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphRuntimeBuilder {
    /// Create a new builder with no layers and default settings.
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            tracer: Arc::new(NoopTracer),
            validation: ValidationStrategy::default(),
        }
    }

    /// Register a source layer compared with `PartialEq`.
    pub fn source<V>(self, name: impl Into<LayerName>) -> Self
    where
        V: PartialEq + Send + Sync + 'static,
    {
        self.source_with_eq::<V>(name, output_eq::partial_eq::<V>)
    }

    /// Register a source layer with a custom equality function.
    pub fn source_with_eq<V>(mut self, name: impl Into<LayerName>, eq: ValueEq<V>) -> Self
    where
        V: Send + Sync + 'static,
    {
        self.layers.push(Layer::source(name.into(), eq));
        self
    }

    /// Register a derived layer compared with `PartialEq`.
    ///
    /// The rule receives a [`RuleContext`] and the key being computed. Every
    /// read it makes through the context becomes a dependency.
    pub fn derived<V, F>(self, name: impl Into<LayerName>, rule: F) -> Self
    where
        V: PartialEq + Send + Sync + 'static,
        F: Fn(&mut RuleContext<'_>, &str) -> Result<V, GraphError> + Send + Sync + 'static,
    {
        self.derived_with_eq(name, rule, output_eq::partial_eq::<V>)
    }

    /// Register a derived layer with a custom equality function used for early cutoff.
    pub fn derived_with_eq<V, F>(
        mut self,
        name: impl Into<LayerName>,
        rule: F,
        eq: ValueEq<V>,
    ) -> Self
    where
        V: Send + Sync + 'static,
        F: Fn(&mut RuleContext<'_>, &str) -> Result<V, GraphError> + Send + Sync + 'static,
    {
        self.layers.push(Layer::derived(name.into(), rule, eq));
        self
    }

    /// Set the tracer that observes evaluation events.
    pub fn tracer(mut self, tracer: impl Tracer) -> Self {
        self.tracer = Arc::new(tracer);
        self
    }

    /// Set how existing derived nodes are validated.
    pub fn validation(mut self, validation: ValidationStrategy) -> Self {
        self.validation = validation;
        self
    }

    /// Build the runtime with the registered layers and settings.
    pub fn build(self) -> GraphRuntime {
        GraphRuntime {
            registry: LayerRegistry::new(self.layers),
            nodes: Slab::new(),
            now: LogicalTime::ZERO,
            validation: self.validation,
            tracer: self.tracer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doubling() -> GraphRuntime {
        GraphRuntime::builder()
            .source::<i64>("N")
            .derived("DOUBLE", |ctx, key| Ok(*ctx.get_value::<i64>("N", key)? * 2))
            .build()
    }

    #[test]
    fn test_runtime_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<GraphRuntime>();
    }

    #[test]
    fn test_simple_derived() {
        let mut runtime = doubling();
        runtime.set_input("N", "a", 5i64).unwrap();
        assert_eq!(*runtime.get_value::<i64>("DOUBLE", "a").unwrap(), 10);
        assert_eq!(
            runtime.dependencies("DOUBLE", "a"),
            Some(vec![NodeId::new("N", "a")])
        );
    }

    #[test]
    fn test_timestamps() {
        let mut runtime = doubling();
        runtime.set_input("N", "a", 5i64).unwrap();
        runtime.set_input("N", "b", 6i64).unwrap();
        runtime.get_value::<i64>("DOUBLE", "a").unwrap();

        let t2 = runtime.now();
        assert_eq!(t2.get(), 2);
        assert_eq!(runtime.changed_at("N", "a").map(LogicalTime::get), Some(1));
        assert_eq!(runtime.changed_at("DOUBLE", "a"), Some(t2));
        assert_eq!(runtime.verified_at("DOUBLE", "a"), Some(t2));
        assert_eq!(runtime.changed_at("DOUBLE", "b"), None);
    }

    #[test]
    fn test_validation_bumps_verified_at_only() {
        let mut runtime = doubling();
        runtime.set_input("N", "a", 5i64).unwrap();
        runtime.get_value::<i64>("DOUBLE", "a").unwrap();
        let computed_at = runtime.now();

        runtime.set_input("N", "other", 1i64).unwrap();
        runtime.get_value::<i64>("DOUBLE", "a").unwrap();

        assert_eq!(runtime.changed_at("DOUBLE", "a"), Some(computed_at));
        assert_eq!(runtime.verified_at("DOUBLE", "a"), Some(runtime.now()));
    }

    #[test]
    fn test_keys_and_layers() {
        let mut runtime = doubling();
        runtime.set_input("N", "b", 1i64).unwrap();
        runtime.set_input("N", "a", 2i64).unwrap();

        let keys = runtime.keys("N").unwrap();
        assert_eq!(keys.iter().map(|k| &**k).collect::<Vec<_>>(), ["a", "b"]);
        assert!(runtime.keys("DOUBLE").unwrap().is_empty());
        assert!(runtime.keys("MISSING").is_err());
        assert_eq!(
            runtime.layer_names(),
            vec![LayerName::new("N"), LayerName::new("DOUBLE")]
        );
    }

    #[test]
    fn test_source_sets_only_tracked_when_used() {
        let mut full = doubling();
        full.set_input("N", "a", 1i64).unwrap();
        full.get_value::<i64>("DOUBLE", "a").unwrap();
        assert!(full.nodes.iter().all(|(_, node)| node.sources.is_none()));

        let mut sources_first = GraphRuntime::builder()
            .source::<i64>("N")
            .derived("DOUBLE", |ctx, key| Ok(*ctx.get_value::<i64>("N", key)? * 2))
            .validation(ValidationStrategy::SourcesFirst)
            .build();
        sources_first.set_input("N", "a", 1i64).unwrap();
        sources_first.get_value::<i64>("DOUBLE", "a").unwrap();
        assert!(sources_first.nodes.iter().all(|(_, node)| node.sources.is_some()));
    }

    #[test]
    fn test_poll_reads_changed_at_of_resolved_node() {
        let mut runtime = doubling();
        runtime.set_input("N", "a", 1i64).unwrap();
        runtime.set_input("N", "b", 2i64).unwrap();

        let polled = runtime.poll::<i64>("DOUBLE", "a").unwrap();
        assert_eq!(*polled.value, 2);
        assert_eq!(polled.changed_at, runtime.now());
        assert_eq!(runtime.poll::<i64>("N", "a").unwrap().changed_at.get(), 1);
    }

    #[test]
    fn test_default_strategy_is_full() {
        assert_eq!(doubling().validation_strategy(), ValidationStrategy::Full);
    }
}
