//! Layer registry: the fixed set of source and derived layers.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::context::RuleContext;
use crate::error::GraphError;
use crate::key::LayerName;
use crate::output_eq::{self, ErasedEq, ValueEq};

/// Type-erased value stored in a node.
pub(crate) type Value = Arc<dyn Any + Send + Sync>;

/// Type-erased rule of a derived layer.
pub(crate) type Rule =
    Arc<dyn Fn(&mut RuleContext<'_>, &str) -> Result<Value, GraphError> + Send + Sync>;

pub(crate) enum LayerKind {
    Source,
    Derived(Rule),
}

/// One registered layer and its key to node-slot map.
pub(crate) struct Layer {
    pub(crate) name: LayerName,
    pub(crate) kind: LayerKind,
    pub(crate) value_type: TypeId,
    pub(crate) value_type_name: &'static str,
    pub(crate) eq: ErasedEq,
    pub(crate) nodes: HashMap<Arc<str>, usize, ahash::RandomState>,
}

impl Layer {
    fn new<V: Send + Sync + 'static>(name: LayerName, kind: LayerKind, eq: ValueEq<V>) -> Self {
        Self {
            name,
            kind,
            value_type: TypeId::of::<V>(),
            value_type_name: std::any::type_name::<V>(),
            eq: output_eq::erase(eq),
            nodes: HashMap::with_hasher(ahash::RandomState::new()),
        }
    }

    pub(crate) fn source<V: Send + Sync + 'static>(name: LayerName, eq: ValueEq<V>) -> Self {
        Self::new(name, LayerKind::Source, eq)
    }

    pub(crate) fn derived<V, F>(name: LayerName, rule: F, eq: ValueEq<V>) -> Self
    where
        V: Send + Sync + 'static,
        F: Fn(&mut RuleContext<'_>, &str) -> Result<V, GraphError> + Send + Sync + 'static,
    {
        let rule: Rule = Arc::new(move |ctx: &mut RuleContext<'_>, key: &str| {
            rule(ctx, key).map(|value| Arc::new(value) as Value)
        });
        Self::new(name, LayerKind::Derived(rule), eq)
    }

    pub(crate) fn is_source(&self) -> bool {
        matches!(self.kind, LayerKind::Source)
    }

    /// Check that `V` is the value type this layer was registered with.
    pub(crate) fn check_type<V: 'static>(&self) -> Result<(), GraphError> {
        if self.value_type == TypeId::of::<V>() {
            Ok(())
        } else {
            Err(self.type_mismatch::<V>())
        }
    }

    pub(crate) fn type_mismatch<V: 'static>(&self) -> GraphError {
        GraphError::TypeMismatch {
            layer: self.name.clone(),
            expected: std::any::type_name::<V>(),
            actual: self.value_type_name,
        }
    }
}

/// Immutable set of layers, addressed by name or by index.
///
/// Only the per-layer node maps change after construction.
pub(crate) struct LayerRegistry {
    layers: Vec<Layer>,
    by_name: HashMap<LayerName, usize, ahash::RandomState>,
}

impl LayerRegistry {
    /// Build a registry. A later layer with the same name replaces an earlier one.
    pub(crate) fn new(layers: impl IntoIterator<Item = Layer>) -> Self {
        let mut registry = Self {
            layers: Vec::new(),
            by_name: HashMap::with_hasher(ahash::RandomState::new()),
        };
        for layer in layers {
            match registry.by_name.get(&layer.name) {
                Some(&index) => registry.layers[index] = layer,
                None => {
                    registry.by_name.insert(layer.name.clone(), registry.layers.len());
                    registry.layers.push(layer);
                }
            }
        }
        registry
    }

    pub(crate) fn index_of(&self, name: &str) -> Result<usize, GraphError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::UnknownLayer {
                layer: name.to_string(),
            })
    }

    pub(crate) fn get(&self, name: &str) -> Result<&Layer, GraphError> {
        self.index_of(name).map(|index| &self.layers[index])
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &LayerName> + '_ {
        self.layers.iter().map(|layer| &layer.name)
    }
}

impl std::ops::Index<usize> for LayerRegistry {
    type Output = Layer;

    fn index(&self, index: usize) -> &Layer {
        &self.layers[index]
    }
}

impl std::ops::IndexMut<usize> for LayerRegistry {
    fn index_mut(&mut self, index: usize) -> &mut Layer {
        &mut self.layers[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> LayerRegistry {
        LayerRegistry::new([
            Layer::source::<String>("CONTENTS".into(), output_eq::partial_eq),
            Layer::derived::<usize, _>(
                "LEN".into(),
                |ctx, key| Ok(ctx.get_value::<String>("CONTENTS", key)?.len()),
                output_eq::partial_eq,
            ),
        ])
    }

    #[test]
    fn test_lookup_by_name() {
        let registry = registry();
        assert!(registry.get("CONTENTS").unwrap().is_source());
        assert!(!registry.get("LEN").unwrap().is_source());
        assert_eq!(registry.names().count(), 2);
    }

    #[test]
    fn test_unknown_layer() {
        let registry = registry();
        assert!(matches!(
            registry.index_of("MISSING"),
            Err(GraphError::UnknownLayer { layer }) if layer == "MISSING"
        ));
    }

    #[test]
    fn test_later_registration_replaces_earlier() {
        let registry = LayerRegistry::new([
            Layer::source::<String>("X".into(), output_eq::partial_eq),
            Layer::source::<i64>("X".into(), output_eq::partial_eq),
        ]);
        assert_eq!(registry.names().count(), 1);
        assert!(registry.get("X").unwrap().check_type::<i64>().is_ok());
    }

    #[test]
    fn test_type_check() {
        let registry = registry();
        let layer = registry.get("CONTENTS").unwrap();
        assert!(layer.check_type::<String>().is_ok());
        assert!(matches!(
            layer.check_type::<i64>(),
            Err(GraphError::TypeMismatch { expected: "i64", .. })
        ));
    }
}
