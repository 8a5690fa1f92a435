//! Error types for graph evaluation.

use std::sync::Arc;

use crate::key::LayerName;

/// Errors surfaced by [`GraphRuntime`](crate::GraphRuntime) entry points and
/// by reads inside rules.
///
/// Rule errors can be propagated using the `?` operator on any
/// `anyhow::Result`, which converts the error into [`GraphError::Rule`].
///
/// Nothing is cached for a failed evaluation: the node under evaluation keeps
/// its previous value, dependencies and timestamps.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GraphError {
    /// A source node was read before any value was set for it.
    ///
    /// Recoverable: set the input and query again.
    #[error("accessing unset input node {layer}({key})")]
    UnsetInput {
        /// The source layer.
        layer: LayerName,
        /// The key that was never set.
        key: Arc<str>,
    },

    /// The layer name is not registered.
    ///
    /// This is a configuration error and is not expected to be retried.
    #[error("unknown layer `{layer}`")]
    UnknownLayer {
        /// The name that was looked up.
        layer: String,
    },

    /// `set_input` was called on a derived layer.
    #[error("layer `{layer}` is derived and cannot be set")]
    NotSourceLayer {
        /// The derived layer.
        layer: LayerName,
    },

    /// A value of the wrong type was written to or read from a layer.
    #[error("layer `{layer}` holds `{actual}` values, not `{expected}`")]
    TypeMismatch {
        /// The layer that was accessed.
        layer: LayerName,
        /// The type requested by the caller.
        expected: &'static str,
        /// The type the layer was registered with.
        actual: &'static str,
    },

    /// A rule failed with its own error.
    #[error("rule error: {0}")]
    Rule(Arc<anyhow::Error>),
}

impl From<anyhow::Error> for GraphError {
    fn from(err: anyhow::Error) -> Self {
        GraphError::Rule(Arc::new(err))
    }
}

impl GraphError {
    /// Wrap any error as a rule error.
    pub fn rule(err: impl Into<anyhow::Error>) -> Self {
        GraphError::Rule(Arc::new(err.into()))
    }

    /// Returns a reference to the inner error if this is a `Rule` variant.
    pub fn rule_error(&self) -> Option<&Arc<anyhow::Error>> {
        match self {
            GraphError::Rule(e) => Some(e),
            _ => None,
        }
    }

    /// Attempts to downcast the rule error to a specific type.
    pub fn downcast_ref<E: std::error::Error + Send + Sync + 'static>(&self) -> Option<&E> {
        self.rule_error().and_then(|e| e.downcast_ref::<E>())
    }

    /// Returns `true` for errors caused by a misconfigured call rather than by
    /// graph contents: unknown layers, writes to derived layers and type mismatches.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            GraphError::UnknownLayer { .. }
                | GraphError::NotSourceLayer { .. }
                | GraphError::TypeMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_input_message() {
        let err = GraphError::UnsetInput {
            layer: LayerName::new("FILE_CONTENTS"),
            key: "x.dat".into(),
        };
        assert_eq!(
            err.to_string(),
            "accessing unset input node FILE_CONTENTS(x.dat)"
        );
        assert!(!err.is_configuration_error());
    }

    #[test]
    fn test_rule_error_from_anyhow() {
        let err: GraphError = anyhow::anyhow!("something went wrong").into();
        assert!(matches!(err, GraphError::Rule(_)));
        assert!(err.to_string().contains("something went wrong"));
    }

    #[test]
    fn test_rule_error_downcast() {
        let parse_err = "abc".parse::<i64>().unwrap_err();
        let err = GraphError::rule(parse_err.clone());
        assert_eq!(err.downcast_ref::<std::num::ParseIntError>(), Some(&parse_err));
        assert!(err.downcast_ref::<std::io::Error>().is_none());
    }

    #[test]
    fn test_configuration_errors() {
        let err = GraphError::UnknownLayer {
            layer: "NOPE".to_string(),
        };
        assert!(err.is_configuration_error());
        assert!(err.rule_error().is_none());
    }
}
