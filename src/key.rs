//! Key types for addressing nodes.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Name of a registered layer.
///
/// Cheap to clone; the name is shared behind an `Arc`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerName(Arc<str>);

impl LayerName {
    /// Create a new layer name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for LayerName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for LayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for LayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LayerName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for LayerName {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Identifies one computation instance: a key within a layer.
///
/// Used as a dependency edge endpoint. Displays as `LAYER(key)`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    layer: LayerName,
    key: Arc<str>,
}

impl NodeId {
    /// Create a new node id.
    pub fn new(layer: impl Into<LayerName>, key: impl Into<Arc<str>>) -> Self {
        Self {
            layer: layer.into(),
            key: key.into(),
        }
    }

    /// The layer this node lives in.
    pub fn layer(&self) -> &LayerName {
        &self.layer
    }

    /// The key of this node within its layer.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn key_arc(&self) -> &Arc<str> {
        &self.key
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.layer, &*self.key)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.layer, self.key)
    }
}

impl<L: Into<LayerName>, K: Into<Arc<str>>> From<(L, K)> for NodeId {
    fn from((layer, key): (L, K)) -> Self {
        Self::new(layer, key)
    }
}
