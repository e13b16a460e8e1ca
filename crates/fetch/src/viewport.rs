use std::collections::HashSet;
use std::sync::Arc;

use foundation::{Dataset, FeatureId};

/// Reports which features a map layer currently renders.
pub trait RenderedFeatures: Send + Sync {
    /// Ids rendered for `layer`, or `None` when the layer has nothing ready.
    fn rendered_ids(&self, layer: &str) -> Option<HashSet<FeatureId>>;
}

/// Restrict fetched records to those rendered in `layer`.
#[derive(Clone)]
pub struct ViewportScope {
    pub layer: String,
    pub features: Arc<dyn RenderedFeatures>,
}

impl ViewportScope {
    pub fn new(layer: impl Into<String>, features: Arc<dyn RenderedFeatures>) -> Self {
        Self {
            layer: layer.into(),
            features,
        }
    }

    /// The records of `raw` currently in view, in `raw` order.
    pub fn apply(&self, raw: &Dataset) -> Option<Dataset> {
        let ids = self.features.rendered_ids(&self.layer)?;
        Some(raw.retain_ids(&ids))
    }
}

impl std::fmt::Debug for ViewportScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewportScope")
            .field("layer", &self.layer)
            .finish_non_exhaustive()
    }
}

/// Fixed id set per layer, updatable from tests and tools.
#[derive(Debug, Default)]
pub struct StaticRenderedFeatures {
    layers: parking_lot::RwLock<std::collections::HashMap<String, HashSet<FeatureId>>>,
}

impl StaticRenderedFeatures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, layer: impl Into<String>, ids: impl IntoIterator<Item = FeatureId>) {
        self.layers
            .write()
            .insert(layer.into(), ids.into_iter().collect());
    }
}

impl RenderedFeatures for StaticRenderedFeatures {
    fn rendered_ids(&self, layer: &str) -> Option<HashSet<FeatureId>> {
        self.layers.read().get(layer).cloned()
    }
}
