use std::collections::BTreeMap;

use foundation::FeatureId;
use serde::{Deserialize, Serialize};

use crate::geometry::{Geometry, GeometryKind};

fn rendered_default() -> bool {
    true
}

/// A map feature as a queryable source reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    #[serde(default)]
    pub label: String,
    pub geometry: Geometry,
    /// Currently drawn inside the viewport.
    #[serde(default = "rendered_default")]
    pub rendered: bool,
}

impl Feature {
    pub fn new(id: impl Into<FeatureId>, geometry: Geometry) -> Self {
        let id = id.into();
        Self {
            label: id.to_string(),
            id,
            geometry,
            rendered: true,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.rendered = false;
        self
    }
}

/// A map layer that exposes its vector features.
pub trait QueryableMapSource {
    /// Features of `source_id`; with `viewport_only`, only rendered ones.
    /// Empty when the source has nothing loaded.
    fn query_features(&self, source_id: &str, viewport_only: bool) -> Vec<Feature>;

    fn layer_geometry_type(&self, source_id: &str) -> Option<GeometryKind>;
}

/// Features held in memory, keyed by source id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InMemoryFeatureSource {
    sources: BTreeMap<String, Vec<Feature>>,
}

impl InMemoryFeatureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_features(mut self, source_id: impl Into<String>, features: Vec<Feature>) -> Self {
        self.insert(source_id, features);
        self
    }

    pub fn insert(&mut self, source_id: impl Into<String>, features: Vec<Feature>) {
        self.sources.insert(source_id.into(), features);
    }

    /// Mark exactly `ids` as rendered. Returns how many features are rendered.
    pub fn set_rendered<'a>(
        &mut self,
        source_id: &str,
        ids: impl IntoIterator<Item = &'a FeatureId>,
    ) -> usize {
        let ids: Vec<&FeatureId> = ids.into_iter().collect();
        let Some(features) = self.sources.get_mut(source_id) else {
            return 0;
        };
        let mut count = 0;
        for f in features {
            f.rendered = ids.contains(&&f.id);
            count += usize::from(f.rendered);
        }
        count
    }
}

impl QueryableMapSource for InMemoryFeatureSource {
    fn query_features(&self, source_id: &str, viewport_only: bool) -> Vec<Feature> {
        self.sources
            .get(source_id)
            .map(|features| {
                features
                    .iter()
                    .filter(|f| !viewport_only || f.rendered)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn layer_geometry_type(&self, source_id: &str) -> Option<GeometryKind> {
        self.sources
            .get(source_id)?
            .first()
            .map(|f| f.geometry.kind())
    }
}
