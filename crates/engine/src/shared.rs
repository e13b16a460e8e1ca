use std::collections::HashSet;
use std::sync::Arc;

use fetch::RenderedFeatures;
use foundation::FeatureId;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use selection::QueryableMapSource;

/// A map feature source shared by the selector and viewport scoping.
///
/// Cloning shares the same source; writes (e.g. a pan that changes which
/// features are rendered) are seen by every clone.
pub struct SharedFeatureSource<S> {
    inner: Arc<RwLock<S>>,
}

impl<S> Clone for SharedFeatureSource<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> SharedFeatureSource<S> {
    pub fn new(source: S) -> Self {
        Self {
            inner: Arc::new(RwLock::new(source)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, S> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, S> {
        self.inner.write()
    }
}

impl<S: QueryableMapSource + Send + Sync> RenderedFeatures for SharedFeatureSource<S> {
    /// `None` until the layer has loaded any geometry; afterwards the
    /// (possibly empty) set of rendered ids.
    fn rendered_ids(&self, layer: &str) -> Option<HashSet<FeatureId>> {
        let source = self.inner.read();
        source.layer_geometry_type(layer)?;
        Some(
            source
                .query_features(layer, true)
                .into_iter()
                .map(|f| f.id)
                .collect(),
        )
    }
}
