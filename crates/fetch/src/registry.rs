use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::coordinator::{DataFetchCoordinator, FetchOptions};
use crate::source::DataSource;

/// One coordinator per visualization name, sharing a data source.
pub struct FetchRegistry {
    source: Arc<dyn DataSource>,
    options: FetchOptions,
    coordinators: BTreeMap<String, DataFetchCoordinator>,
}

impl FetchRegistry {
    pub fn new(source: Arc<dyn DataSource>, options: FetchOptions) -> Self {
        Self {
            source,
            options,
            coordinators: BTreeMap::new(),
        }
    }

    /// The coordinator for `name`, created on first use.
    pub fn coordinator(&mut self, name: &str) -> &DataFetchCoordinator {
        self.coordinators
            .entry(name.to_string())
            .or_insert_with(|| {
                DataFetchCoordinator::new(Arc::clone(&self.source), self.options)
            })
    }

    pub fn get(&self, name: &str) -> Option<&DataFetchCoordinator> {
        self.coordinators.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.coordinators.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.coordinators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinators.is_empty()
    }

    /// Tear down one visualization. Returns `false` if it was unknown.
    pub fn teardown(&mut self, name: &str) -> bool {
        match self.coordinators.remove(name) {
            Some(coord) => {
                coord.reset();
                debug!(visualization = name, "fetch coordinator torn down");
                true
            }
            None => false,
        }
    }

    /// Tear down every visualization, e.g. on page navigation.
    pub fn teardown_all(&mut self) {
        for (name, coord) in std::mem::take(&mut self.coordinators) {
            coord.reset();
            debug!(visualization = %name, "fetch coordinator torn down");
        }
    }
}
