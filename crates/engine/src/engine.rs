use std::collections::BTreeMap;
use std::sync::Arc;

use classify::{BinEditor, BinError, ClassificationBins};
use fetch::{DataSource, FetchRegistry, FetchRequestState, RenderedFeatures, ViewportScope};
use foundation::math::LonLat;
use legend::LegendStop;
use params::ParamError;
use selection::{Feature, FeatureSelector, PointerSelection, QueryableMapSource};
use state::{Action, StateChange, StateStore, StateValue};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::visualization::{Visualization, VisualizationSpec};

/// Owns the state store and one fetch coordinator per visualization.
///
/// Every write goes through the engine so the visualizations reading the
/// changed slots are rescheduled. Must be used inside a tokio runtime:
/// scheduling spawns the debounced fetch.
pub struct Engine {
    config: EngineConfig,
    store: StateStore,
    registry: FetchRegistry,
    visualizations: BTreeMap<String, Visualization>,
    rendered: Option<Arc<dyn RenderedFeatures>>,
    owner: Option<String>,
}

impl Engine {
    pub fn new(config: EngineConfig, source: Arc<dyn DataSource>) -> Self {
        let registry = FetchRegistry::new(source, config.fetch_options());
        Self {
            config,
            store: StateStore::new(),
            registry,
            visualizations: BTreeMap::new(),
            rendered: None,
            owner: None,
        }
    }

    /// Replace the store, e.g. with one backed by persistence.
    pub fn with_store(mut self, store: StateStore) -> Self {
        self.store = store;
        self
    }

    /// Rendered-feature lookup for visualizations with a viewport layer.
    pub fn with_rendered_features(mut self, rendered: Arc<dyn RenderedFeatures>) -> Self {
        self.rendered = Some(rendered);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn visualization(&self, name: &str) -> Option<&Visualization> {
        self.visualizations.get(name)
    }

    pub fn visualization_names(&self) -> impl Iterator<Item = &str> {
        self.visualizations.keys().map(String::as_str)
    }

    /// Register (or replace) a visualization and schedule its first fetch.
    pub fn add_visualization(&mut self, spec: VisualizationSpec) -> Result<FetchRequestState, ParamError> {
        let viz = Visualization::new(spec, self.config.classifier())?;
        let name = viz.name().to_string();
        if self.visualizations.contains_key(&name) {
            self.registry.teardown(&name);
        }

        let coordinator = self.registry.coordinator(&name);
        if let Some(owner) = &self.owner {
            coordinator.set_owner(owner);
        }
        if let (Some(layer), Some(rendered)) = (&viz.spec().viewport_layer, &self.rendered) {
            coordinator.set_viewport(Some(ViewportScope::new(layer.clone(), Arc::clone(rendered))));
        }
        let state = coordinator.schedule(&viz.resolve(&self.store));
        debug!(visualization = %name, endpoint = %viz.spec().endpoint, "visualization added");
        self.visualizations.insert(name, viz);
        Ok(state)
    }

    pub fn remove_visualization(&mut self, name: &str) -> bool {
        self.registry.teardown(name);
        self.visualizations.remove(name).is_some()
    }

    /// Leave the current page: every visualization is torn down and later
    /// ones are owned by `owner`.
    pub fn navigate(&mut self, owner: &str) {
        self.registry.teardown_all();
        self.visualizations.clear();
        self.owner = Some(owner.to_string());
        info!(owner, "navigated; visualizations torn down");
    }

    /// Apply `action` to the store and reschedule affected visualizations.
    pub fn dispatch(&mut self, action: Action) -> Option<StateChange> {
        let change = self.store.dispatch(action)?;
        self.route(&change.keys);
        Some(change)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<StateValue>) -> Option<StateChange> {
        self.dispatch(Action::set(key, value))
    }

    /// Re-resolve `name` against the store and hand it to its coordinator.
    pub fn refresh(&self, name: &str) -> Option<FetchRequestState> {
        let viz = self.visualizations.get(name)?;
        let coordinator = self.registry.get(name)?;
        Some(coordinator.schedule(&viz.resolve(&self.store)))
    }

    fn route(&self, keys: &[String]) {
        for (name, viz) in &self.visualizations {
            if keys.iter().any(|k| viz.reads(k)) {
                debug!(visualization = %name, ?keys, "filters changed; rescheduling");
                self.refresh(name);
            }
        }
    }

    /// The map viewport moved; scoped visualizations refilter after the
    /// viewport debounce window.
    pub fn on_viewport_change(&self) {
        for name in self.registry.names() {
            if let Some(coordinator) = self.registry.get(name) {
                coordinator.on_viewport_change();
            }
        }
    }

    pub fn state(&self, name: &str) -> Option<FetchRequestState> {
        self.registry.get(name).map(|c| c.state())
    }

    pub fn subscribe(&self, name: &str) -> Option<watch::Receiver<FetchRequestState>> {
        self.registry.get(name).map(|c| c.subscribe())
    }

    /// Bins for `name`'s current data; `None` when unknown or not loaded.
    pub fn bins(&self, name: &str) -> Option<Result<ClassificationBins, BinError>> {
        let viz = self.visualizations.get(name)?;
        viz.bins(&self.store, &self.state(name)?)
    }

    pub fn color_legend(&self, name: &str) -> Option<Vec<LegendStop>> {
        self.visualizations.get(name)?.color_legend()
    }

    pub fn width_legend(&self, name: &str) -> Option<Vec<LegendStop>> {
        self.visualizations.get(name)?.width_legend()
    }

    pub fn bin_editor(&self, name: &str) -> Option<BinEditor> {
        let viz = self.visualizations.get(name)?;
        Some(viz.bin_editor(&self.store, &self.state(name)?))
    }

    /// Commit an editor's draft. A rejected draft leaves the previous bins.
    pub fn commit_bins(&mut self, editor: &BinEditor) -> Result<Vec<f64>, BinError> {
        self.write(|store| editor.commit(store))
    }

    /// Drop custom bins for the editor's visualization and reseed the draft
    /// with the computed ones.
    pub fn clear_bins(&mut self, editor: &mut BinEditor) {
        let name = editor.visualization();
        let computed = match (self.visualizations.get(name), self.state(name)) {
            (Some(viz), Some(state)) => viz.computed_bins(&state),
            _ => Vec::new(),
        };
        self.write(|store| editor.clear(store, &computed));
    }

    /// A selector for map layer `source_id` writing into store slot `slot`.
    pub fn selector(&self, source_id: &str, slot: &str) -> FeatureSelector {
        FeatureSelector::new(source_id, slot, self.config.selection_threshold_m)
    }

    pub fn click(
        &mut self,
        selector: &mut FeatureSelector,
        source: &dyn QueryableMapSource,
        point: LonLat,
    ) -> Option<PointerSelection> {
        self.write(|store| selector.click(source, store, point))
    }

    pub fn commit_rectangle(
        &mut self,
        selector: &mut FeatureSelector,
        source: &dyn QueryableMapSource,
        a: LonLat,
        b: LonLat,
    ) -> Vec<Feature> {
        self.write(|store| selector.commit_rectangle(source, store, a, b))
    }

    pub fn clear_selection(&mut self, selector: &FeatureSelector) {
        self.write(|store| selector.clear(store));
    }

    /// Run a direct store write, then route whatever it changed.
    fn write<R>(&mut self, f: impl FnOnce(&mut StateStore) -> R) -> R {
        let before = self.store.revision();
        let out = f(&mut self.store);
        let keys: Vec<String> = self
            .store
            .log()
            .records()
            .iter()
            .filter(|r| r.revision > before)
            .flat_map(|r| r.keys.iter().cloned())
            .collect();
        if !keys.is_empty() {
            self.route(&keys);
        }
        out
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("visualizations", &self.visualizations.keys().collect::<Vec<_>>())
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}
