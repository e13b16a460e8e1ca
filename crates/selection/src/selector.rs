//! Selection mode state machine.
//!
//! `Inactive -> Pointer | Rectangle -> Inactive`. Pointer mode toggles one
//! feature per click and stays on; rectangle mode adds every feature that
//! touches the drawn box, then turns itself off. While rectangle mode is
//! on, the source's generic click handlers are suspended.
//!
//! A source with no features loaded makes every operation a no-op.

use foundation::Aabb2;
use foundation::math::LonLat;
use state::{SelectionItem, StateStore};
use tracing::{debug, info};

use crate::hit::{HitStrategy, ThresholdHitStrategy};
use crate::mode::{ClickHandlers, SelectionMode};
use crate::source::{Feature, QueryableMapSource};

/// Result of a pointer click.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerSelection {
    pub feature: Feature,
    /// Whether the feature is selected after the toggle.
    pub selected: bool,
}

#[derive(Debug, Clone)]
pub struct FeatureSelector<H = ThresholdHitStrategy> {
    source_id: String,
    slot: String,
    strategy: H,
    mode: SelectionMode,
    handlers: ClickHandlers,
}

impl FeatureSelector<ThresholdHitStrategy> {
    /// Selector over `source_id` writing into store slot `slot`.
    pub fn new(source_id: impl Into<String>, slot: impl Into<String>, threshold_m: f64) -> Self {
        Self::with_strategy(source_id, slot, ThresholdHitStrategy::new(threshold_m))
    }
}

impl<H: HitStrategy> FeatureSelector<H> {
    pub fn with_strategy(source_id: impl Into<String>, slot: impl Into<String>, strategy: H) -> Self {
        Self {
            source_id: source_id.into(),
            slot: slot.into(),
            strategy,
            mode: SelectionMode::Inactive,
            handlers: ClickHandlers::new(),
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn handlers(&self) -> &ClickHandlers {
        &self.handlers
    }

    pub fn handlers_mut(&mut self) -> &mut ClickHandlers {
        &mut self.handlers
    }

    pub fn activate_pointer(&mut self) {
        self.set_mode(SelectionMode::Pointer);
    }

    pub fn activate_rectangle(&mut self) {
        self.set_mode(SelectionMode::Rectangle);
    }

    pub fn deactivate(&mut self) {
        self.set_mode(SelectionMode::Inactive);
    }

    fn set_mode(&mut self, mode: SelectionMode) {
        if mode == SelectionMode::Rectangle {
            self.handlers.suspend();
        } else {
            self.handlers.restore();
        }
        if self.mode != mode {
            debug!(source = %self.source_id, from = ?self.mode, to = ?mode, "selection mode");
            self.mode = mode;
        }
    }

    /// The feature a click at `point` refers to, regardless of mode.
    pub fn select_at_point(&self, source: &dyn QueryableMapSource, point: LonLat) -> Option<Feature> {
        let mut features = source.query_features(&self.source_id, false);
        let index = self.strategy.pick(&features, point)?;
        Some(features.swap_remove(index))
    }

    /// Rendered features not disjoint from the box spanned by `a` and `b`.
    pub fn select_in_rectangle(
        &self,
        source: &dyn QueryableMapSource,
        a: LonLat,
        b: LonLat,
    ) -> Vec<Feature> {
        let bbox = Aabb2::from_corners(a, b);
        source
            .query_features(&self.source_id, true)
            .into_iter()
            .filter(|f| f.geometry.intersects_bbox(&bbox))
            .collect()
    }

    /// Pointer mode click: toggle the hit feature in the store's selection.
    pub fn click(
        &mut self,
        source: &dyn QueryableMapSource,
        store: &mut StateStore,
        point: LonLat,
    ) -> Option<PointerSelection> {
        if self.mode != SelectionMode::Pointer {
            return None;
        }
        let feature = self.select_at_point(source, point)?;
        let mut selection = store.selection(&self.slot);
        let selected = selection.toggle(SelectionItem::new(feature.id.clone(), feature.label.clone()));
        store.set(self.slot.clone(), selection);
        debug!(source = %self.source_id, id = %feature.id, selected, "pointer selection");
        Some(PointerSelection { feature, selected })
    }

    /// Rectangle mode commit: add matches to the selection, leave rectangle
    /// mode and restore click handlers. Returns the matched features.
    pub fn commit_rectangle(
        &mut self,
        source: &dyn QueryableMapSource,
        store: &mut StateStore,
        a: LonLat,
        b: LonLat,
    ) -> Vec<Feature> {
        if self.mode != SelectionMode::Rectangle {
            return Vec::new();
        }
        if source.query_features(&self.source_id, true).is_empty() {
            debug!(source = %self.source_id, "no rendered features; rectangle ignored");
            return Vec::new();
        }
        let matches = self.select_in_rectangle(source, a, b);
        let mut selection = store.selection(&self.slot);
        let added = selection.extend(
            matches
                .iter()
                .map(|f| SelectionItem::new(f.id.clone(), f.label.clone())),
        );
        store.set(self.slot.clone(), selection);
        info!(
            source = %self.source_id,
            matched = matches.len(),
            added,
            "rectangle selection committed"
        );
        self.deactivate();
        matches
    }

    pub fn clear(&self, store: &mut StateStore) {
        store.set(self.slot.clone(), state::SelectionSet::new());
    }
}

#[cfg(test)]
mod tests {
    use super::FeatureSelector;
    use crate::geometry::Geometry;
    use crate::mode::SelectionMode;
    use crate::source::{Feature, InMemoryFeatureSource};
    use foundation::FeatureId;
    use foundation::math::LonLat;
    use pretty_assertions::assert_eq;
    use state::StateStore;

    fn square(id: u64, min: [f64; 2], size: f64) -> Feature {
        let [x, y] = min;
        Feature::new(
            id,
            Geometry::Polygon(vec![vec![
                [x, y],
                [x + size, y],
                [x + size, y + size],
                [x, y + size],
                [x, y],
            ]]),
        )
        .with_label(format!("Tract {id}"))
    }

    fn selected_ids(store: &StateStore) -> Vec<String> {
        store.selection("tracts.selected").ids().map(|id| id.to_string()).collect()
    }

    fn source() -> InMemoryFeatureSource {
        InMemoryFeatureSource::new().with_features(
            "tracts",
            vec![square(1, [5.0, 5.0], 1.0), square(2, [0.5, 0.5], 1.0)],
        )
    }

    #[test]
    fn rectangle_selects_only_overlapping_features() {
        let source = source();
        let mut store = StateStore::new();
        let mut selector = FeatureSelector::new("tracts", "tracts.selected", 50.0);
        selector.handlers_mut().register("popup");

        selector.activate_rectangle();
        assert!(selector.handlers().active().is_empty());

        let matched = selector.commit_rectangle(
            &source,
            &mut store,
            LonLat::new(1.0, 1.0),
            LonLat::new(0.0, 0.0),
        );
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, FeatureId::from(2u64));
        assert_eq!(selected_ids(&store), vec!["2"]);

        assert_eq!(selector.mode(), SelectionMode::Inactive);
        assert_eq!(selector.handlers().active(), ["popup"]);
    }

    #[test]
    fn rectangle_adds_to_existing_selection() {
        let source = source();
        let mut store = StateStore::new();
        let mut selector = FeatureSelector::new("tracts", "tracts.selected", 50.0);

        selector.activate_rectangle();
        selector.commit_rectangle(&source, &mut store, LonLat::new(5.5, 5.5), LonLat::new(7.0, 7.0));
        selector.activate_rectangle();
        selector.commit_rectangle(&source, &mut store, LonLat::new(0.0, 0.0), LonLat::new(7.0, 7.0));
        assert_eq!(selected_ids(&store), vec!["1", "2"]);
        assert_eq!(store.selection("tracts.selected").iter().next().map(|i| i.label.as_str()), Some("Tract 1"));
    }

    #[test]
    fn pointer_click_toggles_and_stays_active() {
        let source = source();
        let mut store = StateStore::new();
        let mut selector = FeatureSelector::new("tracts", "tracts.selected", 50.0);

        assert_eq!(selector.click(&source, &mut store, LonLat::new(1.0, 1.0)), None);

        selector.activate_pointer();
        let first = selector.click(&source, &mut store, LonLat::new(1.0, 1.0)).unwrap();
        assert!(first.selected);
        assert_eq!(selected_ids(&store), vec!["2"]);

        let second = selector.click(&source, &mut store, LonLat::new(1.0, 1.0)).unwrap();
        assert!(!second.selected);
        assert!(selected_ids(&store).is_empty());
        assert_eq!(selector.mode(), SelectionMode::Pointer);
    }

    #[test]
    fn empty_source_is_a_no_op() {
        let source = InMemoryFeatureSource::new();
        let mut store = StateStore::new();
        let mut selector = FeatureSelector::new("tracts", "tracts.selected", 50.0);

        selector.activate_pointer();
        assert_eq!(selector.click(&source, &mut store, LonLat::new(0.0, 0.0)), None);

        selector.activate_rectangle();
        let matched =
            selector.commit_rectangle(&source, &mut store, LonLat::new(0.0, 0.0), LonLat::new(1.0, 1.0));
        assert!(matched.is_empty());
        assert_eq!(selector.mode(), SelectionMode::Rectangle);
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn clear_empties_the_slot() {
        let source = source();
        let mut store = StateStore::new();
        let mut selector = FeatureSelector::new("tracts", "tracts.selected", 50.0);
        selector.activate_pointer();
        selector.click(&source, &mut store, LonLat::new(1.0, 1.0));
        selector.clear(&mut store);
        assert!(selected_ids(&store).is_empty());
    }
}
