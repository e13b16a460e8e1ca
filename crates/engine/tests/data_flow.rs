use std::sync::Arc;
use std::time::Duration;

use classify::{ClassificationBins, ClassificationStyle};
use engine::{Engine, EngineConfig, SharedFeatureSource, VisualizationSpec};
use fetch::{FetchStatus, MemorySource, ViewStatus};
use foundation::math::LonLat;
use foundation::{Dataset, FeatureId, Record, Scalar};
use params::FilterBinding;
use pretty_assertions::assert_eq;
use selection::{Feature, Geometry, InMemoryFeatureSource};
use serde_json::json;

fn square(id: u64, lon: f64) -> Feature {
    Feature::new(
        id,
        Geometry::Polygon(vec![vec![
            [lon, 0.0],
            [lon + 1.0, 0.0],
            [lon + 1.0, 1.0],
            [lon, 1.0],
            [lon, 0.0],
        ]]),
    )
}

fn tracts() -> Dataset {
    Dataset::new(
        (1..=10)
            .map(|i| Record::new(i as u64, (i * 5_000) as f64))
            .collect(),
    )
}

#[tokio::test(start_paused = true)]
async fn filter_fetch_classify_and_scope_to_viewport() {
    let source = Arc::new(
        MemorySource::default()
            .with_delayed("/api/tracts/2020", tracts(), Duration::from_millis(50))
            .with_dataset("/api/tracts/2021", Dataset::default()),
    );
    let map = SharedFeatureSource::new(
        InMemoryFeatureSource::new().with_features("tracts", (1..=10).map(|i| square(i, i as f64)).collect()),
    );

    let mut engine = Engine::new(EngineConfig::default(), source.clone())
        .with_rendered_features(Arc::new(map.clone()));
    let spec = VisualizationSpec::new("tracts", "/api/tracts/:year", ClassificationStyle::Continuous)
        .with_filter(FilterBinding::new("year", "year").required())
        .with_viewport_layer("tracts")
        .with_color(json!([
            "interpolate", ["linear"], ["get", "value"],
            0, "#f7fbff",
            25000, "#6baed6",
            50000, "#08306b"
        ]));
    engine.add_visualization(spec).unwrap();
    let mut updates = engine.subscribe("tracts").unwrap();

    // Rapid edits collapse into one request for the last value.
    engine.set("year", Scalar::from(2019.0));
    tokio::time::sleep(Duration::from_millis(100)).await;
    engine.set("year", Scalar::from(2020.0));
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(source.calls(), vec!["/api/tracts/2020".to_string()]);
    updates.changed().await.unwrap();
    let state = engine.state("tracts").unwrap();
    assert_eq!(state.status, FetchStatus::Success);
    assert_eq!(state.view_status(), ViewStatus::Visible);
    assert_eq!(state.visible_data().map(|d| d.len()), Some(10));

    assert_eq!(
        engine.bins("tracts"),
        Some(Ok(ClassificationBins::Numeric(vec![
            11000.0, 16000.0, 22000.0, 28000.0, 33000.0, 39000.0, 44000.0, 50000.0
        ])))
    );
    let legend = engine.color_legend("tracts").unwrap();
    assert_eq!(legend.len(), 3);
    assert_eq!(legend[1].label.as_deref(), Some("25000"));

    // Panning leaves three tracts rendered.
    map.write()
        .set_rendered("tracts", &[FeatureId::from(2u64), FeatureId::from(3u64), FeatureId::from(4u64)]);
    engine.on_viewport_change();
    tokio::time::sleep(Duration::from_millis(250)).await;
    let state = engine.state("tracts").unwrap();
    assert_eq!(state.visible_data().map(|d| d.len()), Some(3));
    assert_eq!(source.calls().len(), 1);

    // Pointer selection writes the clicked tract into the store.
    let mut selector = engine.selector("tracts", "selected_tract");
    selector.activate_pointer();
    let hit = engine
        .click(&mut selector, &*map.read(), LonLat::new(3.5, 0.5))
        .unwrap();
    assert_eq!(hit.feature.id, FeatureId::from(3u64));
    assert_eq!(
        engine.store().first("selected_tract"),
        Some(Scalar::from("3"))
    );

    // A year with no records is empty, not an error.
    engine.set("year", Scalar::from(2021.0));
    tokio::time::sleep(Duration::from_millis(500)).await;
    let state = engine.state("tracts").unwrap();
    assert_eq!(state.status, FetchStatus::Empty);
    assert_eq!(state.view_status(), ViewStatus::NoData);
}
