use std::collections::BTreeSet;

use classify::{
    BinEditor, BinError, ClassificationBins, ClassificationStyle, Classifier, categories,
    committed_bins,
};
use fetch::FetchRequestState;
use foundation::Scalar;
use legend::{LegendStop, NumberFormat, interpret_color, interpret_width};
use params::{
    EndpointTemplate, FilterBinding, Overrides, ParamError, Resolution, ResolveOptions,
    StoreProviders, ValueProvider, resolve, update_url,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use state::StateView;

/// Declarative description of one data-bound visualization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizationSpec {
    pub name: String,

    /// Endpoint template, e.g. `/api/{dataset}/:county?year={year=2020}`.
    pub endpoint: String,

    /// Template parameters fed from store slots.
    #[serde(default)]
    pub filters: Vec<FilterBinding>,

    pub style: ClassificationStyle,

    /// Overrides the style's default bin count.
    #[serde(default)]
    pub num_bins: Option<usize>,

    /// Categories listed first, in this order, for categorical styles.
    #[serde(default)]
    pub categories: Vec<Scalar>,

    /// Paint expression for fill or circle color.
    #[serde(default)]
    pub color: Option<Value>,

    /// Paint expression for line width or circle radius.
    #[serde(default)]
    pub width: Option<Value>,

    /// Cap on the number of width legend stops.
    #[serde(default)]
    pub width_stops: Option<usize>,

    #[serde(default)]
    pub number_format: NumberFormat,

    /// Map layer whose rendered features scope the fetched data.
    #[serde(default)]
    pub viewport_layer: Option<String>,

    /// Query keys whose list values join with `/`.
    #[serde(default)]
    pub slash_joined: BTreeSet<String>,
}

impl VisualizationSpec {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        style: ClassificationStyle,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            filters: Vec::new(),
            style,
            num_bins: None,
            categories: Vec::new(),
            color: None,
            width: None,
            width_stops: None,
            number_format: NumberFormat::default(),
            viewport_layer: None,
            slash_joined: BTreeSet::new(),
        }
    }

    pub fn with_filter(mut self, binding: FilterBinding) -> Self {
        self.filters.push(binding);
        self
    }

    pub fn with_color(mut self, expression: Value) -> Self {
        self.color = Some(expression);
        self
    }

    pub fn with_viewport_layer(mut self, layer: impl Into<String>) -> Self {
        self.viewport_layer = Some(layer.into());
        self
    }
}

/// A parsed [`VisualizationSpec`] with the classifier it bins with.
///
/// Stateless: fetch state lives in the coordinator and inputs in the store,
/// so every method takes what it reads.
#[derive(Debug, Clone)]
pub struct Visualization {
    spec: VisualizationSpec,
    template: EndpointTemplate,
    classifier: Classifier,
}

impl Visualization {
    pub fn new(spec: VisualizationSpec, classifier: Classifier) -> Result<Self, ParamError> {
        let template = EndpointTemplate::parse(&spec.endpoint)?;
        Ok(Self {
            spec,
            template,
            classifier,
        })
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &VisualizationSpec {
        &self.spec
    }

    pub fn template(&self) -> &EndpointTemplate {
        &self.template
    }

    /// Whether a change to store slot `key` can change the request.
    pub fn reads(&self, key: &str) -> bool {
        self.spec.filters.iter().any(|b| b.filter_key == key)
    }

    pub fn resolve(&self, view: &dyn StateView) -> Resolution {
        let providers = StoreProviders::new(view, &self.spec.filters);
        let options = ResolveOptions {
            slash_joined: self.spec.slash_joined.clone(),
            ..ResolveOptions::default()
        };
        resolve(&self.template, &providers, &options)
    }

    /// Rewrite `current_url` to carry the store's current filter values,
    /// keeping anything the store does not provide.
    pub fn update_url(&self, view: &dyn StateView, current_url: &str) -> String {
        let providers = StoreProviders::new(view, &self.spec.filters);
        let overrides: Overrides = self
            .spec
            .filters
            .iter()
            .filter_map(|b| {
                let value = providers.lookup(&b.param)?.value?;
                Some((b.param.clone(), value))
            })
            .collect();
        update_url(&self.template, current_url, &overrides)
    }

    /// Bins for the fetched data, or `None` before any data arrived.
    ///
    /// Numeric styles use committed custom bins when present. Bins come from
    /// the full response, never the viewport-scoped subset.
    pub fn bins(
        &self,
        view: &dyn StateView,
        state: &FetchRequestState,
    ) -> Option<Result<ClassificationBins, BinError>> {
        let data = state.data.as_deref()?;
        let bins = match self.spec.style {
            ClassificationStyle::Categorical => Ok(ClassificationBins::Categories(categories(
                data,
                &self.spec.categories,
            ))),
            style => match committed_bins(view, self.name()) {
                Some(custom) => Ok(ClassificationBins::Numeric(custom)),
                None => self.classifier.classify(data, style, self.spec.num_bins),
            },
        };
        Some(bins)
    }

    /// Numeric bins computed from the data, ignoring custom bins. Empty for
    /// categorical styles and before data arrives.
    pub fn computed_bins(&self, state: &FetchRequestState) -> Vec<f64> {
        match (self.spec.style, state.data.as_deref()) {
            (ClassificationStyle::Categorical, _) | (_, None) => Vec::new(),
            (style, Some(data)) => self
                .classifier
                .classify(data, style, self.spec.num_bins)
                .ok()
                .and_then(|bins| bins.as_numeric().map(<[f64]>::to_vec))
                .unwrap_or_default(),
        }
    }

    /// A bin editor seeded with the committed bins, else the computed ones.
    pub fn bin_editor(&self, view: &dyn StateView, state: &FetchRequestState) -> BinEditor {
        BinEditor::open(self.name(), view, &self.computed_bins(state))
    }

    pub fn color_legend(&self) -> Option<Vec<LegendStop>> {
        interpret_color(self.spec.color.as_ref()?, &self.spec.number_format)
    }

    pub fn width_legend(&self) -> Option<Vec<LegendStop>> {
        interpret_width(self.spec.width.as_ref()?, self.spec.width_stops)
    }
}

#[cfg(test)]
mod tests {
    use super::{Visualization, VisualizationSpec};
    use classify::{ClassificationBins, ClassificationStyle, Classifier, bins_slot};
    use fetch::FetchRequestState;
    use foundation::{Dataset, Record, Scalar};
    use params::FilterBinding;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use state::StateStore;
    use std::sync::Arc;

    fn viz(style: ClassificationStyle) -> Visualization {
        let spec = VisualizationSpec::new("income", "/api/income/:county?year={year=2020}", style)
            .with_filter(FilterBinding::new("county", "county").required());
        Visualization::new(spec, Classifier::default()).unwrap()
    }

    fn loaded(values: &[f64]) -> FetchRequestState {
        let records = values
            .iter()
            .enumerate()
            .map(|(i, v)| Record::new(format!("r{i}").as_str(), *v))
            .collect();
        FetchRequestState {
            data: Some(Arc::new(Dataset::new(records))),
            ..FetchRequestState::default()
        }
    }

    #[test]
    fn resolution_reads_bound_slots() {
        let viz = viz(ClassificationStyle::Continuous);
        let mut store = StateStore::new();
        assert!(!viz.resolve(&store).is_ready());
        assert!(viz.reads("county"));
        assert!(!viz.reads("year"));

        store.set("county", Scalar::from("06037"));
        let resolution = viz.resolve(&store);
        assert!(resolution.is_ready());
        assert_eq!(resolution.request.to_url(""), "/api/income/06037?year=2020");
    }

    #[test]
    fn url_follows_store_values() {
        let viz = viz(ClassificationStyle::Continuous);
        let mut store = StateStore::new();
        store.set("county", Scalar::from("06001"));
        assert_eq!(
            viz.update_url(&store, "https://maps.example.org/api/income/06037?year=2018"),
            "https://maps.example.org/api/income/06001?year=2018"
        );
    }

    #[test]
    fn committed_custom_bins_replace_computed_ones() {
        let viz = viz(ClassificationStyle::Continuous);
        let mut store = StateStore::new();
        let state = loaded(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(viz.bins(&store, &FetchRequestState::default()), None);
        assert!(matches!(
            viz.bins(&store, &state),
            Some(Ok(ClassificationBins::Numeric(_)))
        ));

        store.set(
            bins_slot("income"),
            vec![Scalar::from(10.0), Scalar::from(20.0)],
        );
        assert_eq!(
            viz.bins(&store, &state),
            Some(Ok(ClassificationBins::Numeric(vec![10.0, 20.0])))
        );
        assert_eq!(
            viz.bin_editor(&store, &state).draft(),
            &[Scalar::from(10.0), Scalar::from(20.0)]
        );
    }

    #[test]
    fn categorical_bins_list_declared_categories_first() {
        let mut spec = VisualizationSpec::new("zoning", "/api/zoning", ClassificationStyle::Categorical);
        spec.categories = vec![Scalar::from("industrial")];
        let viz = Visualization::new(spec, Classifier::default()).unwrap();
        let state = FetchRequestState {
            data: Some(Arc::new(Dataset::new(vec![
                Record::new("a", "residential"),
                Record::new("b", "industrial"),
            ]))),
            ..FetchRequestState::default()
        };
        assert_eq!(
            viz.bins(&StateStore::new(), &state),
            Some(Ok(ClassificationBins::Categories(vec![
                Scalar::from("industrial"),
                Scalar::from("residential"),
            ])))
        );
    }

    #[test]
    fn legends_come_from_paint_expressions() {
        let spec = VisualizationSpec::new("income", "/api/income", ClassificationStyle::Continuous)
            .with_color(json!(["step", ["get", "value"], "#eee", 10, "#ccc", 20, "#999"]));
        let viz = Visualization::new(spec, Classifier::default()).unwrap();
        let stops = viz.color_legend().unwrap();
        assert_eq!(stops.len(), 2);
        assert_eq!(stops[0].color.as_deref(), Some("#ccc"));
        assert_eq!(viz.width_legend(), None);
    }
}
