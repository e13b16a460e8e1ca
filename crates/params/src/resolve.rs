use std::collections::{BTreeMap, BTreeSet};

use foundation::Scalar;

use crate::is_tile_placeholder;
use crate::request::{ArrayStyle, ParamData, ResolvedRequest};
use crate::template::{EndpointTemplate, ParamError, Placeholder};

/// What a provider knows about one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamValue {
    pub value: Option<ParamData>,
    pub required: bool,
}

impl ParamValue {
    pub fn required(value: impl Into<ParamData>) -> Self {
        Self {
            value: Some(value.into()),
            required: true,
        }
    }

    pub fn optional(value: Option<ParamData>) -> Self {
        Self {
            value,
            required: false,
        }
    }
}

/// Read-only source of parameter values, typically backed by filters.
pub trait ValueProvider {
    fn lookup(&self, name: &str) -> Option<ParamValue>;
}

impl ValueProvider for BTreeMap<String, ParamValue> {
    fn lookup(&self, name: &str) -> Option<ParamValue> {
        self.get(name).cloned()
    }
}

impl<T: ValueProvider + ?Sized> ValueProvider for &T {
    fn lookup(&self, name: &str) -> Option<ParamValue> {
        (**self).lookup(name)
    }
}

/// A provider that knows nothing; only overrides and defaults apply.
#[derive(Debug, Copy, Clone, Default)]
pub struct NoProviders;

impl ValueProvider for NoProviders {
    fn lookup(&self, _name: &str) -> Option<ParamValue> {
        None
    }
}

pub type Overrides = BTreeMap<String, ParamData>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolveOptions {
    pub overrides: Overrides,
    /// Query keys whose list values join with `/` instead of `,`.
    pub slash_joined: BTreeSet<String>,
}

impl ResolveOptions {
    pub fn with_override(mut self, name: impl Into<String>, value: impl Into<ParamData>) -> Self {
        self.overrides.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ParamLocation {
    Path,
    Query,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingParam {
    pub name: String,
    pub location: ParamLocation,
    /// Required parameters block fetching; optional ones are just dropped.
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub request: ResolvedRequest,
    pub missing: Vec<MissingParam>,
}

impl Resolution {
    /// True when no required parameter is missing.
    pub fn is_ready(&self) -> bool {
        self.missing.iter().all(|m| !m.required)
    }

    pub fn missing_names(&self) -> Vec<&str> {
        self.missing.iter().map(|m| m.name.as_str()).collect()
    }
}

/// Parse and resolve in one step.
pub fn resolve_str(
    raw: &str,
    providers: &dyn ValueProvider,
    options: &ResolveOptions,
) -> Result<Resolution, ParamError> {
    let template = EndpointTemplate::parse(raw)?;
    Ok(resolve(&template, providers, options))
}

/// Resolve every placeholder of `template`.
///
/// Precedence per name: explicit override, then the provider's current value,
/// then the template default. Anything else is reported as missing. Tile
/// placeholders are never missing and stay literal unless overridden.
pub fn resolve(
    template: &EndpointTemplate,
    providers: &dyn ValueProvider,
    options: &ResolveOptions,
) -> Resolution {
    let mut path_params = BTreeMap::new();
    let mut query_params = BTreeMap::new();
    let mut query_raw = BTreeMap::new();
    let mut missing: Vec<MissingParam> = Vec::new();

    let mut note_missing = |name: &str, location: ParamLocation, required: bool| {
        if !missing.iter().any(|m| m.name == name) {
            missing.push(MissingParam {
                name: name.to_string(),
                location,
                required,
            });
        }
    };

    for ph in template.path_placeholders() {
        match lookup(ph, providers, options) {
            Lookup::Found(data) => {
                path_params.insert(ph.name.clone(), data);
            }
            Lookup::Tile => {}
            // Paths cannot be rendered without every segment.
            Lookup::Missing { .. } => note_missing(&ph.name, ParamLocation::Path, true),
        }
    }

    for pair in template.query().unwrap_or_default() {
        let style = if options.slash_joined.contains(&pair.key) {
            ArrayStyle::Slash
        } else {
            ArrayStyle::Comma
        };

        if pair.value.is_literal() {
            query_raw.insert(pair.key.clone(), pair.value.render(|_| None));
            continue;
        }

        if let Some(ph) = pair.value.sole_placeholder() {
            match lookup(ph, providers, options) {
                Lookup::Found(data) => {
                    query_params.insert(pair.key.clone(), data);
                }
                Lookup::Tile => {
                    query_raw.insert(pair.key.clone(), ph.literal());
                }
                Lookup::Missing { required } => {
                    note_missing(&ph.name, ParamLocation::Query, required)
                }
            }
            continue;
        }

        // Mixed value: literal text stays verbatim, each substitution is
        // encoded on its own.
        let mut complete = true;
        let text = pair.value.render(|ph| match lookup(ph, providers, options) {
            Lookup::Found(data) => Some(data.encode(style)),
            Lookup::Tile => None,
            Lookup::Missing { required } => {
                complete = false;
                note_missing(&ph.name, ParamLocation::Query, required);
                None
            }
        });
        if complete {
            query_raw.insert(pair.key.clone(), text);
        }
    }

    let query_styles = options
        .slash_joined
        .iter()
        .filter(|k| query_params.contains_key(*k))
        .map(|k| (k.clone(), ArrayStyle::Slash))
        .collect();

    Resolution {
        request: ResolvedRequest {
            path: template.path(),
            path_params,
            query_params,
            query_raw,
            template: Some(template.clone()),
            query_styles,
        },
        missing,
    }
}

enum Lookup {
    Found(ParamData),
    Tile,
    Missing { required: bool },
}

fn lookup(ph: &Placeholder, providers: &dyn ValueProvider, options: &ResolveOptions) -> Lookup {
    if let Some(data) = options.overrides.get(&ph.name)
        && !data.is_empty()
    {
        return Lookup::Found(data.clone());
    }
    if is_tile_placeholder(&ph.name) {
        return Lookup::Tile;
    }

    let provided = providers.lookup(&ph.name);
    if let Some(data) = provided.as_ref().and_then(|p| p.value.as_ref())
        && !data.is_empty()
    {
        return Lookup::Found(data.clone());
    }
    if let Some(default) = &ph.default {
        return Lookup::Found(ParamData::One(Scalar::Text(default.clone())));
    }
    // Without a provider we cannot know the parameter is optional.
    Lookup::Missing {
        required: provided.map(|p| p.required).unwrap_or(true),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        MissingParam, NoProviders, ParamLocation, ParamValue, ResolveOptions, resolve, resolve_str,
    };
    use crate::request::ParamData;
    use crate::template::EndpointTemplate;
    use foundation::Scalar;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn providers(entries: &[(&str, ParamValue)]) -> BTreeMap<String, ParamValue> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn overrides_are_encoded_into_the_path() {
        let options = ResolveOptions::default()
            .with_override("id", "A/B")
            .with_override("orderId", "x y");
        let res = resolve_str("/users/{id}/orders/:orderId", &NoProviders, &options).unwrap();
        assert!(res.missing.is_empty());
        assert_eq!(res.request.rendered_path(), "/users/A%2FB/orders/x%20y");
    }

    #[test]
    fn precedence_is_override_then_provider_then_default() {
        let t = EndpointTemplate::parse("/d/{a=1}/{b=2}/{c=3}").unwrap();
        let p = providers(&[
            ("a", ParamValue::required(Scalar::from("pa"))),
            ("b", ParamValue::required(Scalar::from("pb"))),
        ]);
        let options = ResolveOptions::default().with_override("a", "oa");
        let res = resolve(&t, &p, &options);
        assert_eq!(res.request.rendered_path(), "/d/oa/pb/3");
    }

    #[test]
    fn unresolved_names_are_missing_but_tiles_are_not() {
        let t = EndpointTemplate::parse("/tiles/{layer}/{z}/{x}/{y}.pbf?year={year}").unwrap();
        let res = resolve(&t, &NoProviders, &ResolveOptions::default());
        assert_eq!(res.missing_names(), vec!["layer", "year"]);
        assert!(!res.is_ready());
        assert_eq!(res.request.rendered_path(), "/tiles/{layer}/{z}/{x}/{y}.pbf");
    }

    #[test]
    fn optional_query_params_are_dropped_not_blocking() {
        let t = EndpointTemplate::parse("/d?year={year}&county={county}").unwrap();
        let p = providers(&[
            ("year", ParamValue::required(Scalar::from(2020))),
            ("county", ParamValue::optional(None)),
        ]);
        let res = resolve(&t, &p, &ResolveOptions::default());
        assert!(res.is_ready());
        assert_eq!(
            res.missing,
            vec![MissingParam {
                name: "county".into(),
                location: ParamLocation::Query,
                required: false,
            }]
        );
        assert_eq!(res.request.to_url("https://api.test"), "https://api.test/d?year=2020");
    }

    #[test]
    fn list_values_join_with_comma_or_slash() {
        let t = EndpointTemplate::parse("/d/{ids}?ids={ids}&path={ids}").unwrap();
        let ids = ParamData::Many(vec![Scalar::from("1"), Scalar::from("2")]);
        let mut options = ResolveOptions::default().with_override("ids", ids);
        options.slash_joined.insert("path".into());
        let res = resolve(&t, &NoProviders, &options);
        assert_eq!(res.request.to_url(""), "/d/1/2?ids=1,2&path=1/2");
    }

    #[test]
    fn resolution_is_idempotent() {
        let t = EndpointTemplate::parse("/d/:geo?year={year=2019}&kind=rate").unwrap();
        let p = providers(&[("geo", ParamValue::required(Scalar::from("06")))]);
        let a = resolve(&t, &p, &ResolveOptions::default());
        let b = resolve(&t, &p, &ResolveOptions::default());
        assert_eq!(a, b);
        assert_eq!(a.request.signature(), b.request.signature());
        assert_eq!(a.request.to_url(""), "/d/06?year=2019&kind=rate");
    }

    #[test]
    fn static_template_returns_itself() {
        let res = resolve_str("/api/static?x=1", &NoProviders, &ResolveOptions::default()).unwrap();
        assert_eq!(res.request.to_url(""), "/api/static?x=1");
    }

    #[test]
    fn literal_query_text_is_not_reencoded() {
        let raw = "/api/static?fields=a,b&q=a%20b";
        let res = resolve_str(raw, &NoProviders, &ResolveOptions::default()).unwrap();
        assert_eq!(res.request.to_url(""), raw);
    }

    #[test]
    fn tile_placeholders_stay_literal_in_the_query() {
        let res = resolve_str("/t?z={z}&year={year=2020}", &NoProviders, &ResolveOptions::default())
            .unwrap();
        assert!(res.is_ready());
        assert_eq!(res.request.to_url(""), "/t?z={z}&year=2020");

        let options = ResolveOptions::default().with_override("z", "4");
        let res = resolve_str("/t?z={z}", &NoProviders, &options).unwrap();
        assert_eq!(res.request.to_url(""), "/t?z=4");
    }

    #[test]
    fn mixed_query_values_encode_each_substitution() {
        let t = EndpointTemplate::parse("/d?range={ids}-x&path=p{ids}&q=name:{name}").unwrap();
        let ids = ParamData::Many(vec![Scalar::from("1"), Scalar::from("2")]);
        let mut options = ResolveOptions::default()
            .with_override("ids", ids)
            .with_override("name", "a b");
        options.slash_joined.insert("path".into());
        let res = resolve(&t, &NoProviders, &options);
        assert_eq!(res.request.to_url(""), "/d?range=1,2-x&path=p1/2&q=name:a%20b");
    }

    #[test]
    fn mixed_query_value_with_missing_part_is_dropped() {
        let res = resolve_str("/d?range={lo}-{hi=9}", &NoProviders, &ResolveOptions::default())
            .unwrap();
        assert_eq!(res.missing_names(), vec!["lo"]);
        assert_eq!(res.request.to_url(""), "/d");
    }

    #[test]
    fn signature_changes_with_values() {
        let t = EndpointTemplate::parse("/d?year={year}").unwrap();
        let a = resolve(&t, &NoProviders, &ResolveOptions::default().with_override("year", "1"));
        let b = resolve(&t, &NoProviders, &ResolveOptions::default().with_override("year", "2"));
        assert_ne!(a.request.signature(), b.request.signature());
    }
}
