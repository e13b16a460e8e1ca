use std::collections::BTreeMap;

use crate::encode::encode_uri_component;
use crate::is_tile_placeholder;
use crate::request::ArrayStyle;
use crate::resolve::Overrides;
use crate::template::{EndpointTemplate, Placeholder, split_origin};

/// Re-render `template` on top of a URL previously produced from it.
///
/// Values come from `overrides` first, then from what `current_url` already
/// carries at the placeholder's position, then from template defaults.
/// Unresolvable path placeholders stay literal. If any non-tile query
/// placeholder is unresolvable, the whole query string of `current_url` is
/// kept as-is rather than emitting a partially resolved query.
pub fn update_url(template: &EndpointTemplate, current_url: &str, overrides: &Overrides) -> String {
    if template.is_static() {
        return template.raw().to_string();
    }

    let current = current_url.split_once('#').map_or(current_url, |(u, _)| u);
    let (current_origin, rest) = split_origin(current);
    let (current_path, current_query) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };

    let found = extract_current_values(template, current_path, current_query);
    let value_for = |ph: &Placeholder, style: ArrayStyle| -> Option<String> {
        if let Some(data) = overrides.get(&ph.name)
            && !data.is_empty()
        {
            return Some(data.encode(style));
        }
        if let Some(raw) = found.get(&ph.name) {
            return Some(raw.clone());
        }
        ph.default.as_deref().map(encode_uri_component)
    };

    let origin = if template.origin().is_empty() {
        current_origin
    } else {
        template.origin()
    };
    let path = template
        .segments()
        .iter()
        .map(|seg| seg.render(|ph| value_for(ph, ArrayStyle::Slash)))
        .collect::<Vec<_>>()
        .join("/");

    let mut url = format!("{origin}{path}");

    let Some(pairs) = template.query() else {
        return url;
    };

    let irresolvable = pairs
        .iter()
        .flat_map(|p| p.value.placeholders())
        .any(|ph| !is_tile_placeholder(&ph.name) && value_for(ph, ArrayStyle::Comma).is_none());

    let query = if irresolvable {
        current_query.unwrap_or_default().to_string()
    } else {
        pairs
            .iter()
            .map(|pair| {
                let value = pair.value.render(|ph| value_for(ph, ArrayStyle::Comma));
                format!("{}={value}", pair.key)
            })
            .collect::<Vec<_>>()
            .join("&")
    };

    if !query.is_empty() {
        url.push('?');
        url.push_str(&query);
    }
    url
}

/// Raw (still encoded) values that `current` holds for each placeholder.
fn extract_current_values(
    template: &EndpointTemplate,
    current_path: &str,
    current_query: Option<&str>,
) -> BTreeMap<String, String> {
    let mut found = BTreeMap::new();

    for (seg, current) in template.segments().iter().zip(current_path.split('/')) {
        if seg.is_literal() {
            continue;
        }
        for (name, raw) in seg.capture(current).unwrap_or_default() {
            found.entry(name).or_insert(raw);
        }
    }

    let current_pairs: Vec<(&str, &str)> = current_query
        .unwrap_or_default()
        .split('&')
        .filter(|p| !p.is_empty())
        .map(|p| p.split_once('=').unwrap_or((p, "")))
        .collect();

    for pair in template.query().unwrap_or_default() {
        if pair.value.is_literal() {
            continue;
        }
        let Some((_, current)) = current_pairs.iter().find(|(k, _)| *k == pair.key) else {
            continue;
        };
        for (name, raw) in pair.value.capture(current).unwrap_or_default() {
            found.entry(name).or_insert(raw);
        }
    }

    found
}
