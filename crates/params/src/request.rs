use std::collections::BTreeMap;

use foundation::Scalar;
use serde::{Deserialize, Serialize};

use crate::encode::encode_uri_component;
use crate::template::EndpointTemplate;

/// A parameter's resolved data: one value or a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamData {
    One(Scalar),
    Many(Vec<Scalar>),
}

impl ParamData {
    pub fn first(&self) -> Option<&Scalar> {
        match self {
            ParamData::One(s) => Some(s),
            ParamData::Many(v) => v.first(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ParamData::Many(v) if v.is_empty())
    }

    /// Encode every value and join lists with `style`'s separator.
    pub fn encode(&self, style: ArrayStyle) -> String {
        match self {
            ParamData::One(s) => encode_uri_component(&s.to_string()),
            ParamData::Many(values) => values
                .iter()
                .map(|s| encode_uri_component(&s.to_string()))
                .collect::<Vec<_>>()
                .join(style.separator()),
        }
    }
}

impl From<Scalar> for ParamData {
    fn from(v: Scalar) -> Self {
        ParamData::One(v)
    }
}

impl From<&str> for ParamData {
    fn from(v: &str) -> Self {
        ParamData::One(Scalar::from(v))
    }
}

impl From<Vec<Scalar>> for ParamData {
    fn from(v: Vec<Scalar>) -> Self {
        ParamData::Many(v)
    }
}

/// How list values are joined into a single URL component.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayStyle {
    #[default]
    Comma,
    Slash,
}

impl ArrayStyle {
    pub fn separator(self) -> &'static str {
        match self {
            ArrayStyle::Comma => ",",
            ArrayStyle::Slash => "/",
        }
    }
}

/// A fully resolved request: the path template plus every value needed to
/// render it.
///
/// Query values keep the order of the template. Tile placeholders (`x`, `y`,
/// `z`) that were not overridden stay literal in the rendered path and query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRequest {
    pub path: String,
    pub path_params: BTreeMap<String, ParamData>,
    pub query_params: BTreeMap<String, ParamData>,
    /// Query values emitted as-is: literal template text, unfilled tile
    /// placeholders, and mixed values whose substitutions are already encoded.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query_raw: BTreeMap<String, String>,
    #[serde(skip)]
    pub(crate) template: Option<EndpointTemplate>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query_styles: BTreeMap<String, ArrayStyle>,
}

impl ResolvedRequest {
    /// The path with every known path parameter substituted and encoded.
    pub fn rendered_path(&self) -> String {
        let Some(template) = &self.template else {
            return self.path.clone();
        };
        let segments: Vec<String> = template
            .segments()
            .iter()
            .map(|seg| {
                seg.render(|ph| {
                    self.path_params
                        .get(&ph.name)
                        .map(|v| v.encode(ArrayStyle::Slash))
                })
            })
            .collect();
        format!("{}{}", template.origin(), segments.join("/"))
    }

    /// The encoded query string without the leading `?`, in template order.
    pub fn rendered_query(&self) -> String {
        let Some(template) = &self.template else {
            let mut pieces: BTreeMap<&str, String> = self
                .query_params
                .iter()
                .map(|(k, v)| (k.as_str(), v.encode(self.style_for(k))))
                .collect();
            pieces.extend(self.query_raw.iter().map(|(k, v)| (k.as_str(), v.clone())));
            return pieces
                .into_iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("&");
        };
        let mut pieces = Vec::new();
        for pair in template.query().unwrap_or_default() {
            let value = match self.query_raw.get(&pair.key) {
                Some(raw) => raw.clone(),
                None => match self.query_params.get(&pair.key) {
                    Some(data) => data.encode(self.style_for(&pair.key)),
                    None => continue,
                },
            };
            pieces.push(format!("{}={value}", pair.key));
        }
        pieces.join("&")
    }

    /// `base` joined with the rendered path and query.
    pub fn to_url(&self, base: &str) -> String {
        let path = self.rendered_path();
        let mut url = if path.contains("://") || base.is_empty() {
            path
        } else {
            format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
        };
        let query = self.rendered_query();
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }
        url
    }

    fn style_for(&self, key: &str) -> ArrayStyle {
        self.query_styles.get(key).copied().unwrap_or_default()
    }

    /// Stable content hash of the request, used to detect duplicate fetches.
    pub fn signature(&self) -> String {
        let canonical = serde_json::json!({
            "path": self.path,
            "path_params": self.path_params,
            "query_params": self.query_params,
            "query_raw": self.query_raw,
            "query_styles": self.query_styles,
        });
        blake3::hash(canonical.to_string().as_bytes())
            .to_hex()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{ArrayStyle, ParamData};
    use foundation::Scalar;

    #[test]
    fn list_values_join_by_style() {
        let v = ParamData::Many(vec![Scalar::from("a b"), Scalar::from(2)]);
        assert_eq!(v.encode(ArrayStyle::Comma), "a%20b,2");
        assert_eq!(v.encode(ArrayStyle::Slash), "a%20b/2");
    }
}
