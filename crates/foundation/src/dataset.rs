use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::scalar::{Scalar, format_number};

/// Stable feature identifier shared by fetched records and map features.
///
/// Numeric ids from JSON are normalized to their canonical text form so that
/// `12` from an API and `"12"` from a tile compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct FeatureId(pub String);

impl<'de> Deserialize<'de> for FeatureId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Scalar::deserialize(deserializer)? {
            Scalar::Text(s) => Ok(Self(s)),
            Scalar::Number(n) => Ok(Self(format_number(n))),
            Scalar::Bool(b) => Err(serde::de::Error::custom(format!(
                "feature id cannot be a boolean ({b})"
            ))),
        }
    }
}

impl FeatureId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(Self(s.clone())),
            serde_json::Value::Number(n) => n.as_f64().map(|v| Self(format_number(v))),
            _ => None,
        }
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeatureId {
    fn from(v: &str) -> Self {
        Self(v.to_string())
    }
}

impl From<u64> for FeatureId {
    fn from(v: u64) -> Self {
        Self(v.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: FeatureId,
    pub value: Option<Scalar>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl Record {
    pub fn new(id: impl Into<FeatureId>, value: impl Into<Scalar>) -> Self {
        Self {
            id: id.into(),
            value: Some(value.into()),
            properties: serde_json::Map::new(),
        }
    }
}

/// Names of the id and value columns in a fetched row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetShape {
    pub id_field: String,
    pub value_field: String,
}

impl Default for DatasetShape {
    fn default() -> Self {
        Self {
            id_field: "id".to_string(),
            value_field: "value".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetError {
    NotAnArray,
    NotAnObject { index: usize },
    MissingId { index: usize, field: String },
}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetError::NotAnArray => write!(f, "dataset payload is not an array of rows"),
            DatasetError::NotAnObject { index } => write!(f, "row {index} is not an object"),
            DatasetError::MissingId { index, field } => {
                write!(f, "row {index} has no usable id field `{field}`")
            }
        }
    }
}

impl std::error::Error for DatasetError {}

/// Ordered list of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Build a dataset from a JSON payload.
    ///
    /// Accepts either a bare array of rows or an object wrapping the rows in
    /// `data`. Rows without a value column keep `value: None`.
    pub fn from_json(payload: &serde_json::Value, shape: &DatasetShape) -> Result<Self, DatasetError> {
        let rows = match payload {
            serde_json::Value::Array(rows) => rows,
            serde_json::Value::Object(obj) => match obj.get("data") {
                Some(serde_json::Value::Array(rows)) => rows,
                _ => return Err(DatasetError::NotAnArray),
            },
            _ => return Err(DatasetError::NotAnArray),
        };

        let mut records = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            let Some(obj) = row.as_object() else {
                return Err(DatasetError::NotAnObject { index });
            };
            let id = obj
                .get(&shape.id_field)
                .and_then(FeatureId::from_json)
                .ok_or_else(|| DatasetError::MissingId {
                    index,
                    field: shape.id_field.clone(),
                })?;
            let value = obj.get(&shape.value_field).and_then(Scalar::from_json);
            let mut properties = obj.clone();
            properties.remove(&shape.id_field);
            properties.remove(&shape.value_field);
            records.push(Record {
                id,
                value,
                properties,
            });
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Present values in record order.
    pub fn values(&self) -> impl Iterator<Item = &Scalar> {
        self.records.iter().filter_map(|r| r.value.as_ref())
    }

    /// Finite numeric values in record order; non-numeric values are skipped.
    pub fn numeric_values(&self) -> Vec<f64> {
        self.values().filter_map(Scalar::as_f64).collect()
    }

    /// Records whose id is in `ids`, preserving dataset order.
    pub fn retain_ids(&self, ids: &HashSet<FeatureId>) -> Dataset {
        Dataset {
            records: self
                .records
                .iter()
                .filter(|r| ids.contains(&r.id))
                .cloned()
                .collect(),
        }
    }
}
