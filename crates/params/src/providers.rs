use serde::{Deserialize, Serialize};
use state::StateView;

use crate::request::ParamData;
use crate::resolve::{ParamValue, ValueProvider};

/// Connects a template parameter to a filter slot in the state store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterBinding {
    pub param: String,
    pub filter_key: String,
    #[serde(default)]
    pub required: bool,
    /// Pass the whole list instead of its first value.
    #[serde(default)]
    pub multiple: bool,
}

impl FilterBinding {
    pub fn new(param: impl Into<String>, filter_key: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            filter_key: filter_key.into(),
            required: false,
            multiple: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }
}

/// Filter providers backed by a store or a snapshot of it.
///
/// Reads only; the store is never written through this type.
pub struct StoreProviders<'a, V: StateView + ?Sized> {
    view: &'a V,
    bindings: &'a [FilterBinding],
}

impl<'a, V: StateView + ?Sized> StoreProviders<'a, V> {
    pub fn new(view: &'a V, bindings: &'a [FilterBinding]) -> Self {
        Self { view, bindings }
    }
}

impl<V: StateView + ?Sized> ValueProvider for StoreProviders<'_, V> {
    fn lookup(&self, name: &str) -> Option<ParamValue> {
        let binding = self.bindings.iter().find(|b| b.param == name)?;
        let value = self.view.value(&binding.filter_key).and_then(|v| {
            if binding.multiple {
                let all = v.all();
                (!all.is_empty()).then_some(ParamData::Many(all))
            } else {
                v.first().map(ParamData::One)
            }
        });
        Some(ParamValue {
            value,
            required: binding.required,
        })
    }
}
