use foundation::FeatureId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionItem {
    pub value: FeatureId,
    pub label: String,
}

impl SelectionItem {
    pub fn new(value: impl Into<FeatureId>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Insertion-ordered selection, deduplicated by feature id.
///
/// Ordering contract:
/// - Iteration yields items in the order they were first selected.
/// - Re-inserting an existing id keeps its original position and label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionSet {
    items: Vec<SelectionItem>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &FeatureId) -> bool {
        self.items.iter().any(|i| &i.value == id)
    }

    /// Returns `true` if the set changed.
    pub fn insert(&mut self, item: SelectionItem) -> bool {
        if self.contains(&item.value) {
            return false;
        }
        self.items.push(item);
        true
    }

    /// Returns `true` if the set changed.
    pub fn remove(&mut self, id: &FeatureId) -> bool {
        let before = self.items.len();
        self.items.retain(|i| &i.value != id);
        self.items.len() != before
    }

    /// Removes `item` if present, otherwise appends it.
    ///
    /// Returns `true` if the item is selected afterwards.
    pub fn toggle(&mut self, item: SelectionItem) -> bool {
        if self.remove(&item.value) {
            return false;
        }
        self.items.push(item);
        true
    }

    /// Adds every new item; existing ones are left untouched.
    ///
    /// Returns how many items were added.
    pub fn extend(&mut self, items: impl IntoIterator<Item = SelectionItem>) -> usize {
        let mut added = 0;
        for item in items {
            if self.insert(item) {
                added += 1;
            }
        }
        added
    }

    pub fn iter(&self) -> impl Iterator<Item = &SelectionItem> {
        self.items.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &FeatureId> {
        self.items.iter().map(|i| &i.value)
    }
}

impl FromIterator<SelectionItem> for SelectionSet {
    fn from_iter<T: IntoIterator<Item = SelectionItem>>(iter: T) -> Self {
        let mut s = SelectionSet::new();
        s.extend(iter);
        s
    }
}
