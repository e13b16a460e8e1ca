use foundation::Scalar;
use state::{Action, StateStore, StateValue, StateView};
use tracing::{debug, warn};

use crate::custom::{BinError, resize_bins, validate_custom_bins};

/// Store slot holding committed custom bins for a visualization.
pub fn bins_slot(visualization: &str) -> String {
    format!("{visualization}.bins")
}

/// Valid custom bins committed for `visualization`, if any.
pub fn committed_bins(view: &dyn StateView, visualization: &str) -> Option<Vec<f64>> {
    let StateValue::List(values) = view.value(&bins_slot(visualization))? else {
        return None;
    };
    validate_custom_bins(values).ok()
}

/// Uncommitted custom bin edits.
///
/// The draft may be invalid while the user types; only [`BinEditor::commit`]
/// writes to the store, and only a valid sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct BinEditor {
    visualization: String,
    draft: Vec<Scalar>,
}

impl BinEditor {
    /// Start from the committed bins, or from `computed` when none exist.
    pub fn open(visualization: impl Into<String>, view: &dyn StateView, computed: &[f64]) -> Self {
        let visualization = visualization.into();
        let start = committed_bins(view, &visualization).unwrap_or_else(|| computed.to_vec());
        Self {
            visualization,
            draft: start.into_iter().map(Scalar::from).collect(),
        }
    }

    pub fn visualization(&self) -> &str {
        &self.visualization
    }

    pub fn draft(&self) -> &[Scalar] {
        &self.draft
    }

    /// Replace one entry. Returns `false` if `index` is out of range.
    pub fn set(&mut self, index: usize, value: impl Into<Scalar>) -> bool {
        match self.draft.get_mut(index) {
            Some(slot) => {
                *slot = value.into();
                true
            }
            None => false,
        }
    }

    /// Change the bin count, keeping existing values.
    pub fn resize(&mut self, n: usize) -> Result<(), BinError> {
        let current = match self.draft.as_slice() {
            [] => Vec::new(),
            draft => validate_custom_bins(draft)?,
        };
        self.draft = resize_bins(&current, n).into_iter().map(Scalar::from).collect();
        Ok(())
    }

    pub fn validate(&self) -> Result<Vec<f64>, BinError> {
        validate_custom_bins(&self.draft)
    }

    /// Validate and write the draft into the store. A rejected draft leaves
    /// the previously committed bins in effect.
    pub fn commit(&self, store: &mut StateStore) -> Result<Vec<f64>, BinError> {
        let bins = match self.validate() {
            Ok(bins) => bins,
            Err(err) => {
                warn!(visualization = %self.visualization, "custom bins rejected: {err}");
                return Err(err);
            }
        };
        let values: Vec<Scalar> = bins.iter().copied().map(Scalar::from).collect();
        store.set(bins_slot(&self.visualization), values);
        debug!(visualization = %self.visualization, count = bins.len(), "custom bins committed");
        Ok(bins)
    }

    /// Drop committed custom bins so computed ones apply again.
    pub fn clear(&mut self, store: &mut StateStore, computed: &[f64]) {
        store.dispatch(Action::reset(bins_slot(&self.visualization)));
        self.draft = computed.iter().copied().map(Scalar::from).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::{BinEditor, bins_slot, committed_bins};
    use crate::custom::BinError;
    use foundation::Scalar;
    use pretty_assertions::assert_eq;
    use state::StateStore;

    #[test]
    fn commit_writes_valid_bins_to_store() {
        let mut store = StateStore::new();
        let mut editor = BinEditor::open("rates", &store, &[10.0, 20.0, 30.0]);
        assert!(editor.set(2, 45.0));
        assert!(!editor.set(9, 1.0));

        assert_eq!(editor.commit(&mut store), Ok(vec![10.0, 20.0, 45.0]));
        assert_eq!(committed_bins(&store, "rates"), Some(vec![10.0, 20.0, 45.0]));
        assert_eq!(store.get(&bins_slot("rates")).map(|v| v.all().len()), Some(3));
    }

    #[test]
    fn rejected_commit_keeps_previous_bins() {
        let mut store = StateStore::new();
        BinEditor::open("rates", &store, &[1.0, 2.0])
            .commit(&mut store)
            .unwrap();

        let mut editor = BinEditor::open("rates", &store, &[100.0]);
        assert_eq!(editor.draft(), &[Scalar::from(1.0), Scalar::from(2.0)]);
        editor.set(1, "x");
        assert!(matches!(
            editor.commit(&mut store),
            Err(BinError::NotNumeric { index: 1, .. })
        ));
        assert_eq!(committed_bins(&store, "rates"), Some(vec![1.0, 2.0]));
    }

    #[test]
    fn resize_and_clear() {
        let mut store = StateStore::new();
        let mut editor = BinEditor::open("rates", &store, &[5.0, 10.0]);
        editor.resize(4).unwrap();
        assert_eq!(editor.validate(), Ok(vec![5.0, 10.0, 15.0, 20.0]));
        editor.resize(1).unwrap();
        assert_eq!(editor.validate(), Ok(vec![5.0]));
        editor.commit(&mut store).unwrap();

        editor.clear(&mut store, &[7.0, 8.0]);
        assert_eq!(committed_bins(&store, "rates"), None);
        assert_eq!(editor.validate(), Ok(vec![7.0, 8.0]));
    }
}
