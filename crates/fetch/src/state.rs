use std::sync::Arc;

use foundation::Dataset;

use crate::error::FetchError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum FetchStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
    /// The request succeeded but returned no records.
    Empty,
}

impl FetchStatus {
    /// A request has finished one way or another.
    pub fn is_settled(self) -> bool {
        matches!(self, FetchStatus::Success | FetchStatus::Error | FetchStatus::Empty)
    }
}

/// What a caller should show for the current fetch.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ViewStatus {
    /// Nothing fetched, or the fetch returned no records.
    NoData,
    /// Records exist but none are inside the current viewport.
    FilteredOut,
    Visible,
}

/// Published state of one visualization's fetch.
///
/// Replaced wholesale whenever a new signature is committed; `data` always
/// belongs to `signature`.
#[derive(Debug, Clone, Default)]
pub struct FetchRequestState {
    pub signature: Option<String>,
    pub status: FetchStatus,
    pub data: Option<Arc<Dataset>>,
    /// Viewport-scoped view of `data`; `None` when scoping is off or the
    /// layer has not rendered yet.
    pub filtered: Option<Arc<Dataset>>,
    pub error: Option<FetchError>,
}

impl FetchRequestState {
    pub fn idle() -> Self {
        Self::default()
    }

    pub(crate) fn loading(signature: String) -> Self {
        Self {
            signature: Some(signature),
            status: FetchStatus::Loading,
            ..Self::default()
        }
    }

    /// Raw data is present but the viewport filter removed every record.
    pub fn filtered_empty(&self) -> bool {
        self.status == FetchStatus::Success && self.filtered.as_ref().is_some_and(|f| f.is_empty())
    }

    pub fn view_status(&self) -> ViewStatus {
        match self.status {
            FetchStatus::Success if self.filtered_empty() => ViewStatus::FilteredOut,
            FetchStatus::Success => ViewStatus::Visible,
            _ => ViewStatus::NoData,
        }
    }

    /// The records to display: the viewport view when there is one.
    pub fn visible_data(&self) -> Option<&Dataset> {
        self.filtered.as_deref().or(self.data.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::{FetchRequestState, FetchStatus, ViewStatus};
    use foundation::{Dataset, Record};
    use std::sync::Arc;

    fn success(raw: usize, filtered: Option<usize>) -> FetchRequestState {
        let records = |n: usize| {
            Arc::new(Dataset::new(
                (0..n).map(|i| Record::new(i as u64, i as f64)).collect(),
            ))
        };
        FetchRequestState {
            signature: Some("sig".into()),
            status: FetchStatus::Success,
            data: Some(records(raw)),
            filtered: filtered.map(records),
            error: None,
        }
    }

    #[test]
    fn distinguishes_no_data_from_filtered_out() {
        assert_eq!(FetchRequestState::idle().view_status(), ViewStatus::NoData);

        let empty = FetchRequestState {
            status: FetchStatus::Empty,
            ..FetchRequestState::idle()
        };
        assert_eq!(empty.view_status(), ViewStatus::NoData);

        let out = success(10, Some(0));
        assert!(out.filtered_empty());
        assert_eq!(out.view_status(), ViewStatus::FilteredOut);

        let visible = success(10, Some(3));
        assert_eq!(visible.view_status(), ViewStatus::Visible);
        assert_eq!(visible.visible_data().map(Dataset::len), Some(3));

        let unscoped = success(10, None);
        assert!(!unscoped.filtered_empty());
        assert_eq!(unscoped.visible_data().map(Dataset::len), Some(10));
    }
}
