//! Debounced fetch scheduling for one visualization.
//!
//! Ordering contract:
//! - `schedule` only records a *pending* signature and (re)starts the
//!   debounce timer.
//! - The *committed* signature changes only when the debounced task starts
//!   executing. A schedule that is superseded or cancelled while waiting
//!   therefore never blocks a later request with the same signature.
//! - A result is applied only if its signature is still the committed one;
//!   superseded results are dropped and their requests aborted.
//! - Viewport filtering always reads the latest published raw data.

use std::sync::Arc;
use std::time::Duration;

use foundation::Dataset;
use params::{Resolution, ResolvedRequest};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::source::DataSource;
use crate::state::{FetchRequestState, FetchStatus};
use crate::viewport::ViewportScope;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Quiescence window before a scheduled request executes.
    pub debounce: Duration,
    /// Quiescence window before a viewport change refilters the data.
    pub viewport_debounce: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(400),
            viewport_debounce: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Default)]
struct Signatures {
    pending: Option<String>,
    committed: Option<String>,
}

#[derive(Debug, Default)]
struct Tasks {
    debounce: Option<JoinHandle<()>>,
    viewport: Option<JoinHandle<()>>,
    in_flight: Option<CancellationToken>,
}

impl Tasks {
    fn cancel_all(&mut self) {
        if let Some(task) = self.debounce.take() {
            task.abort();
        }
        if let Some(task) = self.viewport.take() {
            task.abort();
        }
        if let Some(token) = self.in_flight.take() {
            token.cancel();
        }
    }
}

#[derive(Debug, Default)]
struct Slots {
    signatures: Signatures,
    tasks: Tasks,
    viewport: Option<ViewportScope>,
    owner: Option<String>,
}

struct Shared {
    source: Arc<dyn DataSource>,
    options: FetchOptions,
    slots: Mutex<Slots>,
    state: watch::Sender<FetchRequestState>,
}

/// Schedules fetches for one visualization and publishes its
/// [`FetchRequestState`].
///
/// Must be used from within a Tokio runtime; scheduling spawns tasks.
pub struct DataFetchCoordinator {
    shared: Arc<Shared>,
}

impl DataFetchCoordinator {
    pub fn new(source: Arc<dyn DataSource>, options: FetchOptions) -> Self {
        let (state, _) = watch::channel(FetchRequestState::idle());
        Self {
            shared: Arc::new(Shared {
                source,
                options,
                slots: Mutex::new(Slots::default()),
                state,
            }),
        }
    }

    pub fn options(&self) -> FetchOptions {
        self.shared.options
    }

    pub fn state(&self) -> FetchRequestState {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchRequestState> {
        self.shared.state.subscribe()
    }

    pub fn pending_signature(&self) -> Option<String> {
        self.shared.slots.lock().signatures.pending.clone()
    }

    pub fn committed_signature(&self) -> Option<String> {
        self.shared.slots.lock().signatures.committed.clone()
    }

    /// Request a fetch for `resolution`.
    ///
    /// Returns the state as it is now; progress is observed through
    /// [`Self::subscribe`]. If a required parameter is missing, any pending
    /// request is cancelled and the state is left untouched. A request whose
    /// signature is already committed is not fetched again.
    pub fn schedule(&self, resolution: &Resolution) -> FetchRequestState {
        let mut slots = self.shared.slots.lock();

        if !resolution.is_ready() {
            if let Some(task) = slots.tasks.debounce.take() {
                task.abort();
            }
            if slots.signatures.pending.take().is_some() {
                debug!(
                    missing = ?resolution.missing_names(),
                    "required parameters missing; pending fetch dropped"
                );
            }
            drop(slots);
            return self.state();
        }

        let request = resolution.request.clone();
        let signature = request.signature();

        if slots.signatures.pending.as_deref() == Some(signature.as_str()) {
            drop(slots);
            return self.state();
        }

        if let Some(task) = slots.tasks.debounce.take() {
            task.abort();
            debug!("debounced fetch superseded");
        }

        if slots.signatures.committed.as_deref() == Some(signature.as_str()) {
            // Back to the request that is already loaded or loading.
            slots.signatures.pending = None;
            drop(slots);
            return self.state();
        }

        debug!(signature = short(&signature), "fetch scheduled");
        slots.signatures.pending = Some(signature.clone());
        let shared = Arc::clone(&self.shared);
        let delay = self.shared.options.debounce;
        slots.tasks.debounce = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared.execute(request, signature).await;
        }));
        drop(slots);
        self.state()
    }

    /// Replace the viewport scope and refilter the current data right away.
    pub fn set_viewport(&self, scope: Option<ViewportScope>) {
        let mut slots = self.shared.slots.lock();
        if let Some(task) = slots.tasks.viewport.take() {
            task.abort();
        }
        slots.viewport = scope;
        self.shared.refilter(&slots);
    }

    /// The map moved: refilter once the viewport has been still for
    /// `viewport_debounce`.
    pub fn on_viewport_change(&self) {
        let mut slots = self.shared.slots.lock();
        if slots.viewport.is_none() {
            return;
        }
        if let Some(task) = slots.tasks.viewport.take() {
            task.abort();
        }
        let shared = Arc::clone(&self.shared);
        let delay = self.shared.options.viewport_debounce;
        slots.tasks.viewport = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let slots = shared.slots.lock();
            shared.refilter(&slots);
        }));
    }

    /// Cancel all pending and in-flight work and go back to `Idle`.
    pub fn reset(&self) {
        let mut slots = self.shared.slots.lock();
        slots.tasks.cancel_all();
        slots.signatures = Signatures::default();
        self.shared.state.send_replace(FetchRequestState::idle());
        debug!("fetch state reset");
    }

    /// Record the identity of the page that owns this visualization.
    ///
    /// A change of owner resets the coordinator before anything else is
    /// scheduled, so data from the previous page never leaks into the new
    /// one. Returns `true` when a reset happened.
    pub fn set_owner(&self, owner: &str) -> bool {
        let previous = self.shared.slots.lock().owner.replace(owner.to_string());
        match previous {
            Some(previous) if previous != owner => {
                info!(from = %previous, to = owner, "visualization owner changed");
                self.reset();
                true
            }
            _ => false,
        }
    }
}

impl Drop for DataFetchCoordinator {
    fn drop(&mut self) {
        self.shared.slots.lock().tasks.cancel_all();
    }
}

impl Shared {
    async fn execute(self: Arc<Self>, request: ResolvedRequest, signature: String) {
        let cancel = {
            let mut slots = self.slots.lock();
            if slots.signatures.pending.as_deref() != Some(signature.as_str()) {
                return;
            }
            slots.signatures.pending = None;
            slots.signatures.committed = Some(signature.clone());
            // Our own handle: dropping it detaches, it does not abort.
            slots.tasks.debounce = None;
            if let Some(previous) = slots.tasks.in_flight.take() {
                previous.cancel();
                debug!("in-flight fetch aborted");
            }
            let token = CancellationToken::new();
            slots.tasks.in_flight = Some(token.clone());
            self.state
                .send_replace(FetchRequestState::loading(signature.clone()));
            token
        };

        info!(signature = short(&signature), "fetch committed");
        let result = self.source.get(&request, cancel).await;
        self.apply(&signature, result);
    }

    fn apply(&self, signature: &str, result: Result<Dataset, FetchError>) {
        let mut slots = self.slots.lock();
        if slots.signatures.committed.as_deref() != Some(signature) {
            debug!(signature = short(signature), "superseded result discarded");
            return;
        }
        slots.tasks.in_flight = None;

        let next = match result {
            Ok(data) if data.is_empty() => FetchRequestState {
                signature: Some(signature.to_string()),
                status: FetchStatus::Empty,
                data: Some(Arc::new(data)),
                ..FetchRequestState::idle()
            },
            Ok(data) => {
                let filtered = slots
                    .viewport
                    .as_ref()
                    .and_then(|scope| scope.apply(&data))
                    .map(Arc::new);
                debug!(records = data.len(), "fetch succeeded");
                FetchRequestState {
                    signature: Some(signature.to_string()),
                    status: FetchStatus::Success,
                    data: Some(Arc::new(data)),
                    filtered,
                    error: None,
                }
            }
            Err(err) => {
                warn!("fetch failed: {err}");
                FetchRequestState {
                    signature: Some(signature.to_string()),
                    status: FetchStatus::Error,
                    error: Some(err),
                    ..FetchRequestState::idle()
                }
            }
        };
        self.state.send_replace(next);
    }

    /// Recompute the viewport view from the latest published raw data.
    fn refilter(&self, slots: &Slots) {
        self.state.send_if_modified(|state| {
            if state.status != FetchStatus::Success {
                return false;
            }
            let Some(raw) = state.data.clone() else {
                return false;
            };
            state.filtered = slots
                .viewport
                .as_ref()
                .and_then(|scope| scope.apply(&raw))
                .map(Arc::new);
            true
        });
    }
}

fn short(signature: &str) -> &str {
    signature.get(..12).unwrap_or(signature)
}

#[cfg(test)]
mod tests {
    use super::{DataFetchCoordinator, FetchOptions};
    use crate::error::FetchError;
    use crate::source::{BoxFuture, DataSource, MemorySource};
    use crate::state::{FetchRequestState, FetchStatus, ViewStatus};
    use crate::viewport::{StaticRenderedFeatures, ViewportScope};
    use foundation::{Dataset, FeatureId, Record};
    use params::{NoProviders, ResolveOptions, Resolution, ResolvedRequest, resolve_str};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn resolution(year: &str) -> Resolution {
        let options = ResolveOptions::default().with_override("year", year);
        resolve_str("/rates?year={year}", &NoProviders, &options).unwrap()
    }

    fn records(n: u64) -> Dataset {
        Dataset::new((1..=n).map(|i| Record::new(i, i as f64 * 10.0)).collect())
    }

    async fn settle(coord: &DataFetchCoordinator) -> FetchRequestState {
        let mut rx = coord.subscribe();
        rx.wait_for(|s| s.status.is_settled()).await.unwrap().clone()
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_changes_collapse_into_one_fetch() {
        let source = Arc::new(
            MemorySource::new()
                .with_dataset("/rates?year=2019", records(2))
                .with_dataset("/rates?year=2020", records(3)),
        );
        let coord = DataFetchCoordinator::new(source.clone(), FetchOptions::default());

        coord.schedule(&resolution("2019"));
        sleep_ms(100).await;
        coord.schedule(&resolution("2020"));

        let state = settle(&coord).await;
        assert_eq!(source.calls(), vec!["/rates?year=2020".to_string()]);
        assert_eq!(state.status, FetchStatus::Success);
        assert_eq!(state.signature, Some(resolution("2020").request.signature()));
        assert_eq!(state.data.map(|d| d.len()), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn committed_signature_moves_only_when_execution_starts() {
        let source = Arc::new(
            MemorySource::new()
                .with_delayed("/rates?year=2019", records(2), Duration::from_secs(1))
                .with_dataset("/rates?year=2020", records(3)),
        );
        let coord = DataFetchCoordinator::new(source.clone(), FetchOptions::default());
        let a = resolution("2019").request.signature();
        let b = resolution("2020").request.signature();

        coord.schedule(&resolution("2019"));
        assert_eq!(coord.pending_signature(), Some(a.clone()));
        assert_eq!(coord.committed_signature(), None);

        sleep_ms(450).await;
        assert_eq!(coord.pending_signature(), None);
        assert_eq!(coord.committed_signature(), Some(a.clone()));
        assert_eq!(coord.state().status, FetchStatus::Loading);

        coord.schedule(&resolution("2020"));
        assert_eq!(coord.pending_signature(), Some(b.clone()));
        assert_eq!(coord.committed_signature(), Some(a));

        let state = settle(&coord).await;
        assert_eq!(state.signature, Some(b.clone()));

        // Long after the slow request would have landed, B is still shown.
        sleep_ms(2_000).await;
        let state = coord.state();
        assert_eq!(state.status, FetchStatus::Success);
        assert_eq!(state.signature, Some(b));
        assert_eq!(state.data.map(|d| d.len()), Some(3));
        assert_eq!(source.calls().len(), 2);
    }

    /// Never answers on its own; keeps every token it is handed.
    #[derive(Default)]
    struct HangingSource {
        tokens: Mutex<Vec<CancellationToken>>,
    }

    impl DataSource for HangingSource {
        fn get(
            &self,
            _request: &ResolvedRequest,
            cancel: CancellationToken,
        ) -> BoxFuture<'_, Result<Dataset, FetchError>> {
            self.tokens.lock().push(cancel.clone());
            Box::pin(async move {
                cancel.cancelled().await;
                Err(FetchError::Aborted)
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_request_is_cancelled_in_flight() {
        let source = Arc::new(HangingSource::default());
        let coord = DataFetchCoordinator::new(source.clone(), FetchOptions::default());

        coord.schedule(&resolution("2019"));
        sleep_ms(450).await;
        coord.schedule(&resolution("2020"));
        sleep_ms(450).await;

        let tokens = source.tokens.lock().clone();
        assert_eq!(tokens.len(), 2);
        assert!(tokens[0].is_cancelled());
        assert!(!tokens[1].is_cancelled());
        assert_eq!(coord.state().status, FetchStatus::Loading);

        coord.reset();
        assert!(tokens[1].is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_schedule_does_not_block_same_request_later() {
        let source = Arc::new(MemorySource::new().with_dataset("/rates?year=2019", records(1)));
        let coord = DataFetchCoordinator::new(source.clone(), FetchOptions::default());

        coord.schedule(&resolution("2019"));
        coord.reset();
        sleep_ms(1_000).await;
        assert!(source.calls().is_empty());

        coord.schedule(&resolution("2019"));
        let state = settle(&coord).await;
        assert_eq!(state.status, FetchStatus::Success);
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_required_params_cancel_pending_work() {
        let source = Arc::new(MemorySource::new().with_dataset("/rates?year=2019", records(1)));
        let coord = DataFetchCoordinator::new(source.clone(), FetchOptions::default());

        coord.schedule(&resolution("2019"));
        let missing = resolve_str("/rates/:geo", &NoProviders, &ResolveOptions::default()).unwrap();
        assert!(!missing.is_ready());
        let state = coord.schedule(&missing);
        assert_eq!(state.status, FetchStatus::Idle);

        sleep_ms(1_000).await;
        assert!(source.calls().is_empty());
        assert_eq!(coord.state().status, FetchStatus::Idle);
        assert_eq!(coord.pending_signature(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn same_signature_is_not_refetched_after_error() {
        let source = Arc::new(
            MemorySource::new().with_error("/rates?year=2019", FetchError::Status(500)),
        );
        let coord = DataFetchCoordinator::new(source.clone(), FetchOptions::default());

        coord.schedule(&resolution("2019"));
        let state = settle(&coord).await;
        assert_eq!(state.status, FetchStatus::Error);
        assert!(matches!(state.error, Some(FetchError::Status(500))));

        coord.schedule(&resolution("2019"));
        sleep_ms(1_000).await;
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_payload_reports_empty() {
        let source = Arc::new(MemorySource::new().with_dataset("/rates?year=2019", Dataset::default()));
        let coord = DataFetchCoordinator::new(source, FetchOptions::default());

        coord.schedule(&resolution("2019"));
        let state = settle(&coord).await;
        assert_eq!(state.status, FetchStatus::Empty);
        assert_eq!(state.view_status(), ViewStatus::NoData);
    }

    #[tokio::test(start_paused = true)]
    async fn viewport_scoping_tracks_rendered_features() {
        let source = Arc::new(MemorySource::new().with_dataset("/rates?year=2019", records(10)));
        let rendered = Arc::new(StaticRenderedFeatures::new());
        rendered.set("tracts", [2u64, 4, 6].map(FeatureId::from));

        let coord = DataFetchCoordinator::new(source, FetchOptions::default());
        coord.set_viewport(Some(ViewportScope::new("tracts", rendered.clone())));
        coord.schedule(&resolution("2019"));

        let state = settle(&coord).await;
        assert_eq!(state.filtered.as_ref().map(|d| d.len()), Some(3));
        assert_eq!(state.view_status(), ViewStatus::Visible);

        rendered.set("tracts", Vec::<FeatureId>::new());
        coord.on_viewport_change();
        sleep_ms(100).await;
        assert_eq!(coord.state().view_status(), ViewStatus::Visible);

        sleep_ms(150).await;
        let state = coord.state();
        assert!(state.filtered_empty());
        assert_eq!(state.view_status(), ViewStatus::FilteredOut);
        assert_eq!(state.data.map(|d| d.len()), Some(10));
    }

    #[tokio::test(start_paused = true)]
    async fn owner_change_resets_to_idle() {
        let source = Arc::new(MemorySource::new().with_dataset("/rates?year=2019", records(4)));
        let coord = DataFetchCoordinator::new(source.clone(), FetchOptions::default());

        assert!(!coord.set_owner("page-a"));
        coord.schedule(&resolution("2019"));
        settle(&coord).await;

        assert!(!coord.set_owner("page-a"));
        assert!(coord.set_owner("page-b"));
        let state = coord.state();
        assert_eq!(state.status, FetchStatus::Idle);
        assert!(state.data.is_none());
        assert_eq!(coord.committed_signature(), None);

        coord.schedule(&resolution("2019"));
        settle(&coord).await;
        assert_eq!(source.calls().len(), 2);
    }
}
