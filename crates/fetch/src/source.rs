//! Dataset sources.
//!
//! A [`DataSource`] turns a resolved request into a [`Dataset`]. Sources
//! must honor the [`CancellationToken`] they are handed: once it is
//! cancelled, the returned future should settle promptly with
//! [`FetchError::Aborted`].

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use foundation::{Dataset, DatasetShape};
use params::ResolvedRequest;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;

/// Type alias for a boxed future that can be sent between threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for dataset providers.
///
/// Implementations must be `Send + Sync` for use across async tasks.
/// Methods return boxed futures for dyn-compatibility.
pub trait DataSource: Send + Sync {
    fn get(
        &self,
        request: &ResolvedRequest,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<Dataset, FetchError>>;
}

/// JSON-over-HTTP source.
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
    shape: DatasetShape,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            shape: DatasetShape::default(),
        }
    }

    pub fn with_shape(mut self, shape: DatasetShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn url_for(&self, request: &ResolvedRequest) -> String {
        request.to_url(&self.base_url)
    }

    async fn fetch(&self, url: String) -> Result<Dataset, FetchError> {
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(FetchError::network)?;

        if !resp.status().is_success() {
            return Err(FetchError::Status(resp.status().as_u16()));
        }

        let payload: serde_json::Value = resp.json().await.map_err(FetchError::decode)?;
        Ok(Dataset::from_json(&payload, &self.shape)?)
    }
}

impl DataSource for HttpSource {
    fn get(
        &self,
        request: &ResolvedRequest,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<Dataset, FetchError>> {
        let url = self.url_for(request);
        Box::pin(async move {
            tracing::debug!("GET {url}");
            tokio::select! {
                _ = cancel.cancelled() => Err(FetchError::Aborted),
                result = self.fetch(url) => result,
            }
        })
    }
}

struct CannedResponse {
    result: Result<Dataset, FetchError>,
    delay: Duration,
}

/// Canned responses keyed by rendered URL (no base), with optional latency.
///
/// Unknown URLs answer HTTP 404. Every call is recorded, so tests can
/// assert how many requests actually went out.
#[derive(Default)]
pub struct MemorySource {
    responses: Mutex<HashMap<String, CannedResponse>>,
    calls: Mutex<Vec<String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(self, url: impl Into<String>, dataset: Dataset) -> Self {
        self.insert(url, Ok(dataset), Duration::ZERO);
        self
    }

    pub fn with_delayed(self, url: impl Into<String>, dataset: Dataset, delay: Duration) -> Self {
        self.insert(url, Ok(dataset), delay);
        self
    }

    pub fn with_error(self, url: impl Into<String>, err: FetchError) -> Self {
        self.insert(url, Err(err), Duration::ZERO);
        self
    }

    pub fn insert(
        &self,
        url: impl Into<String>,
        result: Result<Dataset, FetchError>,
        delay: Duration,
    ) {
        self.responses
            .lock()
            .insert(url.into(), CannedResponse { result, delay });
    }

    /// Rendered URLs requested so far, oldest first.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl DataSource for MemorySource {
    fn get(
        &self,
        request: &ResolvedRequest,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<Dataset, FetchError>> {
        let url = request.to_url("");
        self.calls.lock().push(url.clone());
        let (result, delay) = match self.responses.lock().get(&url) {
            Some(canned) => (canned.result.clone(), canned.delay),
            None => (Err(FetchError::Status(404)), Duration::ZERO),
        };
        Box::pin(async move {
            tokio::select! {
                _ = cancel.cancelled() => Err(FetchError::Aborted),
                _ = tokio::time::sleep(delay) => result,
            }
        })
    }
}
