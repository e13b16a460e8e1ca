use std::fmt;
use std::sync::Arc;

use foundation::DatasetError;

type SourceError = Arc<dyn std::error::Error + Send + Sync>;

/// Why a fetch did not produce a dataset.
///
/// Cloneable so it can live inside the published [`crate::FetchRequestState`].
#[derive(Debug, Clone)]
pub enum FetchError {
    Network(SourceError),
    Status(u16),
    Decode(SourceError),
    Shape(DatasetError),
    Aborted,
}

impl FetchError {
    pub fn network(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        FetchError::Network(Arc::new(err))
    }

    pub fn decode(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        FetchError::Decode(Arc::new(err))
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Network(e) => write!(f, "request failed: {e}"),
            FetchError::Status(code) => write!(f, "server responded with HTTP {code}"),
            FetchError::Decode(e) => write!(f, "response is not valid JSON: {e}"),
            FetchError::Shape(e) => write!(f, "unexpected dataset shape: {e}"),
            FetchError::Aborted => write!(f, "request aborted"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Network(e) | FetchError::Decode(e) => Some(e.as_ref() as _),
            FetchError::Shape(e) => Some(e),
            FetchError::Status(_) | FetchError::Aborted => None,
        }
    }
}

impl From<DatasetError> for FetchError {
    fn from(e: DatasetError) -> Self {
        FetchError::Shape(e)
    }
}
