//! Debounced, cancellable dataset fetching keyed by request signature.

pub mod coordinator;
pub mod error;
pub mod registry;
pub mod source;
pub mod state;
pub mod viewport;

pub use coordinator::*;
pub use error::*;
pub use registry::*;
pub use source::*;
pub use state::*;
pub use viewport::*;
