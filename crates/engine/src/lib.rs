//! Wiring for data-bound visualizations.
//!
//! A [`Visualization`] ties an endpoint template and its filter bindings to
//! a fetch coordinator; the [`Engine`] owns the state store, routes store
//! changes to the visualizations that read them and feeds map selections
//! back into the store.

pub mod config;
pub mod engine;
pub mod shared;
pub mod visualization;

pub use config::*;
pub use engine::*;
pub use shared::*;
pub use visualization::*;
