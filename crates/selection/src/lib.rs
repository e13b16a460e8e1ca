//! Pointer and rectangle feature selection feeding the shared state store.

pub mod geometry;
pub mod hit;
pub mod mode;
pub mod selector;
pub mod source;

pub use geometry::*;
pub use hit::*;
pub use mode::*;
pub use selector::*;
pub use source::*;
