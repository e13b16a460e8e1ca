pub mod bounds;
pub mod dataset;
pub mod math;
pub mod scalar;

// Foundation crate: small, well-tested primitives only.
pub use bounds::*;
pub use dataset::*;
pub use scalar::*;
