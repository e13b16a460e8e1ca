pub mod geodesy;
pub mod precision;

pub use geodesy::*;
pub use precision::*;
