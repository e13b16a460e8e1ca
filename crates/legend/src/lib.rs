//! Legend stops derived from declarative paint expressions.

pub mod expression;
pub mod format;
pub mod interpret;

pub use expression::*;
pub use format::*;
pub use interpret::*;
