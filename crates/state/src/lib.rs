pub mod action_log;
pub mod persistence;
pub mod selection_set;
pub mod store;

pub use action_log::*;
pub use persistence::*;
pub use selection_set::*;
pub use store::*;
