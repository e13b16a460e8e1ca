//! Bin computation for choropleth and point styling.

pub mod classifier;
pub mod custom;
pub mod editor;
pub mod quantile;

pub use classifier::*;
pub use custom::*;
pub use editor::*;
pub use quantile::*;
