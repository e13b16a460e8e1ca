//! Endpoint template parsing and parameter resolution.
//!
//! A template such as `/api/{dataset}/:county?year={year=2020}&bins={bins}`
//! is parsed once into an [`EndpointTemplate`]; [`resolve`] then combines
//! explicit overrides, filter providers and template defaults into a
//! [`ResolvedRequest`] plus the list of parameters that could not be found.

pub mod encode;
pub mod providers;
pub mod request;
pub mod resolve;
pub mod template;
pub mod update;

pub use encode::*;
pub use providers::*;
pub use request::*;
pub use resolve::*;
pub use template::*;
pub use update::*;

/// Tile coordinates filled in by the map renderer, never by filters.
pub const TILE_PLACEHOLDERS: [&str; 3] = ["x", "y", "z"];

pub fn is_tile_placeholder(name: &str) -> bool {
    TILE_PLACEHOLDERS.contains(&name)
}
