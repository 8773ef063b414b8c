//! Configuration schema, loading, and validation.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{LoadResult, load};
pub use schema::{Config, ServerEntry};
pub use validation::LoadWarning;
