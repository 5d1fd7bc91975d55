/// Shared types, traits, and errors for the wellroute request router.
///
/// This crate is the foundation that all other wellroute crates depend on.
/// It contains:
/// - **Trait contracts** (`traits`) for agent handlers, backend clients and collection stores
/// - **Shared data types** (`model`) used across the classifier, guard, proxy and router
/// - **Error types** (`errors`) for unified error handling
/// - **Config types** (`config`) and the directory loader (`config_loader`)
pub mod config;
pub mod config_loader;
pub mod errors;
pub mod model;
pub mod traits;

// Re-export commonly used types at the crate root for convenience.
pub use errors::{BackendError, RouterError};
pub use model::*;
pub use traits::*;
