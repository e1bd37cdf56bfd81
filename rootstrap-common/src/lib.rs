// rootstrap-common/src/lib.rs
pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod packages;

// Re-export key types
pub use cache::Cache;
pub use config::{Architecture, Config};
pub use error::{Result, RootstrapError};
pub use model::{ArchiveFormat, RepositoryIndex, ResolvedArtifact};
