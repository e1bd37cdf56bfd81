// rootstrap-common/src/model/mod.rs
// Data that flows between the index fetcher, the resolver and the installers.

pub mod artifact;
pub mod index;

// Re-export
pub use artifact::{ArchiveFormat, ResolvedArtifact};
pub use index::RepositoryIndex;
