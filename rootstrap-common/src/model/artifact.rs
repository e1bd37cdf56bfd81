// rootstrap-common/src/model/artifact.rs
use std::fmt;
use std::path::Path;

/// Compression wrapped around a package's tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    Gzip,
    Xz,
    Zstd,
}

impl ArchiveFormat {
    /// Every suffix the decoder accepts.
    pub const ALL: [ArchiveFormat; 3] = [ArchiveFormat::Gzip, ArchiveFormat::Xz, ArchiveFormat::Zstd];

    /// Determines the format from the file name suffix alone.
    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| name.ends_with(&format!(".{}", format.extension())))
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name()
            .and_then(|n| n.to_str())
            .and_then(Self::from_file_name)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Gzip => "gz",
            ArchiveFormat::Xz => "xz",
            ArchiveFormat::Zstd => "zst",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tar.{}", self.extension())
    }
}

/// A package name pinned to the archive the repository serves for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub package_name: String,
    pub file_name: String,
    pub url: String,
    pub format: ArchiveFormat,
}
