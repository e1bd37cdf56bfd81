// rootstrap-core/src/resolve.rs
use regex::Regex;
use rootstrap_common::error::{Result, RootstrapError};
use rootstrap_common::model::{ArchiveFormat, RepositoryIndex, ResolvedArtifact};
use tracing::debug;

/// Picks the archive for `name` out of `index`: the first entry, in the index's
/// descending order, that starts with `<name>-<digit>` and carries a supported
/// compression suffix. The package name is matched literally, so `pacman`
/// never picks up `pacman-mirrorlist`.
pub fn resolve(name: &str, index: &RepositoryIndex, repo_url: &str) -> Result<ResolvedArtifact> {
    let pattern = format!(r"^{}-[0-9].*\.(gz|xz|zst)$", regex::escape(name));
    let matcher = Regex::new(&pattern)
        .map_err(|e| RootstrapError::Config(format!("Invalid package pattern for '{name}': {e}")))?;

    let file_name = index
        .iter()
        .find(|entry| matcher.is_match(entry))
        .ok_or_else(|| RootstrapError::NotFound(name.to_string()))?;
    let format = ArchiveFormat::from_file_name(file_name)
        .ok_or_else(|| RootstrapError::UnknownFormat(file_name.into()))?;

    let url = format!("{}/{}", repo_url.trim_end_matches('/'), file_name);
    debug!("Resolved {} to {}", name, url);
    Ok(ResolvedArtifact {
        package_name: name.to_string(),
        file_name: file_name.to_string(),
        url,
        format,
    })
}
