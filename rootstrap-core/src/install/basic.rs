// rootstrap-core/src/install/basic.rs
use std::ffi::OsStr;
use std::fs;
use std::path::Path;

use reqwest::Client;
use rootstrap_common::error::{Result, RootstrapError};
use rootstrap_common::model::{RepositoryIndex, ResolvedArtifact};
use rootstrap_common::{Cache, Config};
use rootstrap_net::{fetch_file, FetchOutcome};
use tracing::{debug, info, warn};

use super::extract::extract_package;
use crate::resolve::resolve;

fn join_to_err(e: tokio::task::JoinError) -> RootstrapError {
    RootstrapError::Extract(format!("Extraction task failed: {e}"))
}

/// Stage 1: resolves each package against `index`, downloads it into the cache
/// (reusing an unchanged cached copy) and unpacks it over the root. Packages
/// are handled strictly in order and the first failure aborts the run.
pub async fn install_basic(
    client: &Client,
    config: &Config,
    index: &RepositoryIndex,
    cache: &Cache,
    packages: &[&str],
) -> Result<Vec<ResolvedArtifact>> {
    let repo_url = config.core_repo_url();
    let mut installed = Vec::with_capacity(packages.len());

    for package in packages {
        let artifact = resolve(package, index, &repo_url)?;
        let cache_path = cache.entry_path(&artifact.file_name);

        match fetch_file(client, &artifact.url, &cache_path).await? {
            FetchOutcome::Downloaded => info!("Downloaded {}", artifact.file_name),
            FetchOutcome::NotModified => info!("Using cached {}", artifact.file_name),
        }

        debug!("Unpacking {} into {}", artifact.file_name, config.root.display());
        tokio::task::spawn_blocking({
            let root = config.root.clone();
            move || -> Result<()> { extract_package(&cache_path, &root) }
        })
        .await
        .map_err(join_to_err)??;

        installed.push(artifact);
    }

    Ok(installed)
}

/// Copies the user-mode emulator for the target architecture into the root so
/// that foreign binaries can run under chroot. Does nothing unless emulation
/// was requested; a missing emulator on the host only warns.
pub fn install_emulator(config: &Config) -> Result<()> {
    install_emulator_from(config, std::env::var_os("PATH"))
}

fn install_emulator_from<P: AsRef<OsStr>>(config: &Config, search_path: Option<P>) -> Result<()> {
    if !config.use_qemu {
        return Ok(());
    }
    let name = config.arch.emulator_name();
    let cwd = std::env::current_dir().unwrap_or_else(|_| Path::new("/").to_path_buf());
    let source = match which::which_in(&name, search_path, cwd) {
        Ok(path) => path,
        Err(e) => {
            warn!("{} not found on the host ({}); skipping emulation setup", name, e);
            return Ok(());
        }
    };

    let dest_dir = config.usr_bin_dir();
    fs::create_dir_all(&dest_dir)
        .map_err(|e| RootstrapError::io_at("create directory", &dest_dir, e))?;
    let dest = dest_dir.join(&name);
    fs::copy(&source, &dest).map_err(|e| {
        RootstrapError::IoError(format!(
            "Failed to copy {} to {}: {}",
            source.display(),
            dest.display(),
            e
        ))
    })?;
    info!("Installed {} into {}", name, dest_dir.display());
    Ok(())
}
