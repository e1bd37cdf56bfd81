// rootstrap-core/src/bootstrap.rs
use std::fs;

use rootstrap_common::error::{Result, RootstrapError};
use rootstrap_common::packages::{stage_two_packages, BASIC_PACKAGES, PACKAGE_MANAGER};
use rootstrap_common::{Cache, Config};
use rootstrap_net::{build_http_client, fetch_index};
use tracing::info;

use crate::configure::{configure_minimal_system, configure_pacman};
use crate::install::{install_basic, install_emulator, install_remaining};

/// Builds a pacman-managed root at `config.root`: unpacks the basic packages by
/// hand, prepares the tree, then lets pacman inside it install everything
/// again along with the extra packages.
pub async fn bootstrap(config: &Config, cache: &Cache) -> Result<()> {
    fs::create_dir_all(&config.root)
        .map_err(|e| RootstrapError::io_at("create root directory", &config.root, e))?;

    let client = build_http_client()?;
    let repo_url = config.core_repo_url();
    info!("Fetching package list from {}", repo_url);
    let index = fetch_index(&client, &repo_url).await?;

    info!("Installing basic packages into {}", config.root.display());
    let artifacts = install_basic(&client, config, &index, cache, BASIC_PACKAGES).await?;
    let format = artifacts
        .iter()
        .find(|artifact| artifact.package_name == PACKAGE_MANAGER)
        .map(|artifact| artifact.format);

    configure_pacman(config)?;
    configure_minimal_system(config, format)?;
    install_emulator(config)?;

    install_remaining(config, &stage_two_packages()).await?;
    // Stage 2 reinstalls pacman-mirrorlist over our mirror list.
    configure_pacman(config)?;

    info!("Bootstrap of {} complete", config.root.display());
    Ok(())
}
