// rootstrap-core/src/install/remaining.rs
use rootstrap_common::error::{Result, RootstrapError};
use rootstrap_common::Config;
use tracing::info;

use crate::chroot::Chroot;

const PACMAN: &str = "/usr/bin/pacman";

/// Arguments for a non-interactive pacman sync that is allowed to overwrite
/// the files stage 1 unpacked without a package database.
pub fn pacman_args<'a>(config: &'a Config, packages: &[&'a str]) -> Vec<&'a str> {
    let mut args = vec![
        "--noconfirm",
        "--arch",
        config.arch.as_str(),
        "-Sy",
        "--overwrite",
        "*",
    ];
    args.extend_from_slice(packages);
    args
}

/// Stage 2: runs pacman inside the root to (re)install `packages` properly.
pub async fn install_remaining(config: &Config, packages: &[&str]) -> Result<()> {
    let pacman = config.pacman_path();
    if !pacman.is_file() {
        return Err(RootstrapError::NotFound(format!(
            "{} (stage 1 did not install pacman)",
            pacman.display()
        )));
    }

    info!("Installing {} packages with pacman", packages.len());
    Chroot::new(config)
        .run(PACMAN, pacman_args(config, packages))
        .await
}
