// rootstrap/src/cli.rs
//! Defines the command-line argument structure using clap.
use std::path::PathBuf;

use clap::{ArgAction, Parser};
use rootstrap_common::error::Result;
use rootstrap_common::{Architecture, Config};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "rootstrap", bin_name = "rootstrap")]
pub struct CliArgs {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Target architecture [default: host architecture]
    #[arg(short, long, value_name = "ARCH")]
    pub arch: Option<Architecture>,

    /// Mirror base URL [default depends on the architecture]
    #[arg(short, long, value_name = "URL")]
    pub repo_url: Option<String>,

    /// Copy the static qemu emulator for ARCH into the new root
    #[arg(short, long)]
    pub qemu: bool,

    /// Keep downloaded packages in DIR instead of a temporary directory
    #[arg(short = 'd', long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    #[arg(long, hide = true, env = "ROOTSTRAP_CHROOT", default_value = "chroot")]
    pub chroot_program: PathBuf,

    /// Directory to bootstrap into
    #[arg(value_name = "DESTDIR")]
    pub destdir: PathBuf,
}

impl CliArgs {
    pub fn config(&self) -> Result<Config> {
        Ok(Config::new(self.destdir.clone(), self.arch.clone(), self.repo_url.clone())?
            .with_qemu(self.qemu)
            .with_cache_dir(self.cache_dir.clone())
            .with_chroot_program(self.chroot_program.clone()))
    }
}
