// rootstrap-core/src/chroot.rs
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use rootstrap_common::error::{Result, RootstrapError};
use rootstrap_common::Config;
use tokio::process::Command;
use tracing::{debug, error};

const CHROOT_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// Runs programs with their root directory switched to the new system, using
/// the host's `chroot` tool.
#[derive(Debug, Clone)]
pub struct Chroot {
    program: PathBuf,
    root: PathBuf,
}

impl Chroot {
    pub fn new(config: &Config) -> Self {
        Self {
            program: config.chroot_program.clone(),
            root: config.root.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Environment handed to the chrooted program: a fixed locale and search
    /// path, plus the host terminal type when there is one.
    pub fn env(&self) -> Vec<(String, String)> {
        let mut env = vec![
            ("LC_ALL".to_string(), "C".to_string()),
            ("PATH".to_string(), CHROOT_PATH.to_string()),
        ];
        if let Ok(term) = std::env::var("TERM") {
            env.push(("TERM".to_string(), term));
        }
        env
    }

    fn command<I, S>(&self, program: &str, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut cmd = Command::new(&self.program);
        cmd.arg(&self.root).arg(program).args(args);
        cmd.env_clear();
        cmd.envs(self.env());
        cmd.current_dir(&self.root);
        cmd.kill_on_drop(true);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());
        cmd
    }

    /// Runs `program` inside the root and waits for it. Output goes straight to
    /// the user's terminal; a non-zero exit is an error.
    pub async fn run<I, S>(&self, program: &str, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut cmd = self.command(program, args);
        debug!(
            "Running in {}: {} {:?}",
            self.root.display(),
            program,
            cmd.as_std().get_args().skip(2).collect::<Vec<_>>()
        );

        let status = cmd.status().await.map_err(|e| {
            error!("Failed to execute {}: {}", self.program.display(), e);
            RootstrapError::Io(Arc::new(e))
        })?;
        if !status.success() {
            debug!("{} exited with {}", program, status);
            return Err(RootstrapError::Process {
                program: program.to_string(),
                status,
            });
        }
        debug!("{} finished successfully.", program);
        Ok(())
    }
}
