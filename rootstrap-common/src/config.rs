// rootstrap-common/src/config.rs
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;
use url::Url;

use super::error::{Result, RootstrapError};

const DEFAULT_REPO_URL: &str = "http://mirrors.kernel.org/archlinux";
const DEFAULT_ARM_REPO_URL: &str = "http://mirror.archlinuxarm.org";
const DEFAULT_CHROOT_PROGRAM: &str = "chroot";
const HOST_RESOLV_CONF: &str = "/etc/resolv.conf";

/// Name of the repository that carries the stage-1 packages.
pub const CORE_REPO: &str = "core";

/// How a mirror lays out its repositories below the base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoLayout {
    /// `<url>/<repo>/os/<arch>`, used by the x86 mirrors.
    RepoPrefixed,
    /// `<url>/<arch>/<repo>`, used by the ARM mirrors.
    ArchPrefixed,
}

/// Target CPU architecture, as the package repository names it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Architecture(String);

impl Architecture {
    /// The architecture this binary was built for.
    pub fn host() -> Self {
        Self(std::env::consts::ARCH.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_arm(&self) -> bool {
        self.0.starts_with("arm") || self.0 == "aarch64"
    }

    pub fn layout(&self) -> RepoLayout {
        if self.is_arm() {
            RepoLayout::ArchPrefixed
        } else {
            RepoLayout::RepoPrefixed
        }
    }

    pub fn default_repo_url(&self) -> &'static str {
        if self.is_arm() {
            DEFAULT_ARM_REPO_URL
        } else {
            DEFAULT_REPO_URL
        }
    }

    /// File name of the user-mode emulator able to run binaries of this
    /// architecture; every 32-bit ARM flavour shares `qemu-arm-static`.
    pub fn emulator_name(&self) -> String {
        let qemu_arch = if self.0.starts_with("arm") {
            "arm"
        } else {
            self.0.as_str()
        };
        format!("qemu-{qemu_arch}-static")
    }
}

impl FromStr for Architecture {
    type Err = RootstrapError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(RootstrapError::Config(format!(
                "Invalid architecture '{s}'"
            )));
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub arch: Architecture,
    pub repo_url: String,
    pub use_qemu: bool,
    pub cache_dir: Option<PathBuf>,
    pub chroot_program: PathBuf,
    pub host_resolv_conf: PathBuf,
}

impl Config {
    /// Builds the configuration for bootstrapping into `root`. Unset values fall
    /// back to the host architecture and that architecture's default mirror.
    pub fn new(root: PathBuf, arch: Option<Architecture>, repo_url: Option<String>) -> Result<Self> {
        let arch = arch.unwrap_or_else(Architecture::host);
        let repo_url = repo_url
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| {
                debug!(
                    "No repository URL given, using the default for {}: {}",
                    arch,
                    arch.default_repo_url()
                );
                arch.default_repo_url().to_string()
            });
        let repo_url = repo_url.trim().trim_end_matches('/').to_string();

        let parsed = Url::parse(&repo_url).map_err(|e| {
            RootstrapError::Config(format!("Invalid repository URL '{repo_url}': {e}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RootstrapError::Config(format!(
                "Invalid repository URL '{}': scheme must be http or https, got '{}'",
                repo_url,
                parsed.scheme()
            )));
        }

        debug!(
            "Configuration: root={}, arch={}, repo={}",
            root.display(),
            arch,
            repo_url
        );
        Ok(Self {
            root,
            arch,
            repo_url,
            use_qemu: false,
            cache_dir: None,
            chroot_program: PathBuf::from(DEFAULT_CHROOT_PROGRAM),
            host_resolv_conf: PathBuf::from(HOST_RESOLV_CONF),
        })
    }

    pub fn with_qemu(mut self, use_qemu: bool) -> Self {
        self.use_qemu = use_qemu;
        self
    }

    pub fn with_cache_dir(mut self, cache_dir: Option<PathBuf>) -> Self {
        self.cache_dir = cache_dir;
        self
    }

    pub fn with_chroot_program(mut self, program: PathBuf) -> Self {
        self.chroot_program = program;
        self
    }

    pub fn with_host_resolv_conf(mut self, path: PathBuf) -> Self {
        self.host_resolv_conf = path;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// URL of the directory listing for `repo` on the configured mirror.
    pub fn repo_listing_url(&self, repo: &str) -> String {
        match self.arch.layout() {
            RepoLayout::RepoPrefixed => format!("{}/{}/os/{}", self.repo_url, repo, self.arch),
            RepoLayout::ArchPrefixed => format!("{}/{}/{}", self.repo_url, self.arch, repo),
        }
    }

    pub fn core_repo_url(&self) -> String {
        self.repo_listing_url(CORE_REPO)
    }

    /// Mirror-list server template, with pacman's `$repo` placeholder left in.
    pub fn mirror_server(&self) -> String {
        self.repo_listing_url("$repo")
    }

    pub fn etc_dir(&self) -> PathBuf {
        self.root.join("etc")
    }

    pub fn dev_dir(&self) -> PathBuf {
        self.root.join("dev")
    }

    pub fn usr_bin_dir(&self) -> PathBuf {
        self.root.join("usr").join("bin")
    }

    pub fn resolv_conf_path(&self) -> PathBuf {
        self.etc_dir().join("resolv.conf")
    }

    pub fn mirrorlist_path(&self) -> PathBuf {
        self.etc_dir().join("pacman.d").join("mirrorlist")
    }

    pub fn pacman_conf_path(&self) -> PathBuf {
        self.etc_dir().join("pacman.conf")
    }

    pub fn makepkg_conf_path(&self) -> PathBuf {
        self.etc_dir().join("makepkg.conf")
    }

    pub fn shadow_path(&self) -> PathBuf {
        self.etc_dir().join("shadow")
    }

    pub fn group_path(&self) -> PathBuf {
        self.etc_dir().join("group")
    }

    pub fn hostname_path(&self) -> PathBuf {
        self.etc_dir().join("hostname")
    }

    pub fn mtab_path(&self) -> PathBuf {
        self.etc_dir().join("mtab")
    }

    pub fn pacman_path(&self) -> PathBuf {
        self.usr_bin_dir().join("pacman")
    }
}
