// rootstrap-core/src/configure.rs
// Edits the freshly unpacked tree so that pacman can run inside it.

use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::Path;

use rootstrap_common::error::{Result, RootstrapError};
use rootstrap_common::model::ArchiveFormat;
use rootstrap_common::Config;
use tracing::{debug, info, warn};

use crate::fs::{make_node, remove_non_dir, NodeKind};

/// `root` with password `root`.
pub const ROOT_CREDENTIAL: &str = "root:$1$GT9AUpJe$oXANVIjIzcnmOpY07iaGi/:14657::::::";
pub const HOSTNAME: &str = "bootstrap";
pub const MTAB: &str = "rootfs / rootfs rw 0 0";

struct DeviceNode {
    name: &'static str,
    major: u32,
    minor: u32,
    mode: u32,
}

const DEVICE_NODES: &[DeviceNode] = &[
    DeviceNode { name: "null", major: 1, minor: 3, mode: 0o666 },
    DeviceNode { name: "random", major: 1, minor: 8, mode: 0o644 },
    DeviceNode { name: "urandom", major: 1, minor: 9, mode: 0o644 },
];

/// Points pacman at the configured mirror and gives the root working DNS.
pub fn configure_pacman(config: &Config) -> Result<()> {
    copy_resolv_conf(config)?;

    let mirrorlist = config.mirrorlist_path();
    write_file(&mirrorlist, &format!("Server = {}\n", config.mirror_server()))?;
    info!("Mirror list points at {}", config.mirror_server());
    Ok(())
}

fn copy_resolv_conf(config: &Config) -> Result<()> {
    let host = &config.host_resolv_conf;
    let dest = config.resolv_conf_path();
    if !host.is_file() {
        warn!("{} not found on the host; the root may lack DNS", host.display());
        return Ok(());
    }
    ensure_parent(&dest)?;
    // The filesystem package ships resolv.conf as a symlink into /run.
    remove_non_dir(&dest).map_err(|e| RootstrapError::io_at("remove", &dest, e))?;
    fs::copy(host, &dest).map_err(|e| {
        RootstrapError::IoError(format!(
            "Failed to copy {} to {}: {}",
            host.display(),
            dest.display(),
            e
        ))
    })?;
    debug!("Copied {} into the root", host.display());
    Ok(())
}

/// Everything else the root needs before stage 2: a known root password, a
/// hostname, `/etc/mtab`, minimal device nodes, and pacman/makepkg settings
/// suited to an unattended first run. `format` is the compression the
/// repository uses, if known.
pub fn configure_minimal_system(config: &Config, format: Option<ArchiveFormat>) -> Result<()> {
    let dev = config.dev_dir();
    fs::create_dir_all(&dev).map_err(|e| RootstrapError::io_at("create directory", &dev, e))?;

    let shadow = config.shadow_path();
    match read_optional(&shadow)? {
        Some(current) => write_file(&shadow, &with_root_credential(&current))?,
        None => write_private_file(&shadow, &with_root_credential(""))?,
    }

    let group = config.group_path();
    if !group.exists() {
        write_file(&group, "")?;
    }

    write_file(&config.hostname_path(), &format!("{HOSTNAME}\n"))?;

    let mtab = config.mtab_path();
    remove_non_dir(&mtab).map_err(|e| RootstrapError::io_at("remove", &mtab, e))?;
    write_file(&mtab, &format!("{MTAB}\n"))?;

    for node in DEVICE_NODES {
        let path = dev.join(node.name);
        if let Err(e) = create_device(&path, node) {
            warn!("Could not create {}: {}", path.display(), e);
        }
    }

    if !rewrite_if_present(&config.pacman_conf_path(), disable_checks)? {
        warn!(
            "{} not found; signature and space checks stay enabled",
            config.pacman_conf_path().display()
        );
    }

    match format {
        Some(format) => {
            let makepkg = config.makepkg_conf_path();
            if !rewrite_if_present(&makepkg, |text| set_pkgext(text, format))? {
                debug!("{} not found; leaving PKGEXT alone", makepkg.display());
            }
        }
        None => debug!("Repository compression unknown; leaving PKGEXT alone"),
    }

    info!("Configured minimal system in {}", config.root.display());
    Ok(())
}

fn create_device(path: &Path, node: &DeviceNode) -> io::Result<()> {
    if fs::symlink_metadata(path).is_ok() {
        return Ok(());
    }
    make_node(path, NodeKind::Char, node.mode, node.major, node.minor)?;
    fs::set_permissions(path, fs::Permissions::from_mode(node.mode))
}

/// Replaces every `root:` entry with the fixed credential, adding one when the
/// file has none.
pub fn with_root_credential(shadow: &str) -> String {
    let mut found = false;
    let mut lines: Vec<&str> = shadow
        .lines()
        .map(|line| {
            if line.starts_with("root:") {
                found = true;
                ROOT_CREDENTIAL
            } else {
                line
            }
        })
        .collect();
    if !found {
        lines.push(ROOT_CREDENTIAL);
    }
    join_lines(&lines)
}

/// Comments out `CheckSpace` and disables signature checking.
pub fn disable_checks(pacman_conf: &str) -> String {
    let lines: Vec<String> = pacman_conf
        .lines()
        .map(|line| {
            let trimmed = line.trim_start();
            if trimmed.starts_with("CheckSpace") {
                format!("# {trimmed}")
            } else if is_setting(trimmed, "SigLevel") {
                "SigLevel = Never".to_string()
            } else {
                line.to_string()
            }
        })
        .collect();
    join_lines(&lines)
}

/// Makes makepkg produce packages with the repository's compression.
pub fn set_pkgext(makepkg_conf: &str, format: ArchiveFormat) -> String {
    let setting = format!("PKGEXT='.pkg.{format}'");
    let mut found = false;
    let mut lines: Vec<String> = makepkg_conf
        .lines()
        .map(|line| {
            if line.starts_with("PKGEXT=") {
                found = true;
                setting.clone()
            } else {
                line.to_string()
            }
        })
        .collect();
    if !found {
        lines.push(setting);
    }
    join_lines(&lines)
}

fn is_setting(line: &str, key: &str) -> bool {
    line.strip_prefix(key)
        .is_some_and(|rest| rest.trim_start().starts_with('='))
}

fn join_lines<S: AsRef<str>>(lines: &[S]) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(line.as_ref());
        out.push('\n');
    }
    out
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| RootstrapError::io_at("create directory", parent, e))?;
    }
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    ensure_parent(path)?;
    fs::write(path, contents).map_err(|e| RootstrapError::io_at("write", path, e))
}

/// Like `write_file`, but a newly created file is readable by its owner only.
fn write_private_file(path: &Path, contents: &str) -> Result<()> {
    ensure_parent(path)?;
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .map_err(|e| RootstrapError::io_at("create", path, e))?;
    file.write_all(contents.as_bytes())
        .map_err(|e| RootstrapError::io_at("write", path, e))
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(RootstrapError::io_at("read", path, e)),
    }
}

/// Applies `edit` to the file at `path`. Returns `false` if there is no file.
fn rewrite_if_present<F>(path: &Path, edit: F) -> Result<bool>
where
    F: FnOnce(&str) -> String,
{
    let Some(text) = read_optional(path)? else {
        return Ok(false);
    };
    let updated = edit(&text);
    if updated != text {
        write_file(path, &updated)?;
        debug!("Updated {}", path.display());
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::symlink;
    use std::path::PathBuf;

    use super::*;

    const PACMAN_CONF: &str = "\
[options]
HoldPkg     = pacman glibc
Architecture = auto
CheckSpace
#NoUpgrade   =
SigLevel    = Required DatabaseOptional
LocalFileSigLevel = Optional
#RemoteFileSigLevel = Required

[core]
Include = /etc/pacman.d/mirrorlist
";

    fn config(root: &Path, arch: &str) -> Config {
        Config::new(root.to_path_buf(), Some(arch.parse().unwrap()), Some("http://mirror.test/arch".into()))
            .unwrap()
    }

    #[test]
    fn pacman_conf_checks_are_disabled() {
        let updated = disable_checks(PACMAN_CONF);
        assert!(updated.contains("\n# CheckSpace\n"));
        assert!(updated.contains("\nSigLevel = Never\n"));
        assert!(!updated.contains("Required DatabaseOptional"));
        assert!(updated.contains("LocalFileSigLevel = Optional"));
        assert!(updated.contains("#RemoteFileSigLevel = Required"));
        assert_eq!(disable_checks(&updated), updated);
    }

    #[test]
    fn pkgext_follows_repository_compression() {
        let conf = "CARCH=\"x86_64\"\nPKGEXT='.pkg.tar.xz'\nSRCEXT='.src.tar.gz'\n";
        let updated = set_pkgext(conf, ArchiveFormat::Zstd);
        assert_eq!(
            updated,
            "CARCH=\"x86_64\"\nPKGEXT='.pkg.tar.zst'\nSRCEXT='.src.tar.gz'\n"
        );
        assert_eq!(set_pkgext("", ArchiveFormat::Gzip), "PKGEXT='.pkg.tar.gz'\n");
    }

    #[test]
    fn root_credential_replaces_existing_entry() {
        let shadow = "root:*:19000::::::\nbin:!*:19000::::::\n";
        let updated = with_root_credential(shadow);
        assert_eq!(updated, format!("{ROOT_CREDENTIAL}\nbin:!*:19000::::::\n"));
        assert_eq!(with_root_credential(""), format!("{ROOT_CREDENTIAL}\n"));
    }

    #[test]
    fn pacman_mirrorlist_and_resolv_conf() {
        let work = tempfile::tempdir().unwrap();
        let root = work.path().join("root");
        let host_resolv = work.path().join("resolv.conf");
        fs::write(&host_resolv, "nameserver 192.0.2.1\n").unwrap();
        fs::create_dir_all(root.join("etc")).unwrap();
        symlink("/run/systemd/resolve/resolv.conf", root.join("etc/resolv.conf")).unwrap();

        let cfg = config(&root, "armv7h").with_host_resolv_conf(host_resolv);
        configure_pacman(&cfg).unwrap();
        configure_pacman(&cfg).unwrap();

        assert_eq!(
            fs::read_to_string(root.join("etc/pacman.d/mirrorlist")).unwrap(),
            "Server = http://mirror.test/arch/armv7h/$repo\n"
        );
        let resolv = root.join("etc/resolv.conf");
        assert!(!fs::symlink_metadata(&resolv).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(resolv).unwrap(), "nameserver 192.0.2.1\n");
    }

    #[test]
    fn missing_host_resolv_conf_is_not_fatal() {
        let work = tempfile::tempdir().unwrap();
        let cfg = config(work.path(), "x86_64")
            .with_host_resolv_conf(PathBuf::from("/nonexistent/resolv.conf"));
        configure_pacman(&cfg).unwrap();
        assert!(!work.path().join("etc/resolv.conf").exists());
        assert!(work.path().join("etc/pacman.d/mirrorlist").is_file());
    }

    #[test]
    fn minimal_system_files() {
        let work = tempfile::tempdir().unwrap();
        let root = work.path();
        fs::create_dir_all(root.join("etc")).unwrap();
        fs::write(root.join("etc/pacman.conf"), PACMAN_CONF).unwrap();
        fs::write(root.join("etc/makepkg.conf"), "PKGEXT='.pkg.tar.xz'\n").unwrap();
        symlink("/proc/self/mounts", root.join("etc/mtab")).unwrap();

        let cfg = config(root, "x86_64");
        configure_minimal_system(&cfg, Some(ArchiveFormat::Zstd)).unwrap();
        configure_minimal_system(&cfg, Some(ArchiveFormat::Zstd)).unwrap();

        assert_eq!(
            fs::read_to_string(root.join("etc/shadow")).unwrap(),
            format!("{ROOT_CREDENTIAL}\n")
        );
        let shadow_mode = fs::metadata(root.join("etc/shadow")).unwrap().permissions().mode();
        assert_eq!(shadow_mode & 0o777, 0o600);
        assert!(root.join("etc/group").is_file());
        assert_eq!(fs::read_to_string(root.join("etc/hostname")).unwrap(), "bootstrap\n");
        assert_eq!(
            fs::read_to_string(root.join("etc/mtab")).unwrap(),
            "rootfs / rootfs rw 0 0\n"
        );
        assert!(root.join("dev").is_dir());
        let pacman_conf = fs::read_to_string(root.join("etc/pacman.conf")).unwrap();
        assert!(pacman_conf.contains("SigLevel = Never"));
        assert_eq!(
            fs::read_to_string(root.join("etc/makepkg.conf")).unwrap(),
            "PKGEXT='.pkg.tar.zst'\n"
        );
    }

    #[test]
    fn missing_pacman_conf_is_skipped() {
        let work = tempfile::tempdir().unwrap();
        let cfg = config(work.path(), "x86_64");
        configure_minimal_system(&cfg, None).unwrap();
        assert!(!work.path().join("etc/pacman.conf").exists());
        assert!(!work.path().join("etc/makepkg.conf").exists());
    }
}
