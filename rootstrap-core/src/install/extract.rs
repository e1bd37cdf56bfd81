// rootstrap-core/src/install/extract.rs
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use rootstrap_common::error::{Result, RootstrapError};
use rootstrap_common::model::ArchiveFormat;
use tar::{Archive, EntryType, Header};
use tracing::{debug, error};
use xz2::read::XzDecoder;
use zstd::stream::read::Decoder as ZstdDecoder;

use crate::fs::{make_node, remove_non_dir, NodeKind};

/// Members pacman keeps inside every package for its own bookkeeping.
const PACKAGE_METADATA: &[&str] = &[".PKGINFO", ".BUILDINFO", ".MTREE", ".INSTALL", ".CHANGELOG"];

/// Unpacks a compressed tar archive into `target_dir`, choosing the decompressor
/// from the file name suffix. Unknown suffixes are rejected before anything is
/// written.
pub fn extract_archive(archive_path: &Path, target_dir: &Path) -> Result<()> {
    extract_with_filter(archive_path, target_dir, |_| true)
}

/// Like [`extract_archive`], but leaves out pacman's metadata members so that
/// they do not litter the root of the new system.
pub fn extract_package(archive_path: &Path, root: &Path) -> Result<()> {
    extract_with_filter(archive_path, root, |path| {
        !(path.components().count() == 1
            && path
                .to_str()
                .is_some_and(|name| PACKAGE_METADATA.contains(&name)))
    })
}

fn extract_with_filter<F>(archive_path: &Path, target_dir: &Path, keep: F) -> Result<()>
where
    F: Fn(&Path) -> bool,
{
    let format = ArchiveFormat::from_path(archive_path)
        .ok_or_else(|| RootstrapError::UnknownFormat(archive_path.to_path_buf()))?;
    debug!(
        "Extracting archive '{}' (type: {}) to '{}'",
        archive_path.display(),
        format,
        target_dir.display()
    );

    let file = File::open(archive_path)
        .map_err(|e| RootstrapError::io_at("open archive", archive_path, e))?;
    fs::create_dir_all(target_dir)
        .map_err(|e| RootstrapError::io_at("create target directory", target_dir, e))?;

    let reader = BufReader::new(file);
    match format {
        ArchiveFormat::Gzip => {
            extract_tar_archive(GzDecoder::new(reader), target_dir, archive_path, &keep)
        }
        ArchiveFormat::Xz => {
            extract_tar_archive(XzDecoder::new(reader), target_dir, archive_path, &keep)
        }
        ArchiveFormat::Zstd => {
            let decoder = ZstdDecoder::with_buffer(reader).map_err(|e| {
                RootstrapError::Extract(format!(
                    "Failed to initialise zstd decoder for {}: {}",
                    archive_path.display(),
                    e
                ))
            })?;
            extract_tar_archive(decoder, target_dir, archive_path, &keep)
        }
    }
}

/// Maps an archive path below `target_dir`, refusing anything that could
/// escape it.
fn destination_for(target_dir: &Path, path_in_archive: &Path) -> Option<PathBuf> {
    let mut dest = target_dir.to_path_buf();
    let mut pushed = false;
    for comp in path_in_archive.components() {
        match comp {
            Component::Normal(p) => {
                dest.push(p);
                pushed = true;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) | Component::RootDir => return None,
        }
    }
    pushed.then_some(dest)
}

fn node_kind(entry_type: EntryType) -> Option<NodeKind> {
    match entry_type {
        EntryType::Char => Some(NodeKind::Char),
        EntryType::Block => Some(NodeKind::Block),
        EntryType::Fifo => Some(NodeKind::Fifo),
        _ => None,
    }
}

/// Creates the parent directories of `dest`, refusing when an existing
/// component (such as a symlink unpacked earlier) resolves outside `root`.
/// `root` must already be canonical.
fn prepare_parent_inside(root: &Path, dest: &Path) -> io::Result<()> {
    let Some(parent) = dest.parent() else {
        return Ok(());
    };
    let escapes = |resolved: &Path| {
        io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!(
                "{} resolves to {}, outside of {}",
                dest.display(),
                resolved.display(),
                root.display()
            ),
        )
    };

    let mut existing = parent;
    while fs::symlink_metadata(existing).is_err() {
        match existing.parent() {
            Some(up) => existing = up,
            None => break,
        }
    }
    let resolved = fs::canonicalize(existing)?;
    if !resolved.starts_with(root) {
        return Err(escapes(&resolved));
    }

    fs::create_dir_all(parent)?;
    let resolved = fs::canonicalize(parent)?;
    if !resolved.starts_with(root) {
        return Err(escapes(&resolved));
    }
    Ok(())
}

fn unpack_special(header: &Header, kind: NodeKind, root: &Path, dest: &Path) -> io::Result<()> {
    let mode = header.mode()?;
    let major = header.device_major()?.unwrap_or(0);
    let minor = header.device_minor()?.unwrap_or(0);

    prepare_parent_inside(root, dest)?;
    remove_non_dir(dest)?;
    make_node(dest, kind, mode, major, minor)?;
    std::os::unix::fs::lchown(dest, Some(header.uid()? as u32), Some(header.gid()? as u32))?;
    fs::set_permissions(dest, fs::Permissions::from_mode(mode & 0o7777))
}

fn extract_tar_archive<R: Read>(
    reader: R,
    target_dir: &Path,
    archive_path_for_log: &Path,
    keep: &dyn Fn(&Path) -> bool,
) -> Result<()> {
    let mut archive = Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_preserve_ownerships(true);
    archive.set_unpack_xattrs(true);
    archive.set_overwrite(true);

    let canonical_root = fs::canonicalize(target_dir)
        .map_err(|e| RootstrapError::io_at("resolve", target_dir, e))?;
    let mut errors: Vec<String> = Vec::new();

    let entries = archive.entries().map_err(|e| {
        RootstrapError::Extract(format!(
            "Failed to read TAR stream from {}: {}",
            archive_path_for_log.display(),
            e
        ))
    })?;
    for entry_result in entries {
        let mut entry = entry_result.map_err(|e| {
            RootstrapError::Extract(format!(
                "Error reading TAR entry from {}: {}",
                archive_path_for_log.display(),
                e
            ))
        })?;
        let path_in_archive: PathBuf = entry
            .path()
            .map_err(|e| {
                RootstrapError::Extract(format!(
                    "Invalid path in TAR entry from {}: {}",
                    archive_path_for_log.display(),
                    e
                ))
            })?
            .into_owned();

        if !keep(&path_in_archive) {
            debug!("Skipping metadata entry {}", path_in_archive.display());
            continue;
        }

        let Some(dest) = destination_for(target_dir, &path_in_archive) else {
            if path_in_archive.components().all(|c| c == Component::CurDir) {
                continue;
            }
            let msg = format!(
                "Path traversal in TAR path {} from {}",
                path_in_archive.display(),
                archive_path_for_log.display()
            );
            error!("{}", msg);
            errors.push(msg);
            continue;
        };

        let entry_type = entry.header().entry_type();
        if let Some(kind) = node_kind(entry_type) {
            if let Err(e) = unpack_special(entry.header(), kind, &canonical_root, &dest) {
                let msg = format!(
                    "Failed to create special file {}: {}",
                    dest.display(),
                    e
                );
                error!("{}", msg);
                errors.push(msg);
            }
            continue;
        }

        // tar never overwrites an existing hard link target.
        if entry_type == EntryType::Link {
            if let Err(e) =
                prepare_parent_inside(&canonical_root, &dest).and_then(|()| remove_non_dir(&dest))
            {
                let msg = format!("Failed to replace hard link {}: {}", dest.display(), e);
                error!("{}", msg);
                errors.push(msg);
                continue;
            }
        }

        match entry.unpack_in(target_dir) {
            Ok(true) => {}
            Ok(false) => {
                let msg = format!(
                    "Refused to unpack {} outside of {}",
                    path_in_archive.display(),
                    target_dir.display()
                );
                error!("{}", msg);
                errors.push(msg);
            }
            Err(e) => {
                let msg = format!(
                    "Failed to unpack entry {:?} to {}: {}. Entry type: {:?}",
                    path_in_archive,
                    dest.display(),
                    e,
                    entry.header().entry_type()
                );
                error!("{}", msg);
                errors.push(msg);
            }
        }
    }

    if !errors.is_empty() {
        return Err(RootstrapError::Extract(format!(
            "Failed during TAR extraction for {} with {} error(s): {}",
            archive_path_for_log.display(),
            errors.len(),
            errors.join("; ")
        )));
    }

    debug!(
        "Finished TAR extraction for {}",
        archive_path_for_log.display()
    );
    Ok(())
}
