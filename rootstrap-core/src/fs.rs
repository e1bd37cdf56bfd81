// rootstrap-core/src/fs.rs
// Filesystem primitives the standard library does not cover.

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// Kind of special file `make_node` creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Char,
    Block,
    Fifo,
}

impl NodeKind {
    fn type_bits(self) -> libc::mode_t {
        match self {
            NodeKind::Char => libc::S_IFCHR,
            NodeKind::Block => libc::S_IFBLK,
            NodeKind::Fifo => libc::S_IFIFO,
        }
    }
}

/// Creates a device node or FIFO at `path`. The mode is subject to the umask,
/// callers that need exact bits set them afterwards.
pub fn make_node(path: &Path, kind: NodeKind, mode: u32, major: u32, minor: u32) -> io::Result<()> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let mode = kind.type_bits() | (mode as libc::mode_t & 0o7777);
    // SAFETY: `c_path` is a valid NUL-terminated string that outlives the call.
    let rc = unsafe { libc::mknod(c_path.as_ptr(), mode, libc::makedev(major, minor)) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Removes whatever sits at `path` (file, symlink or special file) without
/// following symlinks. A missing path is fine.
pub fn remove_non_dir(path: &Path) -> io::Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if !meta.is_dir() => std::fs::remove_file(path),
        Ok(_) => Err(io::Error::other(format!("{} is a directory", path.display()))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::{symlink, FileTypeExt};

    use super::*;

    #[test]
    fn creates_fifo_without_privileges() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipe");
        make_node(&path, NodeKind::Fifo, 0o600, 0, 0).unwrap();
        assert!(std::fs::symlink_metadata(&path).unwrap().file_type().is_fifo());
    }

    #[test]
    fn removes_symlink_not_its_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        let link = dir.path().join("link");
        std::fs::write(&target, "keep").unwrap();
        symlink(&target, &link).unwrap();

        remove_non_dir(&link).unwrap();
        assert!(std::fs::symlink_metadata(&link).is_err());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "keep");

        remove_non_dir(&dir.path().join("missing")).unwrap();
        assert!(remove_non_dir(dir.path()).is_err());
    }
}
