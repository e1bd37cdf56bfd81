// rootstrap-common/src/packages.rs
//! Fixed package lists for the two installation stages.

/// Packages pacman needs to run, plus the filesystem skeleton. Unpacked by hand
/// in stage 1, in this order.
pub const BASIC_PACKAGES: &[&str] = &[
    "acl",
    "archlinux-keyring",
    "attr",
    "brotli",
    "bzip2",
    "curl",
    "expat",
    "glibc",
    "gpgme",
    "libarchive",
    "libassuan",
    "libgpg-error",
    "libnghttp2",
    "libssh2",
    "lzo",
    "openssl",
    "pacman",
    "pacman-mirrorlist",
    "xz",
    "zlib",
    "krb5",
    "e2fsprogs",
    "keyutils",
    "libidn2",
    "libunistring",
    "gcc-libs",
    "lz4",
    "libpsl",
    "icu",
    "zstd",
    "filesystem",
];

/// Packages for a minimally usable shell environment, installed by pacman in
/// stage 2.
pub const EXTRA_PACKAGES: &[&str] = &[
    "coreutils", "bash", "grep", "gawk", "file", "tar", "systemd", "sed",
];

/// Package providing the package manager binary.
pub const PACKAGE_MANAGER: &str = "pacman";

/// Everything stage 2 hands to pacman. The basic packages are repeated so that
/// pacman records them in its database.
pub fn stage_two_packages() -> Vec<&'static str> {
    BASIC_PACKAGES
        .iter()
        .chain(EXTRA_PACKAGES.iter())
        .copied()
        .collect()
}
