// rootstrap-core/src/lib.rs

pub mod bootstrap;
pub mod chroot;
pub mod configure;
pub mod fs;
pub mod install;
pub mod resolve;

pub use bootstrap::bootstrap;
pub use chroot::Chroot;
pub use configure::{configure_minimal_system, configure_pacman};
pub use install::{install_basic, install_emulator, install_remaining};
pub use resolve::resolve;
