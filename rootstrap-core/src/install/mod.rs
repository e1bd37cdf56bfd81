// rootstrap-core/src/install/mod.rs
// Stage 1 unpacks packages by hand, stage 2 lets pacman finish the job.

pub mod basic;
pub mod extract;
pub mod remaining;

pub use basic::{install_basic, install_emulator};
pub use remaining::install_remaining;
