//! External tools the pipeline orchestrates.
//!
//! The stager and the image assembler only talk to a [`Toolchain`]; they
//! never spawn processes themselves. [`CargoToolchain`] is the real
//! implementation, tests substitute a scripted one.

pub mod cargo;
pub mod target;

pub use cargo::CargoToolchain;

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::artifact::disk::container;
use crate::build::context::BuildMode;

pub trait Toolchain {
    /// Build one user-space binary, returning the path of the compiled
    /// artifact. Fails if the compiler exits non-zero.
    fn compile(&self, name: &str, mode: BuildMode) -> Result<PathBuf>;

    /// Strip every path in one invocation.
    fn strip(&self, paths: &[PathBuf]) -> Result<()>;

    /// Make the next [`Toolchain::embed`] recompile the kernel from scratch
    /// instead of serving a cached blob.
    fn invalidate_kernel_build(&self) -> Result<()>;

    /// Build the kernel with its bootloader, returning the boot blob path.
    fn embed(&self, mode: BuildMode) -> Result<PathBuf>;

    /// Create a raw container of exactly `size` bytes at `path`.
    fn create_container(&self, path: &Path, size: u64) -> Result<()> {
        container::create_container(path, size)
    }

    fn host_matches_target_arch(&self) -> bool;
}
