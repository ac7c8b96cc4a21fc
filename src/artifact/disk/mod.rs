//! Disk image assembly.
//!
//! Makes sure the raw container exists, rebuilds the kernel with its
//! bootloader, and writes the resulting boot blob at offset zero.
//!
//! The two lifecycles are kept apart on purpose: the container is created
//! once and then only ever written in place ([`container`]), while the boot
//! blob is rebuilt from scratch on every run.

pub mod container;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::build::context::{BuildContext, BuildMode};
use crate::toolchain::Toolchain;
use container::{ContainerState, ensure_container_exists, write_boot_blob};

/// Outcome of one assembly run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskImageReport {
    pub container: PathBuf,
    pub state: ContainerState,
    pub blob: PathBuf,
    pub blob_len: u64,
    pub container_len: u64,
}

/// Build the boot blob and write it onto the container at `path`.
///
/// A tool failure aborts before anything is written; a container created
/// earlier in the same run stays on disk.
pub fn assemble_disk_image(
    toolchain: &dyn Toolchain,
    mode: BuildMode,
    path: &Path,
    capacity: u64,
) -> Result<DiskImageReport> {
    println!("[image] preparing {} ({} build)", path.display(), mode);

    let state = ensure_container_exists(toolchain, path, capacity)?;
    let verb = match state {
        ContainerState::Created { .. } => "created",
        ContainerState::Reused { .. } => "reusing",
    };
    println!("[image] {} disk container ({} bytes)", verb, state.size());

    toolchain
        .invalidate_kernel_build()
        .context("invalidating cached kernel build")?;

    println!("[image] building kernel and bootloader...");
    let blob = toolchain.embed(mode)?;

    let written = write_boot_blob(path, &blob)?;
    println!(
        "[image] wrote {} bytes of {} at offset 0 ({} bytes total)",
        written.blob_len,
        blob.display(),
        written.container_len
    );

    Ok(DiskImageReport {
        container: path.to_path_buf(),
        state,
        blob,
        blob_len: written.blob_len,
        container_len: written.container_len,
    })
}

/// Assemble the image configured for `ctx`.
pub fn build_disk_image(ctx: &BuildContext, toolchain: &dyn Toolchain) -> Result<DiskImageReport> {
    assemble_disk_image(
        toolchain,
        ctx.mode,
        &ctx.config.image.path,
        ctx.config.image.capacity_bytes()?,
    )
}
