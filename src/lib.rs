//! Build-and-deploy pipeline for a bare-metal kernel image.
//!
//! Two independent jobs, run in sequence by the operator:
//!
//! - **Staging** ([`stage`]) - build every user-space program for the
//!   kernel's target, install it into the runtime filesystem tree, and strip
//!   it when the host's binutils understand the target.
//! - **Image assembly** ([`artifact::disk`]) - make sure the raw disk
//!   container exists, rebuild the kernel with its bootloader, and write the
//!   boot blob at offset zero without touching the rest of the container.
//!
//! # Architecture
//!
//! ```text
//! kernel-image-builder (bin)
//!     │
//!     ├── config     kernel-image.toml, defaults for every key
//!     ├── preflight  host tool checks
//!     ├── stage      discover → placeholder → compile → install → strip
//!     ├── artifact   ensure_container_exists → rebuild → write_boot_blob
//!     └── qemu       boot the result
//!
//! toolchain::Toolchain   the only seam that spawns cargo/strip
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use kernel_image_builder::{BuildContext, BuildMode, BuilderConfig, CargoToolchain};
//!
//! let root = std::env::current_dir()?;
//! let config = BuilderConfig::load(&root, None)?;
//! let ctx = BuildContext::new(root, config, BuildMode::Release);
//! let toolchain = CargoToolchain::new(&ctx);
//!
//! kernel_image_builder::stage::stage_userspace(&ctx, &toolchain)?;
//! kernel_image_builder::artifact::disk::build_disk_image(&ctx, &toolchain)?;
//! ```

pub mod artifact;
pub mod build;
pub mod config;
pub mod preflight;
pub mod process;
pub mod qemu;
pub mod stage;
pub mod toolchain;

#[cfg(test)]
pub(crate) mod testing;

pub use build::context::{BuildContext, BuildMode};
pub use config::BuilderConfig;
pub use toolchain::{CargoToolchain, Toolchain};
