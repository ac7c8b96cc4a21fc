//! Preflight checks for build validation.
//!
//! Validates that the host system has the tools a task needs before any
//! build step runs, so a missing `cargo-bootimage` is reported up front
//! instead of after the container has been created.
//!
//! # Example
//!
//! ```rust
//! use kernel_image_builder::preflight::{command_exists, check_required_tools};
//!
//! if !command_exists("qemu-img") {
//!     println!("qemu-utils not installed");
//! }
//!
//! let tools = vec![("strip".to_string(), "binutils".to_string())];
//! if let Err(e) = check_required_tools(&tools) {
//!     eprintln!("{}", e);
//! }
//! ```

use anyhow::{bail, Result};

use crate::config::BuilderConfig;
use crate::toolchain::target;

/// A required tool and where to get it: (command, install hint).
pub type RequiredTool = (String, String);

/// Check if a command exists on the host system.
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Tools needed to stage user-space binaries.
///
/// `strip` is only required when it will actually run.
pub fn stage_tools(config: &BuilderConfig) -> Vec<RequiredTool> {
    let mut tools = vec![(config.tools.cargo.clone(), "rustup".to_string())];
    if target::host_matches_target_arch(&config.target.triple) {
        tools.push((config.tools.strip.clone(), "binutils".to_string()));
    }
    tools
}

/// Tools needed to build the boot blob.
pub fn image_tools(config: &BuilderConfig) -> Vec<RequiredTool> {
    vec![
        (config.tools.cargo.clone(), "rustup".to_string()),
        (
            "cargo-bootimage".to_string(),
            "cargo install bootimage".to_string(),
        ),
    ]
}

/// Tools needed to boot the image in an emulator.
pub fn qemu_tools(config: &BuilderConfig) -> Vec<RequiredTool> {
    let arch = target::target_arch(&config.target.triple);
    vec![(format!("qemu-system-{}", arch), "qemu".to_string())]
}

/// Check that specific tools are available.
///
/// Returns an error listing every missing tool with its install hint.
pub fn check_required_tools(tools: &[RequiredTool]) -> Result<()> {
    let missing: Vec<&RequiredTool> = tools
        .iter()
        .filter(|(tool, _)| !command_exists(tool))
        .collect();

    if !missing.is_empty() {
        let msg = missing
            .iter()
            .map(|(t, p)| format!("  {} (install: {})", t, p))
            .collect::<Vec<_>>()
            .join("\n");
        bail!("Missing required host tools:\n{}", msg);
    }

    Ok(())
}
