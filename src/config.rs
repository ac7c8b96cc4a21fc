//! Project configuration (`kernel-image.toml`).
//!
//! Every key has a default, so a project without the file builds with the
//! stock layout: user programs in `src/bin`, installed into `dsk/bin`, and a
//! 32 MiB `disk.img` in the project root.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "kernel-image.toml";

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuilderConfig {
    pub target: TargetConfig,
    pub kernel: KernelConfig,
    pub userspace: UserspaceConfig,
    pub image: ImageConfig,
    pub tools: ToolsConfig,
    pub qemu: QemuConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetConfig {
    /// Target triple or path to a custom target `.json`.
    pub triple: String,
    pub target_dir: PathBuf,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            triple: "x86_64-syskrnl".to_string(),
            target_dir: PathBuf::from("target"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KernelConfig {
    pub bin: String,
    /// Top-level source whose mtime is bumped to force a kernel rebuild.
    pub entry_source: PathBuf,
    pub features: Vec<String>,
    pub no_default_features: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            bin: "syskrnl".to_string(),
            entry_source: PathBuf::from("src/lib.rs"),
            features: Vec::new(),
            no_default_features: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UserspaceConfig {
    pub source_dir: PathBuf,
    pub install_dir: PathBuf,
    pub features: Vec<String>,
    pub no_default_features: bool,
    /// Passed to rustc after `--` (switches the build to `cargo rustc`).
    pub rustc_args: Vec<String>,
}

impl Default for UserspaceConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("src/bin"),
            install_dir: PathBuf::from("dsk/bin"),
            features: Vec::new(),
            no_default_features: false,
            rustc_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageConfig {
    pub path: PathBuf,
    pub capacity_mib: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("disk.img"),
            capacity_mib: 32,
        }
    }
}

impl ImageConfig {
    pub fn capacity_bytes(&self) -> Result<u64> {
        self.capacity_mib.checked_mul(MIB).with_context(|| {
            format!(
                "image.capacity_mib = {} does not fit in a 64-bit byte count",
                self.capacity_mib
            )
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfig {
    pub cargo: String,
    pub strip: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            cargo: "cargo".to_string(),
            strip: "strip".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QemuConfig {
    pub memory_mb: u32,
    pub extra_args: Vec<String>,
}

impl Default for QemuConfig {
    fn default() -> Self {
        Self {
            memory_mb: 128,
            extra_args: Vec::new(),
        }
    }
}

impl BuilderConfig {
    /// Load `path` if given, else `<project_root>/kernel-image.toml` if it
    /// exists, else defaults. Relative paths are resolved against the root.
    pub fn load(project_root: &Path, path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => Some(project_root.join(p)),
            None => {
                let default = project_root.join(CONFIG_FILENAME);
                default.is_file().then_some(default)
            }
        };

        let mut config = match config_path {
            Some(config_path) => {
                let text = fs::read_to_string(&config_path).with_context(|| {
                    format!("reading builder config '{}'", config_path.display())
                })?;
                Self::parse(&text).with_context(|| {
                    format!("parsing builder config '{}'", config_path.display())
                })?
            }
            None => Self::default(),
        };

        config.resolve_paths(project_root);
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.target.triple.trim().is_empty() {
            bail!("target.triple must not be empty");
        }
        if self.kernel.bin.trim().is_empty() {
            bail!("kernel.bin must not be empty");
        }
        if self.image.capacity_mib == 0 {
            bail!("image.capacity_mib must be greater than zero");
        }
        self.image.capacity_bytes()?;
        Ok(())
    }

    fn resolve_paths(&mut self, root: &Path) {
        for path in [
            &mut self.target.target_dir,
            &mut self.kernel.entry_source,
            &mut self.userspace.source_dir,
            &mut self.userspace.install_dir,
            &mut self.image.path,
        ] {
            if path.is_relative() {
                *path = root.join(&*path);
            }
        }
    }
}
