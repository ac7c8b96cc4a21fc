//! Build mode and run context.

use anyhow::{bail, Result};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::BuilderConfig;

/// Compilation profile, applied uniformly to every build of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuildMode {
    #[default]
    Release,
    Debug,
}

impl BuildMode {
    /// Name of the profile directory cargo writes artifacts into.
    pub fn profile_dir(self) -> &'static str {
        match self {
            BuildMode::Release => "release",
            BuildMode::Debug => "debug",
        }
    }

    pub fn cargo_flag(self) -> Option<&'static str> {
        match self {
            BuildMode::Release => Some("--release"),
            BuildMode::Debug => None,
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "release" | "--release" => Ok(BuildMode::Release),
            "debug" | "--debug" | "dev" => Ok(BuildMode::Debug),
            other => bail!("unsupported build mode '{}'; expected 'release' or 'debug'", other),
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.profile_dir())
    }
}

/// Everything one invocation needs: where the project lives, its loaded
/// configuration, and the mode chosen on the command line.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub project_root: PathBuf,
    pub config: BuilderConfig,
    pub mode: BuildMode,
    pub verbose: bool,
}

impl BuildContext {
    pub fn new(project_root: PathBuf, config: BuilderConfig, mode: BuildMode) -> Self {
        Self {
            project_root,
            config,
            mode,
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Builder-owned state that must stay out of the install tree.
    pub fn state_dir(&self) -> PathBuf {
        self.config.target.target_dir.join("kernel-image-builder")
    }

    pub fn install_dir(&self) -> &Path {
        &self.config.userspace.install_dir
    }

    pub fn source_dir(&self) -> &Path {
        &self.config.userspace.source_dir
    }
}
