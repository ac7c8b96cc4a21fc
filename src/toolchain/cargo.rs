//! Cargo-backed toolchain: `cargo build`/`cargo rustc` for user programs,
//! `cargo bootimage` for the kernel, host `strip` for installed binaries.

use anyhow::{bail, Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::{target, Toolchain};
use crate::build::context::{BuildContext, BuildMode};
use crate::config::BuilderConfig;
use crate::process::Cmd;

pub struct CargoToolchain {
    project_root: PathBuf,
    config: BuilderConfig,
    verbose: bool,
}

impl CargoToolchain {
    pub fn new(ctx: &BuildContext) -> Self {
        Self {
            project_root: ctx.project_root.clone(),
            config: ctx.config.clone(),
            verbose: ctx.verbose,
        }
    }

    /// Custom target files are given to cargo as absolute paths so the
    /// build works regardless of the cargo working directory.
    fn target_arg(&self) -> String {
        let triple = &self.config.target.triple;
        if triple.ends_with(".json") && Path::new(triple).is_relative() {
            return self.project_root.join(triple).display().to_string();
        }
        triple.clone()
    }

    fn output_dir(&self, mode: BuildMode) -> PathBuf {
        self.config
            .target
            .target_dir
            .join(target::target_name(&self.config.target.triple))
            .join(mode.profile_dir())
    }

    pub fn artifact_path(&self, name: &str, mode: BuildMode) -> PathBuf {
        self.output_dir(mode).join(name)
    }

    pub fn boot_blob_path(&self, mode: BuildMode) -> PathBuf {
        self.output_dir(mode)
            .join(format!("bootimage-{}.bin", self.config.kernel.bin))
    }

    fn cargo(&self, subcommand: &str) -> Cmd {
        Cmd::new(&self.config.tools.cargo)
            .arg(subcommand)
            .dir(&self.project_root)
            .env("CARGO_TARGET_DIR", &self.config.target.target_dir)
            .echo(self.verbose)
    }

    pub fn compile_cmd(&self, name: &str, mode: BuildMode) -> Cmd {
        let userspace = &self.config.userspace;
        let subcommand = if userspace.rustc_args.is_empty() {
            "build"
        } else {
            "rustc"
        };

        let mut cmd = self
            .cargo(subcommand)
            .args(["--bin", name])
            .args(["--target", &self.target_arg()])
            .args(mode.cargo_flag());
        if userspace.no_default_features {
            cmd = cmd.arg("--no-default-features");
        }
        if !userspace.features.is_empty() {
            cmd = cmd.args(["--features", &userspace.features.join(",")]);
        }
        if !userspace.rustc_args.is_empty() {
            cmd = cmd.arg("--").args(&userspace.rustc_args);
        }
        cmd
    }

    pub fn embed_cmd(&self, mode: BuildMode) -> Cmd {
        let kernel = &self.config.kernel;
        let mut cmd = self
            .cargo("bootimage")
            .args(["--bin", &kernel.bin])
            .args(["--target", &self.target_arg()])
            .args(mode.cargo_flag());
        if kernel.no_default_features {
            cmd = cmd.arg("--no-default-features");
        }
        if !kernel.features.is_empty() {
            cmd = cmd.args(["--features", &kernel.features.join(",")]);
        }
        cmd
    }
}

impl Toolchain for CargoToolchain {
    fn compile(&self, name: &str, mode: BuildMode) -> Result<PathBuf> {
        self.compile_cmd(name, mode)
            .error_msg(&format!("building '{}' failed", name))
            .run()?;

        let artifact = self.artifact_path(name, mode);
        if !artifact.is_file() {
            bail!(
                "cargo reported success but '{}' was not produced at {}",
                name,
                artifact.display()
            );
        }
        Ok(artifact)
    }

    fn strip(&self, paths: &[PathBuf]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut cmd = Cmd::new(&self.config.tools.strip).echo(self.verbose);
        for path in paths {
            cmd = cmd.arg_path(path);
        }
        cmd.error_msg("stripping staged binaries failed").run()?;
        Ok(())
    }

    fn invalidate_kernel_build(&self) -> Result<()> {
        touch(&self.config.kernel.entry_source)
    }

    fn embed(&self, mode: BuildMode) -> Result<PathBuf> {
        self.embed_cmd(mode)
            .error_msg("building boot image failed")
            .run()?;

        let blob = self.boot_blob_path(mode);
        if !blob.is_file() {
            bail!(
                "cargo bootimage reported success but no boot image at {}",
                blob.display()
            );
        }
        Ok(blob)
    }

    fn host_matches_target_arch(&self) -> bool {
        target::host_matches_target_arch(&self.config.target.triple)
    }
}

/// Bump a file's mtime so cargo's fingerprint sees it as changed.
fn touch(path: &Path) -> Result<()> {
    let file = File::options()
        .write(true)
        .open(path)
        .with_context(|| format!("opening '{}' to invalidate kernel build", path.display()))?;
    file.set_modified(SystemTime::now())
        .with_context(|| format!("updating mtime of '{}'", path.display()))?;
    Ok(())
}
