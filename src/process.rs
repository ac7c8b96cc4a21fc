//! External command runner.
//!
//! Every tool the builder drives (cargo, strip, cargo-bootimage, qemu) goes
//! through [`Cmd`], so failures carry the command line, exit status and
//! stderr in one error message.
//!
//! ```rust,ignore
//! use kernel_image_builder::process::Cmd;
//!
//! Cmd::new("strip")
//!     .arg_path(Path::new("dsk/bin/hello"))
//!     .error_msg("strip failed")
//!     .run()?;
//! ```

use anyhow::{bail, Context, Result};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

/// Builder for an external command invocation.
#[derive(Debug, Clone)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
    dir: Option<PathBuf>,
    error_msg: Option<String>,
    echo: bool,
}

impl Cmd {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            envs: Vec::new(),
            dir: None,
            error_msg: None,
            echo: false,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn arg_path(self, path: &Path) -> Self {
        self.arg(path.as_os_str())
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    /// Working directory for the child.
    pub fn dir(mut self, dir: &Path) -> Self {
        self.dir = Some(dir.to_path_buf());
        self
    }

    /// Message prefixed to the error when the command exits non-zero.
    pub fn error_msg(mut self, msg: &str) -> Self {
        self.error_msg = Some(msg.to_string());
        self
    }

    /// Print the command line before running it.
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Human-readable command line, used in logs and errors.
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| part.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        if let Some(dir) = &self.dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Run to completion, keeping stderr for the error message.
    pub fn run(self) -> Result<()> {
        if self.echo {
            println!("  $ {}", self.display());
        }

        let output = self
            .command()
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("failed to spawn '{}'", self.display()))?;

        if !output.status.success() {
            bail!(
                "{}: '{}' exited with {}\n{}",
                self.error_msg.as_deref().unwrap_or("command failed"),
                self.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(())
    }

    /// Run with inherited stdio so the operator sees progress.
    pub fn run_interactive(self) -> Result<ExitStatus> {
        if self.echo {
            println!("  $ {}", self.display());
        }

        let status = self
            .command()
            .status()
            .with_context(|| format!("failed to spawn '{}'", self.display()))?;

        if !status.success() {
            bail!(
                "{}: '{}' exited with {}",
                self.error_msg.as_deref().unwrap_or("command failed"),
                self.display(),
                status
            );
        }

        Ok(status)
    }
}
