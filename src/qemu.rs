//! QEMU runner for the assembled disk image.
//!
//! Provides `QemuBuilder` for constructing the emulator command and
//! `run_disk_image()` to boot the container interactively, with serial on
//! stdio or in a log file.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

use crate::build::context::BuildContext;
use crate::process::Cmd;
use crate::toolchain::target;

/// How serial output is handled.
#[derive(Debug, Default)]
pub enum SerialOutput {
    /// Write serial to a file path.
    File(PathBuf),
    /// Serial goes to stdio.
    #[default]
    Stdio,
}

/// Builder for QEMU commands.
#[derive(Debug, Default)]
pub struct QemuBuilder {
    arch: String,
    disk: Option<PathBuf>,
    memory_mb: u32,
    kvm: bool,
    serial_only: bool,
    serial_output: SerialOutput,
    extra_args: Vec<String>,
}

impl QemuBuilder {
    pub fn new(arch: &str, memory_mb: u32) -> Self {
        Self {
            arch: arch.to_string(),
            memory_mb,
            ..Default::default()
        }
    }

    pub fn disk(mut self, path: PathBuf) -> Self {
        self.disk = Some(path);
        self
    }

    pub fn kvm(mut self, enabled: bool) -> Self {
        self.kvm = enabled;
        self
    }

    pub fn serial_only(mut self) -> Self {
        self.serial_only = true;
        self
    }

    pub fn serial_output(mut self, output: SerialOutput) -> Self {
        self.serial_output = output;
        self
    }

    pub fn extra_args(mut self, args: &[String]) -> Self {
        self.extra_args.extend(args.iter().cloned());
        self
    }

    pub fn build(self) -> Cmd {
        let mut cmd = Cmd::new(format!("qemu-system-{}", self.arch));

        if self.kvm {
            cmd = cmd.args(["-enable-kvm", "-cpu", "host"]);
        }

        cmd = cmd.args(["-m", &format!("{}M", self.memory_mb)]);

        // Raw container, attached as the first disk so firmware boots it
        if let Some(disk) = &self.disk {
            cmd = cmd.args(["-drive", &format!("format=raw,file={}", disk.display())]);
        }

        match &self.serial_output {
            SerialOutput::File(path) => {
                cmd = cmd.args(["-serial", &format!("file:{}", path.display())]);
            }
            SerialOutput::Stdio => {
                cmd = cmd.args(["-serial", "stdio"]);
            }
        }

        if self.serial_only {
            cmd = cmd.args(["-display", "none"]);
        }

        cmd.args(&self.extra_args)
    }
}

/// Emulator command for the configured disk image.
///
/// `serial_log` sends the guest serial port to a file instead of stdio.
pub fn disk_image_command(
    ctx: &BuildContext,
    serial_only: bool,
    serial_log: Option<&Path>,
) -> Result<Cmd> {
    let image = &ctx.config.image.path;
    if !image.is_file() {
        bail!(
            "disk image not found at {}. Run 'kernel-image-builder image' first.",
            image.display()
        );
    }

    let arch = target::target_arch(&ctx.config.target.triple);
    let kvm = kvm_available() && target::host_matches_target_arch(&ctx.config.target.triple);

    let mut builder = QemuBuilder::new(arch, ctx.config.qemu.memory_mb)
        .disk(image.clone())
        .kvm(kvm)
        .extra_args(&ctx.config.qemu.extra_args);
    if serial_only {
        builder = builder.serial_only();
    }
    if let Some(log) = serial_log {
        builder = builder.serial_output(SerialOutput::File(log.to_path_buf()));
    }

    Ok(builder.build())
}

/// Boot the configured disk image and wait for the emulator to exit.
pub fn run_disk_image(
    ctx: &BuildContext,
    serial_only: bool,
    serial_log: Option<&Path>,
) -> Result<()> {
    let cmd = disk_image_command(ctx, serial_only, serial_log)?;

    println!("[qemu] booting {}", ctx.config.image.path.display());
    if let Some(log) = serial_log {
        println!("[qemu] serial output -> {}", log.display());
    }
    cmd.echo(ctx.verbose)
        .error_msg("qemu exited with an error")
        .run_interactive()?;
    Ok(())
}

fn kvm_available() -> bool {
    Path::new("/dev/kvm").exists()
}
