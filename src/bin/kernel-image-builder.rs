use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use kernel_image_builder::artifact::disk::build_disk_image;
use kernel_image_builder::preflight;
use kernel_image_builder::qemu::run_disk_image;
use kernel_image_builder::stage::stage_userspace;
use kernel_image_builder::{BuildContext, BuildMode, BuilderConfig, CargoToolchain};

fn usage() -> &'static str {
    "Usage:\n  kernel-image-builder [--config <path>] [--release|--debug] [-v] <command>\n\n\
     Commands:\n  \
     stage   build user-space binaries and install them into the runtime tree\n  \
     image   rebuild the kernel and write the boot image onto the disk container\n  \
     all     stage, then image\n  \
     qemu    boot the disk container (--headless for serial only, --serial-log <file>)\n  \
     check   verify host tools"
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    Stage,
    Image,
    All,
    Qemu,
    Check,
}

#[derive(Debug)]
struct Options {
    task: Task,
    mode: BuildMode,
    config: Option<PathBuf>,
    verbose: bool,
    headless: bool,
    serial_log: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Options> {
    let mut mode = BuildMode::default();
    let mut config = None;
    let mut verbose = false;
    let mut headless = false;
    let mut serial_log = None;
    let mut positional = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--release" | "--debug" => mode = BuildMode::parse(arg)?,
            "--mode" => {
                let value = iter.next().context("--mode requires a value")?;
                mode = BuildMode::parse(value)?;
            }
            "--config" => {
                let value = iter.next().context("--config requires a path")?;
                config = Some(PathBuf::from(value));
            }
            "-v" | "--verbose" => verbose = true,
            "--headless" => headless = true,
            "--serial-log" => {
                let value = iter.next().context("--serial-log requires a path")?;
                serial_log = Some(PathBuf::from(value));
            }
            "-h" | "--help" => bail!(usage()),
            other if other.starts_with('-') => bail!("unknown option '{}'\n\n{}", other, usage()),
            other => positional.push(other),
        }
    }

    let task = match positional.as_slice() {
        ["stage"] => Task::Stage,
        ["image"] => Task::Image,
        ["all"] => Task::All,
        ["qemu"] | ["run"] => Task::Qemu,
        ["check"] => Task::Check,
        _ => bail!(usage()),
    };

    Ok(Options {
        task,
        mode,
        config,
        verbose,
        headless,
        serial_log,
    })
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = parse_args(&args)?;

    let root = std::env::current_dir().context("resolving current directory")?;
    let config = BuilderConfig::load(&root, options.config.as_deref())?;
    let ctx = BuildContext::new(root, config, options.mode).with_verbose(options.verbose);
    let toolchain = CargoToolchain::new(&ctx);

    match options.task {
        Task::Stage => {
            preflight::check_required_tools(&preflight::stage_tools(&ctx.config))?;
            stage_userspace(&ctx, &toolchain)?;
        }
        Task::Image => {
            preflight::check_required_tools(&preflight::image_tools(&ctx.config))?;
            build_disk_image(&ctx, &toolchain)?;
        }
        Task::All => {
            let mut tools = preflight::stage_tools(&ctx.config);
            tools.extend(preflight::image_tools(&ctx.config));
            tools.sort();
            tools.dedup();
            preflight::check_required_tools(&tools)?;
            stage_userspace(&ctx, &toolchain)?;
            build_disk_image(&ctx, &toolchain)?;
        }
        Task::Qemu => {
            preflight::check_required_tools(&preflight::qemu_tools(&ctx.config))?;
            run_disk_image(&ctx, options.headless, options.serial_log.as_deref())?;
        }
        Task::Check => {
            let mut tools = preflight::stage_tools(&ctx.config);
            tools.extend(preflight::image_tools(&ctx.config));
            tools.extend(preflight::qemu_tools(&ctx.config));
            tools.sort();
            tools.dedup();
            preflight::check_required_tools(&tools)?;
            println!("[check] all {} host tools found", tools.len());
        }
    }

    Ok(())
}
