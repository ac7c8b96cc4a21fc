//! Artifact staging: build every user-space binary and install it into the
//! runtime filesystem tree.
//!
//! Targets are processed one at a time in discovery order and the first
//! failure stops the run, so no target after a failing one is touched.
//! Installed binaries are always overwritten, never merged.

pub mod discover;
pub mod manifest;

pub use discover::{discover_targets, BinaryTarget};

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::build::context::{BuildContext, BuildMode};
use crate::toolchain::Toolchain;

/// An installed binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedArtifact {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub mode: BuildMode,
    pub artifacts: Vec<StagedArtifact>,
    pub stripped: bool,
}

/// Build and install every binary under `source_dir` into `install_dir`.
///
/// Stripping happens once, over all installed artifacts, and only when the
/// host can handle the target's binary format.
pub fn rebuild_and_install(
    toolchain: &dyn Toolchain,
    mode: BuildMode,
    source_dir: &Path,
    install_dir: &Path,
) -> Result<StageReport> {
    let targets = discover_targets(source_dir)?;
    if targets.is_empty() {
        println!("[stage] no binaries under {}", source_dir.display());
        return Ok(StageReport {
            mode,
            artifacts: Vec::new(),
            stripped: false,
        });
    }

    fs::create_dir_all(install_dir)
        .with_context(|| format!("creating install directory '{}'", install_dir.display()))?;

    let mut artifacts = Vec::with_capacity(targets.len());
    for target in &targets {
        let dst = install_dir.join(&target.name);
        ensure_placeholder(&dst)?;

        println!("[stage] building {} ({})", target.name, mode);
        let built = toolchain
            .compile(&target.name, mode)
            .with_context(|| format!("staging '{}'", target.name))?;

        install_artifact(&built, &dst)?;
        artifacts.push(StagedArtifact {
            name: target.name.clone(),
            path: dst,
        });
    }

    let stripped = if toolchain.host_matches_target_arch() {
        let paths: Vec<PathBuf> = artifacts.iter().map(|a| a.path.clone()).collect();
        println!("[stage] stripping {} binaries", paths.len());
        toolchain.strip(&paths)?;
        true
    } else {
        eprintln!("[stage] host architecture differs from target; leaving binaries unstripped");
        false
    };

    println!(
        "[stage] installed {} binaries into {}",
        artifacts.len(),
        install_dir.display()
    );

    Ok(StageReport {
        mode,
        artifacts,
        stripped,
    })
}

/// Stage user-space binaries for `ctx` and record the run manifest.
pub fn stage_userspace(ctx: &BuildContext, toolchain: &dyn Toolchain) -> Result<StageReport> {
    let report = rebuild_and_install(toolchain, ctx.mode, ctx.source_dir(), ctx.install_dir())?;
    if !report.artifacts.is_empty() {
        let manifest = manifest::write_stage_manifest(&ctx.state_dir(), &report)?;
        println!("[stage] manifest: {}", manifest.display());
    }
    Ok(report)
}

/// Give the install path a deterministic destination before the build.
fn ensure_placeholder(dst: &Path) -> Result<()> {
    // Never create through a link left at the install path
    remove_symlink(dst)?;
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(dst)
        .with_context(|| format!("creating install placeholder '{}'", dst.display()))?;
    Ok(())
}

fn remove_symlink(path: &Path) -> Result<()> {
    if path.is_symlink() {
        fs::remove_file(path)
            .with_context(|| format!("removing symlink at install path '{}'", path.display()))?;
    }
    Ok(())
}

fn install_artifact(src: &Path, dst: &Path) -> Result<()> {
    remove_symlink(dst)?;
    fs::copy(src, dst)
        .with_context(|| format!("copying {} to {}", src.display(), dst.display()))?;
    make_executable(dst)?;
    Ok(())
}

fn make_executable(path: &Path) -> Result<()> {
    let mut perms = fs::metadata(path)
        .with_context(|| format!("reading permissions of '{}'", path.display()))?
        .permissions();
    perms.set_mode(perms.mode() | 0o111);
    fs::set_permissions(path, perms)
        .with_context(|| format!("marking '{}' executable", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeToolchain;
    use tempfile::TempDir;

    fn project(names: &[&str]) -> TempDir {
        let temp = TempDir::new().unwrap();
        let bin = temp.path().join("src/bin");
        fs::create_dir_all(&bin).unwrap();
        for name in names {
            fs::write(bin.join(format!("{}.rs", name)), "fn main() {}\n").unwrap();
        }
        temp
    }

    fn run(tc: &FakeToolchain, root: &Path) -> Result<StageReport> {
        rebuild_and_install(
            tc,
            BuildMode::Release,
            &root.join("src/bin"),
            &root.join("dsk/bin"),
        )
    }

    #[test]
    fn test_no_targets_is_success_without_work() {
        let temp = project(&[]);
        let tc = FakeToolchain::new(temp.path());

        let report = run(&tc, temp.path()).unwrap();

        assert!(report.artifacts.is_empty());
        assert!(!report.stripped);
        assert!(tc.calls().is_empty());
        assert!(!temp.path().join("dsk/bin").exists());
    }

    #[test]
    fn test_stages_and_strips_when_arch_matches() {
        let temp = project(&["a", "b"]);
        let tc = FakeToolchain::new(temp.path()).host_matches(true);

        let report = run(&tc, temp.path()).unwrap();

        assert!(report.stripped);
        assert_eq!(report.artifacts.len(), 2);
        for name in ["a", "b"] {
            let staged = fs::read(temp.path().join("dsk/bin").join(name)).unwrap();
            let unstripped = FakeToolchain::unstripped_bytes(name, BuildMode::Release);
            assert_eq!(staged, FakeToolchain::stripped_bytes(name, BuildMode::Release));
            assert!(staged.len() < unstripped.len());
        }
        assert_eq!(tc.calls(), vec!["compile:a", "compile:b", "strip:2"]);
    }

    #[test]
    fn test_skips_strip_on_arch_mismatch() {
        let temp = project(&["a", "b"]);
        let tc = FakeToolchain::new(temp.path()).host_matches(false);

        let report = run(&tc, temp.path()).unwrap();

        assert!(!report.stripped);
        for name in ["a", "b"] {
            let staged = fs::read(temp.path().join("dsk/bin").join(name)).unwrap();
            assert_eq!(staged, FakeToolchain::unstripped_bytes(name, BuildMode::Release));
        }
        assert!(!tc.calls().iter().any(|c| c.starts_with("strip")));
    }

    #[test]
    fn test_fail_fast_leaves_later_targets_untouched() {
        let temp = project(&["a", "b", "c"]);
        let install = temp.path().join("dsk/bin");
        fs::create_dir_all(&install).unwrap();
        fs::write(install.join("c"), b"old c").unwrap();
        let tc = FakeToolchain::new(temp.path()).failing_compile("b");

        let err = run(&tc, temp.path()).unwrap_err();

        assert!(format!("{:#}", err).contains("staging 'b'"));
        assert!(install.join("a").exists());
        // placeholder for the failed target is left empty
        assert_eq!(fs::metadata(install.join("b")).unwrap().len(), 0);
        assert_eq!(fs::read(install.join("c")).unwrap(), b"old c");
        assert_eq!(tc.calls(), vec!["compile:a", "compile:b"]);
    }

    #[test]
    fn test_rerun_is_byte_identical() {
        let temp = project(&["hello"]);
        let tc = FakeToolchain::new(temp.path());
        let staged = temp.path().join("dsk/bin/hello");

        run(&tc, temp.path()).unwrap();
        let first = fs::read(&staged).unwrap();
        run(&tc, temp.path()).unwrap();
        let second = fs::read(&staged).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_overwrites_unrelated_file_at_install_path() {
        let temp = project(&["hello"]);
        let install = temp.path().join("dsk/bin");
        fs::create_dir_all(&install).unwrap();
        fs::write(install.join("hello"), vec![0xFFu8; 10_000]).unwrap();
        let tc = FakeToolchain::new(temp.path()).host_matches(false);

        run(&tc, temp.path()).unwrap();

        assert_eq!(
            fs::read(install.join("hello")).unwrap(),
            FakeToolchain::unstripped_bytes("hello", BuildMode::Release)
        );
        let mode = fs::metadata(install.join("hello")).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[test]
    fn test_dangling_symlink_at_install_path_is_replaced() {
        let temp = project(&["hello"]);
        let install = temp.path().join("dsk/bin");
        fs::create_dir_all(&install).unwrap();
        std::os::unix::fs::symlink("../../outside-target", install.join("hello")).unwrap();
        let tc = FakeToolchain::new(temp.path()).host_matches(false);

        run(&tc, temp.path()).unwrap();

        assert!(!temp.path().join("outside-target").exists());
        let staged = install.join("hello");
        assert!(!staged.is_symlink());
        assert_eq!(
            fs::read(&staged).unwrap(),
            FakeToolchain::unstripped_bytes("hello", BuildMode::Release)
        );
    }

    #[test]
    fn test_symlink_to_directory_at_install_path_is_replaced() {
        let temp = project(&["hello"]);
        let install = temp.path().join("dsk/bin");
        let elsewhere = temp.path().join("elsewhere");
        fs::create_dir_all(&install).unwrap();
        fs::create_dir_all(&elsewhere).unwrap();
        std::os::unix::fs::symlink(&elsewhere, install.join("hello")).unwrap();
        let tc = FakeToolchain::new(temp.path()).host_matches(false);

        run(&tc, temp.path()).unwrap();

        assert!(install.join("hello").is_file());
        assert!(!install.join("hello").is_symlink());
        assert_eq!(fs::read_dir(&elsewhere).unwrap().count(), 0);
    }

    #[test]
    fn test_strip_failure_is_fatal() {
        let temp = project(&["a"]);
        let tc = FakeToolchain::new(temp.path()).failing_strip();
        assert!(run(&tc, temp.path()).is_err());
    }

    #[test]
    fn test_stage_userspace_writes_manifest_outside_install_tree() {
        let temp = project(&["a", "b"]);
        let mut config = crate::config::BuilderConfig::default();
        config.userspace.source_dir = temp.path().join("src/bin");
        config.userspace.install_dir = temp.path().join("dsk/bin");
        config.target.target_dir = temp.path().join("target");
        let ctx = BuildContext::new(temp.path().to_path_buf(), config, BuildMode::Release);
        let tc = FakeToolchain::new(temp.path());

        stage_userspace(&ctx, &tc).unwrap();

        assert!(ctx.state_dir().join(manifest::MANIFEST_FILENAME).is_file());
        let installed: Vec<_> = fs::read_dir(temp.path().join("dsk/bin"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(installed.len(), 2);
    }
}
