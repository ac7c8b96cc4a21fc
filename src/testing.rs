//! Scripted toolchain for exercising the pipeline without cargo.

use anyhow::{bail, Result};
use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::artifact::disk::container;
use crate::build::context::BuildMode;
use crate::toolchain::Toolchain;

/// Marks where fake debug info starts in a fake compiled binary.
const DEBUG_MARKER: &[u8] = b"\0.debug_info";

pub(crate) struct FakeToolchain {
    out_dir: PathBuf,
    host_matches: bool,
    failing: HashSet<String>,
    fail_embed: bool,
    fail_strip: bool,
    blob: Vec<u8>,
    calls: RefCell<Vec<String>>,
}

impl FakeToolchain {
    pub(crate) fn new(root: &Path) -> Self {
        Self {
            out_dir: root.join("fake-target"),
            host_matches: true,
            failing: HashSet::new(),
            fail_embed: false,
            fail_strip: false,
            blob: b"\xEB\x3C\x90BOOTBLOB".to_vec(),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn host_matches(mut self, matches: bool) -> Self {
        self.host_matches = matches;
        self
    }

    pub(crate) fn failing_compile(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    pub(crate) fn failing_embed(mut self) -> Self {
        self.fail_embed = true;
        self
    }

    pub(crate) fn failing_strip(mut self) -> Self {
        self.fail_strip = true;
        self
    }

    pub(crate) fn with_blob(mut self, blob: Vec<u8>) -> Self {
        self.blob = blob;
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub(crate) fn containers_created(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with("create:"))
            .count()
    }

    /// Bytes the fake compiler emits for `name`.
    pub(crate) fn unstripped_bytes(name: &str, mode: BuildMode) -> Vec<u8> {
        let mut bytes = format!("\x7fELF {} {}", name, mode).into_bytes();
        bytes.extend_from_slice(DEBUG_MARKER);
        bytes.extend(std::iter::repeat(0x5A).take(256));
        bytes
    }

    /// Bytes left after the fake strip of `unstripped_bytes`.
    pub(crate) fn stripped_bytes(name: &str, mode: BuildMode) -> Vec<u8> {
        strip_bytes(&Self::unstripped_bytes(name, mode))
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }
}

fn strip_bytes(bytes: &[u8]) -> Vec<u8> {
    match bytes
        .windows(DEBUG_MARKER.len())
        .position(|w| w == DEBUG_MARKER)
    {
        Some(pos) => bytes[..pos].to_vec(),
        None => bytes.to_vec(),
    }
}

impl Toolchain for FakeToolchain {
    fn compile(&self, name: &str, mode: BuildMode) -> Result<PathBuf> {
        self.record(format!("compile:{}", name));
        if self.failing.contains(name) {
            bail!("building '{}' failed: error[E0425]", name);
        }
        let dir = self.out_dir.join(mode.profile_dir());
        fs::create_dir_all(&dir)?;
        let artifact = dir.join(name);
        fs::write(&artifact, Self::unstripped_bytes(name, mode))?;
        Ok(artifact)
    }

    fn strip(&self, paths: &[PathBuf]) -> Result<()> {
        self.record(format!("strip:{}", paths.len()));
        if self.fail_strip {
            bail!("stripping staged binaries failed");
        }
        for path in paths {
            let bytes = fs::read(path)?;
            fs::write(path, strip_bytes(&bytes))?;
        }
        Ok(())
    }

    fn invalidate_kernel_build(&self) -> Result<()> {
        self.record("invalidate".to_string());
        Ok(())
    }

    fn embed(&self, mode: BuildMode) -> Result<PathBuf> {
        self.record(format!("embed:{}", mode));
        if self.fail_embed {
            bail!("building boot image failed");
        }
        let dir = self.out_dir.join(mode.profile_dir());
        fs::create_dir_all(&dir)?;
        let blob = dir.join("bootimage-syskrnl.bin");
        fs::write(&blob, &self.blob)?;
        Ok(blob)
    }

    fn create_container(&self, path: &Path, size: u64) -> Result<()> {
        self.record(format!("create:{}", size));
        container::create_container(path, size)
    }

    fn host_matches_target_arch(&self) -> bool {
        self.host_matches
    }
}
