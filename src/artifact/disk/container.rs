//! Raw disk container: create-once lifecycle and the offset-zero write.
//!
//! The container is never resized, truncated or recreated by the builder.
//! Bytes past the boot blob belong to whatever else lives on the disk.

use anyhow::{bail, Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Seek, SeekFrom, Write};
use std::path::Path;

use crate::toolchain::Toolchain;

/// What [`ensure_container_exists`] found at the container path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Created { len: u64 },
    Reused { len: u64 },
}

impl ContainerState {
    pub fn size(self) -> u64 {
        match self {
            ContainerState::Created { len } | ContainerState::Reused { len } => len,
        }
    }
}

/// Create a sparse, zero-filled container of exactly `size` bytes.
///
/// Refuses to touch an existing file.
pub fn create_container(path: &Path, size: u64) -> Result<()> {
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .with_context(|| format!("creating disk container '{}'", path.display()))?;
    file.set_len(size)
        .with_context(|| format!("sizing disk container '{}' to {} bytes", path.display(), size))?;
    file.sync_all()?;
    Ok(())
}

/// Create the container through `toolchain` if nothing is at `path`;
/// otherwise reuse the existing file whatever its length or contents.
pub fn ensure_container_exists(
    toolchain: &dyn Toolchain,
    path: &Path,
    capacity: u64,
) -> Result<ContainerState> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(ContainerState::Reused { len: meta.len() }),
        Ok(_) => bail!(
            "disk container path '{}' exists but is not a regular file",
            path.display()
        ),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            toolchain.create_container(path, capacity)?;
            let len = fs::metadata(path)
                .with_context(|| format!("inspecting new disk container '{}'", path.display()))?
                .len();
            if len != capacity {
                bail!(
                    "disk container '{}' was created with {} bytes, expected {}",
                    path.display(),
                    len,
                    capacity
                );
            }
            Ok(ContainerState::Created { len })
        }
        Err(e) => Err(e)
            .with_context(|| format!("inspecting disk container '{}'", path.display())),
    }
}

/// Result of writing a boot blob into a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobWrite {
    pub blob_len: u64,
    pub container_len: u64,
}

/// Copy `blob` over the first `len(blob)` bytes of `container`.
///
/// The container is opened without truncation and its length is checked on
/// both sides of the write. A blob longer than the container is rejected
/// before anything is written.
pub fn write_boot_blob(container: &Path, blob: &Path) -> Result<BlobWrite> {
    let payload =
        fs::read(blob).with_context(|| format!("reading boot blob '{}'", blob.display()))?;
    let blob_len = payload.len() as u64;

    let mut file = OpenOptions::new()
        .write(true)
        .open(container)
        .with_context(|| format!("opening disk container '{}'", container.display()))?;
    let len_before = container_len(&file, container)?;

    if blob_len > len_before {
        bail!(
            "boot blob '{}' ({} bytes) does not fit in disk container '{}' ({} bytes)",
            blob.display(),
            blob_len,
            container.display(),
            len_before
        );
    }

    file.seek(SeekFrom::Start(0))?;
    file.write_all(&payload)
        .with_context(|| format!("writing boot blob into '{}'", container.display()))?;
    file.sync_all()
        .with_context(|| format!("flushing disk container '{}'", container.display()))?;

    let len_after = container_len(&file, container)?;
    if len_after != len_before {
        bail!(
            "disk container '{}' changed length during write ({} -> {} bytes)",
            container.display(),
            len_before,
            len_after
        );
    }

    Ok(BlobWrite {
        blob_len,
        container_len: len_after,
    })
}

fn container_len(file: &File, path: &Path) -> Result<u64> {
    Ok(file
        .metadata()
        .with_context(|| format!("inspecting disk container '{}'", path.display()))?
        .len())
}
