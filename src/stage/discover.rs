//! Binary target discovery.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// One user-space program, named after its source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryTarget {
    pub name: String,
    pub source: PathBuf,
}

/// Find the binaries under `source_dir`, in name order.
///
/// Picks up `<name>.rs` files and `<name>/main.rs` directories, the two
/// layouts cargo auto-discovers under `src/bin`. A missing directory means
/// there is nothing to build.
pub fn discover_targets(source_dir: &Path) -> Result<Vec<BinaryTarget>> {
    if !source_dir.is_dir() {
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(source_dir)
        .with_context(|| format!("reading binary sources '{}'", source_dir.display()))?;

    let mut targets = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| {
            format!("reading entry under '{}'", source_dir.display())
        })?;
        let path = entry.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if file_name.starts_with('.') {
            continue;
        }

        if path.is_dir() {
            let main = path.join("main.rs");
            if main.is_file() {
                targets.push(BinaryTarget {
                    name: file_name.to_string(),
                    source: main,
                });
            }
            continue;
        }

        if path.extension().and_then(|e| e.to_str()) != Some("rs") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if stem.is_empty() {
            continue;
        }
        targets.push(BinaryTarget {
            name: stem.to_string(),
            source: path.clone(),
        });
    }

    targets.sort_by(|a, b| a.name.cmp(&b.name));
    if let Some(dup) = targets.windows(2).find(|w| w[0].name == w[1].name) {
        bail!(
            "binary '{}' is defined twice: {} and {}",
            dup[0].name,
            dup[0].source.display(),
            dup[1].source.display()
        );
    }

    Ok(targets)
}
