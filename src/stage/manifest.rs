//! Stage manifest: what was installed by the last successful stage run.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

use super::StageReport;

pub const MANIFEST_FILENAME: &str = "stage-manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageManifest {
    pub mode: String,
    pub created_at_utc: String,
    pub stripped: bool,
    pub artifacts: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub sha256: String,
}

impl StageManifest {
    pub fn from_report(report: &StageReport) -> Result<Self> {
        let mut artifacts = Vec::with_capacity(report.artifacts.len());
        for artifact in &report.artifacts {
            let (sha256, size) = sha256_file(&artifact.path)?;
            artifacts.push(ManifestEntry {
                name: artifact.name.clone(),
                path: artifact.path.clone(),
                size,
                sha256,
            });
        }

        Ok(Self {
            mode: report.mode.to_string(),
            created_at_utc: now_utc_compact(),
            stripped: report.stripped,
            artifacts,
        })
    }
}

/// Write the manifest for `report` into `state_dir`, replacing any earlier one.
pub fn write_stage_manifest(state_dir: &Path, report: &StageReport) -> Result<PathBuf> {
    let manifest = StageManifest::from_report(report)?;
    fs::create_dir_all(state_dir)
        .with_context(|| format!("creating builder state dir '{}'", state_dir.display()))?;

    let path = state_dir.join(MANIFEST_FILENAME);
    let json = serde_json::to_string_pretty(&manifest)?;
    fs::write(&path, json)
        .with_context(|| format!("writing stage manifest '{}'", path.display()))?;
    Ok(path)
}

fn now_utc_compact() -> String {
    let now = OffsetDateTime::now_utc();
    format!(
        "{:04}{:02}{:02}T{:02}{:02}{:02}Z",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

fn sha256_file(path: &Path) -> Result<(String, u64)> {
    let f = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut r = BufReader::new(f);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut size = 0u64;
    loop {
        let n = r.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    Ok((format!("{:x}", hasher.finalize()), size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::context::BuildMode;
    use crate::stage::StagedArtifact;
    use tempfile::TempDir;

    #[test]
    fn test_manifest_records_hash_and_size() {
        let temp = TempDir::new().unwrap();
        let bin = temp.path().join("hello");
        fs::write(&bin, b"abc").unwrap();
        let report = StageReport {
            mode: BuildMode::Debug,
            artifacts: vec![StagedArtifact {
                name: "hello".to_string(),
                path: bin.clone(),
            }],
            stripped: false,
        };

        let state = temp.path().join("state");
        let path = write_stage_manifest(&state, &report).unwrap();
        assert_eq!(path, state.join(MANIFEST_FILENAME));
        let manifest: StageManifest = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();

        assert_eq!(manifest.mode, "debug");
        assert!(!manifest.stripped);
        assert_eq!(manifest.artifacts.len(), 1);
        assert_eq!(manifest.artifacts[0].size, 3);
        assert_eq!(
            manifest.artifacts[0].sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(manifest.created_at_utc.len(), 16);
        assert!(manifest.created_at_utc.ends_with('Z'));
    }

    #[test]
    fn test_missing_artifact_fails() {
        let temp = TempDir::new().unwrap();
        let report = StageReport {
            mode: BuildMode::Release,
            artifacts: vec![StagedArtifact {
                name: "gone".to_string(),
                path: temp.path().join("gone"),
            }],
            stripped: true,
        };
        assert!(write_stage_manifest(temp.path(), &report).is_err());
    }
}
