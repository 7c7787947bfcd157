//! Installed-module manifest — provenance record for every install.
//!
//! One JSON document keyed by module name, rewritten read-modify-write on
//! every install. The pipeline never reads it back; it exists for future
//! update/audit tooling.

use chrono::Utc;
use cogmod_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestEntry {
    /// The source URI string exactly as the user gave it.
    pub source: String,
    pub github_url: Option<String>,
    pub module_path: Option<String>,
    /// RFC 3339 timestamp of the install.
    pub installed_at: String,
}

impl ManifestEntry {
    pub fn now(source: &str, github_url: Option<String>, module_path: Option<String>) -> Self {
        Self {
            source: source.to_string(),
            github_url,
            module_path,
            installed_at: Utc::now().to_rfc3339(),
        }
    }
}

/// Read the manifest; a missing or corrupt file yields an empty map, since
/// provenance is advisory.
pub fn read_manifest(path: &Path) -> BTreeMap<String, ManifestEntry> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|text| serde_json::from_str(&text).ok())
        .unwrap_or_default()
}

/// Create or overwrite the entry for `name`.
pub fn record_install(path: &Path, name: &str, entry: ManifestEntry) -> Result<()> {
    let mut manifest = read_manifest(path);
    manifest.insert(name.to_string(), entry);
    write_manifest(path, &manifest)
}

/// Drop the entry for `name`, if present.
pub fn remove_entry(path: &Path, name: &str) -> Result<()> {
    let mut manifest = read_manifest(path);
    if manifest.remove(name).is_some() {
        write_manifest(path, &manifest)?;
    }
    Ok(())
}

fn write_manifest(path: &Path, manifest: &BTreeMap<String, ManifestEntry>) -> Result<()> {
    let body = serde_json::to_vec_pretty(manifest)?;
    write_atomic(path, &body)
}

/// Write-then-rename so a concurrent reader never observes a truncated file.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::acquisition(format!("no parent directory for {}", path.display())))?;
    std::fs::create_dir_all(parent)?;
    let tmp = tempfile::NamedTempFile::new_in(parent)?;
    std::fs::write(tmp.path(), bytes)?;
    tmp.persist(path)
        .map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("installed.json");

        let entry = ManifestEntry::now("local:/tmp/mymod", None, None);
        record_install(&path, "mymod", entry.clone()).unwrap();

        let manifest = read_manifest(&path);
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest["mymod"], entry);
    }

    #[test]
    fn record_overwrites_existing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("installed.json");

        record_install(&path, "mymod", ManifestEntry::now("local:/old", None, None)).unwrap();
        record_install(
            &path,
            "mymod",
            ManifestEntry::now(
                "github:org/repo/mymod",
                Some("https://github.com/org/repo.git".into()),
                Some("mymod".into()),
            ),
        )
        .unwrap();

        let manifest = read_manifest(&path);
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest["mymod"].source, "github:org/repo/mymod");
        assert_eq!(
            manifest["mymod"].github_url.as_deref(),
            Some("https://github.com/org/repo.git")
        );
    }

    #[test]
    fn missing_or_corrupt_manifest_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(read_manifest(&missing).is_empty());

        let corrupt = dir.path().join("installed.json");
        std::fs::write(&corrupt, "{not json").unwrap();
        assert!(read_manifest(&corrupt).is_empty());
    }

    #[test]
    fn remove_entry_drops_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("installed.json");

        record_install(&path, "a", ManifestEntry::now("local:/a", None, None)).unwrap();
        record_install(&path, "b", ManifestEntry::now("local:/b", None, None)).unwrap();
        remove_entry(&path, "a").unwrap();

        let manifest = read_manifest(&path);
        assert!(!manifest.contains_key("a"));
        assert!(manifest.contains_key("b"));
    }
}
