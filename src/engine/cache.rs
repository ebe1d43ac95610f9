//! The local cache.
//!
//! ```text
//! <cache>/
//!   e/<name>-<version>/export/            recipe files
//!   e/<name>-<version>/export_sources/    exported sources
//!   b/<name>-<version>/<package_id>/      build sandbox (s/, b/)
//!   p/<name>-<version>/<package_id>/      packaged binary + conaninfo.txt
//! ```
//!
//! A package folder only appears once its build succeeded: packaging
//! happens in a temporary sibling that is renamed into place.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tempfile::TempDir;

use crate::core::reference::{RefPattern, ResolvedRef};
use crate::util::fs::{ensure_dir, remove_dir_all_if_exists};

/// The info view rendered into each package folder.
pub const CONANINFO: &str = "conaninfo.txt";
/// `name/version` of the entries under one `e/` or `p/` folder.
const REFERENCE_FILE: &str = "reference.txt";

/// One cached recipe and its binaries.
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    pub reference: String,
    pub package_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Cache {
    root: PathBuf,
}

impl Cache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Cache { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn slug(reference: &ResolvedRef) -> String {
        format!("{}-{}", reference.name, reference.version)
    }

    pub fn export_dir(&self, reference: &ResolvedRef) -> PathBuf {
        self.root.join("e").join(Self::slug(reference))
    }

    pub fn export_recipe_dir(&self, reference: &ResolvedRef) -> PathBuf {
        self.export_dir(reference).join("export")
    }

    pub fn export_sources_dir(&self, reference: &ResolvedRef) -> PathBuf {
        self.export_dir(reference).join("export_sources")
    }

    pub fn build_dir(&self, reference: &ResolvedRef, package_id: &str) -> PathBuf {
        self.root.join("b").join(Self::slug(reference)).join(package_id)
    }

    pub fn packages_dir(&self, reference: &ResolvedRef) -> PathBuf {
        self.root.join("p").join(Self::slug(reference))
    }

    pub fn package_dir(&self, reference: &ResolvedRef, package_id: &str) -> PathBuf {
        self.packages_dir(reference).join(package_id)
    }

    /// Whether a complete binary exists for this id.
    pub fn has_package(&self, reference: &ResolvedRef, package_id: &str) -> bool {
        self.package_dir(reference, package_id).join(CONANINFO).is_file()
    }

    /// Start a fresh export folder, wiping the previous one.
    pub fn begin_export(&self, reference: &ResolvedRef) -> Result<PathBuf> {
        let dir = self.export_dir(reference);
        remove_dir_all_if_exists(&dir)?;
        ensure_dir(&self.export_recipe_dir(reference))?;
        ensure_dir(&self.export_sources_dir(reference))?;
        write_reference(&dir, reference)?;
        Ok(dir)
    }

    /// A temporary package folder next to where the binary will live.
    pub fn begin_package(&self, reference: &ResolvedRef) -> Result<TempDir> {
        let parent = self.packages_dir(reference);
        ensure_dir(&parent)?;
        write_reference(&parent, reference)?;
        tempfile::Builder::new()
            .prefix(".tmp-")
            .tempdir_in(&parent)
            .with_context(|| format!("failed to create temporary folder in {}", parent.display()))
    }

    /// Move a finished package into place.
    ///
    /// If another build promoted the same id first, that copy is kept and
    /// ours is discarded.
    pub fn promote(&self, tmp: TempDir, reference: &ResolvedRef, package_id: &str) -> Result<PathBuf> {
        let target = self.package_dir(reference, package_id);
        if self.has_package(reference, package_id) {
            tracing::debug!("{}: {} already in cache", reference, package_id);
            return Ok(target);
        }
        remove_dir_all_if_exists(&target)?;
        std::fs::rename(tmp.path(), &target).with_context(|| {
            format!(
                "failed to move {} to {}",
                tmp.path().display(),
                target.display()
            )
        })?;
        Ok(target)
    }

    /// Every recipe with a package folder, sorted by reference.
    pub fn list(&self) -> Result<Vec<CacheEntry>> {
        let mut entries = Vec::new();
        let packages = self.root.join("p");
        for (dir, reference) in read_entries(&packages)? {
            let mut ids: Vec<String> = std::fs::read_dir(&dir)
                .with_context(|| format!("failed to read {}", dir.display()))?
                .filter_map(|e| e.ok())
                .filter(|e| e.path().join(CONANINFO).is_file())
                .filter_map(|e| e.file_name().to_str().map(String::from))
                .collect();
            ids.sort();
            entries.push(CacheEntry {
                reference,
                package_ids: ids,
            });
        }
        entries.sort_by(|a, b| a.reference.cmp(&b.reference));
        Ok(entries)
    }

    /// Remove exports, builds and binaries of every reference matching
    /// `pattern`. Returns the removed references.
    pub fn remove(&self, pattern: &RefPattern) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for area in ["e", "b", "p"] {
            for (dir, reference) in read_entries(&self.root.join(area))? {
                let matches = reference
                    .split_once('/')
                    .map(|(n, v)| pattern.matches(&ResolvedRef::from((n, v))))
                    .unwrap_or(false);
                if matches {
                    remove_dir_all_if_exists(&dir)?;
                    if !removed.contains(&reference) {
                        removed.push(reference);
                    }
                }
            }
        }
        // Build sandboxes carry no reference file; drop orphans.
        let builds = self.root.join("b");
        if builds.is_dir() {
            for entry in std::fs::read_dir(&builds)?.filter_map(|e| e.ok()) {
                let name = entry.file_name().to_string_lossy().to_string();
                let orphan = !self.root.join("p").join(&name).exists()
                    && !self.root.join("e").join(&name).exists();
                if orphan {
                    remove_dir_all_if_exists(&entry.path())?;
                }
            }
        }
        removed.sort();
        Ok(removed)
    }
}

fn write_reference(dir: &Path, reference: &ResolvedRef) -> Result<()> {
    ensure_dir(dir)?;
    let path = dir.join(REFERENCE_FILE);
    std::fs::write(&path, reference.to_string())
        .with_context(|| format!("failed to write {}", path.display()))
}

/// `(folder, reference)` for every folder under `area` with a reference file.
fn read_entries(area: &Path) -> Result<Vec<(PathBuf, String)>> {
    if !area.is_dir() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in std::fs::read_dir(area)
        .with_context(|| format!("failed to read {}", area.display()))?
    {
        let dir = entry?.path();
        let Ok(reference) = std::fs::read_to_string(dir.join(REFERENCE_FILE)) else {
            continue;
        };
        out.push((dir, reference.trim().to_string()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promote_and_list() {
        let tmp = TempDir::new().unwrap();
        let cache = Cache::new(tmp.path());
        let zlib = ResolvedRef::from(("zlib", "1.3.1"));

        let staging = cache.begin_package(&zlib).unwrap();
        std::fs::write(staging.path().join(CONANINFO), "[settings]\nos=Linux\n").unwrap();
        let staged = staging.path().to_path_buf();
        let target = cache.promote(staging, &zlib, "abc").unwrap();
        assert!(!staged.exists());
        assert!(target.join(CONANINFO).is_file());
        assert!(cache.has_package(&zlib, "abc"));

        let list = cache.list().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].reference, "zlib/1.3.1");
        assert_eq!(list[0].package_ids, vec!["abc"]);
    }

    #[test]
    fn test_dropped_staging_leaves_nothing() {
        let tmp = TempDir::new().unwrap();
        let cache = Cache::new(tmp.path());
        let zlib = ResolvedRef::from(("zlib", "1.3.1"));
        let staging = cache.begin_package(&zlib).unwrap();
        std::fs::write(staging.path().join("half.txt"), "x").unwrap();
        drop(staging);
        assert!(cache.list().unwrap()[0].package_ids.is_empty());
    }

    #[test]
    fn test_remove_by_pattern() {
        let tmp = TempDir::new().unwrap();
        let cache = Cache::new(tmp.path());
        let zlib = ResolvedRef::from(("zlib", "1.3.1"));
        let bzip2 = ResolvedRef::from(("bzip2", "1.0.8"));
        cache.begin_export(&zlib).unwrap();
        cache.begin_export(&bzip2).unwrap();

        let removed = cache.remove(&RefPattern::new("zlib/*").unwrap()).unwrap();
        assert_eq!(removed, vec!["zlib/1.3.1"]);
        assert!(!cache.export_dir(&zlib).exists());
        assert!(cache.export_dir(&bzip2).exists());
    }
}
