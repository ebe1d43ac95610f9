//! Filesystem helpers shared by the cache and the recipe tools.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

/// Copy every file under `src` into `dst`, keeping the relative layout.
pub fn copy_dir_all(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", src.display()))?;
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            ensure_dir(&target)?;
            continue;
        }
        fs::copy(entry.path(), &target).with_context(|| {
            format!("failed to copy {} to {}", entry.path().display(), target.display())
        })?;
    }
    Ok(())
}

/// Delete `path` recursively; a missing path is not an error.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
            Err(e).with_context(|| format!("failed to remove {}", path.display()))
        }
        _ => Ok(()),
    }
}

/// `mkdir -p`.
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("failed to create {}", path.display()))
}

pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Write `contents` to `path`, creating missing parent folders.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

/// Move a directory, falling back to copy + delete across filesystems.
pub fn move_dir(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        ensure_dir(parent)?;
    }
    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }
    copy_dir_all(src, dst)?;
    remove_dir_all_if_exists(src)
}

/// Get the relative path from `base` to `path`.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}

/// Render a path with forward slashes, as CMake and pkg-config expect.
pub fn forward_slashes(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_dir_all_keeps_layout() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("include/zlib")).unwrap();
        fs::write(src.join("include/zlib/zlib.h"), "#pragma once").unwrap();
        fs::write(src.join("LICENSE"), "zlib").unwrap();

        let dst = tmp.path().join("dst");
        copy_dir_all(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(dst.join("LICENSE")).unwrap(), "zlib");
        assert!(dst.join("include/zlib/zlib.h").is_file());
    }

    #[test]
    fn test_remove_missing_dir_is_ok() {
        let tmp = TempDir::new().unwrap();
        remove_dir_all_if_exists(&tmp.path().join("nope")).unwrap();
    }

    #[test]
    fn test_move_dir() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("x"), "1").unwrap();

        let dst = tmp.path().join("deep/b");
        move_dir(&src, &dst).unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read_to_string(dst.join("x")).unwrap(), "1");
    }

    #[test]
    fn test_forward_slashes() {
        assert_eq!(forward_slashes(Path::new("a\\b/c")), "a/b/c");
    }
}
