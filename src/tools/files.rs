//! File helpers available to recipes. Relative paths resolve against the
//! instance's current folder.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

use crate::core::instance::Instance;
use crate::util::fs::{copy_dir_all, ensure_dir, move_dir, remove_dir_all_if_exists, write_string};

const MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

fn compile(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern).with_context(|| format!("invalid pattern `{}`", pattern))
}

/// Options for [`copy_with`].
#[derive(Debug, Clone)]
pub struct CopyOptions {
    /// Keep the path relative to `src` under `dst`.
    pub keep_path: bool,
    pub excludes: Vec<String>,
}

impl Default for CopyOptions {
    fn default() -> Self {
        CopyOptions {
            keep_path: true,
            excludes: Vec::new(),
        }
    }
}

/// Copy files matching `pattern` from `src` to `dst`, keeping paths.
pub fn copy(cx: &Instance, pattern: &str, src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    copy_with(cx, pattern, src, dst, &CopyOptions::default())
}

/// Copy files matching `pattern` from `src` to `dst`.
///
/// The pattern is matched against paths relative to `src`; `*` also
/// crosses folder boundaries. Returns the copied destination paths.
pub fn copy_with(
    cx: &Instance,
    pattern: &str,
    src: impl AsRef<Path>,
    dst: impl AsRef<Path>,
    options: &CopyOptions,
) -> Result<Vec<PathBuf>> {
    let src = cx.resolve(src);
    let dst = cx.resolve(dst);
    let matcher = compile(pattern)?;
    let excludes = options
        .excludes
        .iter()
        .map(|e| compile(e))
        .collect::<Result<Vec<_>>>()?;

    let mut copied = Vec::new();
    if !src.is_dir() {
        return Ok(copied);
    }
    for entry in WalkDir::new(&src).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", src.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(&src).unwrap_or(entry.path());
        let rel_text = rel.to_string_lossy().replace('\\', "/");
        let file_name = entry.file_name().to_string_lossy();
        if !matcher.matches_with(&rel_text, MATCH) {
            continue;
        }
        if excludes
            .iter()
            .any(|e| e.matches_with(&rel_text, MATCH) || e.matches_with(&file_name, MATCH))
        {
            continue;
        }
        let target = if options.keep_path {
            dst.join(rel)
        } else {
            dst.join(entry.file_name())
        };
        if let Some(parent) = target.parent() {
            ensure_dir(parent)?;
        }
        std::fs::copy(entry.path(), &target).with_context(|| {
            format!("failed to copy {} to {}", entry.path().display(), target.display())
        })?;
        copied.push(target);
    }
    tracing::debug!("copied {} files matching `{}`", copied.len(), pattern);
    Ok(copied)
}

/// Write a text file, creating parent folders.
pub fn save(cx: &Instance, path: impl AsRef<Path>, content: &str) -> Result<()> {
    write_string(&cx.resolve(path), content)
}

/// Append to a text file, creating it if needed.
pub fn save_append(cx: &Instance, path: impl AsRef<Path>, content: &str) -> Result<()> {
    use std::io::Write;

    let path = cx.resolve(path);
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))
}

pub fn load(cx: &Instance, path: impl AsRef<Path>) -> Result<String> {
    let path = cx.resolve(path);
    std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))
}

/// Replace every occurrence of `search`; fails if it is absent.
pub fn replace_in_file(cx: &Instance, path: impl AsRef<Path>, search: &str, replace: &str) -> Result<()> {
    replace_in_file_with(cx, path, search, replace, true).map(|_| ())
}

/// Replace every occurrence of `search`. With `strict` off, a missing match
/// only logs a warning. Returns whether anything was replaced.
pub fn replace_in_file_with(
    cx: &Instance,
    path: impl AsRef<Path>,
    search: &str,
    replace: &str,
    strict: bool,
) -> Result<bool> {
    let path = cx.resolve(path);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    if !content.contains(search) {
        if strict {
            bail!(
                "replace_in_file didn't find pattern `{}` in {}",
                search,
                path.display()
            );
        }
        tracing::warn!(
            "{}: replace_in_file didn't find pattern `{}` in {}",
            cx.reference,
            search,
            path.display()
        );
        return Ok(false);
    }
    write_string(&path, &content.replace(search, replace))?;
    Ok(true)
}

/// Remove a folder and its contents; missing folders are fine.
pub fn rmdir(cx: &Instance, path: impl AsRef<Path>) -> Result<()> {
    remove_dir_all_if_exists(&cx.resolve(path))
}

/// Remove files in `folder` whose name matches `pattern`.
pub fn rm(cx: &Instance, pattern: &str, folder: impl AsRef<Path>, recursive: bool) -> Result<usize> {
    rm_with(cx, pattern, folder, recursive, &[])
}

/// `rm` with file-name patterns to keep.
pub fn rm_with(
    cx: &Instance,
    pattern: &str,
    folder: impl AsRef<Path>,
    recursive: bool,
    excludes: &[&str],
) -> Result<usize> {
    let folder = cx.resolve(folder);
    if !folder.is_dir() {
        return Ok(0);
    }
    let matcher = compile(pattern)?;
    let excludes = excludes
        .iter()
        .map(|e| compile(e))
        .collect::<Result<Vec<_>>>()?;
    let depth = if recursive { usize::MAX } else { 1 };

    let mut removed = 0;
    for entry in WalkDir::new(&folder).max_depth(depth) {
        let entry = entry.with_context(|| format!("failed to walk {}", folder.display()))?;
        if !entry.file_type().is_file() && !entry.path_is_symlink() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !matcher.matches_with(&name, MATCH) || excludes.iter().any(|e| e.matches_with(&name, MATCH)) {
            continue;
        }
        std::fs::remove_file(entry.path())
            .with_context(|| format!("failed to remove {}", entry.path().display()))?;
        removed += 1;
    }
    Ok(removed)
}

/// Rename a file or folder.
pub fn rename(cx: &Instance, src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<()> {
    let src = cx.resolve(src);
    let dst = cx.resolve(dst);
    if let Some(parent) = dst.parent() {
        ensure_dir(parent)?;
    }
    if src.is_dir() {
        move_dir(&src, &dst)
    } else {
        std::fs::rename(&src, &dst)
            .with_context(|| format!("failed to rename {} to {}", src.display(), dst.display()))
    }
}

pub fn mkdir(cx: &Instance, path: impl AsRef<Path>) -> Result<()> {
    ensure_dir(&cx.resolve(path))
}

/// Run `f` with the current folder changed to `path`, restoring it after.
pub fn chdir<T>(
    cx: &mut Instance,
    path: impl AsRef<Path>,
    f: impl FnOnce(&mut Instance) -> Result<T>,
) -> Result<T> {
    let target = cx.resolve(path);
    ensure_dir(&target)?;
    let previous = std::mem::replace(&mut cx.cwd, target);
    let result = f(cx);
    cx.cwd = previous;
    result
}

/// Move everything inside `src` into `dst`, keeping `excludes` in place.
pub fn move_folder_contents(
    cx: &Instance,
    src: impl AsRef<Path>,
    dst: impl AsRef<Path>,
    excludes: &[&str],
) -> Result<()> {
    let src = cx.resolve(src);
    let dst = cx.resolve(dst);
    ensure_dir(&dst)?;
    let entries: Vec<_> = std::fs::read_dir(&src)
        .with_context(|| format!("failed to read {}", src.display()))?
        .collect::<std::io::Result<_>>()?;
    for entry in entries {
        let name = entry.file_name();
        let name_text = name.to_string_lossy();
        if excludes.iter().any(|e| *e == name_text) {
            continue;
        }
        let from = entry.path();
        let to = dst.join(&name);
        if from == dst {
            continue;
        }
        if to.is_dir() && from.is_dir() {
            copy_dir_all(&from, &to)?;
            remove_dir_all_if_exists(&from)?;
        } else if from.is_dir() {
            move_dir(&from, &to)?;
        } else {
            std::fs::rename(&from, &to)
                .with_context(|| format!("failed to move {}", from.display()))?;
        }
    }
    Ok(())
}

const LIB_SUFFIXES: &[&str] = &[".dll.a", ".a", ".lib", ".so", ".dylib"];

/// Library names found in the package's `lib` folder (or `folder`),
/// sorted and without `lib` prefixes or extensions.
pub fn collect_libs(cx: &Instance, folder: Option<&str>) -> Result<Vec<String>> {
    let dir = cx.package_folder().join(folder.unwrap_or("lib"));
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut libs = Vec::new();
    for entry in std::fs::read_dir(&dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let entry = entry?;
        if !entry.file_type()?.is_file() && !entry.file_type()?.is_symlink() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        // versioned sonames such as libz.so.1 are not link names
        let Some(suffix) = LIB_SUFFIXES.iter().find(|s| name.ends_with(*s)) else {
            continue;
        };
        let stem = &name[..name.len() - suffix.len()];
        let stem = if *suffix != ".lib" {
            stem.strip_prefix("lib").unwrap_or(stem)
        } else {
            stem
        };
        if !stem.is_empty() && !libs.iter().any(|l| l == stem) {
            libs.push(stem.to_string());
        }
    }
    libs.sort();
    Ok(libs)
}
