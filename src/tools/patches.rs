//! Applying unified diffs, including the patches listed in `conandata.yml`.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};

use crate::core::conandata::PatchSpec;
use crate::core::instance::Instance;
use crate::util::fs::{ensure_dir, write_string};

const DEV_NULL: &str = "/dev/null";

/// One file's worth of a multi-file patch.
struct FilePatch<'a> {
    text: &'a str,
    original: Option<String>,
    modified: Option<String>,
}

fn header_path(line: &str, prefix: &str) -> Option<String> {
    let rest = line.strip_prefix(prefix)?;
    let path = rest.split('\t').next().unwrap_or(rest).trim();
    if path == DEV_NULL {
        None
    } else {
        Some(path.trim_matches('"').to_string())
    }
}

/// Split a unified diff into per-file chunks starting at each `---`/`+++`
/// header pair.
fn split_patch(text: &str) -> Vec<FilePatch<'_>> {
    let mut starts = Vec::new();
    let mut offset = 0;
    let mut lines = text.split_inclusive('\n').peekable();
    while let Some(line) = lines.next() {
        if line.starts_with("--- ") && lines.peek().is_some_and(|next| next.starts_with("+++ ")) {
            starts.push(offset);
        }
        offset += line.len();
    }

    let mut chunks = Vec::new();
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(text.len());
        let chunk = &text[start..end];
        let mut header = chunk.lines();
        let original = header.next().and_then(|l| header_path(l, "--- "));
        let modified = header.next().and_then(|l| header_path(l, "+++ "));
        chunks.push(FilePatch {
            text: chunk,
            original,
            modified,
        });
    }
    chunks
}

fn strip_components(path: &str, strip: usize) -> Option<PathBuf> {
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    if parts.len() <= strip {
        return None;
    }
    Some(parts[strip..].iter().collect())
}

/// Pick the target file for a chunk. Without an explicit strip level, the
/// first level whose path exists under `base` wins; new files default to 1
/// for `a/`, `b/` style headers.
fn target_path(chunk: &FilePatch<'_>, base: &Path, strip: Option<usize>) -> Result<(PathBuf, bool)> {
    let name = chunk
        .modified
        .as_deref()
        .or(chunk.original.as_deref())
        .ok_or_else(|| anyhow!("patch chunk has no file name"))?;
    let deleted = chunk.modified.is_none();

    if let Some(strip) = strip {
        let rel = strip_components(name, strip)
            .ok_or_else(|| anyhow!("cannot strip {} components from `{}`", strip, name))?;
        return Ok((base.join(rel), deleted));
    }

    if chunk.original.is_some() {
        for level in 0..=2 {
            if let Some(rel) = strip_components(name, level) {
                if base.join(&rel).is_file() {
                    return Ok((base.join(rel), deleted));
                }
            }
        }
        bail!("file to patch not found: `{}` under {}", name, base.display());
    }

    let level = if name.starts_with("b/") { 1 } else { 0 };
    let rel = strip_components(name, level)
        .ok_or_else(|| anyhow!("invalid file name `{}` in patch", name))?;
    Ok((base.join(rel), false))
}

/// Apply a unified diff to the files under `base`.
pub fn apply_patch_text(text: &str, base: &Path, strip: Option<usize>) -> Result<Vec<PathBuf>> {
    let chunks = split_patch(text);
    if chunks.is_empty() {
        bail!("patch contains no file headers");
    }
    let mut touched = Vec::new();
    for chunk in &chunks {
        let patch = diffy::Patch::from_str(chunk.text)
            .map_err(|e| anyhow!("failed to parse patch: {}", e))?;
        let (target, deleted) = target_path(chunk, base, strip)?;

        let current = if chunk.original.is_some() {
            std::fs::read_to_string(&target)
                .with_context(|| format!("failed to read {}", target.display()))?
        } else {
            String::new()
        };
        let patched = diffy::apply(&current, &patch)
            .map_err(|e| anyhow!("failed to apply patch to {}: {}", target.display(), e))?;

        if deleted {
            std::fs::remove_file(&target)
                .with_context(|| format!("failed to remove {}", target.display()))?;
        } else {
            write_string(&target, &patched)?;
        }
        touched.push(target);
    }
    Ok(touched)
}

/// Apply a patch file or inline patch text. `base_path` is relative to the
/// source folder.
pub fn patch(
    cx: &Instance,
    patch_file: Option<&Path>,
    patch_string: Option<&str>,
    base_path: Option<&str>,
    strip: Option<usize>,
) -> Result<()> {
    let text = match (patch_file, patch_string) {
        (_, Some(s)) => s.to_string(),
        (Some(file), None) => {
            let file = cx.resolve(file);
            std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read patch {}", file.display()))?
        }
        (None, None) => bail!("patch() needs a patch file or a patch string"),
    };
    let mut base = cx.source_folder();
    if let Some(sub) = base_path {
        base = base.join(sub);
    }
    let touched = apply_patch_text(&text, &base, strip)
        .with_context(|| format!("failed to apply patch in `{}`", cx.reference))?;
    tracing::debug!("{}: patched {} files", cx.reference, touched.len());
    Ok(())
}

fn describe(spec: &PatchSpec) -> String {
    spec.patch_description
        .clone()
        .or_else(|| spec.patch_file.clone())
        .unwrap_or_else(|| "inline patch".to_string())
}

/// Apply every patch listed in `conandata.yml` for this version, in order.
///
/// Patch files are read from the export sources folder.
pub fn apply_conandata_patches(cx: &Instance) -> Result<()> {
    let Some(data) = cx.conan_data.as_deref() else {
        return Ok(());
    };
    for spec in data.patches_for(cx.version()) {
        tracing::info!("{}: apply patch: {}", cx.reference, describe(spec));
        let file = spec
            .patch_file
            .as_deref()
            .map(|f| cx.export_sources_folder().join(f));
        patch(
            cx,
            file.as_deref(),
            spec.patch_string.as_deref(),
            spec.base_path.as_deref(),
            None,
        )?;
    }
    Ok(())
}

/// Copy the patch files listed in `conandata.yml` for this version from the
/// recipe folder into the export sources folder.
pub fn export_conandata_patches(cx: &Instance) -> Result<()> {
    let Some(data) = cx.conan_data.as_deref() else {
        return Ok(());
    };
    let recipe = cx
        .recipe_folder()
        .ok_or_else(|| anyhow!("`{}` has no recipe folder to export patches from", cx.reference))?;
    for spec in data.patches_for(cx.version()) {
        let Some(file) = spec.patch_file.as_deref() else {
            continue;
        };
        let src = recipe.join(file);
        let dst = cx.export_sources_folder().join(file);
        if let Some(parent) = dst.parent() {
            ensure_dir(parent)?;
        }
        std::fs::copy(&src, &dst)
            .with_context(|| format!("failed to export patch {}", src.display()))?;
    }
    Ok(())
}
