//! The built-in `utils` helper module: small fixes recipes share.
//!
//! Reached with `cx.python_requires("utils")?.module::<UtilsModule>()`.

use std::any::Any;
use std::path::PathBuf;

use anyhow::{Context, Result};
use walkdir::WalkDir;

use crate::core::conf::keys;
use crate::core::instance::Instance;
use crate::core::modules::RecipeModule;
use crate::tools::build::build_jobs;
use crate::tools::files::rename;

#[derive(Debug, Clone, Copy, Default)]
pub struct UtilsModule;

impl RecipeModule for UtilsModule {
    fn name(&self) -> &str {
        "utils"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl UtilsModule {
    /// Rename `libfoo.a` style archives in the package folder to `foo.lib`
    /// when targeting a cl-like compiler on Windows. Meson names static
    /// libraries the Unix way regardless of the compiler.
    ///
    /// Returns the renamed files.
    pub fn fix_msvc_libnames(
        &self,
        cx: &Instance,
        extensions: &[&str],
        remove_lib_prefix: bool,
    ) -> Result<Vec<PathBuf>> {
        if cx.settings.get_safe("os") != Some("Windows") {
            return Ok(Vec::new());
        }
        let cl_like = cx.settings.get_safe("compiler") == Some("msvc")
            || cx.settings.get_safe("compiler.runtime").is_some();
        if !cl_like {
            return Ok(Vec::new());
        }
        let extensions: &[&str] = if extensions.is_empty() { &[".a"] } else { extensions };

        let root = cx.package_folder();
        let mut renamed = Vec::new();
        for ext in extensions {
            let mut found = Vec::new();
            for entry in WalkDir::new(root).sort_by_file_name() {
                let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let file_name = entry.file_name().to_string_lossy();
                if let Some(stem) = file_name.strip_suffix(ext) {
                    let stem = match stem.strip_prefix("lib") {
                        Some(rest) if remove_lib_prefix => rest,
                        _ => stem,
                    };
                    found.push((entry.path().to_path_buf(), format!("{}.lib", stem)));
                }
            }
            for (path, new_name) in found {
                let target = path.with_file_name(new_name);
                tracing::debug!("renaming {} to {}", path.display(), target.display());
                rename(cx, &path, &target)?;
                renamed.push(target);
            }
        }
        Ok(renamed)
    }

    /// Cap `tools.build:jobs` so each job gets `gb_mem_per_job` GB of the
    /// memory currently available. Leaves the conf alone when available
    /// memory can't be determined.
    pub fn limit_build_jobs(&self, cx: &mut Instance, gb_mem_per_job: f64) {
        let Some(free_gb) = free_memory_gb() else {
            tracing::debug!("available memory unknown, not limiting build jobs");
            return;
        };
        limit_jobs_to(cx, free_gb, gb_mem_per_job);
    }
}

/// Most jobs that fit in `free_gb`, never fewer than one.
pub fn max_jobs(free_gb: f64, gb_mem_per_job: f64) -> usize {
    if gb_mem_per_job <= 0.0 {
        return usize::MAX;
    }
    ((free_gb / gb_mem_per_job).floor() as usize).max(1)
}

fn limit_jobs_to(cx: &mut Instance, free_gb: f64, gb_mem_per_job: f64) {
    let limit = max_jobs(free_gb, gb_mem_per_job);
    if build_jobs(cx) > limit {
        tracing::warn!(
            "limiting build jobs to {} to fit the available {:.1} GB of memory with {} GB per job",
            limit,
            free_gb,
            gb_mem_per_job
        );
        cx.conf.define(keys::JOBS, limit);
    }
}

/// Available memory in GB, from `MemAvailable` in `/proc/meminfo`.
fn free_memory_gb() -> Option<f64> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    parse_mem_available(&meminfo)
}

fn parse_mem_available(meminfo: &str) -> Option<f64> {
    let line = meminfo.lines().find(|l| l.starts_with("MemAvailable:"))?;
    let kib: f64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kib / (1024.0 * 1024.0))
}
