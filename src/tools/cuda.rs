//! The built-in `cuda` helper module.
//!
//! Recipes declare `python_requires = ["cuda/latest"]` and reach it with
//! `cx.python_requires("cuda")?.module::<CudaModule>()`.

use std::any::Any;

use anyhow::{bail, Context, Result};

use crate::core::env_info::Environment;
use crate::core::errors::InvalidConfiguration;
use crate::core::instance::Instance;
use crate::core::modules::RecipeModule;
use crate::core::requirement::Requirement;
use crate::core::version::Version;

/// Conf key with the CUDA toolkit root.
pub const CUDA_PATH: &str = "user.cuda:path";

/// Lowest and highest architecture each toolkit major builds for `all`.
/// `None` means no upper bound yet.
const SUPPORTED_ARCHS: &[(u64, u32, Option<u32>)] = &[
    (9, 30, Some(70)),
    (10, 30, Some(75)),
    (11, 35, Some(90)),
    (12, 50, Some(121)),
    (13, 75, None),
];

/// Toolkit packages versioned in lockstep with the toolkit minor release.
const FOLLOWS_MINOR: &[&str] = &[
    "cublas",
    "cuda-crt",
    "cuda-driver-stubs",
    "cuda-gdb",
    "cuda-opencl",
    "cuda-profiler-api",
    "cuda-sanitizer-api",
    "cudart",
    "cudla",
    "culibos",
    "cupti",
    "npp",
    "nvcc",
    "nvfatbin",
    "nvml-stubs",
    "nvptxcompiler",
    "nvrtc",
    "nvvm",
];

/// Toolkit packages that only track the toolkit major release.
const FOLLOWS_MAJOR: &[&str] = &[
    "cuda-samples",
    "nvjitlink",
    "nvjpeg",
    "nvidia-video-codec-sdk",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct CudaModule;

impl RecipeModule for CudaModule {
    fn name(&self) -> &str {
        "cuda"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn toolkit_version(cx: &Instance) -> Result<(u64, Option<u64>)> {
    let raw = cx.settings.get("cuda.version")?;
    let version = Version::new(raw);
    let major = version
        .major()
        .with_context(|| format!("invalid cuda.version `{}`", raw))?;
    Ok((major, version.minor()))
}

/// Version range of toolkit package `package` compatible with toolkit
/// `major.minor`, without the surrounding brackets.
pub fn package_version_range(package: &str, major: u64, minor: Option<u64>) -> Result<String> {
    if FOLLOWS_MINOR.contains(&package) {
        return Ok(match minor {
            Some(minor) => format!("~{}.{}", major, minor),
            None => format!("^{}", major),
        });
    }
    if FOLLOWS_MAJOR.contains(&package) {
        return Ok(format!("^{}", major));
    }
    let range = match package {
        "cuda-cccl" if major >= 13 => "^3".to_string(),
        "cuda-cccl" if (major, minor.unwrap_or(0)) >= (12, 2) => "^2".to_string(),
        "cuda-cccl" => "^1".to_string(),
        "cufft" => format!("^{}", major.saturating_sub(1)),
        "curand" if major >= 13 => "~10.4".to_string(),
        "curand" if major == 12 => "~10.3".to_string(),
        "curand" => "~10.2".to_string(),
        "cusolver" if major >= 13 => "^12".to_string(),
        "cusolver" => "^11".to_string(),
        "cusparse" if major >= 13 => ">=12.6".to_string(),
        "cusparse" if major == 12 => ">=12 <12.6".to_string(),
        "cusparse" => "^11".to_string(),
        "nvjpeg2k" if major >= 13 => ">=0.9".to_string(),
        "nvjpeg2k" => "<0.9".to_string(),
        "nvimgcodec" => "*".to_string(),
        "nvidia-optical-flow-sdk" => "^5".to_string(),
        "nvtx" => "^3".to_string(),
        other => bail!("unknown CUDA package `{}`", other),
    };
    Ok(range)
}

impl CudaModule {
    /// Architectures from `cuda.architectures` (`"70;80"` or `"70,80"`).
    pub fn architectures(&self, cx: &Instance) -> Vec<String> {
        cx.settings
            .get_safe("cuda.architectures")
            .map(|s| {
                s.split([';', ','])
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Fail unless every configured architecture is at least `min`.
    ///
    /// `native` can't be checked and passes. `all` and `all-major` fail when
    /// the toolkit's lowest supported architecture is below `min`.
    pub fn check_min_cuda_architecture(&self, cx: &Instance, min: u32) -> Result<()> {
        let archs = self.architectures(cx);
        if archs.is_empty() {
            return Err(InvalidConfiguration::new("no `cuda.architectures` setting defined").into());
        }
        for arch in &archs {
            match arch.as_str() {
                "native" => continue,
                "all" | "all-major" => {
                    let (major, _) = toolkit_version(cx)?;
                    let (low, high) = SUPPORTED_ARCHS
                        .iter()
                        .find(|(m, _, _)| *m == major)
                        .map(|(_, low, high)| (*low, *high))
                        .with_context(|| format!("unsupported CUDA major version {}", major))?;
                    if min > low {
                        let high = high.map_or_else(|| "latest".to_string(), |h| h.to_string());
                        return Err(InvalidConfiguration::new(format!(
                            "can't use cuda.architectures={}: {} requires at least {}, but `{}` covers {} to {}",
                            archs.join(","),
                            cx.name(),
                            min,
                            arch,
                            low,
                            high
                        ))
                        .into());
                    }
                }
                _ => {
                    let numeric = arch.split('-').next().unwrap_or_default();
                    let value: u32 = numeric
                        .parse()
                        .with_context(|| format!("invalid CUDA architecture `{}`", arch))?;
                    if value < min {
                        return Err(InvalidConfiguration::new(format!(
                            "{} requires CUDA architecture {} or newer, got {}",
                            cx.reference, min, arch
                        ))
                        .into());
                    }
                }
            }
        }
        Ok(())
    }

    /// `nvcc` code-generation flags for the configured architectures.
    pub fn arch_flags(&self, cx: &Instance) -> Vec<String> {
        self.architectures(cx)
            .iter()
            .filter_map(|a| match a.as_str() {
                "native" | "all" | "all-major" => Some(format!("-arch={a}")),
                _ => {
                    let numeric = a.split('-').next().unwrap_or_default();
                    if numeric.is_empty() || !numeric.chars().all(|c| c.is_ascii_digit()) {
                        tracing::warn!("ignoring invalid CUDA architecture `{}`", a);
                        return None;
                    }
                    Some(format!("-gencode=arch=compute_{numeric},code=sm_{numeric}"))
                }
            })
            .collect()
    }

    /// Version range for a `cudart`-style requirement matching the
    /// configured `cuda.version`, e.g. `[~12.2]`.
    pub fn version_range(&self, cx: &Instance) -> Result<String> {
        let (major, minor) = toolkit_version(cx)?;
        Ok(match minor {
            Some(minor) => format!("[~{}.{}]", major, minor),
            None => format!("[~{}]", major),
        })
    }

    /// Range of toolkit package `package` for the configured `cuda.version`.
    pub fn package_range(&self, cx: &Instance, package: &str) -> Result<String> {
        let (major, minor) = toolkit_version(cx)?;
        package_version_range(package, major, minor)
    }

    /// Require toolkit package `package` at the range matching `cuda.version`.
    pub fn requires<'a>(&self, cx: &'a mut Instance, package: &str) -> Result<&'a mut Requirement> {
        let range = self.package_range(cx, package)?;
        cx.requires(&format!("{}/[{}]", package, range))
    }

    /// Tool-require toolkit package `package`, typically `nvcc`.
    pub fn tool_requires<'a>(&self, cx: &'a mut Instance, package: &str) -> Result<&'a mut Requirement> {
        let range = self.package_range(cx, package)?;
        cx.tool_requires(&format!("{}/[{}]", package, range))
    }

    /// Settings any CUDA build needs: `cuda.version`, and usable
    /// architectures when `cuda.architectures` is present.
    pub fn validate_settings(&self, cx: &Instance) -> Result<()> {
        if cx.settings.get_safe("cuda.version").is_none() {
            return Err(InvalidConfiguration::new(
                "`cuda.version` setting must be defined, e.g. `cuda.version=12.1`",
            )
            .into());
        }
        if cx.settings.get_safe("cuda.architectures").is_some() && self.arch_flags(cx).is_empty() {
            return Err(InvalidConfiguration::new(
                "no valid CUDA architectures in `cuda.architectures`, e.g. `cuda.architectures=70,75`",
            )
            .into());
        }
        Ok(())
    }

    /// Fail when one of `deps` is a host dependency built static.
    /// Prebuilt shared libraries need their dependencies shared at runtime.
    pub fn require_shared_deps(&self, cx: &Instance, deps: &[&str]) -> Result<()> {
        for name in deps {
            let Some(dep) = cx.dependencies.host().find(|d| d.name() == *name) else {
                continue;
            };
            let shared = dep.options.get_safe("shared").map_or(true, |v| v.is_true());
            if shared {
                continue;
            }
            let message = if cx.options.contains("shared") {
                format!(
                    "{} requires -o {}/*:shared=True when -o {}/*:shared=True",
                    cx.name(),
                    name,
                    cx.name()
                )
            } else {
                format!("{} requires -o {}/*:shared=True", cx.name(), name)
            };
            return Err(InvalidConfiguration::new(message).into());
        }
        Ok(())
    }

    /// Build environment pointing CMake and nvcc at the toolkit.
    pub fn environment(&self, cx: &Instance) -> Environment {
        let mut env = Environment::new();
        let archs = self.architectures(cx);
        if !archs.is_empty() {
            env.define("CUDAARCHS", archs.join(";"));
        }
        if let Some(path) = cx.conf.get_str(CUDA_PATH) {
            env.define_path("CUDA_PATH", &path);
            env.prepend_path("PATH", std::path::Path::new(&path).join("bin"));
        }
        env
    }
}
