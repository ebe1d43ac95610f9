//! Build-configuration checks: language standards, cross-building, jobs.

use anyhow::Result;

use crate::core::conf::keys;
use crate::core::errors::InvalidConfiguration;
use crate::core::instance::Instance;

/// Conf key overriding `can_run`.
pub const CAN_RUN: &str = "tools.build.cross_building:can_run";

/// Whether host and build machines differ in os or arch.
pub fn cross_building(cx: &Instance) -> bool {
    let host = &cx.settings;
    let build = &cx.settings_build;
    let differs = |key: &str| match (host.get_safe(key), build.get_safe(key)) {
        (Some(h), Some(b)) => h != b,
        _ => false,
    };
    differs("os") || differs("arch")
}

/// Whether binaries built for the host can execute on the build machine.
pub fn can_run(cx: &Instance) -> bool {
    match cx.conf.get_as::<bool>(CAN_RUN) {
        Ok(Some(value)) => value,
        _ => !cross_building(cx),
    }
}

/// Parallel jobs: `tools.build:jobs`, else the number of CPUs.
pub fn build_jobs(cx: &Instance) -> usize {
    if let Ok(Some(jobs)) = cx.conf.get_as::<usize>(keys::JOBS) {
        return jobs.max(1);
    }
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// The C++ standard library to link, from `compiler.libcxx`.
pub fn stdcpp_library(cx: &Instance) -> Option<&'static str> {
    match cx.settings.get_safe("compiler.libcxx")? {
        "libstdc++" | "libstdc++11" => Some("stdc++"),
        "libc++" => Some("c++"),
        "c++_shared" => Some("c++_shared"),
        "c++_static" => Some("c++_static"),
        _ => None,
    }
}

fn leading_number(s: &str) -> Option<u32> {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Default `cppstd` of a compiler version, when known.
pub fn default_cppstd(compiler: &str, version: &str) -> Option<&'static str> {
    let major = leading_number(version)?;
    Some(match compiler {
        "gcc" if major < 6 => "gnu98",
        "gcc" if major < 11 => "gnu14",
        "gcc" => "gnu17",
        "clang" if major < 6 => "gnu98",
        "clang" if major < 16 => "gnu14",
        "clang" => "gnu17",
        "apple-clang" => "gnu98",
        "msvc" => "14",
        _ => return None,
    })
}

/// Year of a C++ standard value (`17`, `gnu17`, `98`).
fn cppstd_year(value: &str) -> Option<u32> {
    let n = leading_number(value.trim_start_matches("gnu"))?;
    Some(if n >= 98 { 1900 + n } else { 2000 + n })
}

/// Year of a C standard value (`99`, `gnu11`).
fn cstd_year(value: &str) -> Option<u32> {
    let n = leading_number(value.trim_start_matches("gnu"))?;
    Some(if n >= 89 { 1900 + n } else { 2000 + n })
}

fn current_cppstd(cx: &Instance) -> Option<String> {
    if let Some(v) = cx.settings.get_safe("compiler.cppstd") {
        return Some(v.to_string());
    }
    let compiler = cx.settings.compiler()?;
    let version = cx.settings.get_safe("compiler.version")?;
    default_cppstd(compiler, version).map(str::to_string)
}

/// Whether the configured (or default) `cppstd` is at least `min`.
/// Unknown standards pass.
pub fn valid_min_cppstd(cx: &Instance, min: &str) -> bool {
    let (Some(current), Some(required)) = (current_cppstd(cx), cppstd_year(min)) else {
        return true;
    };
    cppstd_year(&current).map_or(true, |c| c >= required)
}

/// Fail with `InvalidConfiguration` if `cppstd` is below `min`.
pub fn check_min_cppstd(cx: &Instance, min: &str) -> Result<()> {
    if valid_min_cppstd(cx, min) {
        return Ok(());
    }
    let current = current_cppstd(cx).unwrap_or_default();
    Err(InvalidConfiguration::new(format!(
        "Current cppstd ({}) is lower than the required C++ standard ({}).",
        current, min
    ))
    .into())
}

/// Fail with `InvalidConfiguration` if `cppstd` is above `max`.
pub fn check_max_cppstd(cx: &Instance, max: &str) -> Result<()> {
    let (Some(current), Some(limit)) = (current_cppstd(cx), cppstd_year(max)) else {
        return Ok(());
    };
    if cppstd_year(&current).is_some_and(|c| c > limit) {
        return Err(InvalidConfiguration::new(format!(
            "Current cppstd ({}) is higher than the supported C++ standard ({}).",
            current, max
        ))
        .into());
    }
    Ok(())
}

/// Fail with `InvalidConfiguration` if `compiler.cstd` is below `min`.
/// Without a `cstd` setting the check passes.
pub fn check_min_cstd(cx: &Instance, min: &str) -> Result<()> {
    let Some(current) = cx.settings.get_safe("compiler.cstd") else {
        return Ok(());
    };
    if let (Some(c), Some(m)) = (cstd_year(current), cstd_year(min)) {
        if c < m {
            return Err(InvalidConfiguration::new(format!(
                "Current cstd ({}) is lower than the required C standard ({}).",
                current, min
            ))
            .into());
        }
    }
    Ok(())
}

/// Fail with `InvalidConfiguration` when building with an MSVC older than
/// `min` (a compiler version such as `191` or `193`). Other compilers pass.
pub fn check_min_vs(cx: &Instance, min: &str) -> Result<()> {
    if cx.settings.compiler() != Some("msvc") {
        return Ok(());
    }
    let current = cx.settings.get_safe("compiler.version").unwrap_or_default();
    if let (Some(c), Some(m)) = (leading_number(current), leading_number(min)) {
        if c < m {
            return Err(InvalidConfiguration::new(format!(
                "{} requires at least msvc {}, got {}",
                cx.reference, min, current
            ))
            .into());
        }
    }
    Ok(())
}
