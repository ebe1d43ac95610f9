//! Platform adapters: MSVC vs MinGW, Apple, GNU triplets, Windows shells,
//! and detection of the running machine's settings.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use regex::Regex;

use crate::core::instance::Instance;
use crate::core::settings::Settings;
use crate::tools::build::default_cppstd;
use crate::util::process::{find_c_compiler, ProcessBuilder};

const APPLE_OS: &[&str] = &["Macos", "iOS", "watchOS", "tvOS", "visionOS"];

pub fn is_apple_os(cx: &Instance) -> bool {
    cx.settings.is_any("os", APPLE_OS)
}

pub fn is_msvc(cx: &Instance) -> bool {
    cx.settings.compiler() == Some("msvc")
}

/// MSVC with a static runtime (`/MT`).
pub fn is_msvc_static_runtime(cx: &Instance) -> bool {
    is_msvc(cx) && cx.settings.is("compiler.runtime", "static")
}

/// `MT`, `MTd`, `MD` or `MDd` for MSVC builds.
pub fn msvc_runtime_flag(cx: &Instance) -> Option<String> {
    if !is_msvc(cx) {
        return None;
    }
    let base = if is_msvc_static_runtime(cx) { "MT" } else { "MD" };
    let debug = match cx.settings.get_safe("compiler.runtime_type") {
        Some(t) => t == "Debug",
        None => cx.settings.build_type() == Some("Debug"),
    };
    Some(format!("{}{}", base, if debug { "d" } else { "" }))
}

/// GNU machine triplet (`x86_64-linux-gnu`) for an os/arch pair.
pub fn get_gnu_triplet(os: &str, arch: &str, compiler: Option<&str>) -> Result<String> {
    let machine = match arch {
        "x86" => "i686",
        "x86_64" => "x86_64",
        "armv8" | "arm64" => "aarch64",
        "armv8_32" => "aarch64",
        "armv7" | "armv7hf" | "armv6" | "armv5el" | "armv5hf" => "arm",
        "ppc64le" => "powerpc64le",
        "ppc64" => "powerpc64",
        "ppc32" => "powerpc",
        "s390x" => "s390x",
        "riscv64" => "riscv64",
        "riscv32" => "riscv32",
        "wasm" => "wasm32",
        other => bail!("unknown architecture `{}` for a GNU triplet", other),
    };
    let is_hard_float = arch.ends_with("hf");
    let system = match os {
        "Linux" if machine == "arm" && is_hard_float => "linux-gnueabihf",
        "Linux" if machine == "arm" => "linux-gnueabi",
        "Linux" => "linux-gnu",
        "Android" if machine == "arm" => "linux-androideabi",
        "Android" => "linux-android",
        "Windows" if compiler == Some("msvc") => "windows-msvc",
        "Windows" => "w64-mingw32",
        "Macos" => "apple-darwin",
        "iOS" | "watchOS" | "tvOS" | "visionOS" => "apple-ios",
        "FreeBSD" => "unknown-freebsd",
        "Emscripten" => "unknown-emscripten",
        "Neutrino" => "nto-qnx",
        other => bail!("unknown os `{}` for a GNU triplet", other),
    };
    Ok(format!("{}-{}", machine, system))
}

/// Conf key naming the Windows bash subsystem (`msys2` or `cygwin`).
pub const BASH_SUBSYSTEM: &str = "tools.microsoft.bash:subsystem";

/// Translate a path for the bash shell of the build machine. Paths are
/// unchanged unless building on Windows.
pub fn unix_path(cx: &Instance, path: &Path) -> String {
    let text = path.display().to_string();
    if !cx.settings_build.is("os", "Windows") {
        return text;
    }
    let text = text.replace('\\', "/");
    let subsystem = cx
        .conf
        .get_str(BASH_SUBSYSTEM)
        .unwrap_or_else(|| "msys2".to_string());
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(drive), Some(':')) if drive.is_ascii_alphabetic() => {
            let rest = &text[2..];
            let drive = drive.to_ascii_lowercase();
            match subsystem.as_str() {
                "cygwin" => format!("/cygdrive/{}{}", drive, rest),
                "wsl" => format!("/mnt/{}{}", drive, rest),
                _ => format!("/{}{}", drive, rest),
            }
        }
        _ => text,
    }
}

/// Make shared libraries on Apple platforms use `@rpath` install names.
pub fn fix_apple_shared_install_name(cx: &Instance) -> Result<()> {
    if !is_apple_os(cx) || !cx.options.is_true("shared") {
        return Ok(());
    }
    let lib = cx.package_folder().join("lib");
    if !lib.is_dir() {
        return Ok(());
    }
    for entry in std::fs::read_dir(&lib).with_context(|| format!("failed to read {}", lib.display()))? {
        let entry = entry?;
        let path = entry.path();
        let is_dylib = path.extension().is_some_and(|e| e == "dylib");
        if !is_dylib || entry.file_type()?.is_symlink() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        cx.run_with(
            &format!("install_name_tool -id @rpath/{} \"{}\"", name, path.display()),
            Some(&lib),
            None,
        )?;
    }
    Ok(())
}

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?").expect("valid version regex"));

/// Compiler family and major version from `--version` output.
pub fn parse_compiler_version(output: &str) -> Option<(&'static str, String)> {
    let lower = output.to_lowercase();
    let family = if lower.contains("apple") && lower.contains("clang") {
        "apple-clang"
    } else if lower.contains("clang") {
        "clang"
    } else if lower.contains("gcc") || lower.contains("free software foundation") {
        "gcc"
    } else {
        return None;
    };
    let caps = VERSION_RE.captures(output)?;
    let major = caps.get(1)?.as_str().to_string();
    let version = if family == "apple-clang" {
        format!("{}.{}", major, caps.get(2)?.as_str())
    } else {
        major
    };
    Some((family, version))
}

fn detect_os() -> &'static str {
    match std::env::consts::OS {
        "linux" => "Linux",
        "macos" => "Macos",
        "windows" => "Windows",
        "freebsd" => "FreeBSD",
        "android" => "Android",
        "ios" => "iOS",
        _ => "Linux",
    }
}

fn detect_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "x86_64",
        "x86" => "x86",
        "aarch64" => "armv8",
        "arm" => "armv7",
        "powerpc64" => "ppc64",
        "s390x" => "s390x",
        "riscv64" => "riscv64",
        _ => "x86_64",
    }
}

/// Detect settings for the running machine, as written by `profile detect`.
pub fn detect_settings() -> Settings {
    let os = detect_os();
    let mut settings = Settings::new();
    settings.set("os", os);
    settings.set("arch", detect_arch());

    if os == "Windows" && which::which("cl").is_ok() {
        settings.set("compiler", "msvc");
        settings.set("compiler.version", "193");
        settings.set("compiler.runtime", "dynamic");
        settings.set("compiler.cppstd", "14");
    } else if let Some(cc) = find_c_compiler() {
        let output = ProcessBuilder::new(&cc).arg("--version").exec();
        let detected = output
            .ok()
            .and_then(|o| parse_compiler_version(&String::from_utf8_lossy(&o.stdout)));
        match detected {
            Some((family, version)) => {
                tracing::debug!("detected {} {} at {}", family, version, cc.display());
                settings.set("compiler", family);
                settings.set("compiler.version", version.as_str());
                let libcxx = match family {
                    "gcc" => "libstdc++11",
                    "clang" if os == "Linux" => "libstdc++11",
                    _ => "libc++",
                };
                settings.set("compiler.libcxx", libcxx);
                if let Some(std) = default_cppstd(family, &version) {
                    settings.set("compiler.cppstd", std);
                }
            }
            None => tracing::warn!("could not identify compiler at {}", cc.display()),
        }
    } else {
        tracing::warn!("no C compiler found; profile has no compiler settings");
    }
    settings.set("build_type", "Release");
    settings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixtures;

    #[test]
    fn test_gnu_triplets() {
        assert_eq!(get_gnu_triplet("Linux", "x86_64", None).unwrap(), "x86_64-linux-gnu");
        assert_eq!(get_gnu_triplet("Linux", "armv7hf", None).unwrap(), "arm-linux-gnueabihf");
        assert_eq!(get_gnu_triplet("Android", "armv8", None).unwrap(), "aarch64-linux-android");
        assert_eq!(get_gnu_triplet("Windows", "x86_64", Some("gcc")).unwrap(), "x86_64-w64-mingw32");
        assert_eq!(get_gnu_triplet("Macos", "armv8", None).unwrap(), "aarch64-apple-darwin");
        assert!(get_gnu_triplet("Plan9", "x86_64", None).is_err());
    }

    #[test]
    fn test_msvc_runtime_flag() {
        let mut cx = fixtures::instance("pkg", "1.0", fixtures::windows_settings());
        assert_eq!(msvc_runtime_flag(&cx).as_deref(), Some("MD"));
        cx.settings.set("compiler.runtime", "static");
        cx.settings.set("compiler.runtime_type", "Debug");
        assert_eq!(msvc_runtime_flag(&cx).as_deref(), Some("MTd"));
        assert!(is_msvc_static_runtime(&cx));

        let linux = fixtures::instance("pkg", "1.0", fixtures::linux_settings());
        assert_eq!(msvc_runtime_flag(&linux), None);
    }

    #[test]
    fn test_unix_path() {
        let cx = fixtures::instance("pkg", "1.0", fixtures::windows_settings());
        assert_eq!(unix_path(&cx, Path::new("C:\\work\\src")), "/c/work/src");
        let mut cyg = cx.clone();
        cyg.conf.define(BASH_SUBSYSTEM, "cygwin");
        assert_eq!(unix_path(&cyg, Path::new("D:\\x")), "/cygdrive/d/x");

        let linux = fixtures::instance("pkg", "1.0", fixtures::linux_settings());
        assert_eq!(unix_path(&linux, Path::new("/tmp/x")), "/tmp/x");
    }

    #[test]
    fn test_parse_compiler_version() {
        let gcc = "gcc (Ubuntu 11.4.0-1ubuntu1~22.04) 11.4.0\nCopyright (C) 2021 Free Software Foundation";
        assert_eq!(parse_compiler_version(gcc), Some(("gcc", "11".to_string())));
        let apple = "Apple clang version 15.0.0 (clang-1500.1.0.2.5)";
        assert_eq!(parse_compiler_version(apple), Some(("apple-clang", "15.0".to_string())));
        let clang = "Ubuntu clang version 17.0.6";
        assert_eq!(parse_compiler_version(clang), Some(("clang", "17".to_string())));
        assert_eq!(parse_compiler_version("tcc version 0.9.27"), None);
    }

    #[test]
    fn test_is_apple_os() {
        let mut cx = fixtures::instance("pkg", "1.0", fixtures::linux_settings());
        assert!(!is_apple_os(&cx));
        cx.settings.set("os", "iOS");
        assert!(is_apple_os(&cx));
    }
}
