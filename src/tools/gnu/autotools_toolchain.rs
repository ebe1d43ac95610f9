//! `AutotoolsToolchain`: compiler flags, triplets and configure arguments
//! for `./configure` based builds.

use std::path::PathBuf;

use anyhow::Result;
use indexmap::IndexMap;
use serde_json::json;

use crate::core::conf::keys;
use crate::core::env_info::Environment;
use crate::core::instance::Instance;
use crate::tools::build::cross_building;
use crate::tools::platform::{get_gnu_triplet, is_apple_os, is_msvc, msvc_runtime_flag};
use crate::util::fs::write_string;

/// Script registering the toolchain environment.
pub const TOOLCHAIN_SCRIPT: &str = "conanautotoolstoolchain";
/// JSON file with the arguments the `Autotools` helper passes along.
pub const ARGS_FILE: &str = "conanbuild.conf";

fn build_type_flags(build_type: Option<&str>, msvc: bool) -> Vec<String> {
    let flags: &[&str] = match (build_type, msvc) {
        (Some("Debug"), false) => &["-g"],
        (Some("Release"), false) => &["-O3"],
        (Some("RelWithDebInfo"), false) => &["-O2", "-g"],
        (Some("MinSizeRel"), false) => &["-Os"],
        (Some("Debug"), true) => &["-Zi", "-Ob0", "-Od"],
        (Some("Release"), true) => &["-O2", "-Ob2"],
        (Some("RelWithDebInfo"), true) => &["-Zi", "-O2", "-Ob1"],
        (Some("MinSizeRel"), true) => &["-O1", "-Ob1"],
        _ => &[],
    };
    flags.iter().map(|f| f.to_string()).collect()
}

fn cppstd_flag(compiler: Option<&str>, cppstd: &str) -> Option<String> {
    let (gnu, std) = match cppstd.strip_prefix("gnu") {
        Some(rest) => (true, rest),
        None => (false, cppstd),
    };
    match compiler? {
        "msvc" => {
            let v = match std {
                "14" => "c++14",
                "17" => "c++17",
                "20" => "c++20",
                "23" => "c++latest",
                _ => return None,
            };
            Some(format!("/std:{}", v))
        }
        _ => {
            let v = match std {
                "11" => "11",
                "14" => "14",
                "17" => "17",
                "20" => "20",
                "23" => "23",
                "98" => "98",
                _ => return None,
            };
            Some(format!("-std={}++{}", if gnu { "gnu" } else { "c" }, v))
        }
    }
}

fn arch_flag(arch: Option<&str>, msvc: bool) -> Option<&'static str> {
    if msvc {
        return None;
    }
    match arch? {
        "x86_64" | "ppc64" | "ppc64le" | "s390x" => Some("-m64"),
        "x86" => Some("-m32"),
        _ => None,
    }
}

/// Toolchain for Autotools. Recipes extend `configure_args`,
/// `extra_*flags` and `defines` before calling `generate()`.
#[derive(Debug, Clone)]
pub struct AutotoolsToolchain {
    pub configure_args: Vec<String>,
    pub make_args: Vec<String>,
    pub autoreconf_args: Vec<String>,
    pub extra_cflags: Vec<String>,
    pub extra_cxxflags: Vec<String>,
    pub extra_ldflags: Vec<String>,
    pub extra_defines: Vec<String>,
    pub defines: Vec<String>,
    pub cflags: Vec<String>,
    pub cxxflags: Vec<String>,
    pub ldflags: Vec<String>,
    pub fpic: Option<bool>,
    pub host: Option<String>,
    pub build: Option<String>,
    compilers: IndexMap<String, String>,
}

impl AutotoolsToolchain {
    pub fn new(cx: &Instance) -> Result<Self> {
        let msvc = is_msvc(cx);
        let settings = &cx.settings;
        let mut common = build_type_flags(settings.build_type(), msvc);
        if let Some(flag) = arch_flag(settings.arch(), msvc) {
            common.push(flag.to_string());
        }
        if let Some(flag) = msvc_runtime_flag(cx) {
            common.push(format!("-{}", flag));
        }
        let fpic = cx.options.get_safe("fPIC").map(|v| v.is_true());

        let mut cxxflags = common.clone();
        if let Some(std) = settings.get_safe("compiler.cppstd") {
            if let Some(flag) = cppstd_flag(settings.compiler(), std) {
                cxxflags.push(flag);
            }
        }
        if matches!(settings.compiler(), Some("clang") | Some("apple-clang")) {
            match settings.get_safe("compiler.libcxx") {
                Some("libc++") => cxxflags.push("-stdlib=libc++".to_string()),
                Some("libstdc++") | Some("libstdc++11") => {
                    cxxflags.push("-stdlib=libstdc++".to_string())
                }
                _ => {}
            }
        }
        let mut cflags = common.clone();
        let mut ldflags = Vec::new();
        if let Some(flag) = arch_flag(settings.arch(), msvc) {
            ldflags.push(flag.to_string());
        }
        if fpic == Some(true) {
            cflags.push("-fPIC".to_string());
            cxxflags.push("-fPIC".to_string());
        }
        if is_apple_os(cx) {
            if let Some(arch) = settings.arch() {
                let apple = if arch == "armv8" { "arm64" } else { arch };
                for flags in [&mut cflags, &mut cxxflags, &mut ldflags] {
                    flags.push(format!("-arch {}", apple));
                }
            }
        }

        let mut defines = Vec::new();
        if matches!(settings.build_type(), Some("Release") | Some("MinSizeRel")) {
            defines.push("NDEBUG".to_string());
        }
        defines.extend(cx.conf.get_list(keys::DEFINES));

        let (host, build) = if cross_building(cx) {
            let host = match (settings.os(), settings.arch()) {
                (Some(os), Some(arch)) => Some(get_gnu_triplet(os, arch, settings.compiler())?),
                _ => None,
            };
            let build = match (cx.settings_build.os(), cx.settings_build.arch()) {
                (Some(os), Some(arch)) => {
                    Some(get_gnu_triplet(os, arch, cx.settings_build.compiler())?)
                }
                _ => None,
            };
            (host, build)
        } else {
            (None, None)
        };

        let compilers = cx
            .conf
            .get_as::<IndexMap<String, String>>(keys::COMPILER_EXECUTABLES)?
            .unwrap_or_default();

        let shared = cx.options.get_safe("shared").map(|v| v.is_true());
        let mut configure_args = vec![
            "--prefix=/".to_string(),
            "--bindir=${prefix}/bin".to_string(),
            "--sbindir=${prefix}/bin".to_string(),
            "--libdir=${prefix}/lib".to_string(),
            "--includedir=${prefix}/include".to_string(),
            "--oldincludedir=${prefix}/include".to_string(),
            "--datarootdir=${prefix}/res".to_string(),
        ];
        match shared {
            Some(true) => configure_args.extend(["--enable-shared".into(), "--disable-static".into()]),
            Some(false) => configure_args.extend(["--disable-shared".into(), "--enable-static".into()]),
            None => {}
        }
        if let Some(h) = &host {
            configure_args.push(format!("--host={}", h));
        }
        if let Some(b) = &build {
            configure_args.push(format!("--build={}", b));
        }

        Ok(AutotoolsToolchain {
            configure_args,
            make_args: Vec::new(),
            autoreconf_args: vec!["--force".into(), "--install".into()],
            extra_cflags: cx.conf.get_list(keys::CFLAGS),
            extra_cxxflags: cx.conf.get_list(keys::CXXFLAGS),
            extra_ldflags: cx
                .conf
                .get_list(keys::SHAREDLINKFLAGS)
                .into_iter()
                .chain(cx.conf.get_list(keys::EXELINKFLAGS))
                .collect(),
            extra_defines: Vec::new(),
            defines,
            cflags,
            cxxflags,
            ldflags,
            fpic,
            host,
            build,
            compilers,
        })
    }

    /// The environment the toolchain exports: compilers and flags.
    pub fn environment(&self) -> Environment {
        let mut env = Environment::new();
        for (lang, var) in [("c", "CC"), ("cpp", "CXX"), ("rc", "RC"), ("asm", "AS")] {
            if let Some(path) = self.compilers.get(lang) {
                env.define(var, path.clone());
            }
        }
        let defines: Vec<String> = self
            .defines
            .iter()
            .chain(&self.extra_defines)
            .map(|d| format!("-D{}", d))
            .collect();
        for flag in defines {
            env.append("CPPFLAGS", flag);
        }
        for flag in self.cflags.iter().chain(&self.extra_cflags) {
            env.append("CFLAGS", flag.clone());
        }
        for flag in self.cxxflags.iter().chain(&self.extra_cxxflags) {
            env.append("CXXFLAGS", flag.clone());
        }
        for flag in self.ldflags.iter().chain(&self.extra_ldflags) {
            env.append("LDFLAGS", flag.clone());
        }
        env
    }

    /// Write the env script and the argument file; register the `build`
    /// scope.
    pub fn generate(&self, cx: &mut Instance) -> Result<PathBuf> {
        let folder = cx.generators_folder();
        let env = self.environment();
        let script = env.save_script(&folder, TOOLCHAIN_SCRIPT)?;
        let args = json!({
            "configure_args": self.configure_args,
            "make_args": self.make_args,
            "autoreconf_args": self.autoreconf_args,
        });
        write_string(&folder.join(ARGS_FILE), &serde_json::to_string_pretty(&args)?)?;
        cx.register_env("build", env);
        tracing::info!("{}: generated {}", cx.reference, script.display());
        Ok(script)
    }
}
