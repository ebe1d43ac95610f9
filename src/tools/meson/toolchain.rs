//! `MesonToolchain`: native or cross machine file for `meson setup`.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Result;
use indexmap::IndexMap;

use crate::core::conf::keys;
use crate::core::instance::Instance;
use crate::tools::build::cross_building;
use crate::tools::platform::{is_msvc, msvc_runtime_flag};
use crate::util::fs::write_string;

pub const NATIVE_FILE: &str = "conan_meson_native.ini";
pub const CROSS_FILE: &str = "conan_meson_cross.ini";

/// A value in a machine file: strings are quoted, booleans and lists are not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MesonValue {
    Bool(bool),
    Text(String),
    List(Vec<String>),
}

impl MesonValue {
    fn render(&self) -> String {
        match self {
            MesonValue::Bool(b) => b.to_string(),
            MesonValue::Text(s) => format!("'{}'", s),
            MesonValue::List(items) => format!(
                "[{}]",
                items
                    .iter()
                    .map(|i| format!("'{}'", i))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

impl From<bool> for MesonValue {
    fn from(b: bool) -> Self {
        MesonValue::Bool(b)
    }
}

impl From<&str> for MesonValue {
    fn from(s: &str) -> Self {
        MesonValue::Text(s.to_string())
    }
}

impl From<String> for MesonValue {
    fn from(s: String) -> Self {
        MesonValue::Text(s)
    }
}

impl From<Vec<String>> for MesonValue {
    fn from(items: Vec<String>) -> Self {
        MesonValue::List(items)
    }
}

fn meson_buildtype(build_type: Option<&str>) -> &'static str {
    match build_type {
        Some("Debug") => "debug",
        Some("RelWithDebInfo") => "debugoptimized",
        Some("MinSizeRel") => "minsize",
        _ => "release",
    }
}

fn cpu_family(arch: &str) -> (&'static str, &'static str) {
    match arch {
        "x86_64" => ("x86_64", "x86_64"),
        "x86" => ("x86", "i686"),
        "armv8" | "arm64" => ("aarch64", "aarch64"),
        "armv7" | "armv7hf" => ("arm", "armv7"),
        "ppc64le" => ("ppc64", "ppc64le"),
        "riscv64" => ("riscv64", "riscv64"),
        "wasm" => ("wasm32", "wasm32"),
        _ => ("unknown", "unknown"),
    }
}

fn meson_system(os: &str) -> &'static str {
    match os {
        "Windows" => "windows",
        "Linux" => "linux",
        "Macos" | "iOS" | "watchOS" | "tvOS" => "darwin",
        "Android" => "android",
        "FreeBSD" => "freebsd",
        "Emscripten" => "emscripten",
        _ => "unknown",
    }
}

#[derive(Debug, Clone)]
pub struct MesonToolchain {
    /// `[project options]`, the recipe's `-D` options for `meson setup`.
    pub project_options: IndexMap<String, MesonValue>,
    pub extra_cflags: Vec<String>,
    pub extra_cxxflags: Vec<String>,
    pub extra_ldflags: Vec<String>,
    pub extra_defines: Vec<String>,
    pub buildtype: String,
    pub default_library: Option<String>,
    pub b_staticpic: Option<bool>,
    pub cpp_std: Option<String>,
    pub b_vscrt: Option<String>,
    binaries: IndexMap<String, String>,
    cross: bool,
    host_machine: Option<(String, String, String)>,
}

impl MesonToolchain {
    pub fn new(cx: &Instance) -> Result<Self> {
        let settings = &cx.settings;
        let mut binaries = IndexMap::new();
        if let Some(map) = cx
            .conf
            .get_as::<IndexMap<String, String>>(keys::COMPILER_EXECUTABLES)?
        {
            for (lang, path) in map {
                let key = match lang.as_str() {
                    "c" => "c",
                    "cpp" => "cpp",
                    "objc" => "objc",
                    "fortran" => "fortran",
                    _ => continue,
                };
                binaries.insert(key.to_string(), path);
            }
        }
        if let Some(pc) = cx.conf.get_str(keys::PKG_CONFIG) {
            binaries.insert("pkgconfig".to_string(), pc);
        }

        let cross = cross_building(cx);
        let host_machine = if cross {
            settings.arch().map(|arch| {
                let (family, cpu) = cpu_family(arch);
                (
                    meson_system(settings.os().unwrap_or_default()).to_string(),
                    family.to_string(),
                    cpu.to_string(),
                )
            })
        } else {
            None
        };

        let default_library = cx.options.get_safe("shared").map(|v| {
            if v.is_true() { "shared" } else { "static" }.to_string()
        });
        let cpp_std = settings.get_safe("compiler.cppstd").map(|s| {
            if is_msvc(cx) {
                format!("vc++{}", s.trim_start_matches("gnu"))
            } else if let Some(rest) = s.strip_prefix("gnu") {
                format!("gnu++{}", rest)
            } else {
                format!("c++{}", s)
            }
        });
        let b_vscrt = msvc_runtime_flag(cx).map(|f| f.to_lowercase());

        let mut defines = cx.conf.get_list(keys::DEFINES);
        if matches!(settings.build_type(), Some("Release") | Some("MinSizeRel")) {
            defines.insert(0, "NDEBUG".to_string());
        }

        Ok(MesonToolchain {
            project_options: IndexMap::new(),
            extra_cflags: cx.conf.get_list(keys::CFLAGS),
            extra_cxxflags: cx.conf.get_list(keys::CXXFLAGS),
            extra_ldflags: cx
                .conf
                .get_list(keys::SHAREDLINKFLAGS)
                .into_iter()
                .chain(cx.conf.get_list(keys::EXELINKFLAGS))
                .collect(),
            extra_defines: defines,
            buildtype: meson_buildtype(settings.build_type()).to_string(),
            default_library,
            b_staticpic: cx.options.get_safe("fPIC").map(|v| v.is_true()),
            cpp_std,
            b_vscrt,
            binaries,
            cross,
            host_machine,
        })
    }

    pub fn file_name(&self) -> &'static str {
        if self.cross {
            CROSS_FILE
        } else {
            NATIVE_FILE
        }
    }

    pub fn is_cross(&self) -> bool {
        self.cross
    }

    pub fn render(&self) -> String {
        let mut out = String::from("# generated by pantry\n");
        if !self.binaries.is_empty() {
            out.push_str("[binaries]\n");
            for (k, v) in &self.binaries {
                let _ = writeln!(out, "{} = '{}'", k, v.replace('\\', "/"));
            }
            out.push('\n');
        }

        out.push_str("[built-in options]\n");
        let _ = writeln!(out, "buildtype = '{}'", self.buildtype);
        out.push_str("prefix = '/'\n");
        out.push_str("libdir = 'lib'\n");
        out.push_str("bindir = 'bin'\n");
        out.push_str("includedir = 'include'\n");
        if let Some(lib) = &self.default_library {
            let _ = writeln!(out, "default_library = '{}'", lib);
        }
        if let Some(pic) = self.b_staticpic {
            let _ = writeln!(out, "b_staticpic = {}", pic);
        }
        if let Some(std) = &self.cpp_std {
            let _ = writeln!(out, "cpp_std = '{}'", std);
        }
        if let Some(crt) = &self.b_vscrt {
            let _ = writeln!(out, "b_vscrt = '{}'", crt);
        }
        let defines: Vec<String> = self.extra_defines.iter().map(|d| format!("-D{}", d)).collect();
        let c_args: Vec<String> = defines.iter().chain(&self.extra_cflags).cloned().collect();
        let cpp_args: Vec<String> = defines.iter().chain(&self.extra_cxxflags).cloned().collect();
        for (key, args) in [
            ("c_args", c_args),
            ("cpp_args", cpp_args),
            ("c_link_args", self.extra_ldflags.clone()),
            ("cpp_link_args", self.extra_ldflags.clone()),
        ] {
            let _ = writeln!(out, "{} = {}", key, MesonValue::List(args).render());
        }
        out.push('\n');

        if !self.project_options.is_empty() {
            out.push_str("[project options]\n");
            for (k, v) in &self.project_options {
                let _ = writeln!(out, "{} = {}", k, v.render());
            }
            out.push('\n');
        }

        if let Some((system, family, cpu)) = &self.host_machine {
            out.push_str("[host_machine]\n");
            let _ = writeln!(out, "system = '{}'", system);
            let _ = writeln!(out, "cpu_family = '{}'", family);
            let _ = writeln!(out, "cpu = '{}'", cpu);
            out.push_str("endian = 'little'\n");
        }
        out
    }

    pub fn generate(&self, cx: &Instance) -> Result<PathBuf> {
        let path = cx.generators_folder().join(self.file_name());
        write_string(&path, &self.render())?;
        tracing::info!("{}: generated {}", cx.reference, path.display());
        Ok(path)
    }
}
