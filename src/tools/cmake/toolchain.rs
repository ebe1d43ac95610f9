//! `CMakeToolchain`: writes `conan_toolchain.cmake` and `CMakePresets.json`.

use std::fmt::{self, Write as _};
use std::path::PathBuf;

use anyhow::Result;
use indexmap::IndexMap;
use serde_json::json;

use crate::core::conf::keys;
use crate::core::instance::Instance;
use crate::tools::build::cross_building;
use crate::tools::platform::{is_apple_os, is_msvc, msvc_runtime_flag};
use crate::util::fs::{forward_slashes, write_string};

pub const TOOLCHAIN_FILE: &str = "conan_toolchain.cmake";
pub const PRESETS_FILE: &str = "CMakePresets.json";

/// A CMake variable value. Booleans render as `ON`/`OFF`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CMakeValue {
    Bool(bool),
    Text(String),
}

impl fmt::Display for CMakeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CMakeValue::Bool(true) => f.write_str("ON"),
            CMakeValue::Bool(false) => f.write_str("OFF"),
            CMakeValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for CMakeValue {
    fn from(b: bool) -> Self {
        CMakeValue::Bool(b)
    }
}

impl From<&str> for CMakeValue {
    fn from(s: &str) -> Self {
        CMakeValue::Text(s.to_string())
    }
}

impl From<String> for CMakeValue {
    fn from(s: String) -> Self {
        CMakeValue::Text(s)
    }
}

impl From<i64> for CMakeValue {
    fn from(n: i64) -> Self {
        CMakeValue::Text(n.to_string())
    }
}

fn cmake_system_name(os: &str) -> Option<&'static str> {
    Some(match os {
        "Linux" => "Linux",
        "Windows" => "Windows",
        "Macos" => "Darwin",
        "iOS" => "iOS",
        "watchOS" => "watchOS",
        "tvOS" => "tvOS",
        "Android" => "Android",
        "FreeBSD" => "FreeBSD",
        "Emscripten" => "Emscripten",
        _ => return None,
    })
}

fn cmake_processor(arch: &str) -> &str {
    match arch {
        "armv8" => "aarch64",
        "x86" => "i686",
        other => other,
    }
}

/// Default generator when `tools.cmake.cmaketoolchain:generator` is unset.
fn default_generator(cx: &Instance) -> Option<String> {
    if let Some(g) = cx.conf.get_str(keys::CMAKE_GENERATOR) {
        return Some(g);
    }
    if is_msvc(cx) {
        let vs = match cx.settings.get_safe("compiler.version") {
            Some("190") => "Visual Studio 14 2015",
            Some("191") => "Visual Studio 15 2017",
            Some("192") => "Visual Studio 16 2019",
            _ => "Visual Studio 17 2022",
        };
        return Some(vs.to_string());
    }
    if cx.settings_build.is("os", "Windows") {
        return Some("MinGW Makefiles".to_string());
    }
    Some("Unix Makefiles".to_string())
}

/// Toolchain file generator. Construct in `generate()`, adjust the public
/// fields, then call [`CMakeToolchain::generate`].
#[derive(Debug, Clone)]
pub struct CMakeToolchain {
    /// Plain `set()` variables in the toolchain file.
    pub variables: IndexMap<String, CMakeValue>,
    /// Cache variables passed with `-D` at configure time.
    pub cache_variables: IndexMap<String, CMakeValue>,
    /// `NAME` or `NAME=value` definitions added with `add_compile_definitions`.
    pub preprocessor_definitions: IndexMap<String, Option<String>>,
    pub extra_cflags: Vec<String>,
    pub extra_cxxflags: Vec<String>,
    pub extra_sharedlinkflags: Vec<String>,
    pub extra_exelinkflags: Vec<String>,
    pub generator: Option<String>,
    pub build_type: Option<String>,
    cross: bool,
    system_name: Option<String>,
    system_processor: Option<String>,
    compilers: IndexMap<String, String>,
    cppstd: Option<String>,
    msvc_runtime: Option<String>,
    fpic: Option<bool>,
    shared: Option<bool>,
    apple_arch: Option<String>,
}

impl CMakeToolchain {
    pub fn new(cx: &Instance) -> Self {
        let cross = cross_building(cx);
        let (system_name, system_processor) = if cross {
            (
                cx.settings.os().and_then(cmake_system_name).map(str::to_string),
                cx.settings.arch().map(|a| cmake_processor(a).to_string()),
            )
        } else {
            (None, None)
        };

        let mut compilers = IndexMap::new();
        if let Ok(Some(map)) = cx
            .conf
            .get_as::<IndexMap<String, String>>(keys::COMPILER_EXECUTABLES)
        {
            for (lang, path) in map {
                let var = match lang.as_str() {
                    "c" => "CMAKE_C_COMPILER",
                    "cpp" => "CMAKE_CXX_COMPILER",
                    "cuda" => "CMAKE_CUDA_COMPILER",
                    "fortran" => "CMAKE_Fortran_COMPILER",
                    "asm" => "CMAKE_ASM_COMPILER",
                    "rc" => "CMAKE_RC_COMPILER",
                    _ => continue,
                };
                compilers.insert(var.to_string(), path);
            }
        }

        let cppstd = cx.settings.get_safe("compiler.cppstd").map(str::to_string);
        let msvc_runtime = msvc_runtime_flag(cx).map(|flag| {
            let debug = if flag.ends_with('d') { "Debug" } else { "" };
            if flag.starts_with("MT") {
                format!("MultiThreaded{}", debug)
            } else {
                format!("MultiThreaded{}DLL", debug)
            }
        });
        let apple_arch = if is_apple_os(cx) {
            cx.settings.arch().map(|a| match a {
                "armv8" => "arm64".to_string(),
                other => other.to_string(),
            })
        } else {
            None
        };

        CMakeToolchain {
            variables: IndexMap::new(),
            cache_variables: IndexMap::new(),
            preprocessor_definitions: IndexMap::new(),
            extra_cflags: cx.conf.get_list(keys::CFLAGS),
            extra_cxxflags: cx.conf.get_list(keys::CXXFLAGS),
            extra_sharedlinkflags: cx.conf.get_list(keys::SHAREDLINKFLAGS),
            extra_exelinkflags: cx.conf.get_list(keys::EXELINKFLAGS),
            generator: default_generator(cx),
            build_type: cx.settings.build_type().map(str::to_string),
            cross,
            system_name,
            system_processor,
            compilers,
            cppstd,
            msvc_runtime,
            fpic: cx.options.get_safe("fPIC").map(|v| v.is_true()),
            shared: cx.options.get_safe("shared").map(|v| v.is_true()),
            apple_arch,
        }
    }

    fn is_multi_config(&self) -> bool {
        self.generator
            .as_deref()
            .is_some_and(|g| g.contains("Visual Studio") || g.contains("Multi-Config") || g == "Xcode")
    }

    /// Cache variables written to the presets, defaults first.
    pub fn effective_cache_variables(&self) -> IndexMap<String, String> {
        let mut vars = IndexMap::new();
        if let Some(bt) = &self.build_type {
            if !self.is_multi_config() {
                vars.insert("CMAKE_BUILD_TYPE".to_string(), bt.clone());
            }
        }
        if let Some(shared) = self.shared {
            vars.insert("BUILD_SHARED_LIBS".to_string(), CMakeValue::Bool(shared).to_string());
        }
        vars.insert("CMAKE_POLICY_DEFAULT_CMP0091".to_string(), "NEW".to_string());
        for (k, v) in &self.cache_variables {
            vars.insert(k.clone(), v.to_string());
        }
        vars
    }

    /// Render `conan_toolchain.cmake`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("# generated by pantry\n");
        out.push_str("include_guard()\n\n");

        if let (Some(name), true) = (&self.system_name, self.cross) {
            let _ = writeln!(out, "set(CMAKE_SYSTEM_NAME {})", name);
            if let Some(p) = &self.system_processor {
                let _ = writeln!(out, "set(CMAKE_SYSTEM_PROCESSOR {})", p);
            }
        }
        if let Some(arch) = &self.apple_arch {
            let _ = writeln!(out, "set(CMAKE_OSX_ARCHITECTURES {} CACHE STRING \"\" FORCE)", arch);
        }
        for (var, path) in &self.compilers {
            let _ = writeln!(out, "set({} \"{}\")", var, path.replace('\\', "/"));
        }
        if let Some(std) = &self.cppstd {
            let (level, gnu) = match std.strip_prefix("gnu") {
                Some(level) => (level, true),
                None => (std.as_str(), false),
            };
            let _ = writeln!(out, "set(CMAKE_CXX_STANDARD {})", level);
            let _ = writeln!(out, "set(CMAKE_CXX_EXTENSIONS {})", if gnu { "ON" } else { "OFF" });
            out.push_str("set(CMAKE_CXX_STANDARD_REQUIRED ON)\n");
        }
        if let Some(runtime) = &self.msvc_runtime {
            let _ = writeln!(out, "set(CMAKE_MSVC_RUNTIME_LIBRARY \"{}\")", runtime);
        }
        if let Some(fpic) = self.fpic {
            let _ = writeln!(
                out,
                "set(CMAKE_POSITION_INDEPENDENT_CODE {})",
                CMakeValue::Bool(fpic)
            );
        }

        let flag_sets = [
            ("CMAKE_C_FLAGS_INIT", &self.extra_cflags),
            ("CMAKE_CXX_FLAGS_INIT", &self.extra_cxxflags),
            ("CMAKE_SHARED_LINKER_FLAGS_INIT", &self.extra_sharedlinkflags),
            ("CMAKE_EXE_LINKER_FLAGS_INIT", &self.extra_exelinkflags),
        ];
        for (var, flags) in flag_sets {
            if !flags.is_empty() {
                let _ = writeln!(out, "string(APPEND {} \" {}\")", var, flags.join(" "));
            }
        }

        if !self.preprocessor_definitions.is_empty() {
            out.push_str("add_compile_definitions(\n");
            for (name, value) in &self.preprocessor_definitions {
                match value {
                    Some(v) => {
                        let _ = writeln!(out, "    \"{}={}\"", name, v);
                    }
                    None => {
                        let _ = writeln!(out, "    \"{}\"", name);
                    }
                }
            }
            out.push_str(")\n");
        }

        for (k, v) in &self.variables {
            let _ = writeln!(out, "set({} \"{}\")", k, v);
        }

        out.push_str("\n# dependencies found through the generators folder\n");
        out.push_str("list(PREPEND CMAKE_PREFIX_PATH \"${CMAKE_CURRENT_LIST_DIR}\")\n");
        out.push_str("list(PREPEND CMAKE_MODULE_PATH \"${CMAKE_CURRENT_LIST_DIR}\")\n");
        out.push_str("set(CMAKE_FIND_PACKAGE_PREFER_CONFIG ON)\n");
        out
    }

    /// Write the toolchain file and presets into the generators folder.
    pub fn generate(&self, cx: &Instance) -> Result<PathBuf> {
        let folder = cx.generators_folder();
        let toolchain = folder.join(TOOLCHAIN_FILE);
        write_string(&toolchain, &self.render())?;

        let preset_name = match &self.build_type {
            Some(bt) if !self.is_multi_config() => format!("conan-{}", bt.to_lowercase()),
            _ => "conan-default".to_string(),
        };
        let presets = json!({
            "version": 3,
            "configurePresets": [{
                "name": preset_name,
                "generator": self.generator,
                "binaryDir": forward_slashes(&cx.build_folder()),
                "toolchainFile": forward_slashes(&toolchain),
                "cacheVariables": self.effective_cache_variables(),
            }],
        });
        let text = serde_json::to_string_pretty(&presets)?;
        write_string(&folder.join(PRESETS_FILE), &text)?;
        tracing::info!("{}: generated {}", cx.reference, toolchain.display());
        Ok(toolchain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::options::OptionDomain;
    use crate::test_support::fixtures;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_from_settings_and_options() {
        let tmp = TempDir::new().unwrap();
        let mut cx = fixtures::sandboxed(tmp.path(), "zlib", "1.3.1", fixtures::linux_settings());
        cx.options.declare("shared", OptionDomain::boolean(), true.into());
        cx.settings.set("compiler.cppstd", "gnu17");

        let mut tc = CMakeToolchain::new(&cx);
        tc.cache_variables.insert("ZLIB_BUILD_EXAMPLES".into(), false.into());
        tc.preprocessor_definitions.insert("NO_FSEEKO".into(), None);

        let vars = tc.effective_cache_variables();
        assert_eq!(vars["CMAKE_BUILD_TYPE"], "Release");
        assert_eq!(vars["BUILD_SHARED_LIBS"], "ON");
        assert_eq!(vars["ZLIB_BUILD_EXAMPLES"], "OFF");

        let text = tc.render();
        assert!(text.contains("set(CMAKE_CXX_STANDARD 17)"));
        assert!(text.contains("set(CMAKE_CXX_EXTENSIONS ON)"));
        assert!(text.contains("\"NO_FSEEKO\""));
        assert!(!text.contains("CMAKE_SYSTEM_NAME"));

        let path = tc.generate(&cx).unwrap();
        assert!(path.is_file());
        let presets = std::fs::read_to_string(cx.generators_folder().join(PRESETS_FILE)).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&presets).unwrap();
        assert_eq!(
            parsed["configurePresets"][0]["cacheVariables"]["ZLIB_BUILD_EXAMPLES"],
            "OFF"
        );
    }

    #[test]
    fn test_cross_building_sets_system() {
        let mut cx = fixtures::instance("zlib", "1.3.1", fixtures::linux_settings());
        cx.settings.set("os", "Android");
        cx.settings.set("arch", "armv8");
        let text = CMakeToolchain::new(&cx).render();
        assert!(text.contains("set(CMAKE_SYSTEM_NAME Android)"));
        assert!(text.contains("set(CMAKE_SYSTEM_PROCESSOR aarch64)"));
    }

    #[test]
    fn test_msvc_runtime_and_multi_config() {
        let cx = fixtures::instance("zlib", "1.3.1", fixtures::windows_settings());
        let tc = CMakeToolchain::new(&cx);
        assert!(tc.render().contains("MultiThreadedDLL"));
        assert!(!tc.effective_cache_variables().contains_key("CMAKE_BUILD_TYPE"));
    }
}
