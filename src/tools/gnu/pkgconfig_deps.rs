//! `PkgConfigDeps`: one `.pc` file per dependency and per component.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::cpp_info::{props, Component};
use crate::core::env_info::Environment;
use crate::core::instance::{Dependency, Instance};
use crate::util::fs::{forward_slashes, relative_path, write_string};

/// Dependency generator for `pkg-config`.
#[derive(Debug, Clone, Default)]
pub struct PkgConfigDeps {
    /// Tool dependencies that also get `.pc` files.
    pub build_context_activated: Vec<String>,
}

struct PcFile {
    name: String,
    description: String,
    version: String,
    requires: Vec<String>,
    body: Option<Component>,
    custom: Option<String>,
}

fn pc_name(dep: &Dependency) -> String {
    dep.cpp_info
        .root
        .property_text(props::PKG_CONFIG_NAME)
        .map(str::to_string)
        .unwrap_or_else(|| dep.name().to_string())
}

fn component_pc_name(dep: &Dependency, comp: &str) -> String {
    dep.cpp_info
        .components
        .get(comp)
        .and_then(|c| c.property_text(props::PKG_CONFIG_NAME))
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}-{}", pc_name(dep), comp))
}

fn relative_dirs(folder: &Path, dirs: &[PathBuf]) -> Vec<String> {
    dirs.iter()
        .map(|d| {
            let rel = relative_path(folder, d);
            format!("${{prefix}}/{}", forward_slashes(&rel))
        })
        .collect()
}

impl PkgConfigDeps {
    pub fn new(_cx: &Instance) -> Self {
        Self::default()
    }

    fn wanted<'a>(&self, cx: &'a Instance) -> Vec<&'a Dependency> {
        cx.dependencies
            .iter()
            .filter(|d| {
                if d.is_build() {
                    self.build_context_activated.iter().any(|n| n == d.name())
                } else {
                    true
                }
            })
            .collect()
    }

    fn requirement_name(cx: &Instance, dep: &Dependency, requirement: &str) -> Option<String> {
        match requirement.split_once("::") {
            Some((other, comp)) => {
                let other = cx.dependencies.get(other).ok()?;
                if other.cpp_info.components.contains_key(comp) {
                    Some(component_pc_name(other, comp))
                } else {
                    Some(pc_name(other))
                }
            }
            None => Some(component_pc_name(dep, requirement)),
        }
    }

    fn files_for(&self, cx: &Instance, dep: &Dependency) -> Vec<PcFile> {
        let mut files = Vec::new();
        let version = dep
            .cpp_info
            .root
            .property_text(props::SYSTEM_PACKAGE_VERSION)
            .map(str::to_string)
            .unwrap_or_else(|| dep.version().to_string());
        let description = format!("Conan package: {}", dep.name());
        let custom = |c: &Component| c.property_text(props::PKG_CONFIG_CUSTOM_CONTENT).map(str::to_string);
        let name = pc_name(dep);

        if dep.cpp_info.has_components() {
            let mut all = Vec::new();
            for (comp_name, comp) in &dep.cpp_info.components {
                let pc = component_pc_name(dep, comp_name);
                let requires = comp
                    .requires
                    .iter()
                    .filter_map(|r| Self::requirement_name(cx, dep, r))
                    .collect();
                files.push(PcFile {
                    name: pc.clone(),
                    description: format!("Conan component: {}", pc),
                    version: version.clone(),
                    requires,
                    body: Some(comp.clone()),
                    custom: custom(comp),
                });
                all.push(pc);
            }
            files.push(PcFile {
                name: name.clone(),
                description,
                version: version.clone(),
                requires: all,
                body: None,
                custom: custom(&dep.cpp_info.root),
            });
        } else {
            let requires = dep
                .requires
                .iter()
                .filter_map(|r| cx.dependencies.get(r).ok())
                .map(pc_name)
                .collect();
            files.push(PcFile {
                name: name.clone(),
                description,
                version: version.clone(),
                requires,
                body: Some(dep.cpp_info.root.clone()),
                custom: custom(&dep.cpp_info.root),
            });
        }

        let aliases = dep
            .cpp_info
            .root
            .get_property(props::PKG_CONFIG_ALIASES)
            .map(|v| v.as_list())
            .unwrap_or_default();
        for alias in aliases {
            files.push(PcFile {
                name: alias.clone(),
                description: format!("Alias {} for {}", alias, name),
                version: version.clone(),
                requires: vec![name.clone()],
                body: None,
                custom: None,
            });
        }
        files
    }

    fn render(dep: &Dependency, file: &PcFile) -> String {
        let folder = &dep.package_folder;
        let mut out = String::new();
        let _ = writeln!(out, "prefix={}", forward_slashes(folder));
        let mut libs = Vec::new();
        let mut cflags = Vec::new();
        if let Some(body) = &file.body {
            let libdirs = if dep.traits.libs {
                relative_dirs(folder, &body.lib_paths(folder))
            } else {
                Vec::new()
            };
            let includedirs = if dep.traits.headers {
                relative_dirs(folder, &body.include_paths(folder))
            } else {
                Vec::new()
            };
            for (i, dir) in libdirs.iter().enumerate() {
                let _ = writeln!(out, "libdir{}={}", i + 1, dir);
                libs.push(format!("-L\"${{libdir{}}}\"", i + 1));
            }
            for (i, dir) in includedirs.iter().enumerate() {
                let _ = writeln!(out, "includedir{}={}", i + 1, dir);
                cflags.push(format!("-I\"${{includedir{}}}\"", i + 1));
            }
            if dep.traits.libs {
                libs.extend(body.libs.iter().chain(&body.system_libs).map(|l| format!("-l{}", l)));
                libs.extend(body.linkflags.iter().cloned());
                libs.extend(body.frameworks.iter().map(|f| format!("-framework {}", f)));
            }
            if dep.traits.headers {
                cflags.extend(body.defines.iter().map(|d| format!("-D{}", d)));
                cflags.extend(body.cflags.iter().cloned());
                cflags.extend(body.cxxflags.iter().cloned());
            }
        }
        if let Some(custom) = &file.custom {
            out.push_str(custom.trim_end());
            out.push('\n');
        }
        out.push('\n');
        let _ = writeln!(out, "Name: {}", file.name);
        let _ = writeln!(out, "Description: {}", file.description);
        let _ = writeln!(out, "Version: {}", file.version);
        if !libs.is_empty() {
            let _ = writeln!(out, "Libs: {}", libs.join(" "));
        }
        if !cflags.is_empty() {
            let _ = writeln!(out, "Cflags: {}", cflags.join(" "));
        }
        if !file.requires.is_empty() {
            let _ = writeln!(out, "Requires: {}", file.requires.join(" "));
        }
        out
    }

    /// Write the `.pc` files and point `PKG_CONFIG_PATH` at them.
    pub fn generate(&self, cx: &mut Instance) -> Result<Vec<PathBuf>> {
        let folder = cx.generators_folder();
        let mut written = Vec::new();
        for dep in self.wanted(cx) {
            for file in self.files_for(cx, dep) {
                let path = folder.join(format!("{}.pc", file.name));
                write_string(&path, &Self::render(dep, &file))?;
                written.push(path);
            }
        }
        let mut env = Environment::new();
        env.prepend_path("PKG_CONFIG_PATH", &folder);
        cx.register_env("build", env);
        tracing::info!("{}: PkgConfigDeps generated {} files", cx.reference, written.len());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::instance::Dependencies;
    use crate::core::recipe::PackageType;
    use crate::test_support::fixtures;
    use tempfile::TempDir;

    #[test]
    fn test_pc_files_for_components_and_aliases() {
        let tmp = TempDir::new().unwrap();
        let mut cx = fixtures::sandboxed(tmp.path(), "app", "1.0", fixtures::linux_settings());

        let mut zlib = fixtures::dependency("zlib", "1.3.1", PackageType::StaticLibrary);
        zlib.cpp_info.root.libs = vec!["z".into()];
        zlib.cpp_info.set_property(props::PKG_CONFIG_ALIASES, vec!["libz"]);

        let mut openssl = fixtures::dependency("openssl", "3.2.0", PackageType::StaticLibrary);
        openssl.cpp_info.root.includedirs.clear();
        openssl.cpp_info.root.libdirs.clear();
        openssl.cpp_info.root.bindirs.clear();
        openssl.requires = vec!["zlib".into()];
        {
            let crypto = openssl.cpp_info.component("crypto");
            crypto.libs = vec!["crypto".into()];
            crypto.requires = vec!["zlib::zlib".into()];
            crypto.set_property(props::PKG_CONFIG_NAME, "libcrypto");
        }
        {
            let ssl = openssl.cpp_info.component("ssl");
            ssl.libs = vec!["ssl".into()];
            ssl.requires = vec!["crypto".into()];
            ssl.set_property(props::PKG_CONFIG_NAME, "libssl");
        }
        cx.dependencies = Dependencies::new(vec![zlib, openssl]);

        let written = PkgConfigDeps::new(&cx).generate(&mut cx).unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["zlib.pc", "libz.pc", "libcrypto.pc", "libssl.pc", "openssl.pc"]);

        let folder = cx.generators_folder();
        let ssl = std::fs::read_to_string(folder.join("libssl.pc")).unwrap();
        assert!(ssl.contains("Libs: -L\"${libdir1}\" -lssl"));
        assert!(ssl.contains("Requires: libcrypto"));
        let crypto = std::fs::read_to_string(folder.join("libcrypto.pc")).unwrap();
        assert!(crypto.contains("Requires: zlib"));
        let umbrella = std::fs::read_to_string(folder.join("openssl.pc")).unwrap();
        assert!(umbrella.contains("Requires: libcrypto libssl"));
        assert!(!umbrella.contains("Libs:"));

        let env = cx.env("build").unwrap();
        assert!(env.value("PKG_CONFIG_PATH").is_some());
    }
}
