//! `CMakeDeps`: one `<File>Config.cmake` per dependency, exposing its
//! `cpp_info` as imported targets.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::cpp_info::{props, CMakeFindMode, Component, PropertyValue};
use crate::core::instance::{Dependency, Instance};
use crate::util::fs::{forward_slashes, write_string};

/// Dependency generator for CMake `find_package()`.
#[derive(Debug, Clone, Default)]
pub struct CMakeDeps {
    /// `(dep or dep::comp, key, value)` overrides of `cpp_info` properties.
    overrides: Vec<(String, String, PropertyValue)>,
    /// Tool dependencies that also get config files.
    pub build_context_activated: Vec<String>,
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| forward_slashes(p))
        .collect::<Vec<_>>()
        .join(";")
}

fn set_target_property(out: &mut String, target: &str, property: &str, values: &[String]) {
    if values.is_empty() {
        return;
    }
    let _ = writeln!(
        out,
        "    set_property(TARGET {} PROPERTY {} \"{}\")",
        target,
        property,
        values.join(";")
    );
}

impl CMakeDeps {
    pub fn new(_cx: &Instance) -> Self {
        Self::default()
    }

    /// Override a property for `dep` (or `dep::comp`) without touching the
    /// dependency's recipe.
    pub fn set_property(&mut self, dep: &str, key: &str, value: impl Into<PropertyValue>) {
        self.overrides
            .push((dep.to_string(), key.to_string(), value.into()));
    }

    fn property(&self, dep: &Dependency, comp: Option<&str>, key: &str) -> Option<PropertyValue> {
        let scope = match comp {
            Some(c) => format!("{}::{}", dep.name(), c),
            None => dep.name().to_string(),
        };
        if let Some((_, _, v)) = self
            .overrides
            .iter()
            .rev()
            .find(|(s, k, _)| *s == scope && k == key)
        {
            return Some(v.clone());
        }
        let node = match comp {
            Some(c) => dep.cpp_info.components.get(c)?,
            None => &dep.cpp_info.root,
        };
        node.get_property(key).cloned()
    }

    fn text(&self, dep: &Dependency, comp: Option<&str>, key: &str) -> Option<String> {
        self.property(dep, comp, key)
            .and_then(|v| v.as_text().map(str::to_string))
    }

    pub fn find_mode(&self, dep: &Dependency) -> CMakeFindMode {
        self.text(dep, None, props::CMAKE_FIND_MODE)
            .map(|m| CMakeFindMode::parse(&m))
            .unwrap_or(CMakeFindMode::Config)
    }

    /// The `find_package()` name.
    pub fn file_name(&self, dep: &Dependency) -> String {
        self.text(dep, None, props::CMAKE_FILE_NAME)
            .unwrap_or_else(|| dep.name().to_string())
    }

    /// Global target, `name::name` unless overridden.
    pub fn target_name(&self, dep: &Dependency) -> String {
        self.text(dep, None, props::CMAKE_TARGET_NAME)
            .unwrap_or_else(|| format!("{}::{}", dep.name(), dep.name()))
    }

    pub fn component_target_name(&self, dep: &Dependency, comp: &str) -> String {
        if let Some(name) = self.text(dep, Some(comp), props::CMAKE_TARGET_NAME) {
            return name;
        }
        let global = self.target_name(dep);
        let namespace = global.split("::").next().unwrap_or(dep.name()).to_string();
        format!("{}::{}", namespace, comp)
    }

    /// Whether `dep` gets config files of its own. Configs only refer to
    /// dependencies that pass this check, so every `find_dependency()` has
    /// a file to load.
    fn visible(&self, dep: &Dependency) -> bool {
        let reachable = if dep.is_build() {
            self.build_context_activated.iter().any(|n| n == dep.name())
        } else {
            dep.traits.headers || dep.traits.libs || dep.direct
        };
        reachable && self.find_mode(dep) != CMakeFindMode::None
    }

    fn wanted<'a>(&self, cx: &'a Instance) -> Vec<&'a Dependency> {
        cx.dependencies.iter().filter(|d| self.visible(d)).collect()
    }

    /// Target that `requirement` (a `dep::comp` entry) links to, if that
    /// dependency is visible to the consumer.
    fn required_target(&self, cx: &Instance, requirement: &str) -> Option<String> {
        let (name, comp) = requirement.split_once("::")?;
        let dep = cx.dependencies.get(name).ok()?;
        if !self.visible(dep) {
            return None;
        }
        if dep.cpp_info.components.contains_key(comp) {
            Some(self.component_target_name(dep, comp))
        } else {
            Some(self.target_name(dep))
        }
    }

    fn write_target(
        &self,
        out: &mut String,
        dep: &Dependency,
        target: &str,
        node: &Component,
        extra_includes: &[PathBuf],
        links: &[String],
    ) {
        let folder: &Path = &dep.package_folder;
        let _ = writeln!(out, "if(NOT TARGET {})", target);
        let _ = writeln!(out, "    add_library({} INTERFACE IMPORTED)", target);

        if dep.traits.headers {
            let mut includes = node.include_paths(folder);
            includes.extend(extra_includes.iter().cloned());
            includes.dedup();
            if !includes.is_empty() {
                set_target_property(out, target, "INTERFACE_INCLUDE_DIRECTORIES", &[join_paths(&includes)]);
            }
            set_target_property(out, target, "INTERFACE_COMPILE_DEFINITIONS", &node.defines);
            let mut options: Vec<String> = node
                .cflags
                .iter()
                .map(|f| format!("$<$<COMPILE_LANGUAGE:C>:{}>", f))
                .collect();
            options.extend(
                node.cxxflags
                    .iter()
                    .map(|f| format!("$<$<COMPILE_LANGUAGE:CXX>:{}>", f)),
            );
            set_target_property(out, target, "INTERFACE_COMPILE_OPTIONS", &options);
        }

        let mut link_libraries = Vec::new();
        if dep.traits.libs {
            let libdirs = node.lib_paths(folder);
            if !libdirs.is_empty() {
                set_target_property(out, target, "INTERFACE_LINK_DIRECTORIES", &[join_paths(&libdirs)]);
            }
            link_libraries.extend(node.libs.iter().cloned());
            link_libraries.extend(node.system_libs.iter().cloned());
            link_libraries.extend(node.frameworks.iter().map(|f| format!("-framework {}", f)));
            set_target_property(out, target, "INTERFACE_LINK_OPTIONS", &node.linkflags);
        }
        link_libraries.extend(links.iter().cloned());
        set_target_property(out, target, "INTERFACE_LINK_LIBRARIES", &link_libraries);

        for alias in self
            .property(dep, None, props::CMAKE_TARGET_ALIASES)
            .map(|v| v.as_list())
            .unwrap_or_default()
            .into_iter()
            .filter(|_| target == self.target_name(dep))
        {
            let _ = writeln!(out, "    if(NOT TARGET {})", alias);
            let _ = writeln!(out, "        add_library({} INTERFACE IMPORTED)", alias);
            let _ = writeln!(
                out,
                "        set_property(TARGET {} PROPERTY INTERFACE_LINK_LIBRARIES {})",
                alias, target
            );
            out.push_str("    endif()\n");
        }
        out.push_str("endif()\n\n");
    }

    /// Render the config script for one dependency.
    pub fn render_config(&self, cx: &Instance, dep: &Dependency) -> String {
        let file = self.file_name(dep);
        let upper = file.to_uppercase();
        let global = self.target_name(dep);
        let mut out = String::new();
        let _ = writeln!(out, "# generated by pantry for {}", dep.reference);
        let _ = writeln!(out, "include_guard()\n");
        let _ = writeln!(out, "set({}_FOUND TRUE)", file);
        let _ = writeln!(out, "set({}_VERSION \"{}\")", file, dep.version());
        let _ = writeln!(
            out,
            "set({}_PACKAGE_FOLDER \"{}\")",
            file,
            forward_slashes(&dep.package_folder)
        );

        // Headers of transitive dependencies that reach the consumer.
        let transitive = cx.dependencies.transitive_of(dep.name());
        let transitive_includes: Vec<PathBuf> = transitive
            .iter()
            .filter(|t| t.traits.headers)
            .flat_map(|t| t.cpp_info.aggregated().include_paths(&t.package_folder))
            .collect();
        let mut all_includes = if dep.traits.headers {
            dep.cpp_info.aggregated().include_paths(&dep.package_folder)
        } else {
            Vec::new()
        };
        all_includes.extend(transitive_includes.iter().cloned());
        let _ = writeln!(out, "set({}_INCLUDE_DIRS \"{}\")", upper, join_paths(&all_includes));
        out.push('\n');

        let required: Vec<&Dependency> = dep
            .requires
            .iter()
            .filter_map(|name| cx.dependencies.get(name).ok())
            .filter(|r| self.visible(r))
            .collect();
        if !required.is_empty() {
            out.push_str("include(CMakeFindDependencyMacro)\n");
            for r in &required {
                let _ = writeln!(out, "find_dependency({} REQUIRED NO_MODULE)", self.file_name(r));
            }
            out.push('\n');
        }

        if dep.cpp_info.has_components() {
            let mut component_targets = Vec::new();
            for (name, comp) in &dep.cpp_info.components {
                let target = self.component_target_name(dep, name);
                let links: Vec<String> = comp
                    .requires
                    .iter()
                    .filter_map(|r| {
                        if r.contains("::") {
                            self.required_target(cx, r)
                        } else {
                            Some(self.component_target_name(dep, r))
                        }
                    })
                    .collect();
                let extra = if comp.requires.iter().any(|r| r.contains("::")) {
                    transitive_includes.clone()
                } else {
                    Vec::new()
                };
                self.write_target(&mut out, dep, &target, comp, &extra, &links);
                component_targets.push(target);
            }
            let mut root = dep.cpp_info.root.clone();
            root.includedirs.clear();
            root.libdirs.clear();
            self.write_target(&mut out, dep, &global, &root, &transitive_includes, &component_targets);
        } else {
            let links: Vec<String> = required.iter().map(|r| self.target_name(r)).collect();
            self.write_target(
                &mut out,
                dep,
                &global,
                &dep.cpp_info.root,
                &transitive_includes,
                &links,
            );
        }

        let modules = self
            .property(dep, None, props::CMAKE_BUILD_MODULES)
            .map(|v| v.as_list())
            .unwrap_or_default();
        for module in modules {
            let path = dep.package_folder.join(module);
            let _ = writeln!(out, "include(\"{}\")", forward_slashes(&path));
        }
        out
    }

    fn render_version(dep: &Dependency) -> String {
        format!(
            "set(PACKAGE_VERSION \"{v}\")\n\
             if(PACKAGE_FIND_VERSION VERSION_GREATER PACKAGE_VERSION)\n\
             \x20   set(PACKAGE_VERSION_COMPATIBLE FALSE)\n\
             else()\n\
             \x20   set(PACKAGE_VERSION_COMPATIBLE TRUE)\n\
             \x20   if(PACKAGE_FIND_VERSION STREQUAL PACKAGE_VERSION)\n\
             \x20       set(PACKAGE_VERSION_EXACT TRUE)\n\
             \x20   endif()\n\
             endif()\n",
            v = dep.version()
        )
    }

    /// Write the config files into the generators folder.
    pub fn generate(&self, cx: &Instance) -> Result<Vec<PathBuf>> {
        let folder = cx.generators_folder();
        let mut written = Vec::new();
        for dep in self.wanted(cx) {
            let file = self.file_name(dep);
            let config = self.render_config(cx, dep);
            let version = Self::render_version(dep);
            let mode = self.find_mode(dep);
            if matches!(mode, CMakeFindMode::Config | CMakeFindMode::Both) {
                let path = folder.join(format!("{}Config.cmake", file));
                write_string(&path, &config)?;
                write_string(&folder.join(format!("{}ConfigVersion.cmake", file)), &version)?;
                written.push(path);
            }
            if matches!(mode, CMakeFindMode::Module | CMakeFindMode::Both) {
                let path = folder.join(format!("Find{}.cmake", file));
                write_string(&path, &config)?;
                written.push(path);
            }
        }
        tracing::info!("{}: CMakeDeps generated {} files", cx.reference, written.len());
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

    fn consumer(tmp: &TempDir, deps: Vec<Dependency>) -> Instance {
        let mut cx = fixtures::sandboxed(tmp.path(), "app", "1.0", fixtures::linux_settings());
        cx.dependencies = Dependencies::new(deps);
        cx
    }

    #[test]
    fn test_target_name_round_trip() {
        let tmp = TempDir::new().unwrap();
        let mut zlib = fixtures::dependency("zlib", "1.3.1", PackageType::StaticLibrary);
        zlib.cpp_info.root.libs = vec!["z".into()];
        zlib.cpp_info.set_property(props::CMAKE_FILE_NAME, "ZLIB");
        zlib.cpp_info.set_property(props::CMAKE_TARGET_NAME, "ZLIB::ZLIB");
        let cx = consumer(&tmp, vec![zlib]);

        let written = CMakeDeps::new(&cx).generate(&cx).unwrap();
        assert_eq!(written.len(), 1);
        assert!(written[0].ends_with("ZLIBConfig.cmake"));
        let text = std::fs::read_to_string(&written[0]).unwrap();
        assert!(text.contains("add_library(ZLIB::ZLIB INTERFACE IMPORTED)"));
        assert!(text.contains("INTERFACE_LINK_LIBRARIES \"z\""));
    }

    #[test]
    fn test_override_and_aliases() {
        let tmp = TempDir::new().unwrap();
        let mut fmt = fixtures::dependency("fmt", "10.2.1", PackageType::StaticLibrary);
        fmt.cpp_info.set_property(props::CMAKE_TARGET_ALIASES, vec!["fmt::fmt-header-only"]);
        let cx = consumer(&tmp, vec![fmt]);

        let mut deps = CMakeDeps::new(&cx);
        deps.set_property("fmt", props::CMAKE_TARGET_NAME, "custom::fmt");
        let text = deps.render_config(&cx, cx.dependencies.get("fmt").unwrap());
        assert!(text.contains("add_library(custom::fmt INTERFACE IMPORTED)"));
        assert!(text.contains("add_library(fmt::fmt-header-only INTERFACE IMPORTED)"));
    }

    #[test]
    fn test_find_mode_none_skipped() {
        let tmp = TempDir::new().unwrap();
        let mut sys = fixtures::dependency("opengl", "system", PackageType::Unknown);
        sys.cpp_info.set_property(props::CMAKE_FIND_MODE, "none");
        let cx = consumer(&tmp, vec![sys]);
        assert!(CMakeDeps::new(&cx).generate(&cx).unwrap().is_empty());
    }

    #[test]
    fn test_module_mode_writes_find_file() {
        let tmp = TempDir::new().unwrap();
        let mut dep = fixtures::dependency("bzip2", "1.0.8", PackageType::StaticLibrary);
        dep.cpp_info.set_property(props::CMAKE_FIND_MODE, "both");
        dep.cpp_info.set_property(props::CMAKE_FILE_NAME, "BZip2");
        let cx = consumer(&tmp, vec![dep]);
        let written = CMakeDeps::new(&cx).generate(&cx).unwrap();
        assert_eq!(written.len(), 2);
        assert!(cx.generators_folder().join("FindBZip2.cmake").is_file());
    }

    #[test]
    fn test_components_link_across_packages() {
        let tmp = TempDir::new().unwrap();
        let mut eigen = fixtures::dependency("eigen", "3.4.0", PackageType::HeaderLibrary);
        eigen.direct = false;
        let mut lib = fixtures::dependency("mylib", "1.0", PackageType::StaticLibrary);
        lib.requires = vec!["eigen".into()];
        lib.cpp_info.root.includedirs.clear();
        lib.cpp_info.root.libdirs.clear();
        let core = lib.cpp_info.component("core");
        core.libs = vec!["mylib_core".into()];
        core.requires = vec!["eigen::eigen".into()];
        let cx = consumer(&tmp, vec![lib, eigen]);

        let text = CMakeDeps::new(&cx).render_config(&cx, cx.dependencies.get("mylib").unwrap());
        assert!(text.contains("add_library(mylib::core INTERFACE IMPORTED)"));
        assert!(text.contains("eigen::eigen"));
        assert!(text.contains("find_dependency(eigen REQUIRED NO_MODULE)"));
    }

    #[test]
    fn test_hidden_dependency_not_referenced() {
        let tmp = TempDir::new().unwrap();
        let mut eigen = fixtures::dependency("eigen", "3.4.0", PackageType::HeaderLibrary);
        eigen.direct = false;
        eigen.traits.headers = false;
        eigen.traits.libs = false;
        eigen.package_folder = Path::new("/pkgs/eigen-hidden").to_path_buf();
        let mut lib = fixtures::dependency("mylib", "1.0", PackageType::StaticLibrary);
        lib.requires = vec!["eigen".into()];
        lib.cpp_info.component("core").requires = vec!["eigen::eigen".into()];
        let cx = consumer(&tmp, vec![lib, eigen]);

        let deps = CMakeDeps::new(&cx);
        let written = deps.generate(&cx).unwrap();
        assert_eq!(written.len(), 1);
        assert!(written[0].ends_with("mylibConfig.cmake"));

        let text = std::fs::read_to_string(&written[0]).unwrap();
        assert!(!text.contains("find_dependency(eigen"));
        assert!(!text.contains("eigen::eigen"));
        assert!(!text.contains("eigen-hidden"));
    }
}
