//! Consumption metadata published by a package (`cpp_info`).
//!
//! The tree is a root node plus named components. Every node carries the
//! same fields and a properties bag read by the generators; property keys a
//! generator does not know are ignored.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::errors::RecipeError;

/// Well-known property keys.
pub mod props {
    pub const CMAKE_FILE_NAME: &str = "cmake_file_name";
    pub const CMAKE_TARGET_NAME: &str = "cmake_target_name";
    pub const CMAKE_TARGET_ALIASES: &str = "cmake_target_aliases";
    pub const CMAKE_BUILD_MODULES: &str = "cmake_build_modules";
    pub const CMAKE_FIND_MODE: &str = "cmake_find_mode";
    pub const PKG_CONFIG_NAME: &str = "pkg_config_name";
    pub const PKG_CONFIG_ALIASES: &str = "pkg_config_aliases";
    pub const PKG_CONFIG_CUSTOM_CONTENT: &str = "pkg_config_custom_content";
    pub const SYSTEM_PACKAGE_VERSION: &str = "system_package_version";
}

/// A property value: text or a list of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Text(String),
    List(Vec<String>),
}

impl PropertyValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            PropertyValue::List(_) => None,
        }
    }

    /// The value as a list; text becomes a one-item list.
    pub fn as_list(&self) -> Vec<String> {
        match self {
            PropertyValue::Text(s) => vec![s.clone()],
            PropertyValue::List(items) => items.clone(),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Text(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::Text(s)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(items: Vec<String>) -> Self {
        PropertyValue::List(items)
    }
}

impl From<Vec<&str>> for PropertyValue {
    fn from(items: Vec<&str>) -> Self {
        PropertyValue::List(items.into_iter().map(String::from).collect())
    }
}

/// `cmake_find_mode` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CMakeFindMode {
    Config,
    Module,
    Both,
    None,
}

impl CMakeFindMode {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "module" => CMakeFindMode::Module,
            "both" => CMakeFindMode::Both,
            "none" => CMakeFindMode::None,
            _ => CMakeFindMode::Config,
        }
    }
}

/// One node of the tree: the root or a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Component {
    pub libs: Vec<String>,
    pub defines: Vec<String>,
    pub cflags: Vec<String>,
    pub cxxflags: Vec<String>,
    pub linkflags: Vec<String>,
    pub system_libs: Vec<String>,
    pub frameworks: Vec<String>,
    pub includedirs: Vec<String>,
    pub libdirs: Vec<String>,
    pub bindirs: Vec<String>,
    pub resdirs: Vec<String>,
    pub builddirs: Vec<String>,
    pub frameworkdirs: Vec<String>,
    /// `comp` (same package) or `pkg::comp`.
    pub requires: Vec<String>,
    pub properties: BTreeMap<String, PropertyValue>,
}

impl Default for Component {
    fn default() -> Self {
        Component {
            libs: Vec::new(),
            defines: Vec::new(),
            cflags: Vec::new(),
            cxxflags: Vec::new(),
            linkflags: Vec::new(),
            system_libs: Vec::new(),
            frameworks: Vec::new(),
            includedirs: vec!["include".to_string()],
            libdirs: vec!["lib".to_string()],
            bindirs: vec!["bin".to_string()],
            resdirs: Vec::new(),
            builddirs: Vec::new(),
            frameworkdirs: Vec::new(),
            requires: Vec::new(),
            properties: BTreeMap::new(),
        }
    }
}

impl Component {
    /// A node with every folder list empty.
    pub fn empty() -> Self {
        Component {
            includedirs: Vec::new(),
            libdirs: Vec::new(),
            bindirs: Vec::new(),
            ..Component::default()
        }
    }

    pub fn set_property(&mut self, key: &str, value: impl Into<PropertyValue>) -> &mut Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn get_property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn property_text(&self, key: &str) -> Option<&str> {
        self.get_property(key).and_then(PropertyValue::as_text)
    }

    /// Names of root fields that conflict with declaring components.
    fn consumption_fields(&self) -> Vec<String> {
        let mut fields = Vec::new();
        if !self.libs.is_empty() {
            fields.push("libs".to_string());
        }
        if !self.defines.is_empty() {
            fields.push("defines".to_string());
        }
        if !self.system_libs.is_empty() {
            fields.push("system_libs".to_string());
        }
        fields
    }

    fn extend_from(&mut self, other: &Component) {
        merge_unique(&mut self.libs, &other.libs);
        merge_unique(&mut self.defines, &other.defines);
        merge_unique(&mut self.cflags, &other.cflags);
        merge_unique(&mut self.cxxflags, &other.cxxflags);
        merge_unique(&mut self.linkflags, &other.linkflags);
        merge_unique(&mut self.system_libs, &other.system_libs);
        merge_unique(&mut self.frameworks, &other.frameworks);
        merge_unique(&mut self.includedirs, &other.includedirs);
        merge_unique(&mut self.libdirs, &other.libdirs);
        merge_unique(&mut self.bindirs, &other.bindirs);
        merge_unique(&mut self.resdirs, &other.resdirs);
        merge_unique(&mut self.builddirs, &other.builddirs);
        merge_unique(&mut self.frameworkdirs, &other.frameworkdirs);
    }

    /// Absolute include directories under `package_folder`.
    pub fn include_paths(&self, package_folder: &Path) -> Vec<PathBuf> {
        absolute(package_folder, &self.includedirs)
    }

    pub fn lib_paths(&self, package_folder: &Path) -> Vec<PathBuf> {
        absolute(package_folder, &self.libdirs)
    }

    pub fn bin_paths(&self, package_folder: &Path) -> Vec<PathBuf> {
        absolute(package_folder, &self.bindirs)
    }

    pub fn build_paths(&self, package_folder: &Path) -> Vec<PathBuf> {
        absolute(package_folder, &self.builddirs)
    }
}

fn absolute(base: &Path, dirs: &[String]) -> Vec<PathBuf> {
    dirs.iter()
        .map(|d| {
            let p = Path::new(d);
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                base.join(p)
            }
        })
        .collect()
}

fn merge_unique(into: &mut Vec<String>, from: &[String]) {
    for item in from {
        if !into.contains(item) {
            into.push(item.clone());
        }
    }
}

/// The full consumption tree of a package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CppInfo {
    pub root: Component,
    pub components: IndexMap<String, Component>,
}

impl CppInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tree for a header-only package: no library or binary folders.
    pub fn header_only() -> Self {
        CppInfo {
            root: Component {
                libdirs: Vec::new(),
                bindirs: Vec::new(),
                ..Component::default()
            },
            components: IndexMap::new(),
        }
    }

    /// Get or create a component.
    pub fn component(&mut self, name: &str) -> &mut Component {
        self.components.entry(name.to_string()).or_default()
    }

    pub fn has_components(&self) -> bool {
        !self.components.is_empty()
    }

    pub fn set_property(&mut self, key: &str, value: impl Into<PropertyValue>) -> &mut Self {
        self.root.set_property(key, value);
        self
    }

    pub fn get_property(&self, key: &str) -> Option<&PropertyValue> {
        self.root.get_property(key)
    }

    /// Check tree well-formedness after `package_info()`.
    ///
    /// `dependency_components` maps each direct dependency name to its
    /// declared component names.
    pub fn validate(
        &self,
        package: &str,
        header_library: bool,
        dependency_components: &BTreeMap<String, Vec<String>>,
    ) -> Result<(), RecipeError> {
        if self.has_components() {
            let fields = self.root.consumption_fields();
            if !fields.is_empty() {
                return Err(RecipeError::RootAndComponents {
                    package: package.to_string(),
                    fields,
                });
            }
        }

        if header_library {
            let nodes = std::iter::once(&self.root).chain(self.components.values());
            for node in nodes {
                if !node.libdirs.is_empty() || !node.bindirs.is_empty() || !node.libs.is_empty() {
                    return Err(RecipeError::HeaderLibraryDirs {
                        package: package.to_string(),
                    });
                }
            }
        }

        let local: Vec<String> = self.components.keys().cloned().collect();
        let nodes = std::iter::once(&self.root).chain(self.components.values());
        for node in nodes {
            for requirement in &node.requires {
                match requirement.split_once("::") {
                    Some((dep, comp)) => {
                        let Some(available) = dependency_components.get(dep) else {
                            return Err(RecipeError::UnknownComponent {
                                package: package.to_string(),
                                requirement: requirement.clone(),
                                available: dependency_components.keys().cloned().collect(),
                            });
                        };
                        let ok = available.iter().any(|c| c == comp)
                            || (available.is_empty() && comp == dep);
                        if !ok {
                            return Err(RecipeError::UnknownComponent {
                                package: package.to_string(),
                                requirement: requirement.clone(),
                                available: available
                                    .iter()
                                    .map(|c| format!("{}::{}", dep, c))
                                    .collect(),
                            });
                        }
                    }
                    None => {
                        if !local.contains(requirement) {
                            return Err(RecipeError::UnknownComponent {
                                package: package.to_string(),
                                requirement: requirement.clone(),
                                available: local.clone(),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Flatten the tree: root plus every component, in declaration order.
    pub fn aggregated(&self) -> Component {
        if !self.has_components() {
            return self.root.clone();
        }
        let mut agg = Component::empty();
        agg.properties = self.root.properties.clone();
        for comp in self.components.values() {
            agg.extend_from(comp);
        }
        agg.extend_from(&self.root);
        agg
    }

    /// Aggregate only the named components and their local requirements.
    pub fn aggregated_components(&self, names: &[String]) -> Component {
        let mut agg = Component::empty();
        let mut stack: Vec<String> = names.to_vec();
        let mut seen = Vec::new();
        while let Some(name) = stack.pop() {
            if seen.contains(&name) {
                continue;
            }
            if let Some(comp) = self.components.get(&name) {
                agg.extend_from(comp);
                for r in &comp.requires {
                    if !r.contains("::") {
                        stack.push(r.clone());
                    }
                }
            }
            seen.push(name);
        }
        agg
    }

    /// External `pkg::comp` requirements across the whole tree.
    pub fn external_requires(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        let nodes = std::iter::once(&self.root).chain(self.components.values());
        for node in nodes {
            for r in &node.requires {
                if let Some((dep, comp)) = r.split_once("::") {
                    let pair = (dep.to_string(), comp.to_string());
                    if !out.contains(&pair) {
                        out.push(pair);
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps() -> BTreeMap<String, Vec<String>> {
        let mut m = BTreeMap::new();
        m.insert("eigen".to_string(), Vec::new());
        m.insert("zlib".to_string(), vec!["zlib".to_string()]);
        m.insert("openssl".to_string(), vec!["ssl".to_string(), "crypto".to_string()]);
        m
    }

    #[test]
    fn test_root_and_components_conflict() {
        let mut info = CppInfo::new();
        info.root.libs.push("foo".into());
        info.component("core").libs.push("foo_core".into());
        let err = info.validate("foo", false, &deps()).unwrap_err();
        assert!(matches!(err, RecipeError::RootAndComponents { .. }));
    }

    #[test]
    fn test_dependency_component_must_exist() {
        let mut info = CppInfo::new();
        info.component("core").requires = vec!["eigen::eigen".into(), "openssl::ssl".into()];
        info.validate("foo", false, &deps()).unwrap();

        info.component("net").requires = vec!["openssl::tls".into()];
        let err = info.validate("foo", false, &deps()).unwrap_err();
        assert!(err.to_string().contains("openssl::tls"));
    }

    #[test]
    fn test_local_component_requires() {
        let mut info = CppInfo::new();
        info.component("a").requires = vec!["b".into()];
        assert!(info.validate("foo", false, &deps()).is_err());
        info.component("b");
        info.validate("foo", false, &deps()).unwrap();
    }

    #[test]
    fn test_header_only_dirs() {
        let info = CppInfo::header_only();
        info.validate("mdspan", true, &deps()).unwrap();
        let info = CppInfo::new();
        assert!(matches!(
            info.validate("mdspan", true, &deps()),
            Err(RecipeError::HeaderLibraryDirs { .. })
        ));
    }

    #[test]
    fn test_aggregated() {
        let mut info = CppInfo::new();
        info.set_property(props::CMAKE_FILE_NAME, "Foo");
        info.component("core").libs = vec!["foo_core".into()];
        let net = info.component("net");
        net.libs = vec!["foo_net".into()];
        net.system_libs = vec!["pthread".into()];
        net.requires = vec!["core".into()];

        let agg = info.aggregated();
        assert_eq!(agg.libs, ["foo_core", "foo_net"]);
        assert_eq!(agg.system_libs, ["pthread"]);
        assert_eq!(agg.includedirs, ["include"]);
        assert_eq!(agg.property_text(props::CMAKE_FILE_NAME), Some("Foo"));

        let only_net = info.aggregated_components(&["net".to_string()]);
        assert_eq!(only_net.libs, ["foo_net", "foo_core"]);
    }
}
