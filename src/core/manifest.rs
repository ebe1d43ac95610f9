//! `recipe.toml`: declarative recipes.
//!
//! The file describes metadata, options, requirements, validation rules,
//! how to fetch and build the sources, what to package and what to publish
//! in `cpp_info`. The loader turns that data into a hook table.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;

use crate::core::conandata::ConanData;
use crate::core::cpp_info::{Component, CppInfo};
use crate::core::env_info::Environment;
use crate::core::errors::InvalidConfiguration;
use crate::core::hooks::Hook;
use crate::core::instance::Instance;
use crate::core::options::{OptionDomain, OptionValue};
use crate::core::recipe::{Implement, Language, PackageType, Recipe};
use crate::core::requirement::Requirement;
use crate::tools::build::{check_min_cppstd, check_min_cstd, cross_building};
use crate::tools::cmake::{CMake, CMakeDeps, CMakeToolchain, CMakeValue};
use crate::tools::download::get_conandata_sources;
use crate::tools::env::VirtualBuildEnv;
use crate::tools::files::{collect_libs, copy_with, replace_in_file_with, rm, rmdir, CopyOptions};
use crate::tools::gnu::{Autotools, AutotoolsDeps, AutotoolsToolchain, PkgConfigDeps};
use crate::tools::layout::{basic_layout, cmake_layout};
use crate::tools::meson::{Meson, MesonToolchain, MesonValue};
use crate::tools::patches::{apply_conandata_patches, export_conandata_patches};

pub const RECIPE_FILE: &str = "recipe.toml";
pub const CONANDATA_FILE: &str = "conandata.yml";

/// A string or a list of strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn contains(&self, value: &str) -> bool {
        match self {
            OneOrMany::One(s) => s == value,
            OneOrMany::Many(items) => items.iter().any(|i| i == value),
        }
    }

    pub fn to_vec(&self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s.clone()],
            OneOrMany::Many(items) => items.clone(),
        }
    }
}

impl Default for OneOrMany {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

/// A scalar in `cache_variables` and `project_options`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl From<&Scalar> for CMakeValue {
    fn from(s: &Scalar) -> Self {
        match s {
            Scalar::Bool(b) => CMakeValue::Bool(*b),
            Scalar::Int(n) => CMakeValue::from(*n),
            Scalar::Text(t) => CMakeValue::Text(t.clone()),
        }
    }
}

impl From<&Scalar> for MesonValue {
    fn from(s: &Scalar) -> Self {
        match s {
            Scalar::Bool(b) => MesonValue::Bool(*b),
            Scalar::Int(n) => MesonValue::Text(n.to_string()),
            Scalar::Text(t) => MesonValue::Text(t.clone()),
        }
    }
}

/// A `when = { ... }` condition. Every key given must match.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Condition {
    pub os: Option<OneOrMany>,
    pub arch: Option<OneOrMany>,
    pub compiler: Option<OneOrMany>,
    pub build_type: Option<OneOrMany>,
    /// Any other setting, e.g. `"compiler.libcxx"`.
    pub settings: IndexMap<String, OneOrMany>,
    pub options: IndexMap<String, OptionValue>,
    pub cross_building: Option<bool>,
}

impl Condition {
    pub fn matches(&self, cx: &Instance) -> bool {
        let setting = |key: &str, wanted: &Option<OneOrMany>| match wanted {
            None => true,
            Some(w) => cx.settings.get_safe(key).is_some_and(|v| w.contains(v)),
        };
        setting("os", &self.os)
            && setting("arch", &self.arch)
            && setting("compiler", &self.compiler)
            && setting("build_type", &self.build_type)
            && self
                .settings
                .iter()
                .all(|(k, w)| cx.settings.get_safe(k).is_some_and(|v| w.contains(v)))
            && self
                .options
                .iter()
                .all(|(k, v)| cx.options.get_safe(k) == Some(v))
            && self
                .cross_building
                .is_none_or(|wanted| cross_building(cx) == wanted)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRequire {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(default)]
    when: Option<Condition>,
    headers: Option<bool>,
    libs: Option<bool>,
    run: Option<bool>,
    visible: Option<bool>,
    transitive_headers: Option<bool>,
    transitive_libs: Option<bool>,
    #[serde(default)]
    options: IndexMap<String, OptionValue>,
}

impl RawRequire {
    fn applies(&self, cx: &Instance) -> bool {
        self.when.as_ref().is_none_or(|w| w.matches(cx))
    }

    fn apply_traits(&self, req: &mut Requirement) {
        req.headers = self.headers.or(req.headers);
        req.libs = self.libs.or(req.libs);
        req.run = self.run.or(req.run);
        req.visible = self.visible.or(req.visible);
        req.transitive_headers = self.transitive_headers.or(req.transitive_headers);
        req.transitive_libs = self.transitive_libs.or(req.transitive_libs);
        for (name, value) in &self.options {
            req.option(name, value.clone());
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawInvalid {
    #[serde(default)]
    when: Condition,
    message: String,
    /// Only checked when a build will happen.
    #[serde(default)]
    build: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawReplace {
    file: String,
    search: String,
    replace: String,
    #[serde(default = "default_true")]
    strict: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawSource {
    strip_root: bool,
    patches: bool,
    replace: Vec<RawReplace>,
}

impl Default for RawSource {
    fn default() -> Self {
        RawSource {
            strip_root: true,
            patches: true,
            replace: Vec::new(),
        }
    }
}

/// Native build system driven by the synthesized hooks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildSystem {
    Cmake,
    Autotools,
    Meson,
    /// Binaries fetched in `source()`; `package()` copies them.
    Prebuilt,
    #[default]
    None,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawBuild {
    system: BuildSystem,
    src_folder: String,
    cache_variables: IndexMap<String, Scalar>,
    /// option name -> CMake cache variable set ON/OFF from it
    option_variables: IndexMap<String, String>,
    configure_args: Vec<String>,
    /// option name -> feature passed as `--enable-x`/`--disable-x`
    enable_options: IndexMap<String, String>,
    autoreconf: bool,
    project_options: IndexMap<String, Scalar>,
    /// option name -> meson feature set `enabled`/`disabled`
    option_features: IndexMap<String, String>,
    target: Option<String>,
    install: bool,
}

impl Default for RawBuild {
    fn default() -> Self {
        RawBuild {
            system: BuildSystem::None,
            src_folder: "src".to_string(),
            cache_variables: IndexMap::new(),
            option_variables: IndexMap::new(),
            configure_args: Vec::new(),
            enable_options: IndexMap::new(),
            autoreconf: false,
            project_options: IndexMap::new(),
            option_features: IndexMap::new(),
            target: None,
            install: true,
        }
    }
}

/// Folder a `[[package.copy]]` rule reads from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum CopyFrom {
    #[default]
    Source,
    Build,
    ExportSources,
    Recipe,
    Package,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCopy {
    pattern: String,
    #[serde(default)]
    from: CopyFrom,
    #[serde(default)]
    src: Option<String>,
    #[serde(default)]
    dst: String,
    #[serde(default = "default_true")]
    keep_path: bool,
    #[serde(default)]
    excludes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPackage {
    name: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    license: OneOrMany,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    homepage: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    package_type: PackageType,
    #[serde(default)]
    settings: Vec<String>,
    #[serde(default)]
    implements: Vec<Implement>,
    #[serde(default)]
    languages: Vec<Language>,
    #[serde(default)]
    python_requires: Vec<String>,
    #[serde(default)]
    exports: Vec<String>,
    #[serde(default)]
    exports_sources: Vec<String>,
    #[serde(default)]
    min_cppstd: Option<String>,
    #[serde(default)]
    min_cstd: Option<String>,
    #[serde(default)]
    copy: Vec<RawCopy>,
    #[serde(default)]
    rmdir: Vec<String>,
    #[serde(default)]
    rm: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawPackageId {
    clear: bool,
    remove_settings: Vec<String>,
    remove_options: Vec<String>,
}

impl RawPackageId {
    fn is_empty(&self) -> bool {
        !self.clear && self.remove_settings.is_empty() && self.remove_options.is_empty()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawComponent {
    #[serde(flatten)]
    node: Component,
    /// os -> system libs added on that os
    #[serde(default)]
    system_libs_by_os: BTreeMap<String, Vec<String>>,
}

impl RawComponent {
    fn realize(&self, cx: &Instance) -> Component {
        let mut node = self.node.clone();
        if let Some(libs) = cx.settings.os().and_then(|os| self.system_libs_by_os.get(os)) {
            node.system_libs.extend(libs.iter().cloned());
        }
        node
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawCppInfo {
    #[serde(flatten)]
    root: RawComponent,
    #[serde(default)]
    components: IndexMap<String, RawComponent>,
    /// Fill root `libs` from the packaged `lib` folder.
    #[serde(default)]
    collect_libs: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawEnv {
    define: IndexMap<String, String>,
    /// Paths relative to the package folder.
    prepend_path: IndexMap<String, OneOrMany>,
    append_path: IndexMap<String, OneOrMany>,
}

impl RawEnv {
    fn realize(&self, package_folder: &Path) -> Environment {
        let mut env = Environment::new();
        for (k, v) in &self.define {
            env.define(k, v.clone());
        }
        for (k, paths) in &self.prepend_path {
            for p in paths.to_vec() {
                env.prepend_path(k, package_folder.join(p));
            }
        }
        for (k, paths) in &self.append_path {
            for p in paths.to_vec() {
                env.append_path(k, package_folder.join(p));
            }
        }
        env
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRecipe {
    package: RawPackage,
    #[serde(default)]
    options: IndexMap<String, OptionDomain>,
    #[serde(default)]
    default_options: IndexMap<String, OptionValue>,
    #[serde(default)]
    requires: Vec<RawRequire>,
    #[serde(default)]
    tool_requires: Vec<RawRequire>,
    #[serde(default)]
    test_requires: Vec<RawRequire>,
    #[serde(default)]
    invalid: Vec<RawInvalid>,
    #[serde(default)]
    source: RawSource,
    #[serde(default)]
    build: RawBuild,
    #[serde(default)]
    package_id: RawPackageId,
    #[serde(default)]
    cpp_info: RawCppInfo,
    #[serde(default)]
    buildenv: RawEnv,
    #[serde(default)]
    runenv: RawEnv,
}

fn default_true() -> bool {
    true
}

/// Load `recipe.toml` (and `conandata.yml` when present) from a folder.
pub fn load_recipe(folder: &Path) -> Result<Recipe> {
    let path = folder.join(RECIPE_FILE);
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read recipe: {}", path.display()))?;
    let data_path = folder.join(CONANDATA_FILE);
    let conan_data = if data_path.is_file() {
        Some(ConanData::load(&data_path)?)
    } else {
        None
    };
    parse_recipe(&text, Some(folder), conan_data)
        .with_context(|| format!("invalid recipe {}", path.display()))
}

/// Parse recipe text into a recipe with synthesized hooks.
pub fn parse_recipe(text: &str, folder: Option<&Path>, conan_data: Option<ConanData>) -> Result<Recipe> {
    let raw: RawRecipe = toml::from_str(text).context("failed to parse recipe.toml")?;
    let pkg = &raw.package;

    let mut builder = Recipe::builder(&pkg.name)
        .package_type(pkg.package_type)
        .topics(pkg.topics.iter().cloned())
        .settings(pkg.settings.iter().cloned())
        .languages(pkg.languages.iter().copied())
        .implements(pkg.implements.iter().copied())
        .exports(pkg.exports.iter().cloned())
        .exports_sources(pkg.exports_sources.iter().cloned());
    if let Some(v) = &pkg.version {
        builder = builder.version(v);
    }
    for license in pkg.license.to_vec() {
        builder = builder.license(&license);
    }
    if let Some(d) = &pkg.description {
        builder = builder.description(d);
    }
    if let Some(u) = &pkg.url {
        builder = builder.url(u);
    }
    if let Some(h) = &pkg.homepage {
        builder = builder.homepage(h);
    }
    for r in &pkg.python_requires {
        builder = builder.python_requires(r);
    }
    for (name, domain) in &raw.options {
        let Some(default) = raw.default_options.get(name) else {
            bail!("option `{}` needs a value in [default_options]", name);
        };
        builder = builder.option(name, domain.clone(), default.clone());
    }
    for (key, value) in &raw.default_options {
        if !raw.options.contains_key(key) {
            builder = builder.default_option(key, value.clone());
        }
    }
    if let Some(folder) = folder {
        builder = builder.recipe_folder(folder);
    }
    let has_patches = conan_data
        .as_ref()
        .is_some_and(|d| !d.patches.is_empty());
    let has_sources = conan_data.as_ref().is_some_and(|d| !d.sources.is_empty());
    if let Some(data) = conan_data {
        builder = builder.conan_data(data);
    }

    let spec = Arc::new(raw);

    if has_patches {
        builder = builder.hook(Hook::ExportSources, |cx| export_conandata_patches(cx));
    }

    let s = spec.clone();
    builder = builder.hook(Hook::Layout, move |cx| {
        match s.build.system {
            BuildSystem::Cmake => cmake_layout(cx, &s.build.src_folder),
            _ => basic_layout(cx, &s.build.src_folder),
        }
        Ok(())
    });

    if !spec.requires.is_empty() {
        let s = spec.clone();
        builder = builder.hook(Hook::Requirements, move |cx| {
            let wanted: Vec<&RawRequire> = s.requires.iter().filter(|r| r.applies(cx)).collect();
            for r in wanted {
                let req = cx.requires(&r.reference)?;
                r.apply_traits(req);
            }
            Ok(())
        });
    }

    if !spec.tool_requires.is_empty() || !spec.test_requires.is_empty() {
        let s = spec.clone();
        builder = builder.hook(Hook::BuildRequirements, move |cx| {
            let tools: Vec<&RawRequire> = s.tool_requires.iter().filter(|r| r.applies(cx)).collect();
            let tests: Vec<&RawRequire> = s.test_requires.iter().filter(|r| r.applies(cx)).collect();
            for r in tools {
                let req = cx.tool_requires(&r.reference)?;
                r.apply_traits(req);
            }
            for r in tests {
                let req = cx.test_requires(&r.reference)?;
                r.apply_traits(req);
            }
            Ok(())
        });
    }

    let has_validate = spec.package.min_cppstd.is_some()
        || spec.package.min_cstd.is_some()
        || spec.invalid.iter().any(|r| !r.build);
    if has_validate {
        let s = spec.clone();
        builder = builder.hook(Hook::Validate, move |cx| {
            if let Some(std) = &s.package.min_cppstd {
                check_min_cppstd(cx, std)?;
            }
            if let Some(std) = &s.package.min_cstd {
                check_min_cstd(cx, std)?;
            }
            check_rules(cx, s.invalid.iter().filter(|r| !r.build))
        });
    }
    if spec.invalid.iter().any(|r| r.build) {
        let s = spec.clone();
        builder = builder.hook(Hook::ValidateBuild, move |cx| {
            check_rules(cx, s.invalid.iter().filter(|r| r.build))
        });
    }

    if has_sources || has_patches || !spec.source.replace.is_empty() {
        let s = spec.clone();
        builder = builder.hook(Hook::Source, move |cx| {
            if has_sources {
                get_conandata_sources(cx, s.source.strip_root)?;
            }
            if has_patches && s.source.patches {
                apply_conandata_patches(cx)?;
            }
            let source = cx.source_folder();
            for r in &s.source.replace {
                replace_in_file_with(cx, source.join(&r.file), &r.search, &r.replace, r.strict)?;
            }
            Ok(())
        });
    }

    let s = spec.clone();
    builder = builder.hook(Hook::Generate, move |cx| generate(cx, &s.build));

    if matches!(
        spec.build.system,
        BuildSystem::Cmake | BuildSystem::Autotools | BuildSystem::Meson
    ) {
        let s = spec.clone();
        builder = builder.hook(Hook::Build, move |cx| build(cx, &s.build));
    }

    let s = spec.clone();
    builder = builder.hook(Hook::Package, move |cx| package(cx, &s));

    if spec.package.package_type == PackageType::HeaderLibrary || !spec.package_id.is_empty() {
        let s = spec.clone();
        builder = builder.hook(Hook::PackageId, move |cx| {
            if s.package_id.clear || s.package.package_type == PackageType::HeaderLibrary {
                cx.info.clear();
                return Ok(());
            }
            for key in &s.package_id.remove_settings {
                cx.info.settings.rm_safe(key);
            }
            for name in &s.package_id.remove_options {
                cx.info.remove_option(name);
            }
            Ok(())
        });
    }

    let s = spec;
    builder = builder.hook(Hook::PackageInfo, move |cx| package_info(cx, &s));

    builder.build()
}

fn check_rules<'a>(cx: &Instance, rules: impl Iterator<Item = &'a RawInvalid>) -> Result<()> {
    for rule in rules {
        if rule.when.matches(cx) {
            return Err(InvalidConfiguration::new(format!("{}: {}", cx.reference, rule.message)).into());
        }
    }
    Ok(())
}

fn generate(cx: &mut Instance, b: &RawBuild) -> Result<()> {
    match b.system {
        BuildSystem::Cmake => {
            let mut tc = CMakeToolchain::new(cx);
            for (k, v) in &b.cache_variables {
                tc.cache_variables.insert(k.clone(), v.into());
            }
            for (option, var) in &b.option_variables {
                if let Some(value) = cx.options.get_safe(option) {
                    tc.cache_variables
                        .insert(var.clone(), CMakeValue::Bool(value.is_true()));
                }
            }
            tc.generate(cx)?;
            CMakeDeps::new(cx).generate(cx)?;
        }
        BuildSystem::Autotools => {
            let mut tc = AutotoolsToolchain::new(cx)?;
            tc.configure_args.extend(b.configure_args.iter().cloned());
            for (option, feature) in &b.enable_options {
                if let Some(value) = cx.options.get_safe(option) {
                    let verb = if value.is_true() { "enable" } else { "disable" };
                    tc.configure_args.push(format!("--{}-{}", verb, feature));
                }
            }
            tc.generate(cx)?;
            AutotoolsDeps::new(cx).generate(cx)?;
            PkgConfigDeps::new(cx).generate(cx)?;
        }
        BuildSystem::Meson => {
            let mut tc = MesonToolchain::new(cx)?;
            for (k, v) in &b.project_options {
                tc.project_options.insert(k.clone(), v.into());
            }
            for (option, feature) in &b.option_features {
                if let Some(value) = cx.options.get_safe(option) {
                    let state = if value.is_true() { "enabled" } else { "disabled" };
                    tc.project_options.insert(feature.clone(), state.into());
                }
            }
            tc.generate(cx)?;
            PkgConfigDeps::new(cx).generate(cx)?;
        }
        BuildSystem::Prebuilt | BuildSystem::None => {}
    }
    VirtualBuildEnv::new(cx).generate(cx)?;
    Ok(())
}

fn build(cx: &mut Instance, b: &RawBuild) -> Result<()> {
    match b.system {
        BuildSystem::Cmake => {
            let cmake = CMake::new(cx)?;
            cmake.configure(cx)?;
            cmake.build_target(cx, b.target.as_deref())
        }
        BuildSystem::Autotools => {
            let at = Autotools::new(cx)?;
            if b.autoreconf {
                at.autoreconf(cx)?;
            }
            at.configure(cx)?;
            at.make_target(cx, b.target.as_deref(), &[])
        }
        BuildSystem::Meson => {
            let meson = Meson::new(cx);
            meson.configure(cx)?;
            meson.build(cx)
        }
        BuildSystem::Prebuilt | BuildSystem::None => Ok(()),
    }
}

fn package(cx: &mut Instance, spec: &RawRecipe) -> Result<()> {
    if spec.build.install {
        match spec.build.system {
            BuildSystem::Cmake => CMake::new(cx)?.install(cx)?,
            BuildSystem::Autotools => Autotools::new(cx)?.install(cx)?,
            BuildSystem::Meson => Meson::new(cx).install(cx)?,
            BuildSystem::Prebuilt | BuildSystem::None => {}
        }
    }
    let package_folder = cx.package_folder().to_path_buf();
    for rule in &spec.package.copy {
        let base: PathBuf = match rule.from {
            CopyFrom::Source => cx.source_folder(),
            CopyFrom::Build => cx.build_folder(),
            CopyFrom::ExportSources => cx.export_sources_folder().to_path_buf(),
            CopyFrom::Recipe => match cx.recipe_folder() {
                Some(f) => f.to_path_buf(),
                None => continue,
            },
            CopyFrom::Package => package_folder.clone(),
        };
        let src = match &rule.src {
            Some(sub) => base.join(sub),
            None => base,
        };
        let options = CopyOptions {
            keep_path: rule.keep_path,
            excludes: rule.excludes.clone(),
        };
        copy_with(cx, &rule.pattern, &src, package_folder.join(&rule.dst), &options)?;
    }
    for dir in &spec.package.rmdir {
        rmdir(cx, package_folder.join(dir))?;
    }
    for pattern in &spec.package.rm {
        rm(cx, pattern, &package_folder, true)?;
    }
    Ok(())
}

fn package_info(cx: &mut Instance, spec: &RawRecipe) -> Result<()> {
    let raw = &spec.cpp_info;
    let mut info = CppInfo::new();
    info.root = raw.root.realize(cx);
    for (name, comp) in &raw.components {
        info.components.insert(name.clone(), comp.realize(cx));
    }
    if raw.collect_libs && info.root.libs.is_empty() {
        info.root.libs = collect_libs(cx, None)?;
    }
    if cx.package_type == PackageType::HeaderLibrary {
        for node in std::iter::once(&mut info.root).chain(info.components.values_mut()) {
            node.libdirs.clear();
            node.bindirs.clear();
        }
    }
    cx.cpp_info = info;
    let folder = cx.package_folder().to_path_buf();
    cx.buildenv_info.compose(&spec.buildenv.realize(&folder));
    cx.runenv_info.compose(&spec.runenv.realize(&folder));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::as_invalid_configuration;
    use crate::core::requirement::RequirementKind;
    use crate::test_support::fixtures;

    const ZLIB: &str = r#"
[package]
name = "minizip"
version = "1.3.1"
license = "Zlib"
package_type = "library"
settings = ["os", "arch", "compiler", "build_type"]
implements = ["auto_shared_fpic"]
languages = ["C"]
rm = ["*.la"]
rmdir = ["lib/pkgconfig"]

[[package.copy]]
pattern = "LICENSE"
dst = "licenses"

[options]
shared = [true, false]
fPIC = [true, false]
bzip2 = [true, false]

[default_options]
shared = false
fPIC = true
bzip2 = true
"zlib/*:shared" = false

[[requires]]
ref = "zlib/[>=1.2.11 <2]"
transitive_headers = true

[[requires]]
ref = "bzip2/1.0.8"
when = { options = { bzip2 = true } }

[[tool_requires]]
ref = "cmake/[>=3.20]"

[[invalid]]
when = { os = "Windows", options = { shared = true } }
message = "shared builds are not supported on Windows"

[build]
system = "cmake"
cache_variables = { MINIZIP_BUILD_TESTS = false }
option_variables = { bzip2 = "MZ_BZIP2" }

[cpp_info]
libs = ["minizip"]
properties = { cmake_file_name = "minizip", pkg_config_name = "minizip" }
system_libs_by_os = { Linux = ["m"] }
"#;

    fn recipe() -> Recipe {
        parse_recipe(ZLIB, None, None).unwrap()
    }

    #[test]
    fn test_metadata() {
        let r = recipe();
        let m = &r.metadata;
        assert_eq!(r.name(), "minizip");
        assert_eq!(r.version().unwrap().as_str(), "1.3.1");
        assert_eq!(m.license, vec!["Zlib"]);
        assert!(m.implements(Implement::AutoSharedFpic));
        assert!(m.is_c_only());
        assert_eq!(m.dependency_defaults.len(), 1);
        assert!(r.has_hook(Hook::Requirements));
        assert!(r.has_hook(Hook::Validate));
        assert!(!r.has_hook(Hook::Source));
        assert!(!r.has_hook(Hook::PackageId));
    }

    #[test]
    fn test_requirements_follow_conditions() {
        let r = recipe();
        let mut cx = fixtures::instance_of(&r, fixtures::linux_settings());
        (r.hook(Hook::Requirements).unwrap())(&mut cx).unwrap();
        assert_eq!(cx.requirements.len(), 2);
        assert_eq!(cx.requirements[0].transitive_headers, Some(true));

        let mut cx = fixtures::instance_of(&r, fixtures::linux_settings());
        cx.options.set("bzip2", false).unwrap();
        (r.hook(Hook::Requirements).unwrap())(&mut cx).unwrap();
        assert_eq!(cx.requirements.len(), 1);

        (r.hook(Hook::BuildRequirements).unwrap())(&mut cx).unwrap();
        assert_eq!(cx.requirements[1].kind, RequirementKind::Tool);
    }

    #[test]
    fn test_invalid_rule() {
        let r = recipe();
        let validate = r.hook(Hook::Validate).unwrap();
        let mut cx = fixtures::instance_of(&r, fixtures::windows_settings());
        assert!(validate(&mut cx).is_ok());
        cx.options.set("shared", true).unwrap();
        let err = validate(&mut cx).unwrap_err();
        let invalid = as_invalid_configuration(&err).unwrap();
        assert!(invalid.reason.contains("not supported on Windows"));
    }

    #[test]
    fn test_package_info_by_os() {
        let r = recipe();
        let mut cx = fixtures::instance_of(&r, fixtures::linux_settings());
        (r.hook(Hook::PackageInfo).unwrap())(&mut cx).unwrap();
        assert_eq!(cx.cpp_info.root.libs, vec!["minizip"]);
        assert_eq!(cx.cpp_info.root.system_libs, vec!["m"]);
        assert_eq!(cx.cpp_info.root.property_text("cmake_file_name"), Some("minizip"));

        let mut cx = fixtures::instance_of(&r, fixtures::windows_settings());
        (r.hook(Hook::PackageInfo).unwrap())(&mut cx).unwrap();
        assert!(cx.cpp_info.root.system_libs.is_empty());
    }

    #[test]
    fn test_header_library_clears_id() {
        let text = r#"
[package]
name = "mdspan"
version = "0.6.0"
package_type = "header-library"

[[package.copy]]
pattern = "*.hpp"
src = "include"
dst = "include"
"#;
        let r = parse_recipe(text, None, None).unwrap();
        assert!(r.has_hook(Hook::PackageId));
        let mut cx = fixtures::instance_of(&r, fixtures::linux_settings());
        cx.info.settings = fixtures::linux_settings();
        (r.hook(Hook::PackageId).unwrap())(&mut cx).unwrap();
        assert!(cx.info.render().is_empty());

        (r.hook(Hook::PackageInfo).unwrap())(&mut cx).unwrap();
        assert!(cx.cpp_info.root.libdirs.is_empty());
        assert_eq!(cx.cpp_info.root.includedirs, vec!["include"]);
    }

    #[test]
    fn test_option_without_default() {
        let text = "[package]\nname = \"x\"\n[options]\nbackend = [\"c\", \"pico\"]\n";
        let err = parse_recipe(text, None, None).unwrap_err();
        assert!(err.to_string().contains("needs a value in [default_options]"));
    }

    #[test]
    fn test_bad_default_rejected() {
        let text = "[package]\nname = \"x\"\n[options]\nbackend = [\"c\", \"pico\"]\n[default_options]\nbackend = \"tcp\"\n";
        let err = parse_recipe(text, None, None).unwrap_err();
        assert!(format!("{:#}", err).contains("invalid value `tcp` for option `backend`"));
    }
}
