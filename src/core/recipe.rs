//! The recipe model: metadata plus a dispatch table of hooks.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::conandata::ConanData;
use crate::core::errors::RecipeError;
use crate::core::hooks::Hook;
use crate::core::instance::Instance;
use crate::core::options::{DependencyOption, OptionDomain, OptionValue, Options};
use crate::core::reference::RefPattern;
use crate::core::version::Version;

/// A hook implementation. Receives the instance being built.
pub type HookFn = Arc<dyn Fn(&mut Instance) -> Result<()> + Send + Sync>;

/// What kind of artifact a package produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageType {
    Application,
    /// Static or shared, decided by the `shared` option.
    Library,
    SharedLibrary,
    StaticLibrary,
    HeaderLibrary,
    #[default]
    Unknown,
}

impl PackageType {
    /// Resolve `library`/`unknown` to a concrete type using the options.
    pub fn resolve(self, options: &Options) -> PackageType {
        match self {
            PackageType::Library | PackageType::Unknown => {
                if options.is_true("header_only") {
                    PackageType::HeaderLibrary
                } else if options.is_true("shared") {
                    PackageType::SharedLibrary
                } else if options.contains("shared") || self == PackageType::Library {
                    PackageType::StaticLibrary
                } else {
                    PackageType::Unknown
                }
            }
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PackageType::Application => "application",
            PackageType::Library => "library",
            PackageType::SharedLibrary => "shared-library",
            PackageType::StaticLibrary => "static-library",
            PackageType::HeaderLibrary => "header-library",
            PackageType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "application" => PackageType::Application,
            "library" => PackageType::Library,
            "shared-library" => PackageType::SharedLibrary,
            "static-library" => PackageType::StaticLibrary,
            "header-library" => PackageType::HeaderLibrary,
            "unknown" => PackageType::Unknown,
            other => bail!("unknown package type `{}`", other),
        })
    }
}

/// Canned behaviors the engine synthesizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Implement {
    /// Remove `fPIC` when `shared`; remove both on Windows.
    AutoSharedFpic,
    /// Clear the package id for header-only configurations.
    AutoHeaderOnly,
}

/// Language toolchains a recipe needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    C,
    #[serde(rename = "C++")]
    Cpp,
}

/// Declarative attributes of a recipe.
#[derive(Debug, Clone, Default)]
pub struct RecipeMetadata {
    pub name: String,
    pub version: Option<Version>,
    pub license: Vec<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub homepage: Option<String>,
    pub topics: Vec<String>,
    pub package_type: PackageType,
    /// Root setting keys the binary depends on.
    pub settings: Vec<String>,
    pub options: IndexMap<String, OptionDomain>,
    pub default_options: IndexMap<String, OptionValue>,
    /// `"pattern:option"` defaults pushed onto dependencies.
    pub dependency_defaults: Vec<DependencyOption>,
    pub languages: Vec<Language>,
    pub implements: Vec<Implement>,
    /// Names of helper modules this recipe imports.
    pub python_requires: Vec<String>,
    /// Recipe files copied into the export folder.
    pub exports: Vec<String>,
    /// Files copied into the export sources folder.
    pub exports_sources: Vec<String>,
}

impl RecipeMetadata {
    pub fn implements(&self, what: Implement) -> bool {
        self.implements.contains(&what)
    }

    /// Whether the recipe only needs a C toolchain.
    pub fn is_c_only(&self) -> bool {
        !self.languages.is_empty() && !self.languages.contains(&Language::Cpp)
    }

    /// Build the initial option set from declarations and defaults.
    pub fn initial_options(&self) -> Result<Options, RecipeError> {
        let mut options = Options::new();
        for (name, domain) in &self.options {
            let default = self
                .default_options
                .get(name)
                .cloned()
                .unwrap_or(OptionValue::None);
            options.declare(name, domain.clone(), default);
        }
        for name in self.default_options.keys() {
            if !self.options.contains_key(name) {
                return Err(RecipeError::UnknownOption {
                    option: name.clone(),
                });
            }
        }
        options.validate_assigned()?;
        Ok(options)
    }
}

/// A recipe: metadata, hook table, and where it was loaded from.
#[derive(Clone)]
pub struct Recipe {
    pub metadata: Arc<RecipeMetadata>,
    hooks: HashMap<Hook, HookFn>,
    pub recipe_folder: Option<PathBuf>,
    pub conan_data: Option<Arc<ConanData>>,
}

impl Recipe {
    pub fn builder(name: &str) -> RecipeBuilder {
        RecipeBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn version(&self) -> Option<&Version> {
        self.metadata.version.as_ref()
    }

    pub fn has_hook(&self, hook: Hook) -> bool {
        self.hooks.contains_key(&hook)
    }

    pub fn hook(&self, hook: Hook) -> Option<&HookFn> {
        self.hooks.get(&hook)
    }

    /// Hooks defined by this recipe, in lifecycle order.
    pub fn defined_hooks(&self) -> Vec<Hook> {
        Hook::ORDER
            .iter()
            .copied()
            .filter(|h| self.has_hook(*h))
            .collect()
    }

    /// Set the version when it is supplied externally.
    pub fn with_version(mut self, version: Version) -> Self {
        let mut metadata = (*self.metadata).clone();
        metadata.version = Some(version);
        self.metadata = Arc::new(metadata);
        self
    }
}

impl fmt::Debug for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recipe")
            .field("name", &self.metadata.name)
            .field("version", &self.metadata.version)
            .field("hooks", &self.defined_hooks())
            .finish()
    }
}

/// Builder for programmatic recipes.
pub struct RecipeBuilder {
    metadata: RecipeMetadata,
    hooks: HashMap<Hook, HookFn>,
    recipe_folder: Option<PathBuf>,
    conan_data: Option<ConanData>,
    errors: Vec<String>,
}

impl RecipeBuilder {
    pub fn new(name: &str) -> Self {
        RecipeBuilder {
            metadata: RecipeMetadata {
                name: name.to_string(),
                ..RecipeMetadata::default()
            },
            hooks: HashMap::new(),
            recipe_folder: None,
            conan_data: None,
            errors: Vec::new(),
        }
    }

    pub fn version(mut self, version: &str) -> Self {
        self.metadata.version = Some(Version::new(version));
        self
    }

    pub fn license(mut self, license: &str) -> Self {
        self.metadata.license.push(license.to_string());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.metadata.description = Some(description.to_string());
        self
    }

    pub fn url(mut self, url: &str) -> Self {
        self.metadata.url = Some(url.to_string());
        self
    }

    pub fn homepage(mut self, homepage: &str) -> Self {
        self.metadata.homepage = Some(homepage.to_string());
        self
    }

    pub fn topics<I: IntoIterator<Item = S>, S: Into<String>>(mut self, topics: I) -> Self {
        self.metadata.topics.extend(topics.into_iter().map(Into::into));
        self
    }

    pub fn package_type(mut self, package_type: PackageType) -> Self {
        self.metadata.package_type = package_type;
        self
    }

    pub fn settings<I: IntoIterator<Item = S>, S: Into<String>>(mut self, settings: I) -> Self {
        self.metadata.settings.extend(settings.into_iter().map(Into::into));
        self
    }

    /// Declare an option with its domain and default value.
    pub fn option(mut self, name: &str, domain: OptionDomain, default: impl Into<OptionValue>) -> Self {
        self.metadata.options.insert(name.to_string(), domain);
        self.metadata
            .default_options
            .insert(name.to_string(), default.into());
        self
    }

    /// Declare the usual `shared`/`fPIC` pair.
    pub fn shared_fpic_options(self) -> Self {
        self.option("shared", OptionDomain::boolean(), false)
            .option("fPIC", OptionDomain::boolean(), true)
    }

    /// Add a default option. `"pattern:name"` keys target dependencies.
    pub fn default_option(mut self, key: &str, value: impl Into<OptionValue>) -> Self {
        match key.rsplit_once(':') {
            Some((pattern, name)) => match RefPattern::new(pattern) {
                Ok(pattern) => self.metadata.dependency_defaults.push(DependencyOption {
                    pattern,
                    name: name.to_string(),
                    value: value.into(),
                }),
                Err(e) => self.errors.push(e.to_string()),
            },
            None => {
                self.metadata
                    .default_options
                    .insert(key.to_string(), value.into());
            }
        }
        self
    }

    pub fn languages<I: IntoIterator<Item = Language>>(mut self, languages: I) -> Self {
        self.metadata.languages.extend(languages);
        self
    }

    pub fn implements<I: IntoIterator<Item = Implement>>(mut self, implements: I) -> Self {
        self.metadata.implements.extend(implements);
        self
    }

    /// Import a helper module (`"cuda"` or `"cuda/latest"`).
    pub fn python_requires(mut self, reference: &str) -> Self {
        let name = reference.split('/').next().unwrap_or(reference);
        self.metadata.python_requires.push(name.to_string());
        self
    }

    pub fn exports<I: IntoIterator<Item = S>, S: Into<String>>(mut self, patterns: I) -> Self {
        self.metadata.exports.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn exports_sources<I: IntoIterator<Item = S>, S: Into<String>>(mut self, patterns: I) -> Self {
        self.metadata
            .exports_sources
            .extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn recipe_folder(mut self, folder: impl AsRef<Path>) -> Self {
        self.recipe_folder = Some(folder.as_ref().to_path_buf());
        self
    }

    pub fn conan_data(mut self, data: ConanData) -> Self {
        self.conan_data = Some(data);
        self
    }

    /// Define a hook.
    pub fn hook<F>(mut self, hook: Hook, f: F) -> Self
    where
        F: Fn(&mut Instance) -> Result<()> + Send + Sync + 'static,
    {
        self.hooks.insert(hook, Arc::new(f));
        self
    }

    /// Finish the recipe, checking default options against their domains.
    pub fn build(self) -> Result<Recipe> {
        if let Some(err) = self.errors.first() {
            bail!("invalid recipe `{}`: {}", self.metadata.name, err);
        }
        self.metadata.initial_options().map_err(|e| {
            anyhow::Error::new(e).context(format!(
                "invalid default_options in recipe `{}`",
                self.metadata.name
            ))
        })?;
        Ok(Recipe {
            metadata: Arc::new(self.metadata),
            hooks: self.hooks,
            recipe_folder: self.recipe_folder,
            conan_data: self.conan_data.map(Arc::new),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_type_resolution() {
        let mut opts = Options::new();
        opts.declare("shared", OptionDomain::boolean(), true.into());
        assert_eq!(PackageType::Library.resolve(&opts), PackageType::SharedLibrary);
        opts.set("shared", false).unwrap();
        assert_eq!(PackageType::Library.resolve(&opts), PackageType::StaticLibrary);
        assert_eq!(PackageType::Unknown.resolve(&Options::new()), PackageType::Unknown);
        assert_eq!(
            PackageType::HeaderLibrary.resolve(&opts),
            PackageType::HeaderLibrary
        );
    }

    #[test]
    fn test_builder_rejects_bad_default() {
        let err = Recipe::builder("foo")
            .option("backend", OptionDomain::values(["c", "pico"]), "tcp")
            .build()
            .unwrap_err();
        assert!(format!("{:#}", err).contains("invalid value `tcp` for option `backend`"));
    }

    #[test]
    fn test_builder_dependency_defaults() {
        let recipe = Recipe::builder("foo")
            .version("1.0")
            .default_option("boost/*:with_system", true)
            .hook(Hook::Build, |_| Ok(()))
            .build()
            .unwrap();
        assert_eq!(recipe.metadata.dependency_defaults.len(), 1);
        assert!(recipe.has_hook(Hook::Build));
        assert_eq!(recipe.defined_hooks(), vec![Hook::Build]);
    }

    #[test]
    fn test_c_only() {
        let meta = RecipeMetadata {
            languages: vec![Language::C],
            ..RecipeMetadata::default()
        };
        assert!(meta.is_c_only());
        assert!(!RecipeMetadata::default().is_c_only());
    }

    #[test]
    fn test_package_type_parse() {
        assert_eq!(
            "header-library".parse::<PackageType>().unwrap(),
            PackageType::HeaderLibrary
        );
        assert!("plugin".parse::<PackageType>().is_err());
    }
}
