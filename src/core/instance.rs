//! A recipe bound to one configuration: the `self` every hook receives.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;

use crate::core::conandata::ConanData;
use crate::core::conf::Conf;
use crate::core::cpp_info::CppInfo;
use crate::core::env_info::Environment;
use crate::core::hooks::Hook;
use crate::core::modules::{lookup_module, PythonRequire};
use crate::core::options::Options;
use crate::core::package_info::BinaryInfo;
use crate::core::recipe::{PackageType, RecipeMetadata};
use crate::core::reference::{RecipeRef, ResolvedRef};
use crate::core::requirement::{EdgeTraits, Requirement, RequirementKind};
use crate::core::settings::Settings;
use crate::core::version::Version;
use crate::util::process::{ProcessBuilder, StreamedOutput};

/// The sandbox folders of one instance.
///
/// `source`, `build` and `generators` are subfolders chosen by `layout()`;
/// the absolute folders are derived from the sandbox bases.
#[derive(Debug, Clone, Default)]
pub struct Folders {
    pub recipe: Option<PathBuf>,
    pub export_sources: PathBuf,
    pub base_source: PathBuf,
    pub base_build: PathBuf,
    pub package: PathBuf,
    pub source: String,
    pub build: String,
    pub generators: String,
}

impl Folders {
    /// Folders for a sandbox rooted at `root`.
    pub fn sandbox(root: &Path) -> Self {
        Folders {
            recipe: None,
            export_sources: root.join("es"),
            base_source: root.join("s"),
            base_build: root.join("b"),
            package: root.join("p"),
            source: String::new(),
            build: String::new(),
            generators: String::new(),
        }
    }

    fn join(base: &Path, sub: &str) -> PathBuf {
        if sub.is_empty() || sub == "." {
            base.to_path_buf()
        } else {
            base.join(sub)
        }
    }

    pub fn source_folder(&self) -> PathBuf {
        Self::join(&self.base_source, &self.source)
    }

    pub fn build_folder(&self) -> PathBuf {
        Self::join(&self.base_build, &self.build)
    }

    pub fn generators_folder(&self) -> PathBuf {
        Self::join(&self.base_build, &self.generators)
    }
}

/// A resolved dependency as seen by a consumer.
#[derive(Debug, Clone)]
pub struct Dependency {
    pub reference: ResolvedRef,
    pub package_type: PackageType,
    pub package_id: Option<String>,
    pub package_folder: PathBuf,
    pub options: Options,
    pub settings: Settings,
    pub cpp_info: CppInfo,
    pub buildenv_info: Environment,
    pub runenv_info: Environment,
    pub conf_info: Conf,
    /// Effective traits from the consumer to this dependency.
    pub traits: EdgeTraits,
    /// Declared directly by the consumer.
    pub direct: bool,
    /// Names of this dependency's own host requirements.
    pub requires: Vec<String>,
}

impl Dependency {
    pub fn name(&self) -> &str {
        &self.reference.name
    }

    pub fn version(&self) -> &Version {
        &self.reference.version
    }

    /// Whether this is a build-context (tool) dependency.
    pub fn is_build(&self) -> bool {
        self.traits.build
    }
}

/// All dependencies of an instance, direct and transitive.
#[derive(Debug, Clone, Default)]
pub struct Dependencies {
    items: Vec<Dependency>,
}

impl Dependencies {
    pub fn new(items: Vec<Dependency>) -> Self {
        Dependencies { items }
    }

    /// Host dependency by name, falling back to a tool dependency.
    pub fn get(&self, name: &str) -> Result<&Dependency> {
        self.host()
            .find(|d| d.name() == name)
            .or_else(|| self.items.iter().find(|d| d.name() == name))
            .ok_or_else(|| anyhow!("`{}` is not a dependency", name))
    }

    /// Tool dependency by name.
    pub fn get_build(&self, name: &str) -> Result<&Dependency> {
        self.build()
            .find(|d| d.name() == name)
            .ok_or_else(|| anyhow!("`{}` is not a tool dependency", name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.iter().any(|d| d.name() == name)
    }

    pub fn host(&self) -> impl Iterator<Item = &Dependency> {
        self.items.iter().filter(|d| !d.is_build())
    }

    pub fn build(&self) -> impl Iterator<Item = &Dependency> {
        self.items.iter().filter(|d| d.is_build())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dependency> {
        self.items.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Host dependencies reachable from `name` through its requirements,
    /// excluding `name` itself.
    pub fn transitive_of(&self, name: &str) -> Vec<&Dependency> {
        let mut out: Vec<&Dependency> = Vec::new();
        let mut stack: Vec<&str> = match self.host().find(|d| d.name() == name) {
            Some(d) => d.requires.iter().map(String::as_str).collect(),
            None => return out,
        };
        while let Some(next) = stack.pop() {
            if next == name || out.iter().any(|d| d.name() == next) {
                continue;
            }
            if let Some(dep) = self.host().find(|d| d.name() == next) {
                stack.extend(dep.requires.iter().map(String::as_str));
                out.push(dep);
            }
        }
        out
    }

    /// Component names per dependency, used to check `dep::comp` references.
    pub fn component_names(&self) -> BTreeMap<String, Vec<String>> {
        self.host()
            .map(|d| {
                (
                    d.name().to_string(),
                    d.cpp_info.components.keys().cloned().collect(),
                )
            })
            .collect()
    }
}

/// A recipe materialized for one configuration.
#[derive(Debug, Clone)]
pub struct Instance {
    pub reference: ResolvedRef,
    pub metadata: Arc<RecipeMetadata>,
    /// Concrete package type, resolved after `configure()`.
    pub package_type: PackageType,
    /// Host settings.
    pub settings: Settings,
    /// Build-machine settings; equal to `settings` when not cross-building.
    pub settings_build: Settings,
    pub options: Options,
    pub conf: Conf,
    /// Configuration published to consumers.
    pub conf_info: Conf,
    pub folders: Folders,
    pub dependencies: Dependencies,
    pub requirements: Vec<Requirement>,
    pub cpp_info: CppInfo,
    pub buildenv_info: Environment,
    pub runenv_info: Environment,
    /// Identity view handed to `package_id()`.
    pub info: BinaryInfo,
    pub conan_data: Option<Arc<ConanData>>,
    /// Hooks invoked so far, in order.
    pub trace: Vec<Hook>,
    /// Base folder relative paths resolve against.
    pub cwd: PathBuf,
    pub(crate) current_hook: Option<Hook>,
    envs: IndexMap<String, Environment>,
}

impl Instance {
    pub fn new(
        reference: ResolvedRef,
        metadata: Arc<RecipeMetadata>,
        settings: Settings,
        settings_build: Settings,
        options: Options,
        conf: Conf,
    ) -> Self {
        let package_type = metadata.package_type;
        Instance {
            reference,
            metadata,
            package_type,
            settings,
            settings_build,
            options,
            conf,
            conf_info: Conf::new(),
            folders: Folders::default(),
            dependencies: Dependencies::default(),
            requirements: Vec::new(),
            cpp_info: CppInfo::new(),
            buildenv_info: Environment::new(),
            runenv_info: Environment::new(),
            info: BinaryInfo::default(),
            conan_data: None,
            trace: Vec::new(),
            cwd: PathBuf::from("."),
            current_hook: None,
            envs: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.reference.name
    }

    pub fn version(&self) -> &Version {
        &self.reference.version
    }

    /// The hook currently executing, if any.
    pub fn current_hook(&self) -> Option<Hook> {
        self.current_hook
    }

    pub fn recipe_folder(&self) -> Option<&Path> {
        self.folders.recipe.as_deref()
    }

    pub fn export_sources_folder(&self) -> &Path {
        &self.folders.export_sources
    }

    pub fn source_folder(&self) -> PathBuf {
        self.folders.source_folder()
    }

    pub fn build_folder(&self) -> PathBuf {
        self.folders.build_folder()
    }

    pub fn generators_folder(&self) -> PathBuf {
        self.folders.generators_folder()
    }

    pub fn package_folder(&self) -> &Path {
        &self.folders.package
    }

    /// Resolve a path against the current working folder.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }

    fn add_requirement(&mut self, reference: &str, kind: RequirementKind) -> Result<&mut Requirement> {
        if let Some(hook) = self.current_hook {
            let allowed = match kind {
                RequirementKind::Host => hook == Hook::Requirements,
                RequirementKind::Tool | RequirementKind::Test => {
                    matches!(hook, Hook::Requirements | Hook::BuildRequirements)
                }
            };
            if !allowed {
                bail!("`{}` can't declare {} in {}()", self.reference, kind, hook);
            }
        }
        let parsed: RecipeRef = reference
            .parse()
            .with_context(|| format!("invalid requirement in `{}`", self.reference))?;
        self.requirements.push(Requirement::new(parsed, kind));
        let last = self.requirements.len() - 1;
        Ok(&mut self.requirements[last])
    }

    /// Declare a host requirement.
    pub fn requires(&mut self, reference: &str) -> Result<&mut Requirement> {
        self.add_requirement(reference, RequirementKind::Host)
    }

    /// Declare a build-machine tool requirement.
    pub fn tool_requires(&mut self, reference: &str) -> Result<&mut Requirement> {
        self.add_requirement(reference, RequirementKind::Tool)
    }

    /// Declare a test-only requirement.
    pub fn test_requires(&mut self, reference: &str) -> Result<&mut Requirement> {
        self.add_requirement(reference, RequirementKind::Test)
    }

    /// Bind a helper module declared in `python_requires`.
    pub fn python_requires(&self, name: &str) -> Result<PythonRequire> {
        if !self.metadata.python_requires.iter().any(|n| n == name) {
            bail!(
                "`{}` does not declare python_requires `{}`",
                self.reference,
                name
            );
        }
        let module = lookup_module(name)
            .ok_or_else(|| anyhow!("helper module `{}` is not available", name))?;
        Ok(PythonRequire::new(module))
    }

    /// The recipe's `conandata.yml`.
    pub fn conan_data(&self) -> Result<&ConanData> {
        self.conan_data
            .as_deref()
            .ok_or_else(|| anyhow!("`{}` has no conandata.yml", self.reference))
    }

    /// Register an environment under a scope (`build` or `run`).
    ///
    /// A later registration takes precedence over earlier ones.
    pub fn register_env(&mut self, scope: &str, env: Environment) {
        let mut merged = env;
        if let Some(existing) = self.envs.get(scope) {
            merged.compose(existing);
        }
        self.envs.insert(scope.to_string(), merged);
    }

    /// The environment registered under `scope`.
    pub fn env(&self, scope: &str) -> Option<&Environment> {
        self.envs.get(scope)
    }

    /// Run a shell command in the current folder with the build environment.
    pub fn run(&self, command: &str) -> Result<StreamedOutput> {
        self.run_with(command, None, Some("build"))
    }

    /// Run a shell command in `cwd` with the build environment.
    pub fn run_in(&self, command: &str, cwd: impl AsRef<Path>) -> Result<StreamedOutput> {
        let cwd = self.resolve(cwd);
        self.run_with(command, Some(&cwd), Some("build"))
    }

    /// Run a shell command.
    ///
    /// `env` selects a registered environment scope; `None` runs with the
    /// plain process environment. Output is streamed to the log and a
    /// non-zero exit code is an error.
    pub fn run_with(
        &self,
        command: &str,
        cwd: Option<&Path>,
        env: Option<&str>,
    ) -> Result<StreamedOutput> {
        let cwd = cwd.map(Path::to_path_buf).unwrap_or_else(|| self.cwd.clone());
        let mut process = ProcessBuilder::shell(command).cwd(&cwd);
        if let Some(env) = env.and_then(|scope| self.envs.get(scope)) {
            for (name, value) in env.vars() {
                process = match value {
                    Some(value) => process.env(name, value),
                    None => process.env_remove(name),
                };
            }
        }
        process
            .exec_streaming_and_check(&self.reference.to_string())
            .with_context(|| format!("command failed in `{}`", self.reference))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixtures;

    #[test]
    fn test_folders_layout() {
        let mut folders = Folders::sandbox(Path::new("/sb"));
        assert_eq!(folders.source_folder(), PathBuf::from("/sb/s"));
        folders.source = "src".into();
        folders.build = "build/Release".into();
        folders.generators = "build/Release/generators".into();
        assert_eq!(folders.source_folder(), PathBuf::from("/sb/s/src"));
        assert_eq!(folders.build_folder(), PathBuf::from("/sb/b/build/Release"));
        assert_eq!(
            folders.generators_folder(),
            PathBuf::from("/sb/b/build/Release/generators")
        );
    }

    #[test]
    fn test_requires_only_in_requirements_hook() {
        let mut cx = fixtures::instance("foo", "1.0", fixtures::linux_settings());
        cx.current_hook = Some(Hook::Requirements);
        cx.requires("zlib/[>=1.2 <2]").unwrap().transitive_headers(true);
        assert_eq!(cx.requirements.len(), 1);
        assert_eq!(cx.requirements[0].transitive_headers, Some(true));

        cx.current_hook = Some(Hook::Build);
        assert!(cx.requires("bzip2/1.0.8").is_err());
    }

    #[test]
    fn test_tool_requires_in_build_requirements() {
        let mut cx = fixtures::instance("foo", "1.0", fixtures::linux_settings());
        cx.current_hook = Some(Hook::BuildRequirements);
        cx.tool_requires("cmake/[>=3.16]").unwrap();
        assert!(cx.requires("zlib/1.3.1").is_err());
    }

    #[test]
    fn test_python_requires_must_be_declared() {
        let cx = fixtures::instance("foo", "1.0", fixtures::linux_settings());
        assert!(cx.python_requires("cuda").is_err());
    }

    #[test]
    fn test_register_env_later_wins() {
        let mut cx = fixtures::instance("foo", "1.0", fixtures::linux_settings());
        let mut first = Environment::new();
        first.define("CC", "gcc").define("AR", "ar");
        let mut second = Environment::new();
        second.define("CC", "clang");
        cx.register_env("build", first);
        cx.register_env("build", second);
        let env = cx.env("build").unwrap();
        assert_eq!(env.value("CC").as_deref(), Some("clang"));
        assert_eq!(env.value("AR").as_deref(), Some("ar"));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_uses_build_env() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut cx = fixtures::instance("foo", "1.0", fixtures::linux_settings());
        cx.cwd = tmp.path().to_path_buf();
        let mut env = Environment::new();
        env.define("PANTRY_GREETING", "hello");
        cx.register_env("build", env);

        let out = cx.run("echo $PANTRY_GREETING").unwrap();
        assert_eq!(out.stdout.trim(), "hello");
        assert!(cx.run("exit 3").is_err());
    }
}
