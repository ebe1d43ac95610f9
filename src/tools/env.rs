//! `VirtualBuildEnv` and `VirtualRunEnv`: dependency environments
//! serialized into activation scripts.

use std::path::PathBuf;

use anyhow::Result;

use crate::core::env_info::Environment;
use crate::core::instance::{Dependency, Instance};
use crate::core::recipe::PackageType;

fn library_path_var(os: Option<&str>) -> Option<&'static str> {
    match os {
        Some("Windows") => None,
        Some("Macos") | Some("iOS") | Some("watchOS") | Some("tvOS") => Some("DYLD_LIBRARY_PATH"),
        _ => Some("LD_LIBRARY_PATH"),
    }
}

/// Runtime paths of a dependency: `PATH` for executables, plus the library
/// search path for shared libraries.
fn runtime_paths(dep: &Dependency, os: Option<&str>) -> Environment {
    let mut env = Environment::new();
    let info = dep.cpp_info.aggregated();
    for bin in info.bin_paths(&dep.package_folder) {
        env.prepend_path("PATH", bin);
    }
    if dep.package_type == PackageType::SharedLibrary {
        if let Some(var) = library_path_var(os) {
            for lib in info.lib_paths(&dep.package_folder) {
                env.prepend_path(var, lib);
            }
        }
    }
    env
}

/// Environment for `build()`: tool dependencies' run and build info and
/// host dependencies' build info.
#[derive(Debug, Clone)]
pub struct VirtualBuildEnv {
    env: Environment,
}

impl VirtualBuildEnv {
    pub fn new(cx: &Instance) -> Self {
        let mut env = Environment::new();
        let build_os = cx.settings_build.os();
        for dep in cx.dependencies.build() {
            env.compose(&dep.buildenv_info);
            env.compose(&dep.runenv_info);
            env.compose(&runtime_paths(dep, build_os));
        }
        for dep in cx.dependencies.host() {
            env.compose(&dep.buildenv_info);
        }
        VirtualBuildEnv { env }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Write `conanbuildenv` and make it the `build` scope.
    pub fn generate(&self, cx: &mut Instance) -> Result<PathBuf> {
        let script = self.env.save_script(&cx.generators_folder(), "conanbuildenv")?;
        cx.register_env("build", self.env.clone());
        tracing::info!("{}: generated {}", cx.reference, script.display());
        Ok(script)
    }
}

/// Environment to run the package's host binaries: host dependencies with
/// the `run` trait.
#[derive(Debug, Clone)]
pub struct VirtualRunEnv {
    env: Environment,
}

impl VirtualRunEnv {
    pub fn new(cx: &Instance) -> Self {
        let mut env = Environment::new();
        let os = cx.settings.os();
        for dep in cx.dependencies.host().filter(|d| d.traits.run) {
            env.compose(&dep.runenv_info);
            env.compose(&runtime_paths(dep, os));
        }
        VirtualRunEnv { env }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Write `conanrunenv` and make it the `run` scope.
    pub fn generate(&self, cx: &mut Instance) -> Result<PathBuf> {
        let script = self.env.save_script(&cx.generators_folder(), "conanrunenv")?;
        cx.register_env("run", self.env.clone());
        tracing::info!("{}: generated {}", cx.reference, script.display());
        Ok(script)
    }
}
