//! `AutotoolsDeps`: dependency flags exported as `CPPFLAGS`, `LDFLAGS`
//! and `LIBS`.

use std::path::PathBuf;

use anyhow::Result;

use crate::core::env_info::Environment;
use crate::core::instance::Instance;
use crate::tools::platform::is_msvc;

pub const DEPS_SCRIPT: &str = "conanautotoolsdeps";

#[derive(Debug, Clone)]
pub struct AutotoolsDeps {
    env: Environment,
}

impl AutotoolsDeps {
    pub fn new(cx: &Instance) -> Self {
        let msvc = is_msvc(cx);
        let mut env = Environment::new();
        for dep in cx.dependencies.host() {
            let info = dep.cpp_info.aggregated();
            if dep.traits.headers {
                for dir in info.include_paths(&dep.package_folder) {
                    env.append("CPPFLAGS", format!("-I{}", dir.display()));
                }
                for define in &info.defines {
                    env.append("CPPFLAGS", format!("-D{}", define));
                }
                for flag in info.cflags.iter() {
                    env.append("CFLAGS", flag.clone());
                }
                for flag in info.cxxflags.iter() {
                    env.append("CXXFLAGS", flag.clone());
                }
            }
            if dep.traits.libs {
                for dir in info.lib_paths(&dep.package_folder) {
                    let flag = if msvc { "-LIBPATH:" } else { "-L" };
                    env.append("LDFLAGS", format!("{}{}", flag, dir.display()));
                }
                for flag in &info.linkflags {
                    env.append("LDFLAGS", flag.clone());
                }
                for framework in &info.frameworks {
                    env.append("LDFLAGS", format!("-framework {}", framework));
                }
                for lib in info.libs.iter().chain(&info.system_libs) {
                    let flag = if msvc {
                        format!("{}.lib", lib)
                    } else {
                        format!("-l{}", lib)
                    };
                    env.append("LIBS", flag);
                }
            }
        }
        AutotoolsDeps { env }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn generate(&self, cx: &mut Instance) -> Result<PathBuf> {
        let script = self.env.save_script(&cx.generators_folder(), DEPS_SCRIPT)?;
        cx.register_env("build", self.env.clone());
        tracing::info!("{}: generated {}", cx.reference, script.display());
        Ok(script)
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
    fn test_flags_respect_traits() {
        let tmp = TempDir::new().unwrap();
        let mut cx = fixtures::sandboxed(tmp.path(), "app", "1.0", fixtures::linux_settings());
        let mut zlib = fixtures::dependency("zlib", "1.3.1", PackageType::StaticLibrary);
        zlib.cpp_info.root.libs = vec!["z".into()];
        let mut hidden = fixtures::dependency("openssl", "3.2.0", PackageType::StaticLibrary);
        hidden.cpp_info.root.libs = vec!["ssl".into()];
        hidden.traits.libs = false;
        cx.dependencies = Dependencies::new(vec![zlib, hidden]);

        let deps = AutotoolsDeps::new(&cx);
        let env = deps.environment();
        assert_eq!(env.value("LIBS").as_deref(), Some("-lz"));
        assert!(env.value("CPPFLAGS").unwrap().contains("openssl"));
        assert!(!env.value("LDFLAGS").unwrap().contains("openssl"));

        deps.generate(&mut cx).unwrap();
        assert!(cx.env("build").is_some());
    }
}
