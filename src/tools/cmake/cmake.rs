//! `CMake` build helper driven by the generated presets.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;

use crate::core::instance::Instance;
use crate::tools::build::build_jobs;
use crate::tools::cmake::toolchain::{PRESETS_FILE, TOOLCHAIN_FILE};
use crate::util::fs::{forward_slashes, read_to_string};

#[derive(Debug, Deserialize)]
struct Presets {
    #[serde(rename = "configurePresets", default)]
    configure_presets: Vec<ConfigurePreset>,
}

#[derive(Debug, Deserialize)]
struct ConfigurePreset {
    generator: Option<String>,
    #[serde(rename = "cacheVariables", default)]
    cache_variables: IndexMap<String, String>,
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s)
}

fn is_multi_config(generator: Option<&str>) -> bool {
    generator.is_some_and(|g| g.contains("Visual Studio") || g.contains("Multi-Config") || g == "Xcode")
}

/// Runs `cmake` in the build folder with the toolchain from `generate()`.
#[derive(Debug, Clone)]
pub struct CMake {
    generator: Option<String>,
    cache_variables: IndexMap<String, String>,
    toolchain: PathBuf,
    build_type: Option<String>,
    jobs: usize,
}

impl CMake {
    pub fn new(cx: &Instance) -> Result<Self> {
        let generators = cx.generators_folder();
        let presets_path = generators.join(PRESETS_FILE);
        let (generator, cache_variables) = if presets_path.is_file() {
            let text = read_to_string(&presets_path)?;
            let presets: Presets = serde_json::from_str(&text)
                .with_context(|| format!("invalid presets file {}", presets_path.display()))?;
            let first = presets.configure_presets.into_iter().next();
            match first {
                Some(p) => (p.generator, p.cache_variables),
                None => (None, IndexMap::new()),
            }
        } else {
            tracing::warn!(
                "{}: {} not found, run CMakeToolchain in generate()",
                cx.reference,
                presets_path.display()
            );
            (None, IndexMap::new())
        };
        Ok(CMake {
            generator,
            cache_variables,
            toolchain: generators.join(TOOLCHAIN_FILE),
            build_type: cx.settings.build_type().map(str::to_string),
            jobs: build_jobs(cx),
        })
    }

    fn config_arg(&self) -> String {
        match &self.build_type {
            Some(bt) if is_multi_config(self.generator.as_deref()) => format!(" --config {}", bt),
            _ => String::new(),
        }
    }

    /// The configure command line. `source_subfolder` is relative to the
    /// source folder.
    pub fn configure_command(
        &self,
        cx: &Instance,
        variables: &IndexMap<String, String>,
        source_subfolder: Option<&str>,
    ) -> String {
        let mut source = cx.source_folder();
        if let Some(sub) = source_subfolder {
            source = source.join(sub);
        }
        let mut cmd = String::from("cmake");
        if let Some(g) = &self.generator {
            cmd.push_str(&format!(" -G {}", quote(g)));
        }
        if self.toolchain.is_file() {
            cmd.push_str(&format!(
                " -DCMAKE_TOOLCHAIN_FILE={}",
                quote(&forward_slashes(&self.toolchain))
            ));
        }
        cmd.push_str(&format!(
            " -DCMAKE_INSTALL_PREFIX={}",
            quote(&forward_slashes(cx.package_folder()))
        ));
        for (k, v) in self.cache_variables.iter().chain(variables.iter()) {
            cmd.push_str(&format!(" -D{}={}", k, quote(v)));
        }
        cmd.push(' ');
        cmd.push_str(&quote(&forward_slashes(&source)));
        cmd
    }

    pub fn configure(&self, cx: &Instance) -> Result<()> {
        self.configure_with(cx, &IndexMap::new(), None)
    }

    pub fn configure_with(
        &self,
        cx: &Instance,
        variables: &IndexMap<String, String>,
        source_subfolder: Option<&str>,
    ) -> Result<()> {
        let build = cx.build_folder();
        std::fs::create_dir_all(&build)
            .with_context(|| format!("failed to create {}", build.display()))?;
        let cmd = self.configure_command(cx, variables, source_subfolder);
        cx.run_with(&cmd, Some(&build), Some("build"))?;
        Ok(())
    }

    pub fn build_command(&self, target: Option<&str>) -> String {
        let mut cmd = format!("cmake --build .{}", self.config_arg());
        if let Some(t) = target {
            cmd.push_str(&format!(" --target {}", t));
        }
        cmd.push_str(&format!(" --parallel {}", self.jobs));
        cmd
    }

    pub fn build(&self, cx: &Instance) -> Result<()> {
        self.build_target(cx, None)
    }

    pub fn build_target(&self, cx: &Instance, target: Option<&str>) -> Result<()> {
        cx.run_with(&self.build_command(target), Some(&cx.build_folder()), Some("build"))?;
        Ok(())
    }

    pub fn install_command(&self, package_folder: &Path) -> String {
        format!(
            "cmake --install .{} --prefix {}",
            self.config_arg(),
            quote(&forward_slashes(package_folder))
        )
    }

    /// Install into the package folder.
    pub fn install(&self, cx: &Instance) -> Result<()> {
        let cmd = self.install_command(cx.package_folder());
        cx.run_with(&cmd, Some(&cx.build_folder()), Some("build"))?;
        Ok(())
    }

    /// Run `ctest` unless tests are skipped through `tools.build:skip_test`.
    pub fn test(&self, cx: &Instance) -> Result<()> {
        if cx.conf.get_bool("tools.build:skip_test") {
            return Ok(());
        }
        let cmd = format!("ctest{} --output-on-failure", self.config_arg().replace("--config", "-C"));
        cx.run_with(&cmd, Some(&cx.build_folder()), Some("build"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::cmake::toolchain::CMakeToolchain;
    use crate::test_support::fixtures;
    use tempfile::TempDir;

    #[test]
    fn test_commands_follow_presets() {
        let tmp = TempDir::new().unwrap();
        let cx = fixtures::sandboxed(tmp.path(), "zlib", "1.3.1", fixtures::linux_settings());
        let mut tc = CMakeToolchain::new(&cx);
        tc.cache_variables.insert("ZLIB_BUILD_EXAMPLES".into(), false.into());
        tc.generate(&cx).unwrap();

        let cmake = CMake::new(&cx).unwrap();
        let cmd = cmake.configure_command(&cx, &IndexMap::new(), None);
        assert!(cmd.starts_with("cmake -G \"Unix Makefiles\""));
        assert!(cmd.contains("-DCMAKE_TOOLCHAIN_FILE="));
        assert!(cmd.contains("-DZLIB_BUILD_EXAMPLES=\"OFF\""));
        assert!(cmd.ends_with(&quote(&forward_slashes(&cx.source_folder()))));

        assert!(cmake.build_command(None).starts_with("cmake --build . --parallel"));
        assert!(!cmake.install_command(cx.package_folder()).contains("--config"));
    }

    #[test]
    fn test_multi_config_passes_config() {
        let tmp = TempDir::new().unwrap();
        let cx = fixtures::sandboxed(tmp.path(), "zlib", "1.3.1", fixtures::windows_settings());
        CMakeToolchain::new(&cx).generate(&cx).unwrap();
        let cmake = CMake::new(&cx).unwrap();
        assert!(cmake.build_command(Some("zlib")).contains("--config Release --target zlib"));
    }
}
