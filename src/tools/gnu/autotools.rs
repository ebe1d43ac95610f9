//! `Autotools` build helper: `configure`, `make`, `make install` and
//! `autoreconf` with the arguments written by `AutotoolsToolchain`.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::instance::Instance;
use crate::tools::build::build_jobs;
use crate::tools::gnu::autotools_toolchain::ARGS_FILE;
use crate::tools::platform::unix_path;
use crate::util::fs::read_to_string;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BuildArgs {
    configure_args: Vec<String>,
    make_args: Vec<String>,
    autoreconf_args: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Autotools {
    configure_args: Vec<String>,
    make_args: Vec<String>,
    autoreconf_args: Vec<String>,
    jobs: usize,
}

impl Autotools {
    pub fn new(cx: &Instance) -> Result<Self> {
        let path = cx.generators_folder().join(ARGS_FILE);
        let args = if path.is_file() {
            let text = read_to_string(&path)?;
            serde_json::from_str::<BuildArgs>(&text)
                .with_context(|| format!("invalid {}", path.display()))?
        } else {
            BuildArgs::default()
        };
        Ok(Autotools {
            configure_args: args.configure_args,
            make_args: args.make_args,
            autoreconf_args: args.autoreconf_args,
            jobs: build_jobs(cx),
        })
    }

    /// The `configure` invocation; `extra` is appended to the stored args.
    pub fn configure_command(&self, cx: &Instance, build_script_folder: Option<&Path>, extra: &[String]) -> String {
        let script_folder = build_script_folder
            .map(|p| cx.resolve(p))
            .unwrap_or_else(|| cx.source_folder());
        let script = unix_path(cx, &script_folder.join("configure"));
        let mut parts = vec![format!("\"{}\"", script)];
        parts.extend(self.configure_args.iter().map(|a| format!("'{}'", a)));
        parts.extend(extra.iter().cloned());
        parts.join(" ")
    }

    pub fn configure(&self, cx: &Instance) -> Result<()> {
        self.configure_with(cx, None, &[])
    }

    pub fn configure_with(&self, cx: &Instance, build_script_folder: Option<&Path>, extra: &[String]) -> Result<()> {
        let build = cx.build_folder();
        std::fs::create_dir_all(&build)
            .with_context(|| format!("failed to create {}", build.display()))?;
        let cmd = self.configure_command(cx, build_script_folder, extra);
        cx.run_with(&cmd, Some(&build), Some("build"))?;
        Ok(())
    }

    pub fn make_command(&self, target: Option<&str>, extra: &[String]) -> String {
        let mut parts = vec!["make".to_string()];
        if let Some(t) = target {
            parts.push(t.to_string());
        }
        parts.extend(self.make_args.iter().cloned());
        parts.extend(extra.iter().cloned());
        parts.push(format!("-j{}", self.jobs));
        parts.join(" ")
    }

    pub fn make(&self, cx: &Instance) -> Result<()> {
        self.make_target(cx, None, &[])
    }

    pub fn make_target(&self, cx: &Instance, target: Option<&str>, extra: &[String]) -> Result<()> {
        cx.run_with(&self.make_command(target, extra), Some(&cx.build_folder()), Some("build"))?;
        Ok(())
    }

    /// `make install` with `DESTDIR` set to the package folder.
    pub fn install(&self, cx: &Instance) -> Result<()> {
        let destdir = format!("DESTDIR={}", unix_path(cx, cx.package_folder()));
        self.make_target(cx, Some("install"), &[destdir])
    }

    pub fn autoreconf(&self, cx: &Instance) -> Result<()> {
        let mut parts = vec!["autoreconf".to_string()];
        parts.extend(self.autoreconf_args.iter().cloned());
        cx.run_with(&parts.join(" "), Some(&cx.source_folder()), Some("build"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::gnu::AutotoolsToolchain;
    use crate::core::conf::keys;
    use crate::test_support::fixtures;
    use tempfile::TempDir;

    #[test]
    fn test_commands_use_generated_args() {
        let tmp = TempDir::new().unwrap();
        let mut cx = fixtures::sandboxed(tmp.path(), "libiconv", "1.17", fixtures::linux_settings());
        cx.conf.define(keys::JOBS, serde_json::Value::from(4u64));
        let mut tc = AutotoolsToolchain::new(&cx).unwrap();
        tc.configure_args.push("--enable-extra-encodings".into());
        tc.make_args.push("V=1".into());
        tc.generate(&mut cx).unwrap();

        let at = Autotools::new(&cx).unwrap();
        let configure = at.configure_command(&cx, None, &[]);
        assert!(configure.contains("configure\" '--prefix=/'"));
        assert!(configure.ends_with("'--enable-extra-encodings'"));
        assert_eq!(at.make_command(Some("install"), &[]), "make install V=1 -j4");
    }
}
