//! `Meson` build helper.

use anyhow::{Context, Result};

use crate::core::instance::Instance;
use crate::tools::build::build_jobs;
use crate::tools::meson::toolchain::{CROSS_FILE, NATIVE_FILE};
use crate::util::fs::forward_slashes;

#[derive(Debug, Clone)]
pub struct Meson {
    jobs: usize,
}

impl Meson {
    pub fn new(cx: &Instance) -> Self {
        Meson {
            jobs: build_jobs(cx),
        }
    }

    /// `meson setup` with whichever machine file `generate()` wrote.
    pub fn configure_command(&self, cx: &Instance, reconfigure: bool) -> String {
        let generators = cx.generators_folder();
        let mut cmd = String::from("meson setup");
        for (flag, file) in [("--native-file", NATIVE_FILE), ("--cross-file", CROSS_FILE)] {
            let path = generators.join(file);
            if path.is_file() {
                cmd.push_str(&format!(" {} \"{}\"", flag, forward_slashes(&path)));
            }
        }
        cmd.push_str(&format!(
            " \"{}\" \"{}\"",
            forward_slashes(&cx.build_folder()),
            forward_slashes(&cx.source_folder())
        ));
        if reconfigure {
            cmd.push_str(" --reconfigure");
        }
        cmd
    }

    pub fn configure(&self, cx: &Instance) -> Result<()> {
        let build = cx.build_folder();
        let reconfigure = build.join("meson-private").is_dir();
        std::fs::create_dir_all(&build)
            .with_context(|| format!("failed to create {}", build.display()))?;
        let cmd = self.configure_command(cx, reconfigure);
        cx.run_with(&cmd, Some(&cx.source_folder()), Some("build"))?;
        Ok(())
    }

    pub fn build_command(&self, cx: &Instance, target: Option<&str>) -> String {
        let mut cmd = format!(
            "meson compile -C \"{}\" -j {}",
            forward_slashes(&cx.build_folder()),
            self.jobs
        );
        if let Some(t) = target {
            cmd.push(' ');
            cmd.push_str(t);
        }
        cmd
    }

    pub fn build(&self, cx: &Instance) -> Result<()> {
        cx.run_with(&self.build_command(cx, None), Some(&cx.build_folder()), Some("build"))?;
        Ok(())
    }

    /// `meson install` with the package folder as `--destdir`.
    pub fn install(&self, cx: &Instance) -> Result<()> {
        let cmd = format!(
            "meson install -C \"{}\" --destdir \"{}\"",
            forward_slashes(&cx.build_folder()),
            forward_slashes(cx.package_folder())
        );
        cx.run_with(&cmd, Some(&cx.build_folder()), Some("build"))?;
        Ok(())
    }

    pub fn test(&self, cx: &Instance) -> Result<()> {
        if cx.conf.get_bool("tools.build:skip_test") {
            return Ok(());
        }
        let cmd = format!("meson test -v -C \"{}\"", forward_slashes(&cx.build_folder()));
        cx.run_with(&cmd, Some(&cx.build_folder()), Some("build"))?;
        Ok(())
    }
}
