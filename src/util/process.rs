//! Running build tools and recipe commands as child processes.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::thread;

use anyhow::{bail, Context, Result};

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    env_remove: Vec<String>,
    cwd: Option<PathBuf>,
}

/// Result of a streamed subprocess run.
#[derive(Debug, Clone)]
pub struct StreamedOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: BTreeMap::new(),
            env_remove: Vec::new(),
            cwd: None,
        }
    }

    /// Build a process that runs `command` through the platform shell.
    pub fn shell(command: &str) -> Self {
        if cfg!(windows) {
            ProcessBuilder::new("cmd").args(["/C", command])
        } else {
            ProcessBuilder::new("sh").args(["-c", command])
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.env
            .insert(key.as_ref().to_string(), value.as_ref().to_string());
        self
    }

    /// Remove an environment variable.
    pub fn env_remove(mut self, key: impl AsRef<str>) -> Self {
        self.env_remove.push(key.as_ref().to_string());
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).envs(&self.env);
        for key in &self.env_remove {
            cmd.env_remove(key);
        }
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        cmd
    }

    fn spawn(&self) -> Result<Child> {
        self.command()
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))
    }

    /// Run quietly and capture stdout and stderr.
    pub fn exec(&self) -> Result<Output> {
        self.spawn()?
            .wait_with_output()
            .with_context(|| format!("failed to wait for `{}`", self.program.display()))
    }

    /// Execute, forwarding every output line to the log under `label`.
    ///
    /// Output is also captured so callers can inspect it afterwards.
    pub fn exec_streaming(&self, label: &str) -> Result<StreamedOutput> {
        tracing::info!("{}: {}", label, self.display_command());

        let mut child = self.spawn()?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let out_label = label.to_string();
        let out_handle = thread::spawn(move || forward_lines(stdout, &out_label, false));
        let err_label = label.to_string();
        let err_handle = thread::spawn(move || forward_lines(stderr, &err_label, true));

        let status = child
            .wait()
            .with_context(|| format!("failed to wait for `{}`", self.program.display()))?;

        let stdout = out_handle.join().unwrap_or_default();
        let stderr = err_handle.join().unwrap_or_default();

        Ok(StreamedOutput {
            status,
            stdout,
            stderr,
        })
    }

    /// Stream output and fail on a non-zero exit code.
    pub fn exec_streaming_and_check(&self, label: &str) -> Result<StreamedOutput> {
        let output = self.exec_streaming(label)?;
        if !output.status.success() {
            bail!(
                "`{}` failed with exit code {:?}",
                self.display_command(),
                output.status.code()
            );
        }
        Ok(output)
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

fn forward_lines<R: Read>(pipe: Option<R>, label: &str, is_stderr: bool) -> String {
    let Some(pipe) = pipe else {
        return String::new();
    };
    let mut captured = String::new();
    for line in BufReader::new(pipe).lines().map_while(|l| l.ok()) {
        if is_stderr {
            tracing::warn!("{}: {}", label, line);
        } else {
            tracing::info!("{}: {}", label, line);
        }
        captured.push_str(&line);
        captured.push('\n');
    }
    captured
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// The C compiler `$CC` names, else the first of the usual suspects on PATH.
pub fn find_c_compiler() -> Option<PathBuf> {
    std::env::var("CC")
        .ok()
        .and_then(|cc| find_executable(&cc))
        .or_else(|| ["cc", "gcc", "clang", "cl"].iter().find_map(|c| find_executable(c)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_command() {
        let pb = ProcessBuilder::new("cmake").args(["--build", ".", "--parallel", "4"]);

        assert_eq!(pb.display_command(), "cmake --build . --parallel 4");
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_streaming_captures_output() {
        let out = ProcessBuilder::shell("echo one; echo two 1>&2")
            .exec_streaming("test")
            .unwrap();
        assert!(out.status.success());
        assert_eq!(out.stdout, "one\n");
        assert_eq!(out.stderr, "two\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_streaming_and_check_reports_exit_code() {
        let err = ProcessBuilder::shell("exit 3")
            .exec_streaming_and_check("test")
            .unwrap_err();
        assert!(err.to_string().contains("Some(3)"));
    }

    #[cfg(unix)]
    #[test]
    fn test_env_is_forwarded() {
        let out = ProcessBuilder::shell("echo $PANTRY_PROBE")
            .env("PANTRY_PROBE", "yes")
            .exec()
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "yes");

        let out = ProcessBuilder::shell("echo \"[$PANTRY_PROBE]\"")
            .env("PANTRY_PROBE", "yes")
            .env_remove("PANTRY_PROBE")
            .exec_streaming("test")
            .unwrap();
        assert_eq!(out.stdout, "[]\n");
    }
}
