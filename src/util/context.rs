//! Global context for pantry operations.
//!
//! Provides centralized access to configuration, paths, and environment.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::util::config::{load_config, Config};

/// Environment variable overriding the pantry home directory.
pub const HOME_ENV: &str = "PANTRY_HOME";

const CONFIG_FILE: &str = "config.toml";

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global pantry data (~/.pantry/)
    home: PathBuf,

    /// Whether to use verbose output
    verbose: bool,

    /// Whether to use colors in output
    color: bool,

    /// Merged global and project configuration
    config: Config,
}

impl GlobalContext {
    /// Create a new GlobalContext rooted at the process working directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        let home = default_home()?;
        Ok(Self::with_paths(cwd, home))
    }

    /// Create a GlobalContext from explicit paths, loading config from both.
    pub fn with_paths(cwd: PathBuf, home: PathBuf) -> Self {
        let config = load_config(
            &home.join(CONFIG_FILE),
            &cwd.join(".pantry").join(CONFIG_FILE),
        );
        GlobalContext {
            cwd,
            home,
            verbose: false,
            color: true,
            config,
        }
    }

    /// Set verbose mode.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Set color output.
    pub fn set_color(&mut self, color: bool) {
        self.color = color;
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the pantry home directory (~/.pantry/).
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Get the merged configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the package cache directory.
    pub fn cache_dir(&self) -> PathBuf {
        self.home.join("cache")
    }

    /// Get the profiles directory.
    pub fn profiles_dir(&self) -> PathBuf {
        self.home.join("profiles")
    }

    /// Resolve a profile argument to a path.
    ///
    /// Existing paths (absolute or relative to cwd) win over names in the
    /// profiles directory.
    pub fn profile_path(&self, name: &str) -> PathBuf {
        let direct = self.cwd.join(name);
        if direct.is_file() {
            return direct;
        }
        self.profiles_dir().join(name)
    }

    /// Check if verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Check if color output is enabled.
    pub fn color(&self) -> bool {
        self.color
    }
}

/// Resolve the pantry home: `$PANTRY_HOME`, else `~/.pantry`.
pub fn default_home() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os(HOME_ENV) {
        return Ok(PathBuf::from(home));
    }
    directories::BaseDirs::new()
        .map(|b| b.home_dir().join(".pantry"))
        .context("could not determine the user home directory; set PANTRY_HOME")
}
