//! Configuration file support for pantry.
//!
//! Two locations are read:
//! - Global: `~/.pantry/config.toml` - user-wide defaults
//! - Project: `.pantry/config.toml` - overrides for one recipe tree
//!
//! Project config takes precedence over global config.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::conf::Conf;
use crate::engine::BuildPolicy;

/// pantry configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Core settings
    pub core: CoreConfig,

    /// Build settings
    pub build: BuildConfig,

    /// Network settings
    pub net: NetConfig,

    /// Default conf entries, applied beneath each profile's `[conf]`
    pub conf: BTreeMap<String, toml::Value>,
}

/// Core configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Profile used when `-pr` is not given (defaults to "default")
    pub default_profile: Option<String>,
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Default number of parallel jobs (None = auto-detect)
    pub jobs: Option<usize>,

    /// Default build policy (missing, never, always)
    pub build_policy: Option<String>,
}

/// Network-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// Download timeout in seconds
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("failed to load config from {}: {}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.core.default_profile.is_some() {
            self.core.default_profile = other.core.default_profile;
        }
        if other.build.jobs.is_some() {
            self.build.jobs = other.build.jobs;
        }
        if other.build.build_policy.is_some() {
            self.build.build_policy = other.build.build_policy;
        }
        if other.net.timeout_secs.is_some() {
            self.net.timeout_secs = other.net.timeout_secs;
        }
        self.conf.extend(other.conf);
    }

    /// Name of the default host profile.
    pub fn default_profile(&self) -> &str {
        self.core.default_profile.as_deref().unwrap_or("default")
    }

    /// Parse the build policy from its config string.
    pub fn build_policy(&self) -> Result<BuildPolicy> {
        match self.build.build_policy.as_deref() {
            Some(s) => s.parse(),
            None => Ok(BuildPolicy::Missing),
        }
    }

    /// Conf entries declared under `[conf]`, as a typed conf map.
    ///
    /// `[build] jobs` is folded in as `tools.build:jobs` unless set explicitly.
    pub fn conf(&self) -> Result<Conf> {
        let mut conf = Conf::new();
        if let Some(jobs) = self.build.jobs {
            conf.define("tools.build:jobs", serde_json::Value::from(jobs as u64));
        }
        for (key, value) in &self.conf {
            let value = serde_json::to_value(value)
                .with_context(|| format!("invalid value for conf `{}`", key))?;
            conf.define(key, value);
        }
        Ok(conf)
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.pantry/config.toml)
/// 2. Global config (~/.pantry/config.toml)
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();

    if global_path.exists() {
        config.merge(Config::load_or_default(global_path));
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}
