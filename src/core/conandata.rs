//! `conandata.yml`: per-version sources and patches.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::version::Version;

/// One or more mirror URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Urls {
    One(String),
    Many(Vec<String>),
}

impl Urls {
    pub fn as_slice(&self) -> &[String] {
        match self {
            Urls::One(u) => std::slice::from_ref(u),
            Urls::Many(us) => us,
        }
    }
}

/// Where to fetch a version's sources from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub url: Urls,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub strip_root: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchType {
    Portability,
    Conan,
    Backport,
    Bugfix,
    Official,
    Vulnerability,
}

/// A patch to apply after fetching sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchSpec {
    /// Path relative to the export folder.
    #[serde(default)]
    pub patch_file: Option<String>,
    /// Inline patch text, used instead of `patch_file`.
    #[serde(default)]
    pub patch_string: Option<String>,
    #[serde(default)]
    pub patch_description: Option<String>,
    #[serde(default)]
    pub patch_type: Option<PatchType>,
    #[serde(default)]
    pub patch_source: Option<String>,
    /// Subfolder of the source folder the patch applies to.
    #[serde(default)]
    pub base_path: Option<String>,
}

/// Parsed `conandata.yml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConanData {
    #[serde(default)]
    pub sources: IndexMap<Version, SourceSpec>,
    #[serde(default)]
    pub patches: IndexMap<Version, Vec<PatchSpec>>,
    /// Any other top-level keys, kept for recipes that read them.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl ConanData {
    pub fn parse(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("failed to parse conandata.yml")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn sources_for(&self, version: &Version) -> Option<&SourceSpec> {
        self.sources.get(version)
    }

    pub fn patches_for(&self, version: &Version) -> &[PatchSpec] {
        self.patches
            .get(version)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Versions declared under `sources`.
    pub fn versions(&self) -> impl Iterator<Item = &Version> {
        self.sources.keys()
    }
}
