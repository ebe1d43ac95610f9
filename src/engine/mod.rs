//! Graph resolution and the build engine.
//!
//! [`Engine::graph`] expands, configures and analyzes a dependency graph
//! without building anything. [`Engine::create`] does the same and then
//! builds or loads every binary, always rebuilding the root.

pub mod analysis;
pub mod cache;
pub mod errors;
pub mod graph;
pub mod index;
pub mod installer;
pub mod lifecycle;

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};

use crate::core::errors::InvalidConfiguration;
use crate::core::profile::Profile;
use crate::core::recipe::Recipe;

pub use cache::Cache;
pub use errors::GraphError;
pub use graph::{Binary, DepGraph, NodeContext, NodeReport};
pub use index::{FolderIndex, MemoryIndex, RecipeIndex};

/// When to build from source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildPolicy {
    /// Build whatever the cache lacks.
    #[default]
    Missing,
    /// Only use cached binaries.
    Never,
    /// Rebuild everything.
    Always,
}

impl FromStr for BuildPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "missing" => Ok(BuildPolicy::Missing),
            "never" => Ok(BuildPolicy::Never),
            "always" => Ok(BuildPolicy::Always),
            "cascade" => bail!("build policy `cascade` is not supported"),
            other => bail!(
                "unknown build policy `{}` (expected missing, never or always)",
                other
            ),
        }
    }
}

impl fmt::Display for BuildPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildPolicy::Missing => "missing",
            BuildPolicy::Never => "never",
            BuildPolicy::Always => "always",
        };
        f.write_str(s)
    }
}

/// Everything needed to resolve and build a graph.
pub struct Engine<'a> {
    index: &'a dyn RecipeIndex,
    cache: Cache,
    host: Profile,
    build: Profile,
    policy: BuildPolicy,
    jobs: Option<usize>,
}

impl<'a> Engine<'a> {
    pub fn new(index: &'a dyn RecipeIndex, cache: Cache, host: Profile, build: Profile) -> Self {
        Engine {
            index,
            cache,
            host,
            build,
            policy: BuildPolicy::default(),
            jobs: None,
        }
    }

    pub fn with_policy(mut self, policy: BuildPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Number of nodes built at once; defaults to the number of CPUs.
    pub fn with_jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    fn expand(&self, root: Recipe, build_root: bool) -> Result<DepGraph> {
        let expander = graph::Expander::new(self.index, &self.cache, &self.host, &self.build);
        let mut graph = expander.expand(root)?;
        graph.analyze(&self.cache, self.policy, build_root)?;
        Ok(graph)
    }

    /// Exploration mode: invalid nodes are reported, not raised.
    pub fn graph(&self, root: Recipe) -> Result<DepGraph> {
        self.expand(root, false)
    }

    /// Build the root and whatever the policy asks for.
    ///
    /// Fails with [`InvalidConfiguration`] if any node was rejected by
    /// `validate()`, before anything is built.
    pub fn create(&self, root: Recipe) -> Result<DepGraph> {
        let mut graph = self.expand(root, true)?;

        let invalid: Vec<String> = graph
            .nodes()
            .filter_map(|n| {
                n.invalid
                    .as_ref()
                    .map(|reason| format!("{}: {}", n.reference(), reason))
            })
            .collect();
        if !invalid.is_empty() {
            return Err(InvalidConfiguration::new(invalid.join("; ")).into());
        }
        if let Some(node) = graph.nodes().find(|n| n.binary == Binary::Missing) {
            return Err(GraphError::MissingBinary {
                reference: node.reference().to_string(),
                package_id: node.package_id.clone().unwrap_or_default(),
            }
            .into());
        }

        installer::install(&mut graph, &self.cache, self.jobs)?;
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::as_invalid_configuration;
    use crate::core::hooks::Hook;
    use crate::test_support::fixtures;
    use tempfile::TempDir;

    #[test]
    fn test_build_policy_parse() {
        assert_eq!("never".parse::<BuildPolicy>().unwrap(), BuildPolicy::Never);
        let err = "cascade".parse::<BuildPolicy>().unwrap_err();
        assert!(err.to_string().contains("not supported"));
        assert!("sometimes".parse::<BuildPolicy>().is_err());
    }

    #[test]
    fn test_create_invalid_builds_nothing() {
        let tmp = TempDir::new().unwrap();
        let index = MemoryIndex::new();
        let windows = Profile {
            settings: fixtures::windows_settings(),
            ..Profile::default()
        };
        let engine = Engine::new(&index, Cache::new(tmp.path()), windows.clone(), windows);
        let recipe = fixtures::posix_only_recipe("libuv", "1.47.0");

        let graph = engine.graph(recipe.clone()).unwrap();
        assert_eq!(graph.root().binary, Binary::Invalid);
        assert!(!graph.root().instance.trace.contains(&Hook::Build));

        let err = engine.create(recipe).err().unwrap();
        assert!(as_invalid_configuration(&err).is_some());
        assert!(engine.cache().list().unwrap().is_empty());
    }

    #[test]
    fn test_create_rebuilds_root() {
        let tmp = TempDir::new().unwrap();
        let index = MemoryIndex::new();
        let linux = Profile {
            settings: fixtures::linux_settings(),
            ..Profile::default()
        };
        let engine = Engine::new(&index, Cache::new(tmp.path()), linux.clone(), linux);
        let recipe = fixtures::header_only_recipe("mdspan", "0.6.0");
        engine.create(recipe.clone()).unwrap();
        let graph = engine.create(recipe).unwrap();
        assert!(graph.root().instance.trace.contains(&Hook::Package));
    }
}
