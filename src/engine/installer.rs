//! Building and loading binaries, level by level.
//!
//! Nodes of one level have no dependencies on each other and run in
//! parallel, each in its own sandbox. A level only starts once the
//! previous one finished, so a dependency is always packaged before any
//! consumer's `generate()`.

use std::path::Path;

use anyhow::{Context, Result};
use petgraph::graph::NodeIndex;
use rayon::prelude::*;

use crate::core::errors::InvalidConfiguration;
use crate::core::hooks::Hook;
use crate::core::instance::Instance;
use crate::core::recipe::Recipe;
use crate::engine::cache::{Cache, CONANINFO};
use crate::engine::errors::GraphError;
use crate::engine::graph::{Binary, DepGraph};
use crate::engine::lifecycle::{self, Validity};
use crate::util::fs::{remove_dir_all_if_exists, write_string};

struct Work {
    idx: NodeIndex,
    recipe: Recipe,
    instance: Instance,
    binary: Binary,
    package_id: String,
    invalid: Option<String>,
}

/// Build or load every node of an analyzed graph.
pub fn install(graph: &mut DepGraph, cache: &Cache, jobs: Option<usize>) -> Result<()> {
    let mut pool = rayon::ThreadPoolBuilder::new();
    if let Some(j) = jobs {
        pool = pool.num_threads(j);
    }
    let pool = pool.build().context("failed to start build workers")?;

    for level in graph.levels() {
        let mut work: Vec<Work> = level
            .iter()
            .map(|&idx| {
                let node = graph.node(idx);
                let mut instance = node.instance.clone();
                // Pick up cpp_info and folders of dependencies finished in
                // earlier levels.
                instance.dependencies = graph.dependencies_view(idx, cache);
                Work {
                    idx,
                    recipe: node.recipe.clone(),
                    instance,
                    binary: node.binary,
                    package_id: node.package_id.clone().unwrap_or_default(),
                    invalid: node.invalid.clone(),
                }
            })
            .collect();

        let results: Vec<Result<()>> =
            pool.install(|| work.par_iter_mut().map(|w| install_node(w, cache)).collect());

        for (w, result) in work.into_iter().zip(results) {
            result?;
            let node = graph.node_mut(w.idx);
            node.instance = w.instance;
            node.installed = true;
        }
    }
    Ok(())
}

fn install_node(w: &mut Work, cache: &Cache) -> Result<()> {
    let reference = w.instance.reference.clone();
    match w.binary {
        Binary::Invalid => {
            let reason = w.invalid.clone().unwrap_or_default();
            Err(InvalidConfiguration::new(format!("{}: {}", reference, reason)).into())
        }
        Binary::Missing => Err(GraphError::MissingBinary {
            reference: reference.to_string(),
            package_id: w.package_id.clone(),
        }
        .into()),
        Binary::Cache => {
            tracing::info!("{}: using cached {}", reference, w.package_id);
            w.instance.folders.package = cache.package_dir(&reference, &w.package_id);
            lifecycle::package_info(&w.recipe, &mut w.instance)
        }
        Binary::Build => {
            let sandbox = cache.build_dir(&reference, &w.package_id);
            let result = build_node(&w.recipe, &mut w.instance, cache, &sandbox, &w.package_id);
            if let Err(e) = remove_dir_all_if_exists(&sandbox) {
                tracing::warn!("{}: failed to clean {}: {:#}", reference, sandbox.display(), e);
            }
            result
        }
    }
}

fn build_node(recipe: &Recipe, cx: &mut Instance, cache: &Cache, sandbox: &Path, package_id: &str) -> Result<()> {
    if let Validity::Invalid(reason) = lifecycle::validate(recipe, cx, Hook::ValidateBuild)? {
        return Err(InvalidConfiguration::new(format!("{}: {}", cx.reference, reason)).into());
    }
    tracing::info!("{}: building {}", cx.reference, package_id);

    remove_dir_all_if_exists(sandbox)?;
    cx.folders.base_source = sandbox.join("s");
    cx.folders.base_build = sandbox.join("b");
    // Dropping the staging folder on any error below deletes it.
    let staging = cache.begin_package(&cx.reference)?;
    cx.folders.package = staging.path().to_path_buf();

    lifecycle::build(recipe, cx)?;
    lifecycle::confirm_package_id(recipe, cx, package_id)?;
    write_string(&staging.path().join(CONANINFO), &cx.info.render())?;

    let folder = cache.promote(staging, &cx.reference, package_id)?;
    cx.folders.package = folder.clone();
    if let Err(e) = lifecycle::package_info(recipe, cx) {
        remove_dir_all_if_exists(&folder)?;
        return Err(e);
    }
    tracing::info!("{}: packaged in {}", cx.reference, folder.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hooks::is_ordered_trace;
    use crate::core::profile::Profile;
    use crate::engine::graph::Expander;
    use crate::engine::index::MemoryIndex;
    use crate::engine::BuildPolicy;
    use crate::test_support::assertions::assert_error_contains;
    use crate::test_support::fixtures;
    use tempfile::TempDir;

    fn linux() -> Profile {
        Profile {
            settings: fixtures::linux_settings(),
            ..Profile::default()
        }
    }

    fn analyzed(index: &MemoryIndex, root: Recipe, cache: &Cache, policy: BuildPolicy) -> DepGraph {
        let host = linux();
        let mut graph = Expander::new(index, cache, &host, &host).expand(root).unwrap();
        graph.analyze(cache, policy, false).unwrap();
        graph
    }

    #[test]
    fn test_build_then_reuse() {
        let tmp = TempDir::new().unwrap();
        let cache = Cache::new(tmp.path());
        let index = MemoryIndex::new()
            .with(fixtures::library_recipe("zlib", "1.3.1", &[]))
            .unwrap();
        let root = fixtures::library_recipe("libpng", "1.6.43", &["zlib/1.3.1"]);

        let mut graph = analyzed(&index, root.clone(), &cache, BuildPolicy::Missing);
        install(&mut graph, &cache, Some(2)).unwrap();
        let zlib = graph.find("zlib").unwrap();
        assert!(zlib.installed);
        assert!(is_ordered_trace(&zlib.instance.trace));
        assert_eq!(zlib.instance.trace.last(), Some(&Hook::PackageInfo));
        let id = zlib.package_id.clone().unwrap();
        assert!(cache.package_dir(zlib.reference(), &id).join("lib/libzlib.a").is_file());
        assert!(!cache.build_dir(zlib.reference(), &id).exists());

        // The consumer saw the dependency's published cpp_info.
        let seen = graph.root().instance.dependencies.get("zlib").unwrap();
        assert_eq!(seen.cpp_info.root.libs, vec!["zlib"]);

        let mut again = analyzed(&index, root, &cache, BuildPolicy::Never);
        assert_eq!(again.find("zlib").unwrap().binary, Binary::Cache);
        assert_eq!(again.root().binary, Binary::Cache);
        install(&mut again, &cache, None).unwrap();
        assert!(!again.find("zlib").unwrap().instance.trace.contains(&Hook::Build));
    }

    #[test]
    fn test_failed_build_leaves_no_package() {
        let tmp = TempDir::new().unwrap();
        let cache = Cache::new(tmp.path());
        let broken = Recipe::builder("broken")
            .version("1.0")
            .hook(Hook::Package, |cx| {
                std::fs::write(cx.package_folder().join("half.txt"), "x")?;
                anyhow::bail!("install step failed")
            })
            .build()
            .unwrap();
        let mut graph = analyzed(&MemoryIndex::new(), broken, &cache, BuildPolicy::Missing);
        let result = install(&mut graph, &cache, None);
        assert_error_contains(result, "error in package()");
        assert!(cache.list().unwrap().iter().all(|e| e.package_ids.is_empty()));
    }

    #[test]
    fn test_package_id_must_not_change() {
        let tmp = TempDir::new().unwrap();
        let cache = Cache::new(tmp.path());
        let flaky = Recipe::builder("flaky")
            .version("1.0")
            .hook(Hook::PackageId, |cx| {
                if cx.package_folder().join("marker").exists() {
                    cx.info.options.insert("late".into(), "yes".into());
                }
                Ok(())
            })
            .hook(Hook::Package, |cx| {
                std::fs::write(cx.package_folder().join("marker"), "")?;
                Ok(())
            })
            .build()
            .unwrap();
        let mut graph = analyzed(&MemoryIndex::new(), flaky, &cache, BuildPolicy::Missing);
        assert_error_contains(install(&mut graph, &cache, None), "package id of `flaky/1.0` changed");
    }

    #[test]
    fn test_never_policy_reports_missing() {
        let tmp = TempDir::new().unwrap();
        let cache = Cache::new(tmp.path());
        let root = fixtures::header_only_recipe("mdspan", "0.6.0");
        let mut graph = analyzed(&MemoryIndex::new(), root, &cache, BuildPolicy::Never);
        assert_eq!(graph.root().binary, Binary::Missing);
        assert_error_contains(install(&mut graph, &cache, None), "missing binary");
    }
}
