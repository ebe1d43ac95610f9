//! Where recipes come from.
//!
//! A [`FolderIndex`] reads a center-index style tree:
//!
//! ```text
//! recipes/
//!   zlib/
//!     config.yml        versions: {"1.3.1": {folder: all}}
//!     all/
//!       recipe.toml
//!       conandata.yml
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;

use crate::core::manifest::load_recipe;
use crate::core::recipe::Recipe;
use crate::core::version::Version;

/// A source of recipes by name and version.
pub trait RecipeIndex: Send + Sync {
    /// Every version the index knows for `name`, unsorted. Empty when the
    /// name is unknown.
    fn versions(&self, name: &str) -> Result<Vec<Version>>;

    /// Load one version. The returned recipe carries that version.
    fn load(&self, name: &str, version: &Version) -> Result<Recipe>;

    /// Every recipe name, for suggestions.
    fn names(&self) -> Vec<String>;
}

/// Programmatic recipes kept in memory.
#[derive(Default)]
pub struct MemoryIndex {
    recipes: BTreeMap<String, BTreeMap<Version, Recipe>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a recipe; it must declare its version.
    pub fn add(&mut self, recipe: Recipe) -> Result<&mut Self> {
        let version = recipe
            .version()
            .cloned()
            .ok_or_else(|| anyhow!("recipe `{}` has no version", recipe.name()))?;
        self.recipes
            .entry(recipe.name().to_string())
            .or_default()
            .insert(version, recipe);
        Ok(self)
    }

    pub fn with(mut self, recipe: Recipe) -> Result<Self> {
        self.add(recipe)?;
        Ok(self)
    }
}

impl RecipeIndex for MemoryIndex {
    fn versions(&self, name: &str) -> Result<Vec<Version>> {
        Ok(self
            .recipes
            .get(name)
            .map(|v| v.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn load(&self, name: &str, version: &Version) -> Result<Recipe> {
        self.recipes
            .get(name)
            .and_then(|v| v.get(version))
            .cloned()
            .ok_or_else(|| anyhow!("recipe `{}/{}` not in index", name, version))
    }

    fn names(&self) -> Vec<String> {
        self.recipes.keys().cloned().collect()
    }
}

#[derive(Debug, Deserialize)]
struct VersionsFile {
    versions: IndexMap<Version, VersionEntry>,
}

#[derive(Debug, Deserialize)]
struct VersionEntry {
    folder: String,
}

/// A `recipes/<name>/config.yml` tree on disk.
pub struct FolderIndex {
    root: PathBuf,
    /// Parsed `config.yml` files: name -> version -> folder.
    cache: Mutex<BTreeMap<String, IndexMap<Version, String>>>,
}

impl FolderIndex {
    /// `root` is the folder holding `recipes/`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FolderIndex {
            root: root.into(),
            cache: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn recipes_dir(&self) -> PathBuf {
        self.root.join("recipes")
    }

    fn entries(&self, name: &str) -> Result<IndexMap<Version, String>> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| anyhow!("recipe index lock poisoned"))?;
        if let Some(entries) = cache.get(name) {
            return Ok(entries.clone());
        }
        let path = self.recipes_dir().join(name).join("config.yml");
        let entries = if path.is_file() {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let file: VersionsFile = serde_yaml::from_str(&text)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            file.versions
                .into_iter()
                .map(|(v, e)| (v, e.folder))
                .collect()
        } else {
            IndexMap::new()
        };
        cache.insert(name.to_string(), entries.clone());
        Ok(entries)
    }
}

impl RecipeIndex for FolderIndex {
    fn versions(&self, name: &str) -> Result<Vec<Version>> {
        Ok(self.entries(name)?.into_keys().collect())
    }

    fn load(&self, name: &str, version: &Version) -> Result<Recipe> {
        let entries = self.entries(name)?;
        let folder = entries
            .get(version)
            .ok_or_else(|| anyhow!("recipe `{}/{}` not in index", name, version))?;
        let dir = self.recipes_dir().join(name).join(folder);
        let recipe = load_recipe(&dir)?;
        if recipe.name() != name {
            anyhow::bail!(
                "{} declares name `{}`, expected `{}`",
                dir.display(),
                recipe.name(),
                name
            );
        }
        Ok(recipe.with_version(version.clone()))
    }

    fn names(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(self.recipes_dir()) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().join("config.yml").is_file())
            .filter_map(|e| e.file_name().to_str().map(String::from))
            .collect();
        names.sort();
        names
    }
}

/// Names close to `name`, for "did you mean" suggestions.
pub fn suggest(index: &dyn RecipeIndex, name: &str) -> Vec<String> {
    index
        .names()
        .into_iter()
        .filter(|n| n.contains(name) || name.contains(n.as_str()) || edit_distance(n, name) <= 2)
        .take(3)
        .collect()
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut row = vec![i + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            row.push((prev[j] + cost).min(prev[j + 1] + 1).min(row[j] + 1));
        }
        prev = row;
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixtures, write_tree};
    use tempfile::TempDir;

    #[test]
    fn test_memory_index() {
        let index = MemoryIndex::new()
            .with(fixtures::library_recipe("zlib", "1.2.13", &[]))
            .unwrap()
            .with(fixtures::library_recipe("zlib", "1.3.1", &[]))
            .unwrap();
        let mut versions = index.versions("zlib").unwrap();
        versions.sort();
        assert_eq!(versions.last().unwrap().as_str(), "1.3.1");
        assert!(index.versions("bzip2").unwrap().is_empty());
        assert!(index.load("zlib", &Version::new("1.2.13")).is_ok());
    }

    #[test]
    fn test_folder_index() {
        let tmp = TempDir::new().unwrap();
        write_tree(
            tmp.path(),
            &[
                (
                    "recipes/zlib/config.yml",
                    "versions:\n  \"1.3.1\":\n    folder: all\n  \"1.2.13\":\n    folder: all\n",
                ),
                (
                    "recipes/zlib/all/recipe.toml",
                    "[package]\nname = \"zlib\"\npackage_type = \"static-library\"\n",
                ),
            ],
        );
        let index = FolderIndex::new(tmp.path());
        assert_eq!(index.versions("zlib").unwrap().len(), 2);
        let recipe = index.load("zlib", &Version::new("1.2.13")).unwrap();
        assert_eq!(recipe.version().unwrap().as_str(), "1.2.13");
        assert_eq!(index.names(), vec!["zlib"]);
        assert_eq!(suggest(&index, "zlb"), vec!["zlib"]);
    }
}
