//! Test utilities for pantry unit tests.
//!
//! Fixtures build settings, instances and recipes without touching a
//! cache; [`write_tree`] lays out recipe folders on disk.
//!
//! # Example
//!
//! ```rust,ignore
//! use pantry::test_support::fixtures;
//!
//! #[test]
//! fn test_example() {
//!     let recipe = fixtures::library_recipe("zlib", "1.3.1", &[]);
//!     let cx = fixtures::instance_of(&recipe, fixtures::linux_settings());
//!     assert!(cx.options.contains("shared"));
//! }
//! ```

pub mod fixtures;

use std::path::{Path, PathBuf};

pub use fixtures::*;

/// Write `(relative path, content)` entries under `root`.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) -> Vec<PathBuf> {
    files
        .iter()
        .map(|(rel, content)| {
            let path = root.join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&path, content).unwrap();
            path
        })
        .collect()
}

/// Assertion helpers for testing.
pub mod assertions {
    use std::path::Path;

    /// Assert that an error chain mentions a substring.
    pub fn assert_error_contains<T: std::fmt::Debug>(
        result: anyhow::Result<T>,
        substring: &str,
    ) {
        match result {
            Ok(v) => panic!("expected Err containing '{}', got Ok: {:?}", substring, v),
            Err(e) => {
                let msg = format!("{:#}", e);
                assert!(
                    msg.contains(substring),
                    "error '{}' does not contain '{}'",
                    msg,
                    substring
                );
            }
        }
    }

    /// Assert that a file exists and contains `content`.
    pub fn assert_file_contains(path: impl AsRef<Path>, content: &str) {
        let path = path.as_ref();
        let actual = std::fs::read_to_string(path)
            .unwrap_or_else(|_| panic!("file not found: {}", path.display()));
        assert!(
            actual.contains(content),
            "file {} does not contain '{}'\nactual content:\n{}",
            path.display(),
            content,
            actual
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_tree() {
        let tmp = TempDir::new().unwrap();
        let paths = write_tree(tmp.path(), &[("a/b.txt", "x"), ("c.txt", "y")]);
        assert_eq!(paths.len(), 2);
        assertions::assert_file_contains(tmp.path().join("a/b.txt"), "x");
    }

    #[test]
    fn test_fixture_recipes() {
        let recipe = fixtures::library_recipe("zlib", "1.3.1", &[]);
        let cx = fixtures::instance_of(&recipe, fixtures::linux_settings());
        assert!(cx.options.contains("shared"));
        assert!(cx.options.contains("fPIC"));
    }
}
