//! Graph errors and their diagnostics.

use thiserror::Error;

use crate::util::diagnostic::Diagnostic;

/// Error while expanding or installing the dependency graph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("recipe `{name}` not found")]
    RecipeNotFound {
        name: String,
        required_by: String,
        suggestions: Vec<String>,
    },

    #[error("no version of `{name}` matches `{requirement}`")]
    NoMatchingVersion {
        name: String,
        requirement: String,
        required_by: String,
        available: Vec<String>,
    },

    #[error("version conflict for `{name}`")]
    VersionConflict {
        name: String,
        existing: String,
        requirement: String,
        required_by: String,
    },

    #[error("cycle detected in dependency graph")]
    CycleDetected { packages: Vec<String> },

    #[error("missing binary for `{reference}`")]
    MissingBinary {
        reference: String,
        package_id: String,
    },
}

impl GraphError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            GraphError::RecipeNotFound {
                name,
                required_by,
                suggestions,
            } => {
                let mut diag = Diagnostic::error(format!("recipe `{}` not found", name))
                    .with_context(format!("required by `{}`", required_by));
                if !suggestions.is_empty() {
                    diag = diag.with_suggestion(format!(
                        "Did you mean: {}?",
                        suggestions.join(", ")
                    ));
                }
                diag.with_suggestion("Point `--index` at a folder with a `recipes/` tree")
            }

            GraphError::NoMatchingVersion {
                name,
                requirement,
                required_by,
                available,
            } => {
                let mut diag = Diagnostic::error(format!(
                    "no version of `{}` matches requirement `{}`",
                    name, requirement
                ))
                .with_context(format!("required by `{}`", required_by));
                if !available.is_empty() {
                    diag = diag.with_context(format!("available versions: {}", available.join(", ")));
                }
                diag.with_suggestion(format!("Update the version requirement for `{}`", name))
            }

            GraphError::VersionConflict {
                name,
                existing,
                requirement,
                required_by,
            } => Diagnostic::error(format!("version conflict for `{}`", name))
                .with_context(format!("the graph already contains `{}`", existing))
                .with_context(format!("`{}` requires `{}`", required_by, requirement))
                .with_suggestion(format!(
                    "Align every requirement on one version of `{}`",
                    name
                )),

            GraphError::CycleDetected { packages } => {
                Diagnostic::error("cycle detected in dependency graph")
                    .with_context(format!("cycle: {}", packages.join(" -> ")))
                    .with_suggestion("Break the cycle by removing or restructuring requirements")
            }

            GraphError::MissingBinary {
                reference,
                package_id,
            } => Diagnostic::error(format!("missing binary for `{}`", reference))
                .with_context(format!("package id {}", package_id))
                .with_suggestion("Build it from source with `--build missing`"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_diagnostic() {
        let err = GraphError::VersionConflict {
            name: "zlib".into(),
            existing: "zlib/1.3.1".into(),
            requirement: "zlib/1.2.13".into(),
            required_by: "libpng/1.6.43".into(),
        };
        let text = err.to_diagnostic().format(false);
        assert!(text.contains("version conflict for `zlib`"));
        assert!(text.contains("`libpng/1.6.43` requires `zlib/1.2.13`"));
    }
}
