//! Errors raised by recipes and by the recipe contract checks.

use thiserror::Error;

use crate::util::diagnostic::Diagnostic;

/// The configuration is not supported by the recipe.
///
/// Raised from `validate()`/`validate_build()` and by the standard checks
/// (`check_min_cppstd` and friends). The engine treats it as an expected
/// outcome and marks the node invalid rather than failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{reason}")]
pub struct InvalidConfiguration {
    pub reason: String,
}

impl InvalidConfiguration {
    pub fn new(reason: impl Into<String>) -> Self {
        InvalidConfiguration {
            reason: reason.into(),
        }
    }
}

/// Find an `InvalidConfiguration` anywhere in an error chain.
pub fn as_invalid_configuration(err: &anyhow::Error) -> Option<&InvalidConfiguration> {
    err.chain()
        .find_map(|e| e.downcast_ref::<InvalidConfiguration>())
}

/// Violation of the recipe contract.
#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("invalid value `{value}` for option `{option}`")]
    OptionValueNotAllowed {
        option: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("option `{option}` has no value")]
    OptionNotDefined { option: String, allowed: Vec<String> },

    #[error("option `{option}` does not exist")]
    UnknownOption { option: String },

    #[error("option `{option}` was removed by the recipe")]
    OptionRemoved { option: String },

    #[error("option `{option}` can only be removed in config_options() or configure()")]
    RemoveOutsideConfigure { option: String },

    #[error("setting `{setting}` is not defined")]
    SettingMissing { setting: String },

    #[error("`{package}` sets both root cpp_info and components")]
    RootAndComponents { package: String, fields: Vec<String> },

    #[error("`{package}` requires unknown component `{requirement}`")]
    UnknownComponent {
        package: String,
        requirement: String,
        available: Vec<String>,
    },

    #[error("header-library `{package}` declares library or binary folders")]
    HeaderLibraryDirs { package: String },

    #[error("package id of `{reference}` changed during the build")]
    PackageIdChanged {
        reference: String,
        before: String,
        after: String,
    },
}

impl RecipeError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            RecipeError::OptionValueNotAllowed {
                option,
                value,
                allowed,
            } => Diagnostic::error(format!(
                "invalid value `{}` for option `{}`",
                value, option
            ))
            .with_context(format!("possible values: {}", allowed.join(", ")))
            .with_suggestion(format!("Pass one of the allowed values with `-o {}=...`", option)),

            RecipeError::OptionNotDefined { option, allowed } => {
                Diagnostic::error(format!("option `{}` has no value", option))
                    .with_context(format!("possible values: {}", allowed.join(", ")))
                    .with_suggestion(format!("Set it with `-o {}=...` or in the profile", option))
            }

            RecipeError::UnknownOption { option } => {
                Diagnostic::error(format!("option `{}` does not exist", option))
                    .with_suggestion("Run `pantry inspect <recipe>` to list declared options")
            }

            RecipeError::RootAndComponents { package, fields } => Diagnostic::error(format!(
                "`{}` sets both root cpp_info and components",
                package
            ))
            .with_context(format!("root fields set: {}", fields.join(", ")))
            .with_suggestion("Move the root libs/defines into a component"),

            RecipeError::UnknownComponent {
                package,
                requirement,
                available,
            } => {
                let mut diag = Diagnostic::error(format!(
                    "`{}` requires unknown component `{}`",
                    package, requirement
                ));
                if !available.is_empty() {
                    diag = diag.with_context(format!("available: {}", available.join(", ")));
                }
                diag
            }

            RecipeError::PackageIdChanged {
                reference,
                before,
                after,
            } => Diagnostic::error(format!(
                "package id of `{}` changed during the build",
                reference
            ))
            .with_context(format!("computed before build: {}", before))
            .with_context(format!("computed after package(): {}", after))
            .with_suggestion("package_id() must only depend on settings, options and requirements"),

            other => Diagnostic::error(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_invalid_configuration_found_through_context() {
        let err: anyhow::Error = Err::<(), _>(InvalidConfiguration::new("only Linux supported"))
            .context("validate() of foo/1.0")
            .unwrap_err();
        let invalid = as_invalid_configuration(&err).unwrap();
        assert_eq!(invalid.reason, "only Linux supported");
    }

    #[test]
    fn test_option_diagnostic() {
        let err = RecipeError::OptionValueNotAllowed {
            option: "backend".to_string(),
            value: "tcp".to_string(),
            allowed: vec!["c".to_string(), "pico".to_string()],
        };
        let out = err.to_diagnostic().format(false);
        assert!(out.contains("invalid value `tcp` for option `backend`"));
        assert!(out.contains("possible values: c, pico"));
    }
}
