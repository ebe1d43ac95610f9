//! Lifecycle hook names and their fixed invocation order.

use std::fmt;

use serde::Serialize;

/// A named, optional recipe method invoked at a fixed lifecycle point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Hook {
    ExportSources,
    ConfigOptions,
    Configure,
    Layout,
    Requirements,
    BuildRequirements,
    Validate,
    ValidateBuild,
    Source,
    Generate,
    Build,
    Package,
    PackageId,
    PackageInfo,
}

impl Hook {
    /// Every hook, in invocation order.
    pub const ORDER: [Hook; 14] = [
        Hook::ExportSources,
        Hook::ConfigOptions,
        Hook::Configure,
        Hook::Layout,
        Hook::Requirements,
        Hook::BuildRequirements,
        Hook::Validate,
        Hook::ValidateBuild,
        Hook::Source,
        Hook::Generate,
        Hook::Build,
        Hook::Package,
        Hook::PackageId,
        Hook::PackageInfo,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Hook::ExportSources => "export_sources",
            Hook::ConfigOptions => "config_options",
            Hook::Configure => "configure",
            Hook::Layout => "layout",
            Hook::Requirements => "requirements",
            Hook::BuildRequirements => "build_requirements",
            Hook::Validate => "validate",
            Hook::ValidateBuild => "validate_build",
            Hook::Source => "source",
            Hook::Generate => "generate",
            Hook::Build => "build",
            Hook::Package => "package",
            Hook::PackageId => "package_id",
            Hook::PackageInfo => "package_info",
        }
    }

    /// Position in the lifecycle.
    pub fn index(self) -> usize {
        Hook::ORDER.iter().position(|h| *h == self).unwrap_or(0)
    }

    /// Hooks whose failure with `InvalidConfiguration` marks the node invalid.
    pub fn is_validation(self) -> bool {
        matches!(self, Hook::Validate | Hook::ValidateBuild)
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether `trace` is an in-order subsequence of the lifecycle.
pub fn is_ordered_trace(trace: &[Hook]) -> bool {
    trace.windows(2).all(|w| w[0].index() < w[1].index())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_matches_derive() {
        let mut sorted = Hook::ORDER;
        sorted.sort();
        assert_eq!(sorted, Hook::ORDER);
    }

    #[test]
    fn test_ordered_trace() {
        assert!(is_ordered_trace(&[Hook::Configure, Hook::Source, Hook::PackageInfo]));
        assert!(!is_ordered_trace(&[Hook::Build, Hook::Generate]));
    }
}
