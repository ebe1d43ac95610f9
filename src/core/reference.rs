//! Recipe references: `name/version`, `name/[range]`, and glob patterns.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::version::{Version, VersionExpr};

/// A requested reference, possibly with a version range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeRef {
    pub name: String,
    pub version: VersionExpr,
}

impl RecipeRef {
    /// Whether a resolved candidate satisfies this request.
    pub fn matches(&self, resolved: &ResolvedRef) -> bool {
        self.name == resolved.name && self.version.matches(&resolved.version)
    }
}

impl FromStr for RecipeRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        // `@user/channel` suffixes carry no meaning here.
        let s = s.trim();
        let s = s.split_once('@').map(|(head, _)| head).unwrap_or(s);
        let Some((name, version)) = s.split_once('/') else {
            bail!("invalid reference `{}`: expected `name/version`", s);
        };
        validate_name(name)?;
        Ok(RecipeRef {
            name: name.to_string(),
            version: version.parse()?,
        })
    }
}

impl fmt::Display for RecipeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

impl Serialize for RecipeRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RecipeRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A concrete `name/version` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResolvedRef {
    pub name: String,
    pub version: Version,
}

impl ResolvedRef {
    pub fn new(name: impl Into<String>, version: impl Into<Version>) -> Self {
        ResolvedRef {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl From<(&str, &str)> for ResolvedRef {
    fn from((name, version): (&str, &str)) -> Self {
        ResolvedRef::new(name, Version::new(version))
    }
}

impl fmt::Display for ResolvedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

impl Serialize for ResolvedRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A glob over references, as used by `pattern:key=value` entries.
///
/// Patterns without a `/` match on the package name alone, so `zlib`,
/// `zlib/*` and `zl*` all select `zlib/1.3.1`.
#[derive(Debug, Clone)]
pub struct RefPattern {
    raw: String,
    pattern: glob::Pattern,
    by_name: bool,
}

impl RefPattern {
    pub fn new(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let pattern = glob::Pattern::new(raw)
            .map_err(|e| anyhow::anyhow!("invalid reference pattern `{}`: {}", raw, e))?;
        Ok(RefPattern {
            raw: raw.to_string(),
            pattern,
            by_name: !raw.contains('/'),
        })
    }

    pub fn matches(&self, reference: &ResolvedRef) -> bool {
        if self.by_name {
            self.pattern.matches(&reference.name)
        } else {
            self.pattern.matches(&reference.to_string())
        }
    }

    /// Match against a bare package name (no version known yet).
    pub fn matches_name(&self, name: &str) -> bool {
        if self.by_name {
            return self.pattern.matches(name);
        }
        match self.raw.split_once('/') {
            Some((name_pat, version_pat)) => {
                version_pat == "*"
                    && glob::Pattern::new(name_pat)
                        .map(|p| p.matches(name))
                        .unwrap_or(false)
            }
            None => false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl PartialEq for RefPattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl fmt::Display for RefPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("package name cannot be empty");
    }
    let valid = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '+'));
    if !valid {
        bail!("invalid package name `{}`", name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exact() {
        let r: RecipeRef = "zlib/1.3.1".parse().unwrap();
        assert_eq!(r.name, "zlib");
        assert!(!r.version.is_range());
        assert_eq!(r.to_string(), "zlib/1.3.1");
    }

    #[test]
    fn test_parse_range_and_channel() {
        let r: RecipeRef = "eigen/[>=3.3 <4]@user/stable".parse().unwrap();
        assert_eq!(r.name, "eigen");
        assert!(r.matches(&ResolvedRef::from(("eigen", "3.4.0"))));
        assert!(!r.matches(&ResolvedRef::from(("eigen", "4.0.0"))));
    }

    #[test]
    fn test_parse_invalid() {
        assert!("zlib".parse::<RecipeRef>().is_err());
        assert!("bad name/1.0".parse::<RecipeRef>().is_err());
    }

    #[test]
    fn test_pattern_by_name() {
        let p = RefPattern::new("boost*").unwrap();
        assert!(p.matches(&ResolvedRef::from(("boost", "1.83.0"))));
        assert!(p.matches_name("boost"));
        assert!(!p.matches_name("zlib"));
    }

    #[test]
    fn test_pattern_with_version() {
        let p = RefPattern::new("openssl/3.*").unwrap();
        assert!(p.matches(&ResolvedRef::from(("openssl", "3.2.0"))));
        assert!(!p.matches(&ResolvedRef::from(("openssl", "1.1.1w"))));
        assert!(!p.matches_name("openssl"));

        let any = RefPattern::new("openssl/*").unwrap();
        assert!(any.matches_name("openssl"));
    }
}
