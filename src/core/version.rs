//! Recipe versions and version-range expressions.
//!
//! Recipe versions are free-form strings (`1.2.13`, `1.1.1w`, `cci.20230101`,
//! `4.1.1.1`). Range matching goes through `semver`: versions are mapped to a
//! semver triple when their leading components are numeric, and versions that
//! cannot be mapped only ever match exact references.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use semver::VersionReq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A recipe version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    raw: String,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Item<'a> {
    // Declared first so that text sorts below numbers.
    Text(&'a str),
    // Leading digits plus any suffix, so `1w` sorts after `1`.
    Number(u64, &'a str),
}

impl Version {
    /// Create a version from its textual form.
    pub fn new(raw: impl Into<String>) -> Self {
        Version {
            raw: raw.into().trim().to_string(),
        }
    }

    /// The version as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn main_part(&self) -> &str {
        self.raw
            .split(['-', '+'])
            .next()
            .unwrap_or(self.raw.as_str())
    }

    fn items(&self) -> Vec<Item<'_>> {
        self.main_part()
            .split('.')
            .map(|p| {
                let split = p.find(|c: char| !c.is_ascii_digit()).unwrap_or(p.len());
                match p[..split].parse::<u64>() {
                    Ok(n) => Item::Number(n, &p[split..]),
                    Err(_) => Item::Text(p),
                }
            })
            .collect()
    }

    fn numeric(&self, index: usize) -> Option<u64> {
        let part = self.main_part().split('.').nth(index)?;
        let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }

    /// Major component, if numeric.
    pub fn major(&self) -> Option<u64> {
        self.numeric(0)
    }

    /// Minor component, if present and numeric.
    pub fn minor(&self) -> Option<u64> {
        self.numeric(1)
    }

    /// Patch component, if present and numeric.
    pub fn patch(&self) -> Option<u64> {
        self.numeric(2)
    }

    /// Map to a semver triple for range matching.
    ///
    /// Missing minor/patch components are zero-filled. Versions whose first
    /// component is not a number (e.g. `cci.20230101`) have no mapping.
    pub fn to_semver(&self) -> Option<semver::Version> {
        if let Ok(v) = semver::Version::parse(&self.raw) {
            return Some(v);
        }
        let major = self.main_part().split('.').next()?.parse::<u64>().ok()?;
        let minor = self.minor().unwrap_or(0);
        let patch = self.patch().unwrap_or(0);
        Some(semver::Version::new(major, minor, patch))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.items()
            .cmp(&other.items())
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Version::new(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // YAML keys like `1.3` arrive as floats, so accept any scalar.
        let value = serde_yaml::Value::deserialize(deserializer)?;
        match value {
            serde_yaml::Value::String(s) => Ok(Version::new(s)),
            serde_yaml::Value::Number(n) => Ok(Version::new(n.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "invalid version: {:?}",
                other
            ))),
        }
    }
}

/// A version range: alternatives joined by `||`, each a conjunction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    raw: String,
    alternatives: Vec<VersionReq>,
    include_prerelease: bool,
}

impl VersionRange {
    /// Parse the inside of a `[...]` range expression.
    pub fn parse(expr: &str) -> Result<Self> {
        let mut body = expr.trim();
        let mut include_prerelease = false;
        if let Some((head, flags)) = body.split_once(',') {
            for flag in flags.split(',').map(str::trim) {
                match flag {
                    "include_prerelease" => include_prerelease = true,
                    "" => {}
                    other => tracing::debug!("ignoring range flag `{}`", other),
                }
            }
            body = head.trim();
        }

        let mut alternatives = Vec::new();
        for alt in body.split("||") {
            alternatives.push(parse_conjunction(alt.trim())?);
        }

        Ok(VersionRange {
            raw: expr.trim().to_string(),
            alternatives,
            include_prerelease,
        })
    }

    /// Check whether `version` satisfies this range.
    pub fn matches(&self, version: &Version) -> bool {
        let Some(mut v) = version.to_semver() else {
            return false;
        };
        if self.include_prerelease {
            v.pre = semver::Prerelease::EMPTY;
        }
        self.alternatives.iter().any(|req| req.matches(&v))
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.raw)
    }
}

fn parse_conjunction(expr: &str) -> Result<VersionReq> {
    if expr.is_empty() || expr == "*" {
        return Ok(VersionReq::STAR);
    }

    let mut comparators = Vec::new();
    let mut tokens = expr.split_whitespace().peekable();
    while let Some(tok) = tokens.next() {
        // Allow `>= 1.0` with a space after the operator.
        let tok = if tok.chars().all(|c| "<>=~^".contains(c)) {
            match tokens.next() {
                Some(next) => format!("{}{}", tok, next),
                None => bail!("dangling operator `{}` in version range `{}`", tok, expr),
            }
        } else {
            tok.to_string()
        };

        let starts_with_op = tok.starts_with(['<', '>', '=', '~', '^']);
        let tok = if starts_with_op || tok == "*" || tok.contains(".*") || tok.contains(".x") {
            tok
        } else {
            format!("={}", tok)
        };
        comparators.push(tok);
    }

    let joined = comparators.join(", ");
    VersionReq::parse(&joined)
        .map_err(|e| anyhow::anyhow!("invalid version range `{}`: {}", expr, e))
}

/// The version part of a reference: exact or a range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionExpr {
    Exact(Version),
    Range(VersionRange),
}

impl VersionExpr {
    /// Check whether a candidate version satisfies this expression.
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            VersionExpr::Exact(v) => v == version,
            VersionExpr::Range(r) => r.matches(version),
        }
    }

    /// Pick the highest candidate that satisfies this expression.
    pub fn select<'a, I>(&self, candidates: I) -> Option<&'a Version>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        candidates.into_iter().filter(|v| self.matches(v)).max()
    }

    pub fn is_range(&self) -> bool {
        matches!(self, VersionExpr::Range(_))
    }
}

impl FromStr for VersionExpr {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(inner) = s.strip_prefix('[') {
            let Some(inner) = inner.strip_suffix(']') else {
                bail!("unterminated version range `{}`", s);
            };
            Ok(VersionExpr::Range(VersionRange::parse(inner)?))
        } else if s.is_empty() {
            bail!("empty version");
        } else {
            Ok(VersionExpr::Exact(Version::new(s)))
        }
    }
}

impl fmt::Display for VersionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionExpr::Exact(v) => write!(f, "{}", v),
            VersionExpr::Range(r) => write!(f, "{}", r),
        }
    }
}
