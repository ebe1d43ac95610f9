//! Recipe options: typed values constrained to declared domains.
//!
//! Options are a plain key-value map with explicit `get_safe`/`rm_safe`/
//! `remove` operations. Removal is only allowed while the engine runs
//! `config_options()` and `configure()`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};

use crate::core::errors::RecipeError;
use crate::core::reference::{RefPattern, ResolvedRef};

/// A single option value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OptionValue {
    None,
    Bool(bool),
    Text(String),
}

impl OptionValue {
    /// Parse a textual value, recognizing `True`/`False`/`None`.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "True" | "true" => OptionValue::Bool(true),
            "False" | "false" => OptionValue::Bool(false),
            "None" => OptionValue::None,
            other => OptionValue::Text(other.to_string()),
        }
    }

    /// Truthiness: `True` and any text other than `False`/`0`/empty.
    pub fn is_true(&self) -> bool {
        match self {
            OptionValue::None => false,
            OptionValue::Bool(b) => *b,
            OptionValue::Text(s) => !matches!(s.as_str(), "" | "0" | "False" | "false"),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            OptionValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::None => f.write_str("None"),
            OptionValue::Bool(true) => f.write_str("True"),
            OptionValue::Bool(false) => f.write_str("False"),
            OptionValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(b: bool) -> Self {
        OptionValue::Bool(b)
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        OptionValue::parse(s)
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> Self {
        OptionValue::parse(&s)
    }
}

impl From<i64> for OptionValue {
    fn from(n: i64) -> Self {
        OptionValue::Text(n.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<RawValue> for OptionValue {
    fn from(raw: RawValue) -> Self {
        match raw {
            RawValue::Bool(b) => OptionValue::Bool(b),
            RawValue::Int(n) => OptionValue::Text(n.to_string()),
            RawValue::Float(n) => OptionValue::Text(n.to_string()),
            RawValue::Text(s) => OptionValue::parse(&s),
        }
    }
}

impl<'de> Deserialize<'de> for OptionValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawValue::deserialize(deserializer).map(Into::into)
    }
}

/// The set of values an option accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionDomain {
    Any,
    Values(Vec<OptionValue>),
}

impl OptionDomain {
    /// Boolean domain `[True, False]`.
    pub fn boolean() -> Self {
        OptionDomain::Values(vec![OptionValue::Bool(true), OptionValue::Bool(false)])
    }

    pub fn values<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<OptionValue>,
    {
        let values: Vec<OptionValue> = values.into_iter().map(Into::into).collect();
        if values.iter().any(|v| v.as_text() == Some("ANY")) {
            return OptionDomain::Any;
        }
        OptionDomain::Values(values)
    }

    pub fn allows(&self, value: &OptionValue) -> bool {
        match self {
            OptionDomain::Any => true,
            OptionDomain::Values(values) => values.contains(value),
        }
    }

    pub fn describe(&self) -> Vec<String> {
        match self {
            OptionDomain::Any => vec!["ANY".to_string()],
            OptionDomain::Values(values) => values.iter().map(|v| v.to_string()).collect(),
        }
    }
}

impl<'de> Deserialize<'de> for OptionDomain {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Single(String),
            List(Vec<OptionValue>),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Single(s) if s == "ANY" => Ok(OptionDomain::Any),
            Raw::Single(s) => Err(serde::de::Error::custom(format!(
                "option domain must be a list or \"ANY\", found `{}`",
                s
            ))),
            Raw::List(values) => Ok(OptionDomain::values(values)),
        }
    }
}

/// An option assignment addressed at the dependencies matching a pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyOption {
    pub pattern: RefPattern,
    pub name: String,
    pub value: OptionValue,
}

/// A `[pattern:]name=value` assignment from the command line or a profile.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionAssignment {
    pub pattern: Option<RefPattern>,
    pub name: String,
    pub value: OptionValue,
}

impl FromStr for OptionAssignment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let Some((key, value)) = s.split_once('=') else {
            bail!("invalid option `{}`: expected `[pattern:]name=value`", s);
        };
        let (pattern, name) = match key.rsplit_once(':') {
            Some((pattern, name)) => (Some(RefPattern::new(pattern)?), name),
            None => (None, key),
        };
        let name = name.trim();
        if name.is_empty() {
            bail!("invalid option `{}`: empty option name", s);
        }
        Ok(OptionAssignment {
            pattern,
            name: name.to_string(),
            value: OptionValue::parse(value),
        })
    }
}

/// The options of one recipe instance.
#[derive(Debug, Clone, Default)]
pub struct Options {
    domains: IndexMap<String, OptionDomain>,
    values: IndexMap<String, OptionValue>,
    removed: BTreeSet<String>,
    dependencies: Vec<DependencyOption>,
    removable: bool,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an option with its domain and initial value.
    pub fn declare(&mut self, name: &str, domain: OptionDomain, default: OptionValue) {
        self.domains.insert(name.to_string(), domain);
        self.values.insert(name.to_string(), default);
    }

    /// Whether the option is currently defined.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Whether the option was declared and later removed.
    pub fn was_removed(&self, name: &str) -> bool {
        self.removed.contains(name)
    }

    /// Get an option, failing if it does not exist.
    pub fn get(&self, name: &str) -> Result<&OptionValue, RecipeError> {
        self.values.get(name).ok_or_else(|| self.missing(name))
    }

    /// Get an option, or `None` when it was removed or never declared.
    pub fn get_safe(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }

    /// Get an option, or `default` when it was removed or never declared.
    pub fn get_safe_or(&self, name: &str, default: impl Into<OptionValue>) -> OptionValue {
        self.values
            .get(name)
            .cloned()
            .unwrap_or_else(|| default.into())
    }

    /// Whether the option exists and is truthy.
    pub fn is_true(&self, name: &str) -> bool {
        self.get_safe(name).map(|v| v.is_true()).unwrap_or(false)
    }

    /// Compare an option against a value; removed options never match.
    pub fn is(&self, name: &str, value: impl Into<OptionValue>) -> bool {
        self.get_safe(name) == Some(&value.into())
    }

    /// Set an option, checking the value against its domain.
    pub fn set(&mut self, name: &str, value: impl Into<OptionValue>) -> Result<(), RecipeError> {
        let value = value.into();
        let Some(domain) = self.domains.get(name) else {
            return Err(RecipeError::UnknownOption {
                option: name.to_string(),
            });
        };
        if !self.values.contains_key(name) {
            return Err(RecipeError::OptionRemoved {
                option: name.to_string(),
            });
        }
        if !domain.allows(&value) {
            return Err(RecipeError::OptionValueNotAllowed {
                option: name.to_string(),
                value: value.to_string(),
                allowed: domain.describe(),
            });
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Remove an option; it must exist.
    pub fn remove(&mut self, name: &str) -> Result<(), RecipeError> {
        if !self.removable {
            return Err(RecipeError::RemoveOutsideConfigure {
                option: name.to_string(),
            });
        }
        if self.values.shift_remove(name).is_none() {
            return Err(self.missing(name));
        }
        self.removed.insert(name.to_string());
        Ok(())
    }

    /// Remove an option if it exists.
    pub fn rm_safe(&mut self, name: &str) -> Result<(), RecipeError> {
        if self.contains(name) {
            self.remove(name)?;
        }
        Ok(())
    }

    pub(crate) fn set_removable(&mut self, removable: bool) {
        self.removable = removable;
    }

    /// Set an option on every dependency matching `pattern`.
    ///
    /// The value is applied before the dependency's own `config_options()`
    /// and `configure()` run.
    pub fn set_dependency(
        &mut self,
        pattern: &str,
        name: &str,
        value: impl Into<OptionValue>,
    ) -> Result<()> {
        self.dependencies.push(DependencyOption {
            pattern: RefPattern::new(pattern)?,
            name: name.to_string(),
            value: value.into(),
        });
        Ok(())
    }

    /// Dependency options that apply to `reference`.
    pub fn dependency_options_for<'a>(
        &'a self,
        reference: &'a ResolvedRef,
    ) -> impl Iterator<Item = &'a DependencyOption> + 'a {
        self.dependencies
            .iter()
            .filter(move |d| d.pattern.matches(reference))
    }

    /// Declared domain for an option.
    pub fn domain(&self, name: &str) -> Option<&OptionDomain> {
        self.domains.get(name)
    }

    /// Check every current value against its domain. An option still unset
    /// at this point is an error unless its domain admits `None`.
    pub fn validate(&self) -> Result<(), RecipeError> {
        self.check(false)
    }

    /// Like [`Options::validate`], but options without a value yet pass.
    /// Profiles and consumers may still assign them.
    pub fn validate_assigned(&self) -> Result<(), RecipeError> {
        self.check(true)
    }

    fn check(&self, allow_unset: bool) -> Result<(), RecipeError> {
        for (name, value) in &self.values {
            let Some(domain) = self.domains.get(name) else {
                continue;
            };
            if domain.allows(value) {
                continue;
            }
            if *value == OptionValue::None {
                if allow_unset {
                    continue;
                }
                return Err(RecipeError::OptionNotDefined {
                    option: name.clone(),
                    allowed: domain.describe(),
                });
            }
            return Err(RecipeError::OptionValueNotAllowed {
                option: name.clone(),
                value: value.to_string(),
                allowed: domain.describe(),
            });
        }
        Ok(())
    }

    /// Current options in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Current options sorted by name, rendered as text.
    pub fn sorted(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn missing(&self, name: &str) -> RecipeError {
        if self.removed.contains(name) {
            RecipeError::OptionRemoved {
                option: name.to_string(),
            }
        } else {
            RecipeError::UnknownOption {
                option: name.to_string(),
            }
        }
    }
}
