//! Profile settings: dotted keys such as `os`, `compiler.version`,
//! `cuda.architectures`.

use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::core::errors::RecipeError;

/// An ordered map of setting values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    values: IndexMap<String, String>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut settings = Settings::new();
        for (k, v) in pairs {
            settings.set(k, v);
        }
        settings
    }

    /// Get a setting, failing when it is not defined.
    pub fn get(&self, key: &str) -> Result<&str, RecipeError> {
        self.get_safe(key).ok_or_else(|| RecipeError::SettingMissing {
            setting: key.to_string(),
        })
    }

    pub fn get_safe(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Whether `key` is defined and equal to `value`.
    pub fn is(&self, key: &str, value: &str) -> bool {
        self.get_safe(key) == Some(value)
    }

    /// Whether `key` is defined and equal to one of `values`.
    pub fn is_any(&self, key: &str, values: &[&str]) -> bool {
        self.get_safe(key).is_some_and(|v| values.contains(&v))
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Remove a setting and all of its sub-settings, if present.
    pub fn rm_safe(&mut self, key: &str) {
        let prefix = format!("{}.", key);
        self.values
            .retain(|k, _| k.as_str() != key && !k.starts_with(&prefix));
    }

    /// Remove a setting and its sub-settings; it must exist.
    pub fn remove(&mut self, key: &str) -> Result<(), RecipeError> {
        if !self.contains(key) {
            return Err(RecipeError::SettingMissing {
                setting: key.to_string(),
            });
        }
        self.rm_safe(key);
        Ok(())
    }

    /// Keep only settings whose root key is in `roots`.
    pub fn filtered(&self, roots: &[String]) -> Settings {
        let values = self
            .values
            .iter()
            .filter(|(k, _)| {
                let root = k.split('.').next().unwrap_or(k);
                roots.iter().any(|r| r == root)
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Settings { values }
    }

    /// Overlay another set of settings; `other` wins.
    pub fn update(&mut self, other: &Settings) {
        for (k, v) in &other.values {
            self.values.insert(k.clone(), v.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn sorted(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn os(&self) -> Option<&str> {
        self.get_safe("os")
    }

    pub fn arch(&self) -> Option<&str> {
        self.get_safe("arch")
    }

    pub fn compiler(&self) -> Option<&str> {
        self.get_safe("compiler")
    }

    pub fn build_type(&self) -> Option<&str> {
        self.get_safe("build_type")
    }
}
