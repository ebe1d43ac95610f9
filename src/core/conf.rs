//! Typed configuration map (`tools.build:jobs`, `user.mylib:flag`, ...).

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Well-known conf keys read by the built-in helpers.
pub mod keys {
    pub const COMPILER_EXECUTABLES: &str = "tools.build:compiler_executables";
    pub const JOBS: &str = "tools.build:jobs";
    pub const CFLAGS: &str = "tools.build:cflags";
    pub const CXXFLAGS: &str = "tools.build:cxxflags";
    pub const DEFINES: &str = "tools.build:defines";
    pub const SHAREDLINKFLAGS: &str = "tools.build:sharedlinkflags";
    pub const EXELINKFLAGS: &str = "tools.build:exelinkflags";
    pub const PKG_CONFIG: &str = "tools.gnu:pkg_config";
    pub const BASH_PATH: &str = "tools.microsoft.bash:path";
    pub const ANDROID_NDK_PATH: &str = "tools.android:ndk_path";
    pub const CMAKE_GENERATOR: &str = "tools.cmake.cmaketoolchain:generator";
    pub const DOWNLOAD_TIMEOUT: &str = "core.net.http:timeout";
}

/// An ordered map from dotted conf keys to JSON-compatible values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conf {
    values: IndexMap<String, Value>,
}

impl Conf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Read a value converted to `T`, failing on a type mismatch.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .with_context(|| format!("conf `{}` has an unexpected type: {}", key, value)),
        }
    }

    /// Read a value converted to `T`, or `default` when undefined.
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        Ok(self.get_as(key)?.unwrap_or(default))
    }

    /// Read a value as text; scalars are stringified.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Read a list of strings; a single string becomes a one-item list.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        match self.values.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            Some(Value::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    pub fn get_bool(&self, key: &str) -> bool {
        matches!(self.values.get(key), Some(Value::Bool(true)))
    }

    pub fn define(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Append to a list value, creating it when absent.
    pub fn append(&mut self, key: &str, value: impl Into<Value>) {
        let items = as_items(value.into());
        let entry = self
            .values
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        let mut current = as_items(entry.take());
        current.extend(items);
        *entry = Value::Array(current);
    }

    /// Prepend to a list value, creating it when absent.
    pub fn prepend(&mut self, key: &str, value: impl Into<Value>) {
        let mut items = as_items(value.into());
        let entry = self
            .values
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        items.extend(as_items(entry.take()));
        *entry = Value::Array(items);
    }

    pub fn unset(&mut self, key: &str) {
        self.values.shift_remove(key);
    }

    /// Apply one `key=value` / `key+=value` / `key=+value` / `key=!` line.
    pub fn apply_line(&mut self, line: &str) -> Result<()> {
        let line = line.trim();
        if let Some(key) = line.strip_suffix("=!") {
            let key = check_key(key)?;
            self.unset(key);
        } else if let Some((key, value)) = line.split_once("+=") {
            let key = check_key(key)?;
            self.append(key, parse_conf_value(value));
        } else if let Some((key, value)) = line.split_once("=+") {
            let key = check_key(key)?;
            self.prepend(key, parse_conf_value(value));
        } else if let Some((key, value)) = line.split_once('=') {
            let key = check_key(key)?;
            self.define(key, parse_conf_value(value));
        } else {
            bail!("invalid conf line `{}`: expected `key=value`", line);
        }
        Ok(())
    }

    /// Overlay `other` on top of this conf; `other` wins.
    pub fn update(&mut self, other: &Conf) {
        for (k, v) in &other.values {
            self.values.insert(k.clone(), v.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn as_items(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

fn check_key(key: &str) -> Result<&str> {
    let key = key.trim();
    if !key.contains(':') {
        bail!(
            "invalid conf key `{}`: expected `namespace:name`, e.g. `tools.build:jobs`",
            key
        );
    }
    Ok(key)
}

/// Parse a conf value written in profile syntax.
///
/// Accepts `True`/`False`/`None`, numbers, JSON lists and dicts (single
/// quotes allowed); anything else is taken as a plain string.
pub fn parse_conf_value(text: &str) -> Value {
    let text = text.trim();
    match text {
        "True" | "true" => return Value::Bool(true),
        "False" | "false" => return Value::Bool(false),
        "None" | "" => return Value::Null,
        _ => {}
    }

    if let Ok(n) = text.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = text.parse::<f64>() {
        if text.contains('.') && !text.ends_with('.') {
            return Value::from(f);
        }
    }

    if text.starts_with(['[', '{', '"']) {
        if let Ok(v) = serde_json::from_str(text) {
            return v;
        }
        let normalized = text
            .replace('\'', "\"")
            .replace("True", "true")
            .replace("False", "false")
            .replace("None", "null");
        if let Ok(v) = serde_json::from_str(&normalized) {
            return v;
        }
    }

    Value::String(text.to_string())
}
