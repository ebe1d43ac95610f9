//! The binary identity view (`self.info`) and package id computation.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;

use crate::core::settings::Settings;
use crate::core::version::Version;
use crate::util::hash::Fingerprint;

/// How much of a requirement's identity feeds the consumer's package id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequireMode {
    /// Not part of the id.
    Unrelated,
    /// `name/1.Y.Z`
    Major,
    /// `name/1.2.Z`
    Minor,
    /// `name/1.2.3`
    Patch,
    /// `name/<version>`
    Full,
    /// `name/<version>:<package_id>`, used when the dependency's binary is
    /// embedded in the consumer.
    PackageId,
}

/// One requirement as seen by the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequireInfo {
    pub name: String,
    pub version: Version,
    pub package_id: Option<String>,
    pub mode: RequireMode,
}

impl RequireInfo {
    fn render(&self) -> Option<String> {
        let v = &self.version;
        let numeric = v.major().is_some();
        let text = match self.mode {
            RequireMode::Unrelated => return None,
            RequireMode::Major if numeric => {
                format!("{}/{}.Y.Z", self.name, v.major().unwrap_or(0))
            }
            RequireMode::Minor if numeric => format!(
                "{}/{}.{}.Z",
                self.name,
                v.major().unwrap_or(0),
                v.minor().unwrap_or(0)
            ),
            RequireMode::Patch if numeric => format!(
                "{}/{}.{}.{}",
                self.name,
                v.major().unwrap_or(0),
                v.minor().unwrap_or(0),
                v.patch().unwrap_or(0)
            ),
            RequireMode::PackageId => format!(
                "{}/{}:{}",
                self.name,
                v,
                self.package_id.as_deref().unwrap_or("unknown")
            ),
            _ => format!("{}/{}", self.name, v),
        };
        Some(text)
    }
}

/// Mutable identity view handed to `package_id()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinaryInfo {
    /// `name/version` of the package itself. Survives `clear()`.
    pub reference: String,
    pub settings: Settings,
    pub options: BTreeMap<String, String>,
    pub requires: Vec<RequireInfo>,
}

impl BinaryInfo {
    pub fn new(
        reference: impl Into<String>,
        settings: Settings,
        options: BTreeMap<String, String>,
        requires: Vec<RequireInfo>,
    ) -> Self {
        BinaryInfo {
            reference: reference.into(),
            settings,
            options,
            requires,
        }
    }

    /// Drop everything but the reference: one binary per recipe version.
    pub fn clear(&mut self) {
        self.settings = Settings::new();
        self.options.clear();
        self.requires.clear();
    }

    pub fn remove_option(&mut self, name: &str) {
        self.options.remove(name);
    }

    pub fn remove_require(&mut self, name: &str) {
        self.requires.retain(|r| r.name != name);
    }

    pub fn set_require_mode(&mut self, name: &str, mode: RequireMode) {
        for r in self.requires.iter_mut().filter(|r| r.name == name) {
            r.mode = mode;
        }
    }

    pub fn set_all_require_modes(&mut self, mode: RequireMode) {
        for r in &mut self.requires {
            r.mode = mode;
        }
    }

    /// Canonical text form; the package id is the hash of this text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.reference.is_empty() {
            let _ = writeln!(out, "[package]\n{}", self.reference);
        }
        let settings = self.settings.sorted();
        if !settings.is_empty() {
            out.push_str("[settings]\n");
            for (k, v) in &settings {
                let _ = writeln!(out, "{}={}", k, v);
            }
        }
        if !self.options.is_empty() {
            out.push_str("[options]\n");
            for (k, v) in &self.options {
                let _ = writeln!(out, "{}={}", k, v);
            }
        }
        let mut requires: Vec<String> = self.requires.iter().filter_map(|r| r.render()).collect();
        requires.sort();
        requires.dedup();
        if !requires.is_empty() {
            out.push_str("[requires]\n");
            for r in requires {
                let _ = writeln!(out, "{}", r);
            }
        }
        out
    }

    pub fn package_id(&self) -> String {
        let mut fp = Fingerprint::new();
        fp.update_strs(self.render().lines());
        fp.finish_package_id()
    }
}
