//! Environment variable operations (`buildenv_info`, `runenv_info`,
//! `Environment` objects) and their shell-script rendering.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Result;
use indexmap::IndexMap;
use serde::Serialize;

use crate::util::fs::write_string;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
enum Piece {
    Text(String),
    /// The value the variable had before this environment applied.
    Previous,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct EnvVar {
    /// `None` after `unset`.
    pieces: Option<Vec<Piece>>,
    path: bool,
    separator: String,
}

impl EnvVar {
    fn new(path: bool, separator: Option<&str>) -> Self {
        let separator = match separator {
            Some(s) => s.to_string(),
            None if path => path_separator().to_string(),
            None => " ".to_string(),
        };
        EnvVar {
            pieces: Some(vec![Piece::Previous]),
            path,
            separator,
        }
    }

    fn render(&self, previous: &str) -> Option<String> {
        let pieces = self.pieces.as_ref()?;
        let parts: Vec<&str> = pieces
            .iter()
            .filter_map(|p| match p {
                Piece::Text(s) => Some(s.as_str()),
                Piece::Previous if previous.is_empty() => None,
                Piece::Previous => Some(previous),
            })
            .collect();
        Some(parts.join(&self.separator))
    }
}

/// Path-list separator for the host running the build.
pub fn path_separator() -> &'static str {
    if cfg!(windows) {
        ";"
    } else {
        ":"
    }
}

/// An ordered set of environment variable operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Environment {
    vars: IndexMap<String, EnvVar>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    fn set_pieces(&mut self, name: &str, path: bool, pieces: Vec<Piece>) {
        let mut var = EnvVar::new(path, None);
        var.pieces = Some(pieces);
        self.vars.insert(name.to_string(), var);
    }

    /// Replace the variable's value.
    pub fn define(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.set_pieces(name, false, vec![Piece::Text(value.into())]);
        self
    }

    /// Replace the variable's value with a path.
    pub fn define_path(&mut self, name: &str, value: impl AsRef<Path>) -> &mut Self {
        let value = value.as_ref().display().to_string();
        self.set_pieces(name, true, vec![Piece::Text(value)]);
        self
    }

    fn add(&mut self, name: &str, value: String, path: bool, front: bool, sep: Option<&str>) {
        let var = self
            .vars
            .entry(name.to_string())
            .or_insert_with(|| EnvVar::new(path, sep));
        let pieces = var.pieces.get_or_insert_with(Vec::new);
        if front {
            pieces.insert(0, Piece::Text(value));
        } else {
            pieces.push(Piece::Text(value));
        }
    }

    /// Append to a space-separated variable.
    pub fn append(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.add(name, value.into(), false, false, None);
        self
    }

    /// Prepend to a space-separated variable.
    pub fn prepend(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.add(name, value.into(), false, true, None);
        self
    }

    /// Append to a variable with an explicit separator.
    pub fn append_with(&mut self, name: &str, value: impl Into<String>, sep: &str) -> &mut Self {
        self.add(name, value.into(), false, false, Some(sep));
        self
    }

    /// Append to a path-list variable.
    pub fn append_path(&mut self, name: &str, value: impl AsRef<Path>) -> &mut Self {
        let value = value.as_ref().display().to_string();
        self.add(name, value, true, false, None);
        self
    }

    /// Prepend to a path-list variable.
    pub fn prepend_path(&mut self, name: &str, value: impl AsRef<Path>) -> &mut Self {
        let value = value.as_ref().display().to_string();
        self.add(name, value, true, true, None);
        self
    }

    /// Remove the variable from the environment.
    pub fn unset(&mut self, name: &str) -> &mut Self {
        let mut var = EnvVar::new(false, None);
        var.pieces = None;
        self.vars.insert(name.to_string(), var);
        self
    }

    /// Compose with a lower-priority environment.
    ///
    /// Variables only in `other` are added. Where this environment refers to
    /// the previous value of a variable, `other`'s operations are spliced in.
    pub fn compose(&mut self, other: &Environment) {
        for (name, theirs) in &other.vars {
            match self.vars.get_mut(name) {
                None => {
                    self.vars.insert(name.clone(), theirs.clone());
                }
                Some(ours) => {
                    let Some(pieces) = ours.pieces.as_mut() else {
                        continue;
                    };
                    let Some(pos) = pieces.iter().position(|p| *p == Piece::Previous) else {
                        continue;
                    };
                    match &theirs.pieces {
                        Some(their_pieces) => {
                            pieces.splice(pos..=pos, their_pieces.iter().cloned());
                        }
                        None => {
                            pieces.remove(pos);
                        }
                    }
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    /// Evaluate against the process environment. `None` means unset.
    pub fn vars(&self) -> IndexMap<String, Option<String>> {
        self.vars_with(|name| std::env::var(name).ok())
    }

    /// Evaluate against a custom lookup of previous values.
    pub fn vars_with(
        &self,
        previous: impl Fn(&str) -> Option<String>,
    ) -> IndexMap<String, Option<String>> {
        self.vars
            .iter()
            .map(|(name, var)| {
                let prev = previous(name).unwrap_or_default();
                (name.clone(), var.render(&prev))
            })
            .collect()
    }

    /// Value of one variable, ignoring the previous value.
    pub fn value(&self, name: &str) -> Option<String> {
        self.vars.get(name)?.render("")
    }

    /// Write `<name>.sh` (and `<name>.bat` on Windows) activating this
    /// environment. Returns the script for the current platform.
    pub fn save_script(&self, folder: &Path, name: &str) -> Result<PathBuf> {
        let sh = folder.join(format!("{}.sh", name));
        write_string(&sh, &self.render_sh())?;
        if cfg!(windows) {
            let bat = folder.join(format!("{}.bat", name));
            write_string(&bat, &self.render_bat())?;
            return Ok(bat);
        }
        Ok(sh)
    }

    pub fn render_sh(&self) -> String {
        let mut out = String::from("# generated by pantry\n");
        for (name, var) in &self.vars {
            match var.render(&format!("${}", name)) {
                None => {
                    let _ = writeln!(out, "unset {}", name);
                }
                Some(value) => {
                    let value = value.replace('"', "\\\"");
                    let _ = writeln!(out, "export {}=\"{}\"", name, value);
                }
            }
        }
        out
    }

    pub fn render_bat(&self) -> String {
        let mut out = String::from("@echo off\nREM generated by pantry\n");
        for (name, var) in &self.vars {
            match var.render(&format!("%{}%", name)) {
                None => {
                    let _ = writeln!(out, "set \"{}=\"", name);
                }
                Some(value) => {
                    let _ = writeln!(out, "set \"{}={}\"", name, value);
                }
            }
        }
        out
    }
}
