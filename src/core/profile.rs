//! Profiles: the host and build-host descriptions a graph is resolved under.
//!
//! ```text
//! include(base)
//!
//! [settings]
//! os=Linux
//! compiler=gcc
//! compiler.version=11
//!
//! [options]
//! shared=False
//! boost/*:with_system=True
//!
//! [conf]
//! tools.build:jobs=8
//! tools.build:cxxflags+=['-g']
//!
//! [tool_requires]
//! cmake/3.27.0
//! zlib/*:ninja/1.11.1
//! ```

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::conf::Conf;
use crate::core::options::OptionAssignment;
use crate::core::reference::{RecipeRef, RefPattern, ResolvedRef};
use crate::core::settings::Settings;
use crate::util::diagnostic::ProfileParseError;

/// A tool requirement injected by a profile.
#[derive(Debug, Clone)]
pub struct ProfileToolRequire {
    /// Packages it applies to; `None` means every package in the host graph.
    pub pattern: Option<RefPattern>,
    pub reference: RecipeRef,
}

impl ProfileToolRequire {
    pub fn applies_to(&self, reference: &ResolvedRef) -> bool {
        self.pattern
            .as_ref()
            .map(|p| p.matches(reference))
            .unwrap_or(true)
    }
}

/// A parsed profile.
#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub settings: Settings,
    pub options: Vec<OptionAssignment>,
    pub conf: Conf,
    pub tool_requires: Vec<ProfileToolRequire>,
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    None,
    Settings,
    Options,
    Conf,
    ToolRequires,
}

impl Profile {
    /// Load a profile from disk, following `include()` lines relative to it.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read profile: {}", path.display()))?;
        let base = path.parent().unwrap_or(Path::new("."));
        let name = path.display().to_string();
        Self::parse_with_includes(&name, &text, &mut |include: &str| {
            Profile::load(&base.join(include))
        })
    }

    /// Parse profile text with no include support.
    pub fn parse(name: &str, text: &str) -> Result<Self> {
        Self::parse_with_includes(name, text, &mut |include: &str| {
            anyhow::bail!("include({}) is not supported here", include)
        })
    }

    fn parse_with_includes(
        name: &str,
        text: &str,
        load_include: &mut dyn FnMut(&str) -> Result<Profile>,
    ) -> Result<Self> {
        let mut profile = Profile::default();
        let mut section = Section::None;

        for (line_no, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let err = |reason: String| ProfileParseError::at_line(name, text, line_no, reason);

            if let Some(include) = line
                .strip_prefix("include(")
                .and_then(|rest| rest.strip_suffix(')'))
            {
                if section != Section::None {
                    return Err(err("include() must appear before any section".into()).into());
                }
                let included = load_include(include.trim())?;
                profile.update(&included);
                continue;
            }

            if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                section = match header.trim() {
                    "settings" => Section::Settings,
                    "options" => Section::Options,
                    "conf" => Section::Conf,
                    "tool_requires" | "build_requires" => Section::ToolRequires,
                    other => return Err(err(format!("unknown section `[{}]`", other)).into()),
                };
                continue;
            }

            match section {
                Section::None => {
                    return Err(err("entry outside of any section".into()).into());
                }
                Section::Settings => {
                    let Some((key, value)) = line.split_once('=') else {
                        return Err(err("missing `=`".into()).into());
                    };
                    let key = key.trim();
                    if key.contains(':') {
                        return Err(err(format!(
                            "package-scoped setting `{}` is not supported",
                            key
                        ))
                        .into());
                    }
                    profile.settings.set(key, value.trim());
                }
                Section::Options => {
                    let assignment: OptionAssignment =
                        line.parse().map_err(|e: anyhow::Error| err(e.to_string()))?;
                    profile.options.push(assignment);
                }
                Section::Conf => {
                    profile
                        .conf
                        .apply_line(line)
                        .map_err(|e| err(e.to_string()))?;
                }
                Section::ToolRequires => {
                    let tool = parse_tool_require(line).map_err(|e| err(e.to_string()))?;
                    profile.tool_requires.push(tool);
                }
            }
        }

        Ok(profile)
    }

    /// Overlay another profile on this one; `other` wins on conflicts.
    pub fn update(&mut self, other: &Profile) {
        self.settings.update(&other.settings);
        self.options.extend(other.options.iter().cloned());
        self.conf.update(&other.conf);
        self.tool_requires.extend(other.tool_requires.iter().cloned());
    }

    /// Apply `-s`, `-o` and `-c` command-line overrides.
    pub fn apply_overrides(
        &mut self,
        settings: &[String],
        options: &[String],
        conf: &[String],
    ) -> Result<()> {
        for s in settings {
            let Some((key, value)) = s.split_once('=') else {
                anyhow::bail!("invalid setting `{}`: expected `key=value`", s);
            };
            self.settings.set(key.trim(), value.trim());
        }
        for o in options {
            self.options.push(o.parse()?);
        }
        for c in conf {
            self.conf.apply_line(c)?;
        }
        Ok(())
    }

    /// Render the profile back into its text form.
    pub fn to_text(&self) -> String {
        let mut out = String::from("[settings]\n");
        for (k, v) in self.settings.iter() {
            let _ = writeln!(out, "{}={}", k, v);
        }
        if !self.options.is_empty() {
            out.push_str("\n[options]\n");
            for o in &self.options {
                match &o.pattern {
                    Some(p) => {
                        let _ = writeln!(out, "{}:{}={}", p, o.name, o.value);
                    }
                    None => {
                        let _ = writeln!(out, "{}={}", o.name, o.value);
                    }
                }
            }
        }
        if !self.conf.is_empty() {
            out.push_str("\n[conf]\n");
            for (k, v) in self.conf.iter() {
                match v {
                    serde_json::Value::String(s) => {
                        let _ = writeln!(out, "{}={}", k, s);
                    }
                    serde_json::Value::Bool(true) => {
                        let _ = writeln!(out, "{}=True", k);
                    }
                    serde_json::Value::Bool(false) => {
                        let _ = writeln!(out, "{}=False", k);
                    }
                    other => {
                        let _ = writeln!(out, "{}={}", k, other);
                    }
                }
            }
        }
        if !self.tool_requires.is_empty() {
            out.push_str("\n[tool_requires]\n");
            for t in &self.tool_requires {
                match &t.pattern {
                    Some(p) => {
                        let _ = writeln!(out, "{}:{}", p, t.reference);
                    }
                    None => {
                        let _ = writeln!(out, "{}", t.reference);
                    }
                }
            }
        }
        out
    }
}

fn parse_tool_require(line: &str) -> Result<ProfileToolRequire> {
    // `pattern:ref` - the reference itself never contains `:`.
    match line.rsplit_once(':') {
        Some((pattern, reference)) => Ok(ProfileToolRequire {
            pattern: Some(RefPattern::new(pattern)?),
            reference: reference.trim().parse()?,
        }),
        None => Ok(ProfileToolRequire {
            pattern: None,
            reference: line.parse()?,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::options::OptionValue;
    use tempfile::TempDir;

    const LINUX: &str = "\
[settings]
os=Linux
arch=x86_64
compiler=gcc
compiler.version=11
build_type=Release

[options]
shared=True
boost/*:with_system=False

[conf]
tools.build:jobs=8

[tool_requires]
cmake/3.27.0
zlib*:ninja/[>=1.10]
";

    #[test]
    fn test_parse_sections() {
        let p = Profile::parse("linux", LINUX).unwrap();
        assert!(p.settings.is("compiler.version", "11"));
        assert_eq!(p.options.len(), 2);
        assert_eq!(p.options[1].value, OptionValue::Bool(false));
        assert_eq!(p.conf.get_as::<u32>("tools.build:jobs").unwrap(), Some(8));
        assert_eq!(p.tool_requires.len(), 2);
        assert!(p.tool_requires[0].pattern.is_none());

        let zlib = ResolvedRef::from(("zlib", "1.3.1"));
        let other = ResolvedRef::from(("bzip2", "1.0.8"));
        assert!(p.tool_requires[1].applies_to(&zlib));
        assert!(!p.tool_requires[1].applies_to(&other));
    }

    #[test]
    fn test_parse_error_points_at_line() {
        let err = Profile::parse("bad", "[settings]\nos Linux\n").unwrap_err();
        let parse = err.downcast_ref::<ProfileParseError>().unwrap();
        assert!(parse.reason.contains("missing `=`"));
    }

    #[test]
    fn test_unknown_section() {
        assert!(Profile::parse("bad", "[platform]\nx=1\n").is_err());
    }

    #[test]
    fn test_include_and_overrides() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("base"), "[settings]\nos=Linux\narch=x86_64\n").unwrap();
        std::fs::write(
            tmp.path().join("child"),
            "include(base)\n\n[settings]\narch=armv8\n",
        )
        .unwrap();

        let mut p = Profile::load(&tmp.path().join("child")).unwrap();
        assert!(p.settings.is("os", "Linux"));
        assert!(p.settings.is("arch", "armv8"));

        p.apply_overrides(
            &["build_type=Debug".to_string()],
            &["mylib/*:shared=True".to_string()],
            &["user.x:y=1".to_string()],
        )
        .unwrap();
        assert!(p.settings.is("build_type", "Debug"));
        assert_eq!(p.options.len(), 1);
        assert!(p.conf.get("user.x:y").is_some());
    }

    #[test]
    fn test_to_text_reparses() {
        let p = Profile::parse("linux", LINUX).unwrap();
        let again = Profile::parse("again", &p.to_text()).unwrap();
        assert_eq!(again.settings, p.settings);
        assert_eq!(again.options, p.options);
        assert_eq!(again.tool_requires.len(), 2);
    }
}
