//! Requirements declared by recipes and the traits carried on graph edges.

use std::fmt;

use serde::Serialize;

use crate::core::options::OptionValue;
use crate::core::recipe::PackageType;
use crate::core::reference::RecipeRef;

/// What an edge is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    /// `requires`: linked into the host.
    Host,
    /// `tool_requires`: runs on the build machine.
    Tool,
    /// `test_requires`: only for building and testing this package.
    Test,
}

impl fmt::Display for RequirementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequirementKind::Host => f.write_str("requires"),
            RequirementKind::Tool => f.write_str("tool_requires"),
            RequirementKind::Test => f.write_str("test_requires"),
        }
    }
}

/// A requirement as declared by a recipe. Unset traits take defaults
/// derived from the consumer and dependency package types.
#[derive(Debug, Clone)]
pub struct Requirement {
    pub reference: RecipeRef,
    pub kind: RequirementKind,
    pub headers: Option<bool>,
    pub libs: Option<bool>,
    pub run: Option<bool>,
    pub visible: Option<bool>,
    pub transitive_headers: Option<bool>,
    pub transitive_libs: Option<bool>,
    /// Option values pushed onto the dependency.
    pub options: Vec<(String, OptionValue)>,
}

impl Requirement {
    pub fn new(reference: RecipeRef, kind: RequirementKind) -> Self {
        Requirement {
            reference,
            kind,
            headers: None,
            libs: None,
            run: None,
            visible: None,
            transitive_headers: None,
            transitive_libs: None,
            options: Vec::new(),
        }
    }

    pub fn headers(&mut self, value: bool) -> &mut Self {
        self.headers = Some(value);
        self
    }

    pub fn libs(&mut self, value: bool) -> &mut Self {
        self.libs = Some(value);
        self
    }

    pub fn run(&mut self, value: bool) -> &mut Self {
        self.run = Some(value);
        self
    }

    pub fn visible(&mut self, value: bool) -> &mut Self {
        self.visible = Some(value);
        self
    }

    pub fn transitive_headers(&mut self, value: bool) -> &mut Self {
        self.transitive_headers = Some(value);
        self
    }

    pub fn transitive_libs(&mut self, value: bool) -> &mut Self {
        self.transitive_libs = Some(value);
        self
    }

    pub fn option(&mut self, name: &str, value: impl Into<OptionValue>) -> &mut Self {
        self.options.push((name.to_string(), value.into()));
        self
    }

    /// Resolve the effective traits of this edge.
    ///
    /// `consumer` and `dependency` are the concrete package types, with
    /// `library` already resolved through the `shared` option.
    pub fn traits(&self, consumer: PackageType, dependency: PackageType) -> EdgeTraits {
        match self.kind {
            RequirementKind::Tool => EdgeTraits {
                headers: self.headers.unwrap_or(false),
                libs: self.libs.unwrap_or(false),
                run: self.run.unwrap_or(true),
                visible: self.visible.unwrap_or(false),
                build: true,
                test: false,
                transitive_headers: self.transitive_headers.unwrap_or(false),
                transitive_libs: self.transitive_libs.unwrap_or(false),
            },
            RequirementKind::Host | RequirementKind::Test => {
                let is_app = dependency == PackageType::Application;
                let header_only = dependency == PackageType::HeaderLibrary;
                let default_run =
                    matches!(dependency, PackageType::Application | PackageType::SharedLibrary);
                let consumer_headers = consumer == PackageType::HeaderLibrary;
                let consumer_embeds = matches!(
                    consumer,
                    PackageType::HeaderLibrary | PackageType::StaticLibrary
                );
                EdgeTraits {
                    headers: self.headers.unwrap_or(!is_app),
                    libs: self.libs.unwrap_or(!is_app && !header_only),
                    run: self.run.unwrap_or(default_run),
                    visible: self
                        .visible
                        .unwrap_or(self.kind == RequirementKind::Host),
                    build: false,
                    test: self.kind == RequirementKind::Test,
                    transitive_headers: self.transitive_headers.unwrap_or(consumer_headers),
                    transitive_libs: self.transitive_libs.unwrap_or(consumer_embeds),
                }
            }
        }
    }
}

/// Effective traits of a graph edge, direct or transitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EdgeTraits {
    pub headers: bool,
    pub libs: bool,
    pub run: bool,
    pub visible: bool,
    pub build: bool,
    pub test: bool,
    pub transitive_headers: bool,
    pub transitive_libs: bool,
}

impl EdgeTraits {
    /// Traits seen by a consumer N for E, where `self` is N->D and `next`
    /// is D->E. Returns `None` when D does not expose E at all.
    pub fn through(&self, next: &EdgeTraits) -> Option<EdgeTraits> {
        if self.build || next.build || next.test || !next.visible {
            return None;
        }
        Some(EdgeTraits {
            headers: self.headers && next.headers && next.transitive_headers,
            libs: self.libs && next.libs && next.transitive_libs,
            run: next.run,
            visible: self.visible,
            build: false,
            test: self.test,
            transitive_headers: self.transitive_headers && next.transitive_headers,
            transitive_libs: self.transitive_libs && next.transitive_libs,
        })
    }

    /// Combine traits reached through two different paths.
    pub fn merge(&self, other: &EdgeTraits) -> EdgeTraits {
        EdgeTraits {
            headers: self.headers || other.headers,
            libs: self.libs || other.libs,
            run: self.run || other.run,
            visible: self.visible || other.visible,
            build: self.build && other.build,
            test: self.test && other.test,
            transitive_headers: self.transitive_headers || other.transitive_headers,
            transitive_libs: self.transitive_libs || other.transitive_libs,
        }
    }
}
