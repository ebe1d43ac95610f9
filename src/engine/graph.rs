//! Dependency graph construction and analysis.
//!
//! Expansion walks requirements breadth-first from the root. Every new
//! node is exported and configured as soon as it is created, with the
//! option overrides of its consumers applied before its own
//! `configure()`. A package name appears at most once per context: later
//! requirements must be satisfied by the node already in the graph.
//!
//! Analysis then runs in dependency order: each node sees its resolved
//! dependencies, is validated, and gets a package id and a binary
//! decision.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;

use crate::core::hooks::Hook;
use crate::core::instance::{Dependencies, Dependency, Instance};
use crate::core::package_info::BinaryInfo;
use crate::core::profile::Profile;
use crate::core::recipe::{PackageType, Recipe};
use crate::core::reference::{RecipeRef, ResolvedRef};
use crate::core::requirement::{EdgeTraits, Requirement, RequirementKind};
use crate::engine::analysis;
use crate::engine::cache::Cache;
use crate::engine::errors::GraphError;
use crate::engine::index::{suggest, RecipeIndex};
use crate::engine::lifecycle::{self, OptionOverride, Validity};
use crate::engine::BuildPolicy;

/// Which machine a node is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeContext {
    Host,
    /// Tools that run on the build machine.
    Build,
}

impl fmt::Display for NodeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeContext::Host => f.write_str("host"),
            NodeContext::Build => f.write_str("build"),
        }
    }
}

/// What happens to a node's binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Binary {
    Build,
    Cache,
    /// Not cached and the build policy forbids building it.
    Missing,
    /// Rejected by `validate()`.
    Invalid,
}

impl fmt::Display for Binary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Binary::Build => "build",
            Binary::Cache => "cache",
            Binary::Missing => "missing",
            Binary::Invalid => "invalid",
        };
        f.write_str(s)
    }
}

/// One configured recipe in the graph.
#[derive(Debug)]
pub struct Node {
    pub recipe: Recipe,
    pub instance: Instance,
    pub context: NodeContext,
    pub package_id: Option<String>,
    pub info: BinaryInfo,
    pub binary: Binary,
    /// Reason given by `validate()`.
    pub invalid: Option<String>,
    /// Set once the binary is built or its cached copy was loaded.
    pub installed: bool,
}

impl Node {
    fn new(recipe: Recipe, instance: Instance, context: NodeContext) -> Self {
        Node {
            recipe,
            instance,
            context,
            package_id: None,
            info: BinaryInfo::default(),
            binary: Binary::Build,
            invalid: None,
            installed: false,
        }
    }

    pub fn reference(&self) -> &ResolvedRef {
        &self.instance.reference
    }
}

/// A requirement edge, consumer to dependency.
#[derive(Debug, Clone)]
pub struct Edge {
    pub kind: RequirementKind,
    pub traits: EdgeTraits,
    /// The requirement as written, e.g. `zlib/[>=1.2 <2]`.
    pub requirement: String,
}

/// Summary of one node for display.
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub reference: String,
    pub context: NodeContext,
    pub package_type: PackageType,
    pub package_id: Option<String>,
    pub binary: Binary,
    pub installed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid: Option<String>,
    pub options: BTreeMap<String, String>,
    pub requires: Vec<String>,
}

/// The expanded dependency graph.
#[derive(Debug)]
pub struct DepGraph {
    graph: DiGraph<Node, Edge>,
    root: NodeIndex,
}

impl DepGraph {
    pub fn root(&self) -> &Node {
        &self.graph[self.root]
    }

    pub fn node(&self, idx: NodeIndex) -> &Node {
        &self.graph[idx]
    }

    pub fn node_mut(&mut self, idx: NodeIndex) -> &mut Node {
        &mut self.graph[idx]
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// A node by name, host context first.
    pub fn find(&self, name: &str) -> Option<&Node> {
        self.find_in(name, NodeContext::Host)
            .or_else(|| self.find_in(name, NodeContext::Build))
            .map(|idx| &self.graph[idx])
    }

    fn find_in(&self, name: &str, context: NodeContext) -> Option<NodeIndex> {
        self.graph
            .node_indices()
            .find(|&i| self.graph[i].context == context && self.graph[i].instance.name() == name)
    }

    /// Nodes with every dependency before its consumers.
    pub fn order(&self) -> Vec<NodeIndex> {
        let mut order = toposort(&self.graph, None).unwrap_or_default();
        order.reverse();
        order
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.order().into_iter().map(move |idx| &self.graph[idx])
    }

    /// Nodes grouped so that every node's dependencies sit in earlier
    /// groups. Nodes within a group are independent.
    pub fn levels(&self) -> Vec<Vec<NodeIndex>> {
        let mut depth: HashMap<NodeIndex, usize> = HashMap::new();
        for idx in self.order() {
            let d = self
                .graph
                .edges(idx)
                .map(|e| depth.get(&e.target()).copied().unwrap_or(0) + 1)
                .max()
                .unwrap_or(0);
            depth.insert(idx, d);
        }
        let mut levels: Vec<Vec<NodeIndex>> = Vec::new();
        for idx in self.order() {
            let d = depth[&idx];
            if levels.len() <= d {
                levels.resize_with(d + 1, Vec::new);
            }
            levels[d].push(idx);
        }
        levels
    }

    /// Direct dependencies of `idx`.
    pub fn direct(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.graph.edges(idx).map(|e| e.target()).collect()
    }

    /// The dependencies `idx` sees: direct edges plus whatever those
    /// dependencies expose transitively.
    pub fn dependencies_view(&self, idx: NodeIndex, cache: &Cache) -> Dependencies {
        let mut items: IndexMap<(String, bool), Dependency> = IndexMap::new();
        let mut queue: VecDeque<(NodeIndex, EdgeTraits, bool)> = self
            .graph
            .edges(idx)
            .map(|e| (e.target(), e.weight().traits, true))
            .collect();

        while let Some((n, traits, direct)) = queue.pop_front() {
            let key = (self.graph[n].instance.name().to_string(), traits.build);
            let effective = match items.get_mut(&key) {
                Some(existing) => {
                    let merged = existing.traits.merge(&traits);
                    let changed = merged != existing.traits || (direct && !existing.direct);
                    existing.traits = merged;
                    existing.direct |= direct;
                    if !changed {
                        continue;
                    }
                    merged
                }
                None => {
                    items.insert(key, self.dependency(n, traits, direct, cache));
                    traits
                }
            };
            for e in self.graph.edges(n) {
                if let Some(t) = effective.through(&e.weight().traits) {
                    queue.push_back((e.target(), t, false));
                }
            }
        }
        Dependencies::new(items.into_values().collect())
    }

    fn dependency(&self, n: NodeIndex, traits: EdgeTraits, direct: bool, cache: &Cache) -> Dependency {
        let node = &self.graph[n];
        let cx = &node.instance;
        let package_folder = if node.installed || node.binary == Binary::Cache {
            node.package_id
                .as_deref()
                .map(|id| cache.package_dir(&cx.reference, id))
                .unwrap_or_default()
        } else {
            cx.folders.package.clone()
        };
        let requires = self
            .graph
            .edges(n)
            .filter(|e| !e.weight().traits.build && !e.weight().traits.test)
            .map(|e| self.graph[e.target()].instance.name().to_string())
            .collect();
        Dependency {
            reference: cx.reference.clone(),
            package_type: cx.package_type,
            package_id: node.package_id.clone(),
            package_folder,
            options: cx.options.clone(),
            settings: cx.settings.clone(),
            cpp_info: cx.cpp_info.clone(),
            buildenv_info: cx.buildenv_info.clone(),
            runenv_info: cx.runenv_info.clone(),
            conf_info: cx.conf_info.clone(),
            traits,
            direct,
            requires,
        }
    }

    /// Validate every node, compute package ids and decide binaries.
    ///
    /// With `build_root` the root is always built, whatever the policy.
    pub fn analyze(&mut self, cache: &Cache, policy: BuildPolicy, build_root: bool) -> Result<()> {
        for idx in self.order() {
            let deps = self.dependencies_view(idx, cache);
            let is_root = idx == self.root;
            let node = &mut self.graph[idx];
            node.instance.dependencies = deps;
            if let Validity::Invalid(reason) =
                lifecycle::validate(&node.recipe, &mut node.instance, Hook::Validate)?
            {
                node.invalid = Some(reason);
            }
            let (id, info) = analysis::compute(&node.recipe, &node.instance)?;
            let reference = &node.instance.reference;
            node.binary = if node.invalid.is_some() {
                Binary::Invalid
            } else if policy == BuildPolicy::Always || (build_root && is_root) {
                Binary::Build
            } else if cache.has_package(reference, &id) {
                Binary::Cache
            } else if policy == BuildPolicy::Never {
                Binary::Missing
            } else {
                Binary::Build
            };
            tracing::info!("{}: {} ({})", reference, id, node.binary);
            node.package_id = Some(id);
            node.info = info;
        }
        Ok(())
    }

    /// Display summaries, dependencies first.
    pub fn report(&self) -> Vec<NodeReport> {
        self.order()
            .into_iter()
            .map(|idx| {
                let node = &self.graph[idx];
                NodeReport {
                    reference: node.reference().to_string(),
                    context: node.context,
                    package_type: node.instance.package_type,
                    package_id: node.package_id.clone(),
                    binary: node.binary,
                    installed: node.installed,
                    invalid: node.invalid.clone(),
                    options: node.instance.options.sorted(),
                    requires: self
                        .graph
                        .edges(idx)
                        .map(|e| self.graph[e.target()].reference().to_string())
                        .collect(),
                }
            })
            .collect()
    }
}

/// Builds a [`DepGraph`] from a root recipe.
pub struct Expander<'a> {
    index: &'a dyn RecipeIndex,
    cache: &'a Cache,
    host: &'a Profile,
    build: &'a Profile,
}

impl<'a> Expander<'a> {
    pub fn new(index: &'a dyn RecipeIndex, cache: &'a Cache, host: &'a Profile, build: &'a Profile) -> Self {
        Expander {
            index,
            cache,
            host,
            build,
        }
    }

    fn profile(&self, context: NodeContext) -> &'a Profile {
        match context {
            NodeContext::Host => self.host,
            NodeContext::Build => self.build,
        }
    }

    /// Expand and configure the whole graph.
    pub fn expand(&self, root: Recipe) -> Result<DepGraph> {
        let version = root.version().cloned().ok_or_else(|| {
            anyhow!("recipe `{}` has no version; pass one with --version", root.name())
        })?;
        let reference = ResolvedRef::new(root.name(), version);
        let overrides = self.root_overrides(&reference);

        let mut graph: DiGraph<Node, Edge> = DiGraph::new();
        let root_idx = self.add_node(&mut graph, root, reference, NodeContext::Host, &overrides)?;

        // (node, its consumers from the root down)
        let mut queue: VecDeque<(NodeIndex, Vec<NodeIndex>)> = VecDeque::new();
        queue.push_back((root_idx, Vec::new()));

        while let Some((idx, ancestors)) = queue.pop_front() {
            let requirements = self.requirements_of(&graph[idx], idx == root_idx);
            for req in requirements {
                let context = if req.kind == RequirementKind::Tool
                    || graph[idx].context == NodeContext::Build
                {
                    NodeContext::Build
                } else {
                    NodeContext::Host
                };
                let consumer = graph[idx].instance.reference.clone();

                let existing = graph.node_indices().find(|&i| {
                    graph[i].context == context && graph[i].instance.name() == req.reference.name
                });
                let dep_idx = match existing {
                    Some(found) => {
                        let present = &graph[found].instance.reference;
                        if !req.reference.matches(present) {
                            return Err(GraphError::VersionConflict {
                                name: req.reference.name.clone(),
                                existing: present.to_string(),
                                requirement: req.reference.to_string(),
                                required_by: consumer.to_string(),
                            }
                            .into());
                        }
                        found
                    }
                    None => {
                        let reference = self.resolve(&req.reference, &consumer)?;
                        let recipe = self
                            .index
                            .load(&reference.name, &reference.version)
                            .with_context(|| format!("required by `{}`", consumer))?;
                        let mut chain = ancestors.clone();
                        chain.push(idx);
                        let overrides = self.overrides_for(&graph, &chain, &req, &reference, context);
                        let added = self.add_node(&mut graph, recipe, reference, context, &overrides)?;
                        queue.push_back((added, chain));
                        added
                    }
                };

                let traits = req.traits(graph[idx].instance.package_type, graph[dep_idx].instance.package_type);
                graph.add_edge(
                    idx,
                    dep_idx,
                    Edge {
                        kind: req.kind,
                        traits,
                        requirement: req.reference.to_string(),
                    },
                );
            }
        }

        check_acyclic(&graph)?;
        Ok(DepGraph {
            graph,
            root: root_idx,
        })
    }

    /// Declared requirements plus the profile's tool requires. Test
    /// requirements only matter for the root.
    fn requirements_of(&self, node: &Node, is_root: bool) -> Vec<Requirement> {
        let mut requirements: Vec<Requirement> = node
            .instance
            .requirements
            .iter()
            .filter(|r| is_root || r.kind != RequirementKind::Test)
            .cloned()
            .collect();
        for tool in &self.profile(node.context).tool_requires {
            let name = &tool.reference.name;
            if name == node.instance.name() || !tool.applies_to(&node.instance.reference) {
                continue;
            }
            if requirements.iter().any(|r| &r.reference.name == name && r.kind == RequirementKind::Tool) {
                continue;
            }
            requirements.push(Requirement::new(tool.reference.clone(), RequirementKind::Tool));
        }
        requirements
    }

    fn resolve(&self, requirement: &RecipeRef, consumer: &ResolvedRef) -> Result<ResolvedRef> {
        let name = &requirement.name;
        let mut versions = self.index.versions(name)?;
        if versions.is_empty() {
            return Err(GraphError::RecipeNotFound {
                name: name.clone(),
                required_by: consumer.to_string(),
                suggestions: suggest(self.index, name),
            }
            .into());
        }
        match requirement.version.select(&versions) {
            Some(v) => Ok(ResolvedRef::new(name.as_str(), v.clone())),
            None => {
                versions.sort();
                Err(GraphError::NoMatchingVersion {
                    name: name.clone(),
                    requirement: requirement.to_string(),
                    required_by: consumer.to_string(),
                    available: versions.iter().map(|v| v.to_string()).collect(),
                }
                .into())
            }
        }
    }

    /// Profile options for the root: unscoped ones must name a real option.
    fn root_overrides(&self, reference: &ResolvedRef) -> Vec<OptionOverride> {
        self.host
            .options
            .iter()
            .filter_map(|a| match &a.pattern {
                None => Some(OptionOverride::new(&a.name, a.value.clone(), "profile").strict()),
                Some(p) if p.matches(reference) => {
                    Some(OptionOverride::new(&a.name, a.value.clone(), "profile"))
                }
                Some(_) => None,
            })
            .collect()
    }

    /// Overrides for a new dependency, lowest precedence first: the
    /// requirement's own options, then each consumer from the direct one
    /// down to the root, then the profile.
    fn overrides_for(
        &self,
        graph: &DiGraph<Node, Edge>,
        chain: &[NodeIndex],
        requirement: &Requirement,
        reference: &ResolvedRef,
        context: NodeContext,
    ) -> Vec<OptionOverride> {
        let mut out = Vec::new();
        let Some(&direct) = chain.last() else {
            return out;
        };
        let direct_ref = graph[direct].instance.reference.to_string();
        for (name, value) in &requirement.options {
            out.push(OptionOverride::new(name, value.clone(), direct_ref.clone()));
        }
        for &c in chain.iter().rev() {
            let node = &graph[c];
            if c != direct && node.context != context {
                continue;
            }
            let origin = node.instance.reference.to_string();
            let defaults = node
                .recipe
                .metadata
                .dependency_defaults
                .iter()
                .filter(|d| d.pattern.matches(reference));
            for d in defaults.chain(node.instance.options.dependency_options_for(reference)) {
                out.push(OptionOverride::new(&d.name, d.value.clone(), origin.clone()));
            }
        }
        for a in &self.profile(context).options {
            if a.pattern.as_ref().is_some_and(|p| p.matches(reference)) {
                out.push(OptionOverride::new(&a.name, a.value.clone(), "profile"));
            }
        }
        out
    }

    fn add_node(
        &self,
        graph: &mut DiGraph<Node, Edge>,
        recipe: Recipe,
        reference: ResolvedRef,
        context: NodeContext,
        overrides: &[OptionOverride],
    ) -> Result<NodeIndex> {
        let profile = self.profile(context);
        let options = recipe
            .metadata
            .initial_options()
            .with_context(|| format!("{}: invalid default options", reference))?;
        let mut cx = Instance::new(
            reference.clone(),
            recipe.metadata.clone(),
            profile.settings.clone(),
            self.build.settings.clone(),
            options,
            profile.conf.clone(),
        );
        cx.conan_data = recipe.conan_data.clone();
        cx.folders.recipe = recipe.recipe_folder.clone();

        lifecycle::check_overrides(&cx, overrides)?;
        let export_dir = self.cache.begin_export(&reference)?;
        lifecycle::export(&recipe, &mut cx, &export_dir)?;
        lifecycle::configure(&recipe, &mut cx, overrides)?;
        tracing::debug!("{}: configured in {} context", reference, context);
        Ok(graph.add_node(Node::new(recipe, cx, context)))
    }
}

fn check_acyclic(graph: &DiGraph<Node, Edge>) -> Result<()> {
    let Err(cycle) = toposort(graph, None) else {
        return Ok(());
    };
    let start = cycle.node_id();
    let members = tarjan_scc(graph)
        .into_iter()
        .find(|scc| scc.contains(&start))
        .unwrap_or_else(|| vec![start]);
    let mut packages: Vec<String> = members
        .iter()
        .rev()
        .map(|&i| graph[i].instance.reference.to_string())
        .collect();
    if let Some(first) = packages.first().cloned() {
        packages.push(first);
    }
    Err(GraphError::CycleDetected { packages }.into())
}
