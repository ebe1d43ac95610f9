//! Pantry - recipe-driven builds of C and C++ packages
//!
//! A recipe describes how to fetch, configure, build and publish one
//! version of one package. This crate provides the recipe model, the
//! lifecycle engine that drives recipes through their hooks, the
//! toolchain generators and build system facades recipes call, and the
//! binary cache.

pub mod core;
pub mod engine;
pub mod tools;
pub mod util;

/// Test utilities for pantry unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides ready-made settings, instances and recipes.
#[cfg(test)]
pub mod test_support;

pub use crate::core::{
    Hook, Instance, InvalidConfiguration, Profile, Recipe, RecipeError, RecipeRef, ResolvedRef,
};
pub use engine::{BuildPolicy, Cache, DepGraph, Engine, FolderIndex, MemoryIndex, RecipeIndex};
pub use util::context::GlobalContext;
