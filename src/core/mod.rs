//! The recipe model.
//!
//! - references and versions
//! - settings, options, conf and profiles
//! - recipes, their hooks and the per-build instance handed to them
//! - what a package publishes to its consumers (`cpp_info`, environments)
//! - the binary identity (`package_id`)

pub mod conandata;
pub mod conf;
pub mod cpp_info;
pub mod env_info;
pub mod errors;
pub mod hooks;
pub mod instance;
pub mod manifest;
pub mod modules;
pub mod options;
pub mod package_info;
pub mod profile;
pub mod recipe;
pub mod reference;
pub mod requirement;
pub mod settings;
pub mod version;

pub use conf::Conf;
pub use cpp_info::{Component, CppInfo};
pub use errors::{InvalidConfiguration, RecipeError};
pub use hooks::Hook;
pub use instance::{Dependencies, Dependency, Instance};
pub use manifest::{load_recipe, parse_recipe, RECIPE_FILE};
pub use options::{OptionDomain, OptionValue, Options};
pub use profile::Profile;
pub use recipe::{PackageType, Recipe, RecipeMetadata};
pub use reference::{RecipeRef, RefPattern, ResolvedRef};
pub use requirement::{EdgeTraits, Requirement, RequirementKind};
pub use settings::Settings;
pub use version::{Version, VersionExpr, VersionRange};
