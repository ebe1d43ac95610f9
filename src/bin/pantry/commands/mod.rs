//! Command implementations

pub mod cache;
pub mod completions;
pub mod create;
pub mod graph;
pub mod inspect;
pub mod profile;

use anyhow::{bail, Result};

use crate::cli::{ProfileSelection, RecipeArgs};
use pantry::core::manifest::load_recipe;
use pantry::core::version::Version;
use pantry::engine::{Cache, FolderIndex, MemoryIndex, RecipeIndex};
use pantry::tools::platform::detect_settings;
use pantry::util::diagnostic::{emit, Diagnostic};
use pantry::util::GlobalContext;
use pantry::{Profile, Recipe};

/// Flags shared by every command.
#[derive(Clone, Copy)]
pub struct GlobalOpts {
    pub verbose: bool,
    pub color: bool,
}

/// Create the global context with the command-line flags applied.
pub fn context(opts: GlobalOpts) -> Result<GlobalContext> {
    let mut ctx = GlobalContext::new()?;
    ctx.set_verbose(opts.verbose);
    ctx.set_color(opts.color);
    Ok(ctx)
}

/// Print a right-aligned status line to stderr.
pub fn status(verb: &str, message: impl std::fmt::Display) {
    eprintln!("{:>12} {}", verb, message);
}

/// Resolve the host and build profiles.
///
/// Config conf is the base, named profiles stack on top in order, and
/// `-s`/`-o`/`-c` only touch the host profile.
pub fn load_profiles(ctx: &GlobalContext, sel: &ProfileSelection) -> Result<(Profile, Profile)> {
    let base = Profile {
        conf: ctx.config().conf()?,
        ..Profile::default()
    };

    let mut host = base.clone();
    stack_profiles(ctx, &mut host, &sel.profile)?;
    host.apply_overrides(&sel.settings, &sel.options, &sel.conf)?;

    let mut build = base;
    stack_profiles(ctx, &mut build, &sel.profile_build)?;

    Ok((host, build))
}

fn stack_profiles(ctx: &GlobalContext, target: &mut Profile, names: &[String]) -> Result<()> {
    if names.is_empty() {
        target.update(&default_profile(ctx)?);
        return Ok(());
    }
    for name in names {
        let path = ctx.profile_path(name);
        if !path.is_file() {
            bail!(
                "profile `{}` not found (looked in {})",
                name,
                ctx.profiles_dir().display()
            );
        }
        target.update(&Profile::load(&path)?);
    }
    Ok(())
}

fn default_profile(ctx: &GlobalContext) -> Result<Profile> {
    let name = ctx.config().default_profile();
    let path = ctx.profile_path(name);
    if path.is_file() {
        return Profile::load(&path);
    }
    tracing::debug!("default profile missing at {}", path.display());
    emit(
        &Diagnostic::warning(format!("profile `{}` not found, using detected settings", name))
            .with_suggestion("run `pantry profile detect` to save one"),
        ctx.color(),
    );
    Ok(Profile {
        settings: detect_settings(),
        ..Profile::default()
    })
}

/// Load the root recipe from the command-line folder.
pub fn load_root(ctx: &GlobalContext, args: &RecipeArgs) -> Result<Recipe> {
    let folder = ctx.cwd().join(&args.path);
    let mut recipe = load_recipe(&folder)?;
    if let Some(version) = &args.version {
        if let Some(declared) = recipe.version() {
            if declared.as_str() != version {
                bail!(
                    "`--version {}` conflicts with version {} declared by `{}`",
                    version,
                    declared,
                    recipe.name()
                );
            }
        }
        recipe = recipe.with_version(Version::new(version.as_str()));
    }
    if recipe.version().is_none() {
        bail!(
            "recipe `{}` declares no version; pass one with `--version`",
            recipe.name()
        );
    }
    Ok(recipe)
}

/// The recipe index: `--index`, else a `recipes/` tree in the working
/// directory, else nothing.
pub fn open_index(ctx: &GlobalContext, args: &RecipeArgs) -> Box<dyn RecipeIndex> {
    if let Some(path) = &args.index {
        return Box::new(FolderIndex::new(ctx.cwd().join(path)));
    }
    if ctx.cwd().join("recipes").is_dir() {
        return Box::new(FolderIndex::new(ctx.cwd()));
    }
    Box::new(MemoryIndex::new())
}

pub fn open_cache(ctx: &GlobalContext) -> Cache {
    Cache::new(ctx.cache_dir())
}
