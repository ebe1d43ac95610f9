//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Pantry - build C and C++ packages from recipes
#[derive(Parser)]
#[command(name = "pantry")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a recipe and whatever it needs into the cache
    Create(CreateArgs),

    /// Resolve and analyze the dependency graph without building
    Graph(GraphArgs),

    /// Show the attributes of a recipe
    Inspect(InspectArgs),

    /// Manage profiles
    Profile(ProfileArgs),

    /// Manage the package cache
    Cache(CacheArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Where the root recipe and its dependencies come from.
#[derive(Args, Clone)]
pub struct RecipeArgs {
    /// Folder holding recipe.toml
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Version to use when the recipe does not declare one
    #[arg(long = "version")]
    pub version: Option<String>,

    /// Recipe index: a folder holding a `recipes/` tree
    #[arg(long, env = "PANTRY_INDEX")]
    pub index: Option<PathBuf>,
}

/// Host and build profiles plus command-line overrides.
#[derive(Args, Clone, Default)]
pub struct ProfileSelection {
    /// Host profile (repeatable; later ones win)
    #[arg(long = "profile", visible_alias = "pr")]
    pub profile: Vec<String>,

    /// Build-machine profile (repeatable)
    #[arg(long = "profile-build", visible_alias = "pr-b")]
    pub profile_build: Vec<String>,

    /// Host setting, `key=value`
    #[arg(short = 's', long = "settings")]
    pub settings: Vec<String>,

    /// Option, `[pattern:]name=value`
    #[arg(short = 'o', long = "options")]
    pub options: Vec<String>,

    /// Conf entry, `key=value`
    #[arg(short = 'c', long = "conf")]
    pub conf: Vec<String>,
}

#[derive(Args)]
pub struct CreateArgs {
    #[command(flatten)]
    pub recipe: RecipeArgs,

    #[command(flatten)]
    pub profiles: ProfileSelection,

    /// Build policy: missing, never or always
    #[arg(short = 'b', long = "build")]
    pub build: Option<String>,

    /// Number of packages built at once
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Args)]
pub struct GraphArgs {
    #[command(flatten)]
    pub recipe: RecipeArgs,

    #[command(flatten)]
    pub profiles: ProfileSelection,

    /// Build policy used to classify binaries
    #[arg(short = 'b', long = "build")]
    pub build: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct InspectArgs {
    /// Folder holding recipe.toml
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct ProfileArgs {
    #[command(subcommand)]
    pub command: ProfileCommands,
}

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Write a profile describing this machine
    Detect(ProfileDetectArgs),

    /// Print the effective host and build profiles
    Show(ProfileShowArgs),

    /// List saved profiles
    List,

    /// Print the path of a profile
    Path(ProfilePathArgs),
}

#[derive(Args)]
pub struct ProfileDetectArgs {
    /// Profile name
    #[arg(long, default_value = "default")]
    pub name: String,

    /// Overwrite an existing profile
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct ProfileShowArgs {
    #[command(flatten)]
    pub profiles: ProfileSelection,
}

#[derive(Args)]
pub struct ProfilePathArgs {
    /// Profile name
    #[arg(default_value = "default")]
    pub name: String,
}

#[derive(Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommands,
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Print the cache folder
    Path,

    /// List cached packages and their binaries
    List(CacheListArgs),

    /// Remove recipes and binaries matching a pattern
    Remove(CacheRemoveArgs),
}

#[derive(Args)]
pub struct CacheListArgs {
    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct CacheRemoveArgs {
    /// Reference pattern, e.g. `zlib/*` or `*`
    pub pattern: String,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
