//! Pantry CLI - recipe-driven builds of C and C++ packages

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use pantry::core::errors::as_invalid_configuration;
use pantry::engine::GraphError;
use pantry::util::diagnostic::{emit, ProfileParseError};
use pantry::RecipeError;

/// Exit code for configurations a recipe rejected.
const EXIT_INVALID_CONFIGURATION: i32 = 6;

fn main() {
    let cli = Cli::parse();
    let color = !cli.no_color;
    if let Err(e) = run(cli) {
        std::process::exit(report(&e, color));
    }
}

fn run(cli: Cli) -> Result<()> {
    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("pantry=debug")
    } else {
        EnvFilter::new("pantry=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let opts = commands::GlobalOpts {
        verbose: cli.verbose,
        color: !cli.no_color,
    };

    // Execute command
    match cli.command {
        Commands::Create(args) => commands::create::execute(args, opts),
        Commands::Graph(args) => commands::graph::execute(args, opts),
        Commands::Inspect(args) => commands::inspect::execute(args),
        Commands::Profile(args) => commands::profile::execute(args, opts),
        Commands::Cache(args) => commands::cache::execute(args, opts),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}

/// Print an error and pick the exit code.
fn report(err: &anyhow::Error, color: bool) -> i32 {
    if let Some(invalid) = as_invalid_configuration(err) {
        eprintln!("error: invalid configuration: {}", invalid);
        return EXIT_INVALID_CONFIGURATION;
    }

    let outer: Vec<String> = err
        .chain()
        .take_while(|e| !e.is::<GraphError>() && !e.is::<RecipeError>())
        .map(|e| e.to_string())
        .collect();

    if let Some(graph) = err.chain().find_map(|e| e.downcast_ref::<GraphError>()) {
        let diag = outer
            .iter()
            .fold(graph.to_diagnostic(), |d, c| d.with_context(c.clone()));
        emit(&diag, color);
    } else if let Some(recipe) = err.chain().find_map(|e| e.downcast_ref::<RecipeError>()) {
        let diag = outer
            .iter()
            .fold(recipe.to_diagnostic(), |d, c| d.with_context(c.clone()));
        emit(&diag, color);
    } else if let Some(parse) = err.chain().find_map(|e| e.downcast_ref::<ProfileParseError>()) {
        let handler = if color {
            miette::GraphicalReportHandler::new()
        } else {
            miette::GraphicalReportHandler::new_themed(miette::GraphicalTheme::unicode_nocolor())
        };
        let mut out = String::new();
        if handler.render_report(&mut out, parse).is_ok() {
            eprint!("{}", out);
        } else {
            eprintln!("error: {}", parse);
        }
    } else {
        eprintln!("error: {:#}", err);
    }
    1
}
