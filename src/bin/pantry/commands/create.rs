//! `pantry create` command
//!
//! Export the recipe in the current folder, resolve its graph and build
//! whatever the cache lacks, always rebuilding the root.

use std::time::{Duration, Instant};

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::CreateArgs;
use crate::commands::{context, load_profiles, load_root, open_cache, open_index, status, GlobalOpts};
use pantry::engine::Binary;
use pantry::Engine;

pub fn execute(args: CreateArgs, opts: GlobalOpts) -> Result<()> {
    let ctx = context(opts)?;
    let (host, build) = load_profiles(&ctx, &args.profiles)?;
    let root = load_root(&ctx, &args.recipe)?;
    let index = open_index(&ctx, &args.recipe);

    let policy = match &args.build {
        Some(policy) => policy.parse()?,
        None => ctx.config().build_policy()?,
    };
    let jobs = args.jobs.or(ctx.config().build.jobs);

    let engine = Engine::new(index.as_ref(), open_cache(&ctx), host, build)
        .with_policy(policy)
        .with_jobs(jobs);

    let start = Instant::now();
    let spinner = if ctx.is_verbose() {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("creating {}", root.name()));
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    };

    let result = engine.create(root);
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let graph = result?;

    for node in graph.nodes() {
        let verb = match node.binary {
            Binary::Build => "Built",
            Binary::Cache => "Cached",
            Binary::Missing | Binary::Invalid => continue,
        };
        status(
            verb,
            format!(
                "{} ({})",
                node.reference(),
                node.package_id.as_deref().unwrap_or("-")
            ),
        );
    }

    let root = graph.root();
    if let Some(id) = &root.package_id {
        status(
            "Packaged",
            engine.cache().package_dir(root.reference(), id).display(),
        );
    }
    status(
        "Finished",
        format!(
            "{} package(s) in {:.2}s",
            graph.len(),
            start.elapsed().as_secs_f64()
        ),
    );
    Ok(())
}
