//! `pantry cache` command
//!
//! Inspect and prune the package cache.

use anyhow::Result;

use crate::cli::{CacheArgs, CacheCommands, CacheListArgs, CacheRemoveArgs, OutputFormat};
use crate::commands::{context, open_cache, status, GlobalOpts};
use pantry::core::reference::RefPattern;
use pantry::Cache;

pub fn execute(args: CacheArgs, opts: GlobalOpts) -> Result<()> {
    let ctx = context(opts)?;
    let cache = open_cache(&ctx);
    match args.command {
        CacheCommands::Path => {
            println!("{}", cache.root().display());
            Ok(())
        }
        CacheCommands::List(list) => list_cache(&cache, list),
        CacheCommands::Remove(remove) => remove_cache(&cache, remove),
    }
}

fn list_cache(cache: &Cache, args: CacheListArgs) -> Result<()> {
    let entries = cache.list()?;
    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("(empty)");
            }
            for entry in entries {
                println!("{}", entry.reference);
                for id in entry.package_ids {
                    println!("  {}", id);
                }
            }
        }
    }
    Ok(())
}

fn remove_cache(cache: &Cache, args: CacheRemoveArgs) -> Result<()> {
    let pattern = RefPattern::new(&args.pattern)?;
    let removed = cache.remove(&pattern)?;
    if removed.is_empty() {
        status("Removed", format!("nothing matched `{}`", pattern));
    }
    for reference in removed {
        status("Removed", reference);
    }
    Ok(())
}
