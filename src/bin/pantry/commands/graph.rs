//! `pantry graph` command
//!
//! Expand, configure and analyze the graph without building. Invalid
//! nodes are reported rather than raised.

use anyhow::Result;

use crate::cli::{GraphArgs, OutputFormat};
use crate::commands::{context, load_profiles, load_root, open_cache, open_index, GlobalOpts};
use pantry::engine::NodeReport;
use pantry::Engine;

pub fn execute(args: GraphArgs, opts: GlobalOpts) -> Result<()> {
    let ctx = context(opts)?;
    let (host, build) = load_profiles(&ctx, &args.profiles)?;
    let root = load_root(&ctx, &args.recipe)?;
    let index = open_index(&ctx, &args.recipe);

    let policy = match &args.build {
        Some(policy) => policy.parse()?,
        None => ctx.config().build_policy()?,
    };
    let engine = Engine::new(index.as_ref(), open_cache(&ctx), host, build).with_policy(policy);
    let graph = engine.graph(root)?;
    let report = graph.report();

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print!("{}", render_text(&report)),
    }
    Ok(())
}

fn render_text(report: &[NodeReport]) -> String {
    let mut out = String::new();
    for node in report {
        out.push_str(&format!(
            "{} [{}] {} {}",
            node.reference,
            node.context,
            node.package_type,
            node.package_id.as_deref().unwrap_or("-")
        ));
        out.push_str(&format!(" ({})\n", node.binary));
        if let Some(reason) = &node.invalid {
            out.push_str(&format!("    invalid: {}\n", reason));
        }
        for (name, value) in &node.options {
            out.push_str(&format!("    {}={}\n", name, value));
        }
        for dep in &node.requires {
            out.push_str(&format!("    -> {}\n", dep));
        }
    }
    out
}
