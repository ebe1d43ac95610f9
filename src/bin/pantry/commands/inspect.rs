//! `pantry inspect` command

use anyhow::Result;
use serde_json::{json, Value};

use crate::cli::{InspectArgs, OutputFormat};
use pantry::core::manifest::load_recipe;
use pantry::Recipe;

pub fn execute(args: InspectArgs) -> Result<()> {
    let recipe = load_recipe(&args.path)?;
    let value = describe(&recipe);
    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&value)?),
        OutputFormat::Text => {
            if let Value::Object(map) = &value {
                for (key, v) in map {
                    match v {
                        Value::Null => {}
                        Value::String(s) => println!("{}: {}", key, s),
                        other => println!("{}: {}", key, other),
                    }
                }
            }
        }
    }
    Ok(())
}

fn describe(recipe: &Recipe) -> Value {
    let m = &recipe.metadata;
    let options: serde_json::Map<String, Value> = m
        .options
        .iter()
        .map(|(name, domain)| (name.clone(), json!(domain.describe())))
        .collect();
    let defaults: serde_json::Map<String, Value> = m
        .default_options
        .iter()
        .map(|(name, value)| (name.clone(), json!(value.to_string())))
        .collect();
    let hooks: Vec<&str> = recipe.defined_hooks().into_iter().map(|h| h.name()).collect();

    json!({
        "name": m.name,
        "version": m.version.as_ref().map(|v| v.to_string()),
        "license": m.license,
        "description": m.description,
        "url": m.url,
        "homepage": m.homepage,
        "topics": m.topics,
        "package_type": m.package_type.as_str(),
        "settings": m.settings,
        "options": options,
        "default_options": defaults,
        "languages": m.languages,
        "implements": m.implements,
        "python_requires": m.python_requires,
        "hooks": hooks,
    })
}
