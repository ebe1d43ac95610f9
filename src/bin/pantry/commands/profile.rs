//! `pantry profile` command

use anyhow::{bail, Context, Result};

use crate::cli::{ProfileArgs, ProfileCommands, ProfileDetectArgs, ProfileShowArgs};
use crate::commands::{context, load_profiles, status, GlobalOpts};
use pantry::tools::platform::detect_settings;
use pantry::util::fs::{ensure_dir, write_string};
use pantry::util::GlobalContext;
use pantry::Profile;

pub fn execute(args: ProfileArgs, opts: GlobalOpts) -> Result<()> {
    let ctx = context(opts)?;
    match args.command {
        ProfileCommands::Detect(detect) => detect_profile(&ctx, detect),
        ProfileCommands::Show(show) => show_profiles(&ctx, show),
        ProfileCommands::List => list_profiles(&ctx),
        ProfileCommands::Path(path) => {
            println!("{}", ctx.profiles_dir().join(&path.name).display());
            Ok(())
        }
    }
}

fn detect_profile(ctx: &GlobalContext, args: ProfileDetectArgs) -> Result<()> {
    let path = ctx.profiles_dir().join(&args.name);
    if path.exists() && !args.force {
        bail!(
            "profile `{}` already exists at {} (use --force to overwrite)",
            args.name,
            path.display()
        );
    }

    let profile = Profile {
        settings: detect_settings(),
        ..Profile::default()
    };
    ensure_dir(&ctx.profiles_dir())?;
    write_string(&path, &profile.to_text())?;

    eprint!("{}", profile.to_text());
    status("Created", format!("profile `{}` at {}", args.name, path.display()));
    Ok(())
}

fn show_profiles(ctx: &GlobalContext, args: ProfileShowArgs) -> Result<()> {
    let (host, build) = load_profiles(ctx, &args.profiles)?;
    println!("Host profile:");
    print!("{}", host.to_text());
    println!();
    println!("Build profile:");
    print!("{}", build.to_text());
    Ok(())
}

fn list_profiles(ctx: &GlobalContext) -> Result<()> {
    let dir = ctx.profiles_dir();
    if !dir.is_dir() {
        return Ok(());
    }
    let mut names: Vec<String> = std::fs::read_dir(&dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    for name in names {
        println!("{}", name);
    }
    Ok(())
}
