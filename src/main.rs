//! benchplot - comparison charts from aggregation benchmark exports.
//!
//! Reads indexed CSV tables or whitespace-separated time series, normalizes
//! units, orders the compared protocols and writes one SVG chart per input
//! with a fixed visual vocabulary.

mod chart;
mod config;
mod error;
mod loader;
mod normalize;
mod pipeline;
mod render;
mod select;
mod style;
mod table;

use anyhow::{bail, Context, Result};
use clap::Parser;
use config::Config;
use env_logger::Env;
use log::{info, warn};
use pipeline::Pipeline;
use std::io::{self, Write};
use std::path::PathBuf;

/// Render benchmark exports as publication charts
#[derive(Parser, Debug)]
#[command(name = "benchplot")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Profile or mode group to run (see --list)
    #[arg(short, long, required_unless_present = "list")]
    profile: Option<String>,

    /// Directory holding the inputs; charts are written next to them
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// JSON configuration replacing the built-in profiles and styles
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Mode for a mode group, skips the prompt (e.g. DCN)
    #[arg(short, long)]
    mode: Option<String>,

    /// Apply this family's legend rules to every input
    #[arg(short, long)]
    family: Option<String>,

    /// List profiles and mode groups, then exit
    #[arg(long)]
    list: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?;
    if args.list {
        print_profiles(&config);
        return Ok(());
    }

    let Some(name) = args.profile.as_deref() else {
        bail!("no profile given, use --profile or --list");
    };

    let profile_name = match config.mode_group(name) {
        Some(group) => {
            let answer = match &args.mode {
                Some(mode) => mode.clone(),
                None => prompt(&group.prompt)?,
            };
            group.resolve(&answer)?.to_string()
        }
        None => {
            if args.mode.is_some() {
                warn!("--mode is ignored for profile {name}");
            }
            name.to_string()
        }
    };

    let profile = config
        .profile(&profile_name)
        .with_context(|| format!("unknown profile {profile_name} (see --list)"))?;
    let registry = config.registry()?;

    info!("Running {} in {}", profile.name, args.dir.display());
    let report = Pipeline::new(&registry, profile)
        .with_family(args.family.as_deref())
        .run(&args.dir)?;

    println!("{}", report.summary());
    for path in &report.exported {
        println!("  {}", path.display());
    }
    Ok(())
}

fn prompt(question: &str) -> Result<String> {
    print!("{question}");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin()
        .read_line(&mut answer)
        .context("Failed to read mode from stdin")?;
    Ok(answer)
}

fn print_profiles(config: &Config) {
    println!("Profiles:");
    for profile in &config.profiles {
        println!("  {:<16} {}", profile.name, profile.description);
    }
    if !config.mode_groups.is_empty() {
        println!("Mode groups:");
        for group in &config.mode_groups {
            println!("  {:<16} modes: {}", group.name, group.tokens().join(", "));
        }
    }
}
