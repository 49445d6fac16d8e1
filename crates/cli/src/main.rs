mod check;
mod manifest;
mod render;

use anyhow::{Context, Result};
use argbind::ParseError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt};

use crate::check::check_manifest;
use crate::manifest::{DEFAULT_MANIFEST_NAME, load_manifest};
use crate::render::render_parsed;

#[derive(Parser)]
#[command(name = "argbind")]
#[command(version, about = "Parse tokens against a declared command tree", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse tokens against the manifest and print the bindings as JSON
    Parse(ParseArgs),

    /// Validate every declaration in the manifest
    Check(CheckArgs),
}

#[derive(Parser)]
struct ParseArgs {
    /// Path to the command manifest
    #[arg(
        short,
        long,
        env = "ARGBIND_MANIFEST",
        default_value = DEFAULT_MANIFEST_NAME,
        value_name = "FILE"
    )]
    manifest: PathBuf,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Tokens to parse (everything after `--`)
    #[arg(last = true, value_name = "TOKENS")]
    tokens: Vec<String>,
}

#[derive(Parser)]
struct CheckArgs {
    /// Path to the command manifest
    #[arg(
        short,
        long,
        env = "ARGBIND_MANIFEST",
        default_value = DEFAULT_MANIFEST_NAME,
        value_name = "FILE"
    )]
    manifest: PathBuf,

    /// Only output JSON (no human-readable output)
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse(args) => parse_command(args),
        Commands::Check(args) => check_command(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<ParseError>() {
            Some(parse_err) if parse_err.is_usage_error() => {
                eprintln!("error: {parse_err}");
                ExitCode::from(2)
            }
            _ => {
                eprintln!("error: {err:#}");
                ExitCode::FAILURE
            }
        },
    }
}

fn parse_command(args: ParseArgs) -> Result<()> {
    let loaded = load_manifest(&args.manifest)?;
    let (group, catalog) = loaded
        .manifest
        .build()
        .with_context(|| format!("invalid declarations in {}", loaded.path.display()))?;

    let parsed = argbind::parse(&group, args.tokens)?;
    let output = render_parsed(&parsed, &catalog);

    let json = if args.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{json}");
    Ok(())
}

fn check_command(args: CheckArgs) -> Result<()> {
    let report = check_manifest(&args.manifest)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Manifest: {}", report.manifest);
    println!("Group: {}", report.name);
    println!("Global options: {}", report.global_options);
    println!("Commands: {}", report.commands.len());
    for command in &report.commands {
        let aliases = if command.aliases.is_empty() {
            String::new()
        } else {
            format!(" (aliases: {})", command.aliases.join(", "))
        };
        println!(
            "  - {}{}: {} option(s), {} parameter(s), {} group(s)",
            command.path, aliases, command.options, command.params, command.groups
        );
    }
    println!("OK: all declarations are valid");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
