//! CLI entry point for bnd-wrapgen.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

/// bnd-wrapgen: generate idiomatic Rust wrappers from C headers.
#[derive(Parser, Debug)]
#[command(name = "bnd-wrapgen", version, about)]
struct Cli {
    /// Path to the bnd-wrapgen.toml configuration file.
    #[arg(default_value = "bnd-wrapgen.toml")]
    config: PathBuf,

    /// Output file path (overrides config).
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bnd_wrapgen=info")),
        )
        .init();

    let cli = Cli::parse();
    bnd_wrapgen::run(&cli.config, cli.output.as_deref())?;
    Ok(())
}
