use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use tilekit_codegen::{Manifest, generate};

#[derive(Parser)]
#[command(
    name = "tilekit-gen",
    about = "Generate typed host-side bindings from a tilekit component manifest"
)]
struct Cli {
    /// Path to the manifest emitted by the bundler (manifest.json)
    manifest: PathBuf,

    /// Path of the Rust source file to write
    output: PathBuf,
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_env("TILEKIT_LOG"))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let json = std::fs::read_to_string(&cli.manifest)
        .with_context(|| format!("reading manifest {}", cli.manifest.display()))?;
    let manifest = Manifest::from_json(&json)?;

    tracing::info!(
        manifest = %cli.manifest.display(),
        components = manifest.components.len(),
        "Generating bindings"
    );

    let code = generate(&manifest)?;
    std::fs::write(&cli.output, code)
        .with_context(|| format!("writing {}", cli.output.display()))?;

    tracing::info!(output = %cli.output.display(), "Bindings written");
    Ok(())
}
