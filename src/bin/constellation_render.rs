//! Offline constellation renderer.
//!
//! Runs the full pipeline against a local star-field image (standing in for
//! the generative model) and a CSV of term observations, stores the composite
//! in a local directory and prints the JSON result.
//!
//! ```text
//! constellation-render --image starfield.png --terms terms.csv --output labelled.png
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use constellation::{
    read_observations_csv, read_term_table_csv, ConstellationConfig, ConstellationPipeline,
    ConstellationRequest, FileSystemStorage, QuotaCounter, StaticImageGenerator, TermLookup,
};

#[derive(Parser, Debug)]
#[command(version, about = "Label the stars of a generated constellation image")]
struct Args {
    /// Star-field image used in place of the image generator
    #[arg(long)]
    image: PathBuf,

    /// CSV of `term,count` observations
    #[arg(long)]
    terms: PathBuf,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also copy the composite to this path
    #[arg(long)]
    output: Option<PathBuf>,

    /// Directory the composite is stored in
    #[arg(long, default_value = "constellations")]
    storage_dir: PathBuf,

    /// CSV of `term,category[,display]` replacing the built-in lookup table
    #[arg(long)]
    lookup: Option<PathBuf>,

    /// Log filter (overrides RUST_LOG and the config file)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ConstellationConfig::from_toml_file(path)?,
        None => ConstellationConfig::default(),
    };
    config.apply_env_overrides()?;
    init_tracing(args.log_level.as_deref().or(config.log_level.as_deref()));
    config.validate().context("Invalid configuration")?;

    let lookup = match &args.lookup {
        Some(path) => read_term_table_csv(path)?,
        None => TermLookup::builtin(),
    };
    let observations = read_observations_csv(&args.terms)?;
    let generator = StaticImageGenerator::from_path(&args.image)?;
    let storage = FileSystemStorage::new(&args.storage_dir);
    let quota = Arc::new(QuotaCounter::new(config.pipeline.daily_quota));

    let pipeline = ConstellationPipeline::new(&config, lookup, quota, Arc::new(generator), Arc::new(storage));
    let result = pipeline
        .run(&ConstellationRequest::new(observations))
        .await
        .map_err(|e| anyhow::anyhow!("pipeline failed (status {}): {}", e.status_code(), e))?;

    if let Some(output) = &args.output {
        let stored = result.image_url.trim_start_matches("file://");
        tokio::fs::copy(stored, output)
            .await
            .with_context(|| format!("Failed to copy {} to {}", stored, output.display()))?;
    }

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
