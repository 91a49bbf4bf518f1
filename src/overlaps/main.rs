//! Overlap artifact pipeline.
//!
//! Computes area and population overlap fractions between the configured
//! source and target boundary sets, projects the result onto the current
//! boundary edition, rolls up to higher tiers, and writes the merged
//! overlap artifact to the interim store.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use hashbrown::HashMap;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use geopoll::config::Config;
use geopoll::hierarchy::{expand_tiers, map_to_current, CouncilRegistry};
use geopoll::overlap::{
    area_fractions, load_boundaries, load_postcode_directory_path, load_unit_populations_path,
    population_overlaps, BoundaryIndex, OverlapTable,
};
use geopoll::store::ArtifactStore;

#[derive(Parser, Debug)]
#[command(name = "overlaps")]
#[command(about = "Regenerate the boundary overlap artifact")]
struct Args {
    /// Pipeline configuration file
    #[arg(short, long, default_value = "geopoll.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = Config::load_from_file(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;
    let store = ArtifactStore::new(&config.interim_dir)?;

    info!(
        "Building {} -> {} overlap artifact",
        config.boundaries.source_geography, config.boundaries.target_geography
    );

    // Area pass: spatial join + polygon intersection, partitioned by source
    info!("Calculating area overlaps");
    let sources = load_boundaries(
        &config.boundaries.source_file,
        &config.boundaries.source_code_key,
        config.boundaries.source_name_key.as_deref(),
    )?;
    let targets = load_boundaries(
        &config.boundaries.target_file,
        &config.boundaries.target_code_key,
        config.boundaries.target_name_key.as_deref(),
    )?;
    let index = BoundaryIndex::build(targets);

    let pb = ProgressBar::new(sources.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})",
            )?
            .progress_chars("#>-"),
    );

    let pairs: Vec<((String, String), f64)> = sources
        .par_iter()
        .flat_map_iter(|source| {
            let fractions = area_fractions(source, &index);
            pb.inc(1);
            fractions
                .into_iter()
                .map(move |(target, fraction)| ((source.code.clone(), target), fraction))
        })
        .collect();
    let area: HashMap<(String, String), f64> = pairs.into_iter().collect();
    pb.finish_with_message("Area pass complete");
    info!("Area pass: {} overlapping pairs", area.len());

    // Population pass: LSOA populations spread over the postcode directory
    info!("Calculating population overlaps");
    let unit_populations = load_unit_populations_path(&config.population.unit_populations)?;
    let directory = load_postcode_directory_path(&config.population.postcode_directory)?;
    let population = population_overlaps(&unit_populations, &directory);

    let merged = OverlapTable::merge(
        config.boundaries.source_geography,
        config.boundaries.target_geography,
        area,
        population,
    );

    // Checkpoint the raw (pre-edition-mapping) table
    let raw_name = format!(
        "{}_{}_raw_overlap.csv",
        config.boundaries.source_geography.as_str(),
        config.boundaries.target_geography.as_str()
    );
    store.write_atomic(&raw_name, |w| merged.write_csv(w))?;

    // Edition mapping must run before tier roll-up: hierarchy lookups are
    // only valid for current-edition codes
    let client = reqwest::Client::new();
    let registry = CouncilRegistry::fetch(
        &client,
        &config.registry.url,
        config.reference_date,
        config.registry.include_historical,
    )
    .await?;
    info!("Council registry: {} records", registry.len());

    let mapped = map_to_current(&merged, &registry);
    let expanded = expand_tiers(&mapped, &registry);

    let artifact = store.write_atomic(&config.overlap_artifact_name(), |w| {
        expanded.write_csv(w)
    })?;

    info!(
        "Overlap artifact complete: {} records at {}",
        expanded.records.len(),
        artifact.display()
    );

    Ok(())
}
