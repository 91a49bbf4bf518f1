//! Survey conversion pipeline.
//!
//! Converts the configured survey datasets from constituency codes to
//! local-authority (and higher-tier) estimates using the overlap artifact,
//! attaches official council names, and writes one wide table per dataset
//! plus a combined long-format file.

mod melt;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use hashbrown::HashSet;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use geopoll::config::Config;
use geopoll::convert::convert;
use geopoll::hierarchy::CouncilRegistry;
use geopoll::models::{OverlapMeasure, SurveyTable, ValueKind};
use geopoll::overlap::OverlapTable;
use geopoll::store::ArtifactStore;

use crate::melt::{melt_dataset, write_combined, write_lookup, write_wide, MeltedRow};

const OUTPUT_KEY: &str = "local-authority-code";

#[derive(Parser, Debug)]
#[command(name = "convert")]
#[command(about = "Convert survey datasets to local authority tables")]
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

    if config.datasets.is_empty() {
        anyhow::bail!("no survey datasets configured");
    }

    let client = reqwest::Client::new();
    let overlap = load_overlap_table(&config, &store, &client).await?;
    info!("Overlap table: {} records", overlap.records.len());

    let registry = CouncilRegistry::fetch(
        &client,
        &config.registry.url,
        config.reference_date,
        config.registry.include_historical,
    )
    .await?;
    info!("Council registry: {} records", registry.len());

    let mut combined: Vec<MeltedRow> = Vec::new();

    for dataset in &config.datasets {
        info!("Converting dataset '{}'", dataset.name);
        let survey = SurveyTable::from_csv_path(&dataset.file, &dataset.key_column)?;

        let result = convert(
            &survey,
            &overlap,
            ValueKind::Percentage,
            ValueKind::Percentage,
            OverlapMeasure::Population,
            Some(OUTPUT_KEY),
        )?;

        // Codes without a registry row keep their code as the display name
        let unnamed: HashSet<&str> = result
            .rows
            .iter()
            .map(|r| r.code.as_str())
            .filter(|code| registry.official_name(code).is_none())
            .collect();
        if !unnamed.is_empty() {
            warn!(
                "{} output codes missing from the council registry in '{}'",
                unnamed.len(),
                dataset.name
            );
        }

        store.write_atomic(&format!("{}.csv", dataset.name), |w| {
            write_wide(w, &result, &registry)
        })?;

        let (rows, lookup) = melt_dataset(&dataset.name, &result, &registry);
        store.write_atomic(&format!("{}_lookup.csv", dataset.name), |w| {
            write_lookup(w, &lookup)
        })?;
        combined.extend(rows);
    }

    let combined_path = store.write_atomic("combined.csv", |w| write_combined(w, &combined))?;
    info!(
        "Converted {} datasets, {} combined rows at {}",
        config.datasets.len(),
        combined.len(),
        combined_path.display()
    );

    Ok(())
}

/// Use the interim overlap artifact if present, otherwise fetch the
/// published one.
async fn load_overlap_table(
    config: &Config,
    store: &ArtifactStore,
    client: &reqwest::Client,
) -> Result<OverlapTable> {
    let name = config.overlap_artifact_name();
    if store.exists(&name) {
        return OverlapTable::read_csv(
            store.open(&name)?,
            config.boundaries.source_geography,
            config.boundaries.target_geography,
        );
    }

    let base_url = config.overlap_base_url.as_deref().ok_or_else(|| {
        anyhow::anyhow!(
            "overlap artifact '{}' not found and no overlap_base_url configured; run the overlaps command first",
            name
        )
    })?;
    info!("Interim artifact missing, fetching published overlap table");
    let table = OverlapTable::fetch(
        client,
        base_url,
        config.boundaries.source_geography,
        config.boundaries.target_geography,
    )
    .await?;
    Ok(table)
}
