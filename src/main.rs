use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use job_locations::{
    init_tracing, read_records, write_records, AppConfig, GeoResolver, GoogleGeocoder,
    LocationCache, LocationPipeline, LocationTables,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = AppConfig::from_env()?;
    info!(config = ?config.public_profile(), "starting location pipeline");

    let input_path = config
        .input_path
        .clone()
        .context("JOBS_INPUT_PATH must point to a JSON-lines export")?;
    let input = File::open(&input_path)
        .with_context(|| format!("failed to open {}", input_path.display()))?;
    let records = read_records(BufReader::new(input))?;

    let cache = LocationCache::from_config(&config)?;
    let geocoder = GoogleGeocoder::new(&config)?;
    let resolver = GeoResolver::new(
        cache,
        Arc::new(geocoder),
        Arc::new(LocationTables::default()),
    );
    let mut pipeline = LocationPipeline::new(resolver);
    let output = pipeline.run(records).await?;

    match &config.output_path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            write_records(BufWriter::new(file), &output.records)?;
        }
        None => write_records(BufWriter::new(io::stdout().lock()), &output.records)?,
    }

    info!(stats = ?output.stats, "done");
    Ok(())
}
