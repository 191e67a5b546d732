pub mod aliases;
pub mod cache;
pub mod config;
pub mod dedup;
pub mod duration;
pub mod errors;
pub mod geocoder;
pub mod ingestion;
pub mod normalize;
pub mod pipeline;
pub mod regions;
pub mod resolver;

use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use aliases::GeocoderAliasRewriter;
pub use cache::{
    CsvLocationStore, Location, LocationCache, LocationEntry, LocationStore, MemoryLocationStore,
    SqliteLocationStore,
};
pub use config::{AppConfig, CacheBackend};
pub use dedup::{CityFrequencies, DedupPlan, Deduplicator};
pub use duration::{sanitize_duration, ContractDuration};
pub use errors::{AppError, AppResult};
pub use geocoder::{GeocodedAddress, Geocoder, GoogleGeocoder, StaticGeocoder};
pub use ingestion::{read_records, write_records, JobRecord, ResolvedRecord};
pub use normalize::normalize;
pub use pipeline::{LocationPipeline, PipelineOutput, PipelineStats};
pub use regions::RegionAliasTable;
pub use resolver::{GeoResolver, LocationTables, Resolution, ResolutionSource, FOREIGN};

pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,job_locations=debug"));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    });
}
