use serde::Serialize;
use tracing::{error, info};

use crate::dedup::{CityFrequencies, Deduplicator};
use crate::errors::AppResult;
use crate::ingestion::{JobRecord, ResolvedRecord};
use crate::normalize::normalize;
use crate::resolver::{GeoResolver, ResolutionSource};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub total_records: usize,
    pub cache_hits: usize,
    pub geocoded: usize,
    pub geocoder_requests: usize,
    pub cache_write_failures: usize,
    pub distinct_cities: usize,
    pub dedup_rewrites: usize,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub records: Vec<ResolvedRecord>,
    pub stats: PipelineStats,
}

/// Resolves a whole batch, then folds near-duplicate city spellings.
///
/// Deduplication needs the frequency of every name in the batch, so nothing
/// is returned until every record has been resolved.
pub struct LocationPipeline {
    resolver: GeoResolver,
    deduplicator: Deduplicator,
}

impl LocationPipeline {
    pub fn new(resolver: GeoResolver) -> Self {
        Self {
            resolver,
            deduplicator: Deduplicator::new(),
        }
    }

    pub fn resolver(&self) -> &GeoResolver {
        &self.resolver
    }

    pub async fn run(&mut self, records: Vec<JobRecord>) -> AppResult<PipelineOutput> {
        let requests_before = self.resolver.geocoder_requests();
        let mut stats = PipelineStats {
            total_records: records.len(),
            ..PipelineStats::default()
        };
        let mut frequencies = CityFrequencies::new();
        let mut resolved = Vec::with_capacity(records.len());

        for record in records {
            let normalized = normalize(&record.city);
            let city = self.resolver.rewrite(&normalized);
            let resolution = match self.resolver.resolve(&city).await {
                Ok(resolution) => resolution,
                Err(err) => {
                    error!(?err, raw = %record.city, city = %city, "aborting batch");
                    return Err(err);
                }
            };

            match resolution.source {
                ResolutionSource::Cache => stats.cache_hits += 1,
                ResolutionSource::Geocoder => stats.geocoded += 1,
            }
            if !resolution.persisted {
                stats.cache_write_failures += 1;
            }

            frequencies.record(&city);
            resolved.push(ResolvedRecord::new(record, city, resolution.location));
        }

        let plan = self.deduplicator.plan(&frequencies);
        stats.dedup_rewrites = plan.apply(&mut resolved);
        stats.distinct_cities = frequencies.len();
        stats.geocoder_requests = self.resolver.geocoder_requests() - requests_before;

        info!(
            total = stats.total_records,
            cache_hits = stats.cache_hits,
            geocoded = stats.geocoded,
            requests = stats.geocoder_requests,
            write_failures = stats.cache_write_failures,
            distinct = stats.distinct_cities,
            rewritten = stats.dedup_rewrites,
            "location pipeline finished"
        );

        Ok(PipelineOutput {
            records: resolved,
            stats,
        })
    }
}
