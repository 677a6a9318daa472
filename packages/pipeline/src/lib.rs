#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregate -> geocode -> render pipeline for the client map.
//!
//! One run is strictly sequential:
//!
//! 1. Fetch visit rows for the region from the [`RecordSource`] and group
//!    them into per-`(city, county, state)` aggregates.
//! 2. Load the geocode cache and, for every city not already in it, query
//!    the [`Geocoder`] once, paced by a [`MinIntervalGate`]. Hits and
//!    misses are both recorded, then the cache is flushed.
//! 3. Merge cached coordinates back into the aggregates, assign tiers, and
//!    write the HTML map.
//!
//! A failure to read the record source aborts the run before anything is
//! written. Geocoder failures never abort the run; the city is recorded as
//! unresolved.

pub mod config;
pub mod progress;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use client_map_aggregate::{aggregate, distinct_cities, filter_region};
use client_map_database::geocode_cache::{CacheError, CacheLookup, GeocodeCache};
use client_map_database::visits::RecordSource;
use client_map_database::{DbError, paths};
use client_map_geocoder::rate_limit::MinIntervalGate;
use client_map_geocoder::{Geocoder, city_query};
use client_map_render::{RenderError, layers};
use client_map_visit_models::{CityAggregate, Tier};

pub use config::{ConfigError, PipelineConfig};
use progress::{ProgressCallback, null_progress};

/// How often (in cities) the geocoding pass logs a progress line.
const LOG_EVERY: usize = 10;

/// Errors that abort a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The record source could not be read.
    #[error("Failed to read visit records: {0}")]
    Source(#[from] DbError),

    /// The geocode cache is corrupt or could not be written.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The map could not be rendered.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// The rendered map could not be written.
    #[error("Failed to write map {path}: {source}")]
    Output {
        /// Path being written.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Outcome counts for the geocoding pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveStats {
    /// Distinct city names considered.
    pub cities: usize,
    /// Cities already cached with coordinates.
    pub cached_resolved: usize,
    /// Cities already cached as unresolved (not re-queried).
    pub cached_unresolved: usize,
    /// Requests sent to the geocoder.
    pub geocoder_calls: usize,
    /// New cities resolved to coordinates.
    pub resolved: usize,
    /// New cities the geocoder had no match for.
    pub no_match: usize,
    /// New cities whose request failed (timeout, unavailable, rate
    /// limited). Persisted as unresolved, same as `no_match`.
    pub failed: usize,
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Rows returned by the record source.
    pub rows_fetched: usize,
    /// Rows that passed the region / non-null-city filter.
    pub rows_aggregated: usize,
    /// Number of `(city, county, state)` aggregates.
    pub aggregates: usize,
    /// Geocoding pass counts.
    pub geocoding: ResolveStats,
    /// Markers in the High layer.
    pub high: usize,
    /// Markers in the Medium layer.
    pub medium: usize,
    /// Markers in the Low layer.
    pub low: usize,
    /// Aggregates left off the map for lack of coordinates.
    pub excluded: usize,
    /// Where the map was written.
    pub output_path: PathBuf,
}

impl RunReport {
    /// Total markers on the map.
    #[must_use]
    pub const fn markers(&self) -> usize {
        self.high + self.medium + self.low
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let g = &self.geocoding;
        writeln!(
            f,
            "Rows: {} fetched, {} aggregated into {} city groups",
            self.rows_fetched, self.rows_aggregated, self.aggregates
        )?;
        writeln!(
            f,
            "Cities: {} total, {} cached ({} unresolved), {} geocoder calls",
            g.cities,
            g.cached_resolved + g.cached_unresolved,
            g.cached_unresolved,
            g.geocoder_calls
        )?;
        writeln!(
            f,
            "Geocoded: {} resolved, {} no match, {} failed",
            g.resolved, g.no_match, g.failed
        )?;
        writeln!(
            f,
            "Markers: {} (high {}, medium {}, low {}), {} without coordinates",
            self.markers(),
            self.high,
            self.medium,
            self.low,
            self.excluded
        )?;
        write!(f, "Map: {}", self.output_path.display())
    }
}

/// One configured pipeline run.
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    source: &'a dyn RecordSource,
    geocoder: &'a dyn Geocoder,
    gate: MinIntervalGate,
    progress: Arc<dyn ProgressCallback>,
}

impl<'a> Pipeline<'a> {
    #[must_use]
    pub fn new(
        config: &'a PipelineConfig,
        source: &'a dyn RecordSource,
        geocoder: &'a dyn Geocoder,
        gate: MinIntervalGate,
    ) -> Self {
        Self {
            config,
            source,
            geocoder,
            gate,
            progress: null_progress(),
        }
    }

    /// Reports geocoding progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Runs the pipeline end to end.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the record source cannot be read, the
    /// cache file is corrupt or cannot be written, or the map cannot be
    /// rendered or written.
    pub async fn run(&mut self) -> Result<RunReport, PipelineError> {
        let config = self.config;
        let region = config.region.code.as_str();

        log::info!("Querying visit records for region {region}...");
        let rows = self.source.fetch_visits(region).await?;
        log::info!("Query complete: {} rows", rows.len());

        let filtered: Vec<_> = filter_region(&rows, region).collect();
        if filtered.len() < rows.len() {
            log::warn!(
                "Dropped {} rows outside region {region} or without a city",
                rows.len() - filtered.len()
            );
        }

        log::info!("Aggregating data...");
        let mut aggregates = aggregate(filtered.iter().copied());
        log::info!("Aggregation done: {} city groups", aggregates.len());

        let mut cache = GeocodeCache::load(&config.cache.path)?;
        let cities = distinct_cities(&aggregates);
        if config.cache.retry_unresolved {
            let removed = cache.forget_unresolved(&cities);
            log::info!("Retrying {removed} previously unresolved cities");
        }

        let geocoding = self.resolve_cities(&mut cache, &cities).await?;

        let merged = merge_coordinates(&mut aggregates, &cache);
        log::info!("Valid coordinates: {merged}/{}", aggregates.len());
        layers::assign_tiers(&mut aggregates);

        log::info!("Building map...");
        let map = client_map_render::render_map(&aggregates, region, &config.map_view())?;
        let output_path = config.output.path.clone();
        paths::write_atomic(&output_path, map.html.as_bytes()).map_err(|source| {
            PipelineError::Output {
                path: output_path.clone(),
                source,
            }
        })?;
        log::info!(
            "Map with {} markers saved to {}",
            map.layers.marker_count(),
            output_path.display()
        );
        let markers = &map.layers;

        Ok(RunReport {
            rows_fetched: rows.len(),
            rows_aggregated: filtered.len(),
            aggregates: aggregates.len(),
            geocoding,
            high: markers.count(Tier::High),
            medium: markers.count(Tier::Medium),
            low: markers.count(Tier::Low),
            excluded: markers.excluded,
            output_path,
        })
    }

    /// Ensures every city has a cache entry, querying the geocoder for
    /// cache misses only.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Cache`] if flushing the cache fails.
    pub async fn resolve_cities(
        &mut self,
        cache: &mut GeocodeCache,
        cities: &[&str],
    ) -> Result<ResolveStats, PipelineError> {
        let config = self.config;
        let region = config.region.code.as_str();
        let flush_every = config.cache.flush_every;
        let total = cities.len();
        let mut stats = ResolveStats {
            cities: total,
            ..ResolveStats::default()
        };

        log::info!("Total cities to check: {total}");
        self.progress.set_total(total as u64);

        for (i, city) in cities.iter().enumerate() {
            match cache.lookup(city) {
                CacheLookup::Resolved(_) => stats.cached_resolved += 1,
                CacheLookup::Unresolved => stats.cached_unresolved += 1,
                CacheLookup::Miss => {
                    self.progress.set_message(format!("Geocoding {city}"));
                    self.gate.wait().await;
                    stats.geocoder_calls += 1;

                    let query = city_query(city, region);
                    let result = match self.geocoder.geocode(&query).await {
                        Ok(Some(found)) => {
                            log::debug!(
                                "Resolved '{query}' to ({}, {})",
                                found.latitude,
                                found.longitude
                            );
                            stats.resolved += 1;
                            Some(found.coordinates())
                        }
                        Ok(None) => {
                            log::debug!("No match for '{query}'");
                            stats.no_match += 1;
                            None
                        }
                        Err(e) => {
                            log::warn!("Geocoder error for '{query}': {e}");
                            stats.failed += 1;
                            None
                        }
                    };
                    cache.record(city, result);

                    if let Some(n) = flush_every
                        && cache.pending() >= n
                    {
                        cache.flush()?;
                    }
                }
            }

            self.progress.inc(1);
            if (i + 1) % LOG_EVERY == 0 {
                log::info!("Processed {}/{total} cities", i + 1);
            }
        }

        if cache.pending() > 0 {
            cache.flush()?;
        }

        self.progress.finish(format!(
            "Geocoded {total} cities ({} new lookups)",
            stats.geocoder_calls
        ));
        log::info!(
            "Geocoding pass: {} cached, {} resolved, {} no match, {} failed",
            stats.cached_resolved + stats.cached_unresolved,
            stats.resolved,
            stats.no_match,
            stats.failed
        );
        Ok(stats)
    }
}

/// Copies cached coordinates onto every aggregate whose city is resolved.
///
/// Cities are matched by name alone, so aggregates for the same city name in
/// different counties get the same coordinates. Returns the number of
/// aggregates that have coordinates afterwards.
pub fn merge_coordinates(aggregates: &mut [CityAggregate], cache: &GeocodeCache) -> usize {
    let mut merged = 0;
    for agg in aggregates {
        agg.coordinates = match cache.lookup(&agg.city) {
            CacheLookup::Resolved(coords) => Some(coords),
            CacheLookup::Unresolved | CacheLookup::Miss => None,
        };
        if agg.coordinates.is_some() {
            merged += 1;
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use client_map_visit_models::Coordinates;

    use super::*;

    fn agg(city: &str, county: &str) -> CityAggregate {
        CityAggregate {
            city: city.to_string(),
            county: Some(county.to_string()),
            state: "NJ".to_string(),
            record_count: 1,
            unique_client_count: 1,
            coordinates: None,
            tier: None,
        }
    }

    #[test]
    fn merge_shares_coordinates_across_counties() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = GeocodeCache::empty(dir.path().join("cache.json"));
        cache.record("Washington", Some(Coordinates::new(40.75, -74.98)));
        cache.record("Nowhere", None);

        let mut aggs = vec![
            agg("Washington", "Warren"),
            agg("Washington", "Morris"),
            agg("Nowhere", "Essex"),
            agg("Unknown", "Essex"),
        ];

        assert_eq!(merge_coordinates(&mut aggs, &cache), 2);
        assert_eq!(aggs[0].coordinates, aggs[1].coordinates);
        assert_eq!(aggs[0].latitude(), Some(40.75));
        assert_eq!(aggs[2].coordinates, None);
        assert_eq!(aggs[3].coordinates, None);
    }

    #[test]
    fn report_display_mentions_counts() {
        let report = RunReport {
            rows_fetched: 4,
            rows_aggregated: 4,
            aggregates: 2,
            geocoding: ResolveStats {
                cities: 2,
                cached_resolved: 1,
                geocoder_calls: 1,
                no_match: 1,
                ..ResolveStats::default()
            },
            high: 0,
            medium: 0,
            low: 1,
            excluded: 1,
            output_path: PathBuf::from("client_map.html"),
        };
        let text = report.to_string();
        assert!(text.contains("4 fetched"));
        assert!(text.contains("1 geocoder calls"));
        assert!(text.contains("Markers: 1 (high 0, medium 0, low 1), 1 without coordinates"));
        assert!(text.ends_with("Map: client_map.html"));
    }
}
