//! Actions shared by the subcommands and the interactive menu.

use std::path::{Path, PathBuf};
use std::time::Instant;

use client_map_cli_utils::{IndicatifProgress, MultiProgress};
use client_map_database::db;
use client_map_database::geocode_cache::GeocodeCache;
use client_map_database::visits::{PostgresVisitSource, VisitTable};
use client_map_geocoder::nominatim::NominatimGeocoder;
use client_map_geocoder::rate_limit::MinIntervalGate;
use client_map_pipeline::{ConfigError, Pipeline, PipelineConfig};

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct RunOverrides {
    pub output: Option<PathBuf>,
    pub cache: Option<PathBuf>,
    pub database_url: Option<String>,
    pub region: Option<String>,
    pub retry_unresolved: bool,
    pub flush_every: Option<usize>,
}

impl RunOverrides {
    /// Writes the overrides into `config` and re-validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if an override is out of range.
    pub fn apply(self, config: &mut PipelineConfig) -> Result<(), ConfigError> {
        if let Some(output) = self.output {
            config.output.path = output;
        }
        if let Some(cache) = self.cache {
            config.cache.path = cache;
        }
        if let Some(url) = self.database_url {
            config.database.url = url;
        }
        if let Some(region) = self.region {
            config.region.code = region;
        }
        if self.retry_unresolved {
            config.cache.retry_unresolved = true;
        }
        if self.flush_every.is_some() {
            config.cache.flush_every = self.flush_every;
        }
        config.validate()
    }
}

/// Runs the full pipeline against the configured database and geocoder,
/// then prints the run report.
///
/// # Errors
///
/// Returns an error if the table settings are invalid, the database is
/// unreachable, or the pipeline fails.
pub async fn run_map(
    multi: &MultiProgress,
    config: &PipelineConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();

    let table = VisitTable::new(&config.database.table, &config.database.client_id_column)?;
    log::info!("Connecting to {}...", db::redact_url(&config.database.url));
    let source = PostgresVisitSource::new(db::connect(&config.database.url).await?, table);

    let geocoder = NominatimGeocoder::new(config.nominatim())?;
    let gate = MinIntervalGate::system(config.min_interval());
    let progress = IndicatifProgress::cities_bar(multi, "Checking cities");

    let report = Pipeline::new(config, &source, &geocoder, gate)
        .with_progress(progress)
        .run()
        .await?;

    println!();
    println!("{report}");
    println!("Finished in {:.1}s", start.elapsed().as_secs_f64());
    Ok(())
}

/// Prints entry counts for the cache at `path`.
///
/// # Errors
///
/// Returns an error if the cache file is corrupt.
pub fn cache_stats(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let cache = GeocodeCache::load(path)?;
    println!("Cache: {}", path.display());
    println!("  Cities:     {}", cache.len());
    println!("  Resolved:   {}", cache.resolved_count());
    println!("  Unresolved: {}", cache.unresolved_count());
    Ok(())
}

/// Prints `config` as TOML.
///
/// # Errors
///
/// Returns an error if the configuration cannot be serialized.
pub fn print_config(config: &PipelineConfig) -> Result<(), Box<dyn std::error::Error>> {
    print!("{}", config.to_toml()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_file_values() {
        let mut config = PipelineConfig::default();
        RunOverrides {
            output: Some(PathBuf::from("out/map.html")),
            region: Some("PA".to_string()),
            retry_unresolved: true,
            flush_every: Some(25),
            ..RunOverrides::default()
        }
        .apply(&mut config)
        .unwrap();

        assert_eq!(config.output.path, PathBuf::from("out/map.html"));
        assert_eq!(config.region.code, "PA");
        assert!(config.cache.retry_unresolved);
        assert_eq!(config.cache.flush_every, Some(25));
        assert_eq!(config.cache.path, PipelineConfig::default().cache.path);
    }

    #[test]
    fn empty_overrides_keep_config() {
        let mut config = PipelineConfig::default();
        config.cache.retry_unresolved = true;
        RunOverrides::default().apply(&mut config).unwrap();
        assert!(config.cache.retry_unresolved);
        assert_eq!(config.database.url, PipelineConfig::default().database.url);
    }

    #[test]
    fn invalid_override_is_rejected() {
        let mut config = PipelineConfig::default();
        let err = RunOverrides {
            region: Some("  ".to_string()),
            ..RunOverrides::default()
        }
        .apply(&mut config)
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
