//! Geocoding result cache stored as a JSON file.
//!
//! Maps a city name to `{"lat": .., "lon": ..}`. Failed lookups are cached
//! too, as `{"lat": null, "lon": null}`, so a city is never queried twice.
//! The whole file is loaded at startup and rewritten on [`GeocodeCache::flush`]
//! using write-to-temp-then-rename, so an interrupted write never leaves a
//! half-written cache behind.
//!
//! Keys are city names alone (case-sensitive, as received). Two cities with
//! the same name in different counties share one entry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use client_map_visit_models::Coordinates;
use serde::{Deserialize, Serialize};

use crate::paths;

/// Errors from loading or persisting the geocode cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The cache file exists but is not a valid cache mapping.
    #[error("Geocode cache {path} is corrupt: {source}")]
    Corrupt {
        /// Path of the corrupt file.
        path: PathBuf,
        /// Underlying parse error.
        source: serde_json::Error,
    },

    /// Serializing the cache failed.
    #[error("Failed to serialize geocode cache: {0}")]
    Serialize(#[source] serde_json::Error),

    /// I/O error while writing the cache.
    #[error("I/O error writing geocode cache {path}: {source}")]
    Io {
        /// Path being written.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// On-disk value for one city. Both fields are `null` for an unresolved
/// city.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Latitude, `None` when the city could not be resolved.
    pub lat: Option<f64>,
    /// Longitude, `None` when the city could not be resolved.
    pub lon: Option<f64>,
}

impl CacheEntry {
    /// Entry for a resolved city.
    #[must_use]
    pub const fn resolved(coords: Coordinates) -> Self {
        Self {
            lat: Some(coords.latitude),
            lon: Some(coords.longitude),
        }
    }

    /// Negative entry for a city the geocoder could not resolve.
    #[must_use]
    pub const fn unresolved() -> Self {
        Self {
            lat: None,
            lon: None,
        }
    }

    /// Returns the coordinates if both halves are present.
    #[must_use]
    pub const fn coordinates(&self) -> Option<Coordinates> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        }
    }
}

/// Result of a cache lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CacheLookup {
    /// The city has coordinates.
    Resolved(Coordinates),
    /// The city was tried and could not be resolved.
    Unresolved,
    /// The city has never been tried.
    Miss,
}

/// In-memory view of the persisted geocode cache.
#[derive(Debug)]
pub struct GeocodeCache {
    path: PathBuf,
    entries: BTreeMap<String, CacheEntry>,
    /// Entries recorded since the last flush.
    pending: usize,
    /// A file exists at `path` but could not be read. Flushing would
    /// replace it with only this run's entries, so flushes are skipped.
    preserve_existing: bool,
}

impl GeocodeCache {
    /// Creates an empty cache that will persist to `path`.
    #[must_use]
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
            pending: 0,
            preserve_existing: false,
        }
    }

    /// Loads the cache from `path`.
    ///
    /// A missing file yields an empty cache. A file that exists but cannot
    /// be read also yields an empty cache, and that cache never flushes
    /// over the file. A file whose bytes are not a valid UTF-8 JSON cache
    /// mapping is [`CacheError::Corrupt`].
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Corrupt`] if the file content is not a valid
    /// cache mapping.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();

        let contents = match std::fs::read(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No geocode cache at {}, starting empty", path.display());
                return Ok(Self::empty(path));
            }
            Err(e) => {
                log::warn!(
                    "Failed to read geocode cache {}: {e}; starting empty and leaving the file untouched",
                    path.display()
                );
                let mut cache = Self::empty(path);
                cache.preserve_existing = true;
                return Ok(cache);
            }
        };

        // from_slice rejects invalid UTF-8, so a mis-encoded file is corrupt.
        let entries: BTreeMap<String, CacheEntry> = serde_json::from_slice(&contents)
            .map_err(|source| CacheError::Corrupt {
                path: path.clone(),
                source,
            })?;

        let half = entries
            .values()
            .filter(|e| e.lat.is_some() != e.lon.is_some())
            .count();
        if half > 0 {
            log::warn!(
                "{half} cache entries in {} have only one coordinate; treating them as unresolved",
                path.display()
            );
        }

        let cache = Self {
            path,
            entries,
            pending: 0,
            preserve_existing: false,
        };
        log::info!(
            "Loaded geocode cache from {} ({} resolved, {} unresolved)",
            cache.path.display(),
            cache.resolved_count(),
            cache.unresolved_count()
        );
        Ok(cache)
    }

    /// Path the cache persists to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Looks up a city by exact name.
    #[must_use]
    pub fn lookup(&self, city: &str) -> CacheLookup {
        match self.entries.get(city) {
            None => CacheLookup::Miss,
            Some(entry) => entry
                .coordinates()
                .map_or(CacheLookup::Unresolved, CacheLookup::Resolved),
        }
    }

    /// Records the outcome for `city`: coordinates, or `None` for a city
    /// the geocoder could not resolve.
    pub fn record(&mut self, city: &str, result: Option<Coordinates>) {
        let entry = result.map_or_else(CacheEntry::unresolved, CacheEntry::resolved);
        self.entries.insert(city.to_string(), entry);
        self.pending += 1;
    }

    /// Drops the unresolved entries for `cities` so they are queried
    /// again. Unresolved entries for other cities are kept.
    ///
    /// Returns the number of entries removed.
    pub fn forget_unresolved(&mut self, cities: &[&str]) -> usize {
        let mut removed = 0;
        for city in cities {
            if self.lookup(city) == CacheLookup::Unresolved {
                self.entries.remove(*city);
                removed += 1;
            }
        }
        self.pending += removed;
        removed
    }

    /// Number of entries recorded (or removed) since the last flush.
    #[must_use]
    pub const fn pending(&self) -> usize {
        self.pending
    }

    /// Total number of cached cities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no city is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of cities with coordinates.
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.coordinates().is_some())
            .count()
    }

    /// Number of cities cached as unresolved.
    #[must_use]
    pub fn unresolved_count(&self) -> usize {
        self.len() - self.resolved_count()
    }

    /// Iterates over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CacheEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Writes the full mapping to disk atomically (`.tmp` then rename).
    ///
    /// Output is UTF-8 JSON with 4-space indentation and non-ASCII city
    /// names written as-is. If the cache was loaded from a file that could
    /// not be read, nothing is written.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if serialization or any file operation fails.
    pub fn flush(&mut self) -> Result<(), CacheError> {
        if self.preserve_existing {
            log::warn!(
                "Not saving {} geocode cache entries: {} exists but could not be read",
                self.pending,
                self.path.display()
            );
            self.pending = 0;
            return Ok(());
        }

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.entries
            .serialize(&mut ser)
            .map_err(CacheError::Serialize)?;

        paths::write_atomic(&self.path, &buf).map_err(|source| CacheError::Io {
            path: self.path.clone(),
            source,
        })?;

        log::info!(
            "Saved {} geocode cache entries to {}",
            self.entries.len(),
            self.path.display()
        );
        self.pending = 0;
        Ok(())
    }
}
