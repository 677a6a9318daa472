#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregation of raw client visits into per-city summaries.
//!
//! Rows are grouped on `(city, county, state)`. A missing county is kept as
//! its own group rather than being dropped or merged into another county.
//! Each group yields one [`CityAggregate`] with a row count and a distinct
//! client count. Coordinates and tier are left empty here; they are merged
//! in after geocoding.

use std::collections::{BTreeMap, BTreeSet};

use client_map_visit_models::{CityAggregate, VisitRecord};

/// Grouping key: `(city, county, state)`.
type GroupKey<'a> = (&'a str, Option<&'a str>, &'a str);

#[derive(Default)]
struct Group<'a> {
    records: u64,
    clients: BTreeSet<&'a str>,
}

/// Keeps only rows that belong to `region` and have a city.
///
/// The record source is expected to filter already; this enforces the same
/// predicate for any source.
pub fn filter_region<'a>(
    records: &'a [VisitRecord],
    region: &'a str,
) -> impl Iterator<Item = &'a VisitRecord> + 'a {
    records.iter().filter(move |r| r.matches_region(region))
}

/// Groups visit rows into one [`CityAggregate`] per `(city, county, state)`.
///
/// Rows without a city are skipped. Output is sorted by the grouping key
/// (rows with no county sort before named counties within a city).
#[must_use]
pub fn aggregate<'a, I>(records: I) -> Vec<CityAggregate>
where
    I: IntoIterator<Item = &'a VisitRecord>,
{
    let mut groups: BTreeMap<GroupKey<'a>, Group<'a>> = BTreeMap::new();
    let mut skipped = 0u64;

    for record in records {
        let Some(city) = record.city.as_deref() else {
            skipped += 1;
            continue;
        };

        let group = groups
            .entry((city, record.county.as_deref(), record.state.as_str()))
            .or_default();
        group.records += 1;
        group.clients.insert(record.client_id.as_str());
    }

    if skipped > 0 {
        log::debug!("Skipped {skipped} rows without a city");
    }

    groups
        .into_iter()
        .map(|((city, county, state), group)| CityAggregate {
            city: city.to_string(),
            county: county.map(String::from),
            state: state.to_string(),
            record_count: group.records,
            unique_client_count: group.clients.len() as u64,
            coordinates: None,
            tier: None,
        })
        .collect()
}

/// Returns each distinct city name once, in aggregate order.
///
/// The geocode cache is keyed on city name alone, so a city that appears
/// under several counties is only looked up once.
#[must_use]
pub fn distinct_cities(aggregates: &[CityAggregate]) -> Vec<&str> {
    let mut seen = BTreeSet::new();
    aggregates
        .iter()
        .map(|a| a.city.as_str())
        .filter(|city| seen.insert(*city))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visit(city: Option<&str>, county: Option<&str>, state: &str, client: &str) -> VisitRecord {
        VisitRecord {
            city: city.map(String::from),
            county: county.map(String::from),
            state: state.to_string(),
            client_id: client.to_string(),
        }
    }

    fn find<'a>(aggs: &'a [CityAggregate], city: &str, county: Option<&str>) -> &'a CityAggregate {
        aggs.iter()
            .find(|a| a.city == city && a.county.as_deref() == county)
            .unwrap()
    }

    #[test]
    fn newark_and_camden() {
        let rows = vec![
            visit(Some("Newark"), Some("X"), "NJ", "a"),
            visit(Some("Newark"), Some("X"), "NJ", "a"),
            visit(Some("Newark"), Some("X"), "NJ", "b"),
            visit(Some("Camden"), Some("X"), "NJ", "c"),
        ];

        let aggs = aggregate(&rows);
        assert_eq!(aggs.len(), 2);

        let newark = find(&aggs, "Newark", Some("X"));
        assert_eq!(newark.record_count, 3);
        assert_eq!(newark.unique_client_count, 2);

        let camden = find(&aggs, "Camden", Some("X"));
        assert_eq!(camden.record_count, 1);
        assert_eq!(camden.unique_client_count, 1);
    }

    #[test]
    fn record_counts_sum_to_filtered_rows() {
        let rows = vec![
            visit(Some("Newark"), Some("Essex"), "NJ", "a"),
            visit(Some("Newark"), None, "NJ", "a"),
            visit(Some("Trenton"), Some("Mercer"), "nj", "b"),
            visit(Some("Albany"), Some("Albany"), "NY", "c"),
            visit(None, Some("Essex"), "NJ", "d"),
            visit(Some("Trenton"), Some("Mercer"), "NJ", "e"),
        ];

        let filtered: Vec<&VisitRecord> = filter_region(&rows, "NJ").collect();
        assert_eq!(filtered.len(), 4);

        let aggs = aggregate(filtered.iter().copied());
        let total: u64 = aggs.iter().map(|a| a.record_count).sum();
        assert_eq!(total, 4);

        for agg in &aggs {
            assert!(agg.unique_client_count >= 1);
            assert!(agg.unique_client_count <= agg.record_count);
        }
    }

    #[test]
    fn missing_county_is_its_own_group() {
        let rows = vec![
            visit(Some("Newark"), Some("Essex"), "NJ", "a"),
            visit(Some("Newark"), None, "NJ", "b"),
            visit(Some("Newark"), None, "NJ", "c"),
        ];

        let aggs = aggregate(&rows);
        assert_eq!(aggs.len(), 2);
        assert_eq!(find(&aggs, "Newark", None).record_count, 2);
        assert_eq!(find(&aggs, "Newark", Some("Essex")).record_count, 1);
    }

    #[test]
    fn state_spelling_splits_groups() {
        let rows = vec![
            visit(Some("Trenton"), Some("Mercer"), "NJ", "a"),
            visit(Some("Trenton"), Some("Mercer"), "nj", "a"),
        ];

        assert_eq!(aggregate(&rows).len(), 2);
    }

    #[test]
    fn rows_without_city_are_skipped() {
        let rows = vec![visit(None, Some("Essex"), "NJ", "a")];
        assert!(aggregate(&rows).is_empty());
    }

    #[test]
    fn distinct_cities_dedupes_across_counties() {
        let rows = vec![
            visit(Some("Washington"), Some("Warren"), "NJ", "a"),
            visit(Some("Washington"), Some("Morris"), "NJ", "b"),
            visit(Some("Camden"), Some("Camden"), "NJ", "c"),
        ];

        let aggs = aggregate(&rows);
        assert_eq!(aggs.len(), 3);
        assert_eq!(distinct_cities(&aggs), vec!["Camden", "Washington"]);
    }
}
