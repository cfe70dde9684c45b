//! Marketing statistics aggregation per persona

use crate::trip::{PersonaFilter, Trip};
use chrono::{Datelike, Timelike};
use serde::Serialize;
use std::collections::HashMap;

/// Sentinel message returned when a persona filter matches no trips.
pub const NO_DATA_ERROR: &str = "No data for this persona.";

/// Number of entries kept in each "top" ranking.
const TOP_LIMIT: usize = 5;

/// Minimum total trips at a station before it is considered for the
/// opportunity ranking.
const OPPORTUNITY_MIN_TRIPS: usize = 10;

pub const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationPoint {
    pub name: String,
    pub count: usize,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorridorCount {
    pub route_name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorridorGeo {
    pub route_name: String,
    pub count: usize,
    pub start_coords: [f64; 2],
    pub end_coords: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpportunityStation {
    pub station: String,
    pub persona_trips: usize,
    pub total_trips: usize,
    pub concentration_pct: f64,
    pub relative_concentration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpportunityPoint {
    pub station: String,
    pub lat: f64,
    pub lon: f64,
    pub concentration: f64,
    pub persona_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DurationStats {
    pub mean_min: f64,
    pub median_min: f64,
    pub p25_min: f64,
    pub p75_min: f64,
}

/// One persona's statistics bundle. Built fresh on every call and never
/// mutated after return. Consumers must treat every field as optional in
/// spirit: empty vectors and `None` mean "nothing to render", not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketingStats {
    pub trip_count: usize,
    pub top_start_stations: Vec<StationCount>,
    pub top_end_stations: Vec<StationCount>,
    pub top_start_stations_with_coords: Vec<StationPoint>,
    pub top_end_stations_with_coords: Vec<StationPoint>,
    /// Full station footprint of the persona (start and end roles summed);
    /// empty for the "ALL" filter.
    pub persona_stations_with_coords: Vec<StationPoint>,
    pub top_travel_corridors: Vec<CorridorCount>,
    pub top_travel_corridors_with_coords: Vec<CorridorGeo>,
    /// Stations where the persona is disproportionately represented versus
    /// its base rate; empty for the "ALL" filter.
    pub opportunity_stations: Vec<OpportunityStation>,
    pub opportunity_stations_with_coords: Vec<OpportunityPoint>,
    pub trips_by_hour: [usize; 24],
    /// Counts ordered Monday..Sunday, see [`DAY_NAMES`].
    pub trips_by_day_of_week: [usize; 7],
    pub monthly_usage_counts: [usize; 12],
    /// Share of the filtered set's trips per month, January..December.
    pub monthly_usage_percentages: [f64; 12],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip_duration: Option<DurationStats>,
}

/// Aggregation result: either a stats bundle or the empty-filter sentinel.
/// The sentinel is a value, not an error; callers check it before reading
/// any metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatsResult {
    NoData { error: String },
    Stats(MarketingStats),
}

impl StatsResult {
    pub fn stats(&self) -> Option<&MarketingStats> {
        match self {
            StatsResult::Stats(stats) => Some(stats),
            StatsResult::NoData { .. } => None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, StatsResult::NoData { .. })
    }
}

/// Compute the marketing statistics bundle for one persona filter.
///
/// `PersonaFilter::All` uses the whole dataset; otherwise the dataset is
/// filtered to trips whose persona matches. The opportunity ranking always
/// compares the filtered set against the full dataset.
pub fn compute_stats(trips: &[Trip], filter: &PersonaFilter) -> StatsResult {
    let filtered: Vec<&Trip> = trips.iter().filter(|trip| filter.matches(trip)).collect();
    if filtered.is_empty() {
        return StatsResult::NoData {
            error: NO_DATA_ERROR.to_string(),
        };
    }

    let top_start_stations = top_counts(
        filtered.iter().map(|t| t.start_station_name.as_str()),
        TOP_LIMIT,
    );
    let top_end_stations = top_counts(
        filtered.iter().map(|t| t.end_station_name.as_str()),
        TOP_LIMIT,
    );

    let start_coords = coord_lookup(
        filtered
            .iter()
            .map(|t| (t.start_station_name.as_str(), t.start_lat, t.start_lon)),
    );
    let end_coords = coord_lookup(
        filtered
            .iter()
            .map(|t| (t.end_station_name.as_str(), t.end_lat, t.end_lon)),
    );

    let top_start_stations_with_coords = decorate_stations(&top_start_stations, &start_coords);
    let top_end_stations_with_coords = decorate_stations(&top_end_stations, &end_coords);

    let persona_stations_with_coords = if filter.is_all() {
        Vec::new()
    } else {
        station_footprint(&filtered)
    };

    let (top_travel_corridors, top_travel_corridors_with_coords) = top_corridors(&filtered);

    let (opportunity_stations, opportunity_stations_with_coords) = if filter.is_all() {
        (Vec::new(), Vec::new())
    } else {
        opportunity_stations(trips, &filtered)
    };

    let mut trips_by_hour = [0usize; 24];
    let mut trips_by_day_of_week = [0usize; 7];
    let mut monthly_usage_counts = [0usize; 12];
    for trip in &filtered {
        if let Some(start) = trip.start_time {
            trips_by_hour[start.hour() as usize] += 1;
            trips_by_day_of_week[start.weekday().num_days_from_monday() as usize] += 1;
            monthly_usage_counts[start.month0() as usize] += 1;
        }
    }

    let mut monthly_usage_percentages = [0.0f64; 12];
    for (month, &count) in monthly_usage_counts.iter().enumerate() {
        monthly_usage_percentages[month] = count as f64 / filtered.len() as f64 * 100.0;
    }

    let trip_duration = duration_stats(&filtered);

    StatsResult::Stats(MarketingStats {
        trip_count: filtered.len(),
        top_start_stations,
        top_end_stations,
        top_start_stations_with_coords,
        top_end_stations_with_coords,
        persona_stations_with_coords,
        top_travel_corridors,
        top_travel_corridors_with_coords,
        opportunity_stations,
        opportunity_stations_with_coords,
        trips_by_hour,
        trips_by_day_of_week,
        monthly_usage_counts,
        monthly_usage_percentages,
        trip_duration,
    })
}

/// Count occurrences and keep the top `limit`, ordered by count descending
/// with ties broken by first encounter.
fn top_counts<'a>(names: impl Iterator<Item = &'a str>, limit: usize) -> Vec<StationCount> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (row_idx, name) in names.enumerate() {
        let entry = counts.entry(name).or_insert((0, row_idx));
        entry.0 += 1;
    }

    let mut ranked: Vec<(&str, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    ranked.truncate(limit);
    ranked
        .into_iter()
        .map(|(name, (count, _))| StationCount {
            name: name.to_string(),
            count,
        })
        .collect()
}

/// First encountered non-null coordinate pair per station name.
fn coord_lookup<'a>(
    rows: impl Iterator<Item = (&'a str, Option<f64>, Option<f64>)>,
) -> HashMap<&'a str, (f64, f64)> {
    let mut lookup = HashMap::new();
    for (name, lat, lon) in rows {
        if let (Some(lat), Some(lon)) = (lat, lon) {
            lookup.entry(name).or_insert((lat, lon));
        }
    }
    lookup
}

/// Attach coordinates to a ranking; stations without known coordinates are
/// dropped from the decorated variant only.
fn decorate_stations(
    ranking: &[StationCount],
    coords: &HashMap<&str, (f64, f64)>,
) -> Vec<StationPoint> {
    ranking
        .iter()
        .filter_map(|station| {
            coords.get(station.name.as_str()).map(|&(lat, lon)| StationPoint {
                name: station.name.clone(),
                count: station.count,
                lat,
                lon,
            })
        })
        .collect()
}

/// Every station the persona touches, as start or end, grouped by
/// (name, lat, lon) with appearances in both roles summed. Rows without
/// coordinates contribute nothing.
fn station_footprint(filtered: &[&Trip]) -> Vec<StationPoint> {
    let mut counts: HashMap<(&str, u64, u64), (f64, f64, usize)> = HashMap::new();
    let appearances = filtered.iter().flat_map(|trip| {
        [
            (trip.start_station_name.as_str(), trip.start_lat, trip.start_lon),
            (trip.end_station_name.as_str(), trip.end_lat, trip.end_lon),
        ]
    });
    for (name, lat, lon) in appearances {
        if let (Some(lat), Some(lon)) = (lat, lon) {
            let entry = counts
                .entry((name, lat.to_bits(), lon.to_bits()))
                .or_insert((lat, lon, 0));
            entry.2 += 1;
        }
    }

    let mut footprint: Vec<StationPoint> = counts
        .into_iter()
        .map(|((name, _, _), (lat, lon, count))| StationPoint {
            name: name.to_string(),
            count,
            lat,
            lon,
        })
        .collect();
    footprint.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then(a.lat.total_cmp(&b.lat))
            .then(a.lon.total_cmp(&b.lon))
    });
    footprint
}

struct CorridorAcc {
    count: usize,
    first_row: usize,
    start: Option<(f64, f64)>,
    end: Option<(f64, f64)>,
}

/// Top ordered (start, end) station pairs by trip count, formatted as
/// `"{start} → {end}"`. The decorated variant drops any corridor missing
/// either endpoint's coordinates.
fn top_corridors(filtered: &[&Trip]) -> (Vec<CorridorCount>, Vec<CorridorGeo>) {
    let mut corridors: HashMap<(&str, &str), CorridorAcc> = HashMap::new();
    for (row_idx, trip) in filtered.iter().enumerate() {
        let key = (
            trip.start_station_name.as_str(),
            trip.end_station_name.as_str(),
        );
        let acc = corridors.entry(key).or_insert(CorridorAcc {
            count: 0,
            first_row: row_idx,
            start: None,
            end: None,
        });
        acc.count += 1;
        if acc.start.is_none() {
            if let (Some(lat), Some(lon)) = (trip.start_lat, trip.start_lon) {
                acc.start = Some((lat, lon));
            }
        }
        if acc.end.is_none() {
            if let (Some(lat), Some(lon)) = (trip.end_lat, trip.end_lon) {
                acc.end = Some((lat, lon));
            }
        }
    }

    let mut ranked: Vec<((&str, &str), CorridorAcc)> = corridors.into_iter().collect();
    ranked.sort_by(|a, b| b.1.count.cmp(&a.1.count).then(a.1.first_row.cmp(&b.1.first_row)));
    ranked.truncate(TOP_LIMIT);

    let plain = ranked
        .iter()
        .map(|((start, end), acc)| CorridorCount {
            route_name: format!("{start} → {end}"),
            count: acc.count,
        })
        .collect();

    let decorated = ranked
        .iter()
        .filter_map(|((start, end), acc)| match (acc.start, acc.end) {
            (Some(start_coords), Some(end_coords)) => Some(CorridorGeo {
                route_name: format!("{start} → {end}"),
                count: acc.count,
                start_coords: [start_coords.0, start_coords.1],
                end_coords: [end_coords.0, end_coords.1],
            }),
            _ => None,
        })
        .collect();

    (plain, decorated)
}

/// Rank stations where the persona is over-represented relative to its
/// overall share of the full dataset. Only stations with at least
/// [`OPPORTUNITY_MIN_TRIPS`] trips in the unfiltered dataset qualify.
fn opportunity_stations(
    all_trips: &[Trip],
    filtered: &[&Trip],
) -> (Vec<OpportunityStation>, Vec<OpportunityPoint>) {
    let mut total_counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (row_idx, trip) in all_trips.iter().enumerate() {
        let entry = total_counts
            .entry(trip.start_station_name.as_str())
            .or_insert((0, row_idx));
        entry.0 += 1;
    }

    let mut persona_counts: HashMap<&str, usize> = HashMap::new();
    for trip in filtered {
        *persona_counts
            .entry(trip.start_station_name.as_str())
            .or_insert(0) += 1;
    }

    let overall_persona_ratio = filtered.len() as f64 / all_trips.len() as f64 * 100.0;

    let mut candidates: Vec<(usize, OpportunityStation)> = total_counts
        .iter()
        .filter(|(_, &(total, _))| total >= OPPORTUNITY_MIN_TRIPS)
        .map(|(&station, &(total, first_row))| {
            let persona_trips = persona_counts.get(station).copied().unwrap_or(0);
            let concentration_pct = persona_trips as f64 / total as f64 * 100.0;
            let relative_concentration = if overall_persona_ratio > 0.0 {
                concentration_pct / overall_persona_ratio
            } else {
                0.0
            };
            (
                first_row,
                OpportunityStation {
                    station: station.to_string(),
                    persona_trips,
                    total_trips: total,
                    concentration_pct,
                    relative_concentration,
                },
            )
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.1.relative_concentration
            .total_cmp(&a.1.relative_concentration)
            .then(a.0.cmp(&b.0))
    });
    candidates.truncate(TOP_LIMIT);

    let full_coords = coord_lookup(
        all_trips
            .iter()
            .map(|t| (t.start_station_name.as_str(), t.start_lat, t.start_lon)),
    );
    let decorated = candidates
        .iter()
        .filter_map(|(_, station)| {
            full_coords
                .get(station.station.as_str())
                .map(|&(lat, lon)| OpportunityPoint {
                    station: station.station.clone(),
                    lat,
                    lon,
                    concentration: station.relative_concentration,
                    persona_pct: station.concentration_pct,
                })
        })
        .collect();

    let plain = candidates.into_iter().map(|(_, station)| station).collect();
    (plain, decorated)
}

/// Mean, median and quartiles over the non-null durations, rounded to two
/// decimals. `None` when the filtered set carries no duration data.
fn duration_stats(filtered: &[&Trip]) -> Option<DurationStats> {
    let mut durations: Vec<f64> = filtered
        .iter()
        .filter_map(|trip| trip.duration_minutes)
        .collect();
    if durations.is_empty() {
        return None;
    }
    durations.sort_by(f64::total_cmp);

    let mean = durations.iter().sum::<f64>() / durations.len() as f64;
    Some(DurationStats {
        mean_min: round2(mean),
        median_min: round2(percentile(&durations, 0.50)),
        p25_min: round2(percentile(&durations, 0.25)),
        p75_min: round2(percentile(&durations, 0.75)),
    })
}

/// Linear-interpolation percentile over a sorted slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
