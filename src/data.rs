//! Trip ingest: CSV loading, demo-data generation and cleaning

use crate::trip::Trip;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use tracing::info;

/// Seed for the synthetic demo dataset, matching the warehouse fallback.
const DEMO_SEED: u64 = 42;

/// Trips longer than six hours are treated as data errors and removed.
const MAX_TRIP_MINUTES: f64 = 360.0;

/// Load trips from a CSV file.
///
/// Required columns: `rental_id`, `start_station_name`, `end_station_name`,
/// `start_date`. Duration is taken from `duration_minutes`, falling back to
/// `duration` (seconds) and `duration_ms`. Coordinate columns and `end_date`
/// are optional; unparseable timestamps become `None` rather than failing
/// the load.
pub fn load_trips_csv(path: &str) -> crate::Result<Vec<Trip>> {
    let df = CsvReader::from_path(path)?.has_header(true).finish()?;
    trips_from_dataframe(&df)
}

fn trips_from_dataframe(df: &DataFrame) -> crate::Result<Vec<Trip>> {
    for required in [
        "rental_id",
        "start_station_name",
        "end_station_name",
        "start_date",
    ] {
        if !has_column(df, required) {
            anyhow::bail!("input data is missing required column '{required}'");
        }
    }

    let n_rows = df.height();
    let rental_ids = int_column(df, "rental_id")?;
    let start_names = str_column(df, "start_station_name")?;
    let end_names = str_column(df, "end_station_name")?;
    let start_dates = str_column(df, "start_date")?;
    let end_dates = if has_column(df, "end_date") {
        str_column(df, "end_date")?
    } else {
        vec![None; n_rows]
    };
    let durations = duration_column(df)?;
    let start_lat = opt_f64_column(df, "start_lat")?;
    let start_lon = opt_f64_column(df, "start_lon")?;
    let end_lat = opt_f64_column(df, "end_lat")?;
    let end_lon = opt_f64_column(df, "end_lon")?;

    let mut trips = Vec::with_capacity(n_rows);
    for row in 0..n_rows {
        let start_time = start_dates[row].as_deref().and_then(parse_timestamp);
        let end_time = end_dates[row]
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| match (start_time, durations[row]) {
                (Some(start), Some(minutes)) => {
                    Some(start + Duration::milliseconds((minutes * 60_000.0) as i64))
                }
                _ => None,
            });

        let mut trip = Trip::new(
            rental_ids[row].unwrap_or(row as i64),
            start_names[row].clone().unwrap_or_default(),
            end_names[row].clone().unwrap_or_default(),
            start_time,
            durations[row],
        );
        trip.end_time = end_time;
        trip.start_lat = start_lat[row];
        trip.start_lon = start_lon[row];
        trip.end_lat = end_lat[row];
        trip.end_lon = end_lon[row];
        trips.push(trip);
    }

    info!(rows = trips.len(), "loaded trips from CSV");
    Ok(trips)
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().contains(&name)
}

fn int_column(df: &DataFrame, name: &str) -> crate::Result<Vec<Option<i64>>> {
    Ok(df
        .column(name)?
        .cast(&DataType::Int64)?
        .i64()?
        .into_iter()
        .collect())
}

fn str_column(df: &DataFrame, name: &str) -> crate::Result<Vec<Option<String>>> {
    Ok(df
        .column(name)?
        .cast(&DataType::Utf8)?
        .utf8()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect())
}

fn opt_f64_column(df: &DataFrame, name: &str) -> crate::Result<Vec<Option<f64>>> {
    if !has_column(df, name) {
        return Ok(vec![None; df.height()]);
    }
    Ok(df
        .column(name)?
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .collect())
}

/// Duration in minutes from whichever source column the dataset carries.
fn duration_column(df: &DataFrame) -> crate::Result<Vec<Option<f64>>> {
    if has_column(df, "duration_minutes") {
        opt_f64_column(df, "duration_minutes")
    } else if has_column(df, "duration") {
        Ok(opt_f64_column(df, "duration")?
            .into_iter()
            .map(|secs| secs.map(|s| s / 60.0))
            .collect())
    } else if has_column(df, "duration_ms") {
        Ok(opt_f64_column(df, "duration_ms")?
            .into_iter()
            .map(|ms| ms.map(|m| m / 60_000.0))
            .collect())
    } else {
        Ok(vec![None; df.height()])
    }
}

/// Lenient timestamp parsing for the formats the warehouse exports use.
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim().trim_end_matches(" UTC");
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(parsed);
        }
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.naive_utc())
}

const DEMO_STATIONS: &[(&str, f64, f64)] = &[
    ("Great Tower Street, Monument", 51.5101, -0.0852),
    ("Grosvenor Road, Pimlico", 51.4882, -0.1448),
    ("Exhibition Road, Knightsbridge", 51.4997, -0.1744),
    ("British Museum, Bloomsbury", 51.5194, -0.1270),
    ("Hyde Park Corner, Hyde Park", 51.5027, -0.1527),
    ("Victoria & Albert Museum, South Kensington", 51.4966, -0.1722),
    ("London Bridge Station, Southwark", 51.5048, -0.0863),
    ("King's Cross Station, King's Cross", 51.5308, -0.1238),
    ("Canary Wharf Station, Canary Wharf", 51.5051, -0.0209),
    ("Waterloo Station, Waterloo", 51.5036, -0.1143),
];

/// Generate a seeded synthetic dataset over a fixed station list.
///
/// Trips are spread across a full year and mix commuter, weekend, fitness
/// and long-leisure patterns so every downstream metric has signal.
pub fn demo_trips(n_trips: usize) -> Vec<Trip> {
    let mut rng = StdRng::seed_from_u64(DEMO_SEED);
    let base_date = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();

    let mut trips = Vec::with_capacity(n_trips);
    for id in 0..n_trips {
        let date = base_date + Duration::days(rng.gen_range(0..365));
        let weekend = date.weekday().num_days_from_monday() >= 5;

        let (hour, duration): (u32, f64) = if weekend {
            match rng.gen_range(0..10) {
                0..=5 => (rng.gen_range(12..=18), rng.gen_range(30.0..70.0)),
                6..=8 => (rng.gen_range(7..=12), rng.gen_range(20.0..60.0)),
                _ => (rng.gen_range(10..=16), rng.gen_range(95.0..180.0)),
            }
        } else {
            match rng.gen_range(0..10) {
                0..=3 => (rng.gen_range(6..=10), rng.gen_range(5.0..28.0)),
                4..=7 => (rng.gen_range(16..=21), rng.gen_range(5.0..28.0)),
                8 => (rng.gen_range(14..=19), rng.gen_range(45.0..80.0)),
                _ => (rng.gen_range(10..=15), rng.gen_range(95.0..150.0)),
            }
        };

        let start_idx = rng.gen_range(0..DEMO_STATIONS.len());
        let mut end_idx = rng.gen_range(0..DEMO_STATIONS.len());
        if end_idx == start_idx {
            end_idx = (end_idx + 1) % DEMO_STATIONS.len();
        }
        let (start_name, start_lat, start_lon) = DEMO_STATIONS[start_idx];
        let (end_name, end_lat, end_lon) = DEMO_STATIONS[end_idx];

        let minute = rng.gen_range(0..60);
        let start_time = date
            .and_hms_opt(hour, minute, 0)
            .unwrap_or_else(|| date.and_time(chrono::NaiveTime::MIN));

        let mut trip = Trip::new(id as i64, start_name, end_name, Some(start_time), Some(duration));
        trip.end_time = Some(start_time + Duration::seconds((duration * 60.0) as i64));
        trip.start_lat = Some(start_lat);
        trip.start_lon = Some(start_lon);
        trip.end_lat = Some(end_lat);
        trip.end_lon = Some(end_lon);
        trips.push(trip);
    }

    info!(rows = trips.len(), "generated demo trips");
    trips
}

/// Basic hygiene before classification: drop duplicate rentals, rows with
/// missing coordinates (only when the dataset carries coordinates at all)
/// and implausibly long trips.
pub fn clean_trips(trips: Vec<Trip>) -> Vec<Trip> {
    let original = trips.len();

    let mut seen_ids = HashSet::new();
    let mut cleaned: Vec<Trip> = trips
        .into_iter()
        .filter(|trip| seen_ids.insert(trip.rental_id))
        .collect();

    if cleaned
        .iter()
        .any(|t| t.end_lat.is_some() && t.end_lon.is_some())
    {
        cleaned.retain(|t| t.end_lat.is_some() && t.end_lon.is_some());
    }
    if cleaned
        .iter()
        .any(|t| t.start_lat.is_some() && t.start_lon.is_some())
    {
        cleaned.retain(|t| t.start_lat.is_some() && t.start_lon.is_some());
    }

    cleaned.retain(|t| t.duration_minutes.map_or(true, |d| d <= MAX_TRIP_MINUTES));

    info!(
        original,
        kept = cleaned.len(),
        removed = original - cleaned.len(),
        "cleaned trips"
    );
    cleaned
}
