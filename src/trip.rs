//! Trip record model and persona labels

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Serialize, Serializer};
use std::fmt;

/// Behavioral label assigned to a trip.
///
/// The fixed set covers the five clustered personas plus the rule-based
/// `GeneralUser` fallback. `Cluster(i)` only appears when clustering runs
/// with more than five clusters, in which case the extra indices have no
/// named persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersonaLabel {
    MorningCommuter,
    EveningCommuter,
    WeekendExplorer,
    Fitness,
    TouristLongLeisure,
    GeneralUser,
    Cluster(usize),
}

impl PersonaLabel {
    /// The six named personas a classified trip can carry.
    pub const NAMED: [PersonaLabel; 6] = [
        PersonaLabel::MorningCommuter,
        PersonaLabel::EveningCommuter,
        PersonaLabel::WeekendExplorer,
        PersonaLabel::Fitness,
        PersonaLabel::TouristLongLeisure,
        PersonaLabel::GeneralUser,
    ];

    /// Parse a display name back into a label.
    pub fn from_name(name: &str) -> Option<PersonaLabel> {
        match name {
            "Morning Commuter" => Some(PersonaLabel::MorningCommuter),
            "Evening Commuter" => Some(PersonaLabel::EveningCommuter),
            "Weekend Explorer" => Some(PersonaLabel::WeekendExplorer),
            "Fitness" => Some(PersonaLabel::Fitness),
            "Tourist/Long Leisure" => Some(PersonaLabel::TouristLongLeisure),
            "General User" => Some(PersonaLabel::GeneralUser),
            other => other
                .strip_prefix("Cluster_")
                .and_then(|idx| idx.parse().ok())
                .map(PersonaLabel::Cluster),
        }
    }
}

impl fmt::Display for PersonaLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersonaLabel::MorningCommuter => f.write_str("Morning Commuter"),
            PersonaLabel::EveningCommuter => f.write_str("Evening Commuter"),
            PersonaLabel::WeekendExplorer => f.write_str("Weekend Explorer"),
            PersonaLabel::Fitness => f.write_str("Fitness"),
            PersonaLabel::TouristLongLeisure => f.write_str("Tourist/Long Leisure"),
            PersonaLabel::GeneralUser => f.write_str("General User"),
            PersonaLabel::Cluster(idx) => write!(f, "Cluster_{idx}"),
        }
    }
}

impl Serialize for PersonaLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Persona selection for the statistics aggregator.
///
/// `"ALL"` keeps the full dataset; any other string filters to trips whose
/// persona display name matches it exactly. Unknown names are kept as-is and
/// simply match nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonaFilter {
    All,
    Persona(String),
}

impl PersonaFilter {
    pub fn parse(raw: &str) -> PersonaFilter {
        if raw == "ALL" {
            PersonaFilter::All
        } else {
            PersonaFilter::Persona(raw.to_string())
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, PersonaFilter::All)
    }

    pub fn matches(&self, trip: &Trip) -> bool {
        match self {
            PersonaFilter::All => true,
            PersonaFilter::Persona(name) => trip
                .persona
                .map(|persona| persona.to_string() == *name)
                .unwrap_or(false),
        }
    }
}

impl fmt::Display for PersonaFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersonaFilter::All => f.write_str("ALL"),
            PersonaFilter::Persona(name) => f.write_str(name),
        }
    }
}

/// One rental event.
///
/// `hour`, `is_weekend` and `is_weekday` are derived from `start_time` by
/// [`derive_time_features`]; `persona` and `cluster` are filled in by the
/// classifier. Coordinates are optional throughout and missing values only
/// reduce geo output, never fail a computation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Trip {
    pub rental_id: i64,
    pub start_station_name: String,
    pub end_station_name: String,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub duration_minutes: Option<f64>,
    pub start_lat: Option<f64>,
    pub start_lon: Option<f64>,
    pub end_lat: Option<f64>,
    pub end_lon: Option<f64>,
    pub hour: Option<u32>,
    pub is_weekend: bool,
    pub is_weekday: bool,
    pub persona: Option<PersonaLabel>,
    pub cluster: Option<usize>,
}

impl Trip {
    pub fn new(
        rental_id: i64,
        start_station_name: impl Into<String>,
        end_station_name: impl Into<String>,
        start_time: Option<NaiveDateTime>,
        duration_minutes: Option<f64>,
    ) -> Trip {
        Trip {
            rental_id,
            start_station_name: start_station_name.into(),
            end_station_name: end_station_name.into(),
            start_time,
            duration_minutes,
            ..Trip::default()
        }
    }
}

/// Populate `hour`, `is_weekend` and `is_weekday` from `start_time` for every
/// trip. Runs unconditionally so the classifier always sees a consistent
/// feature set; trips without a start time get `hour = None` and neither
/// weekday flag.
pub fn derive_time_features(trips: &mut [Trip]) {
    for trip in trips.iter_mut() {
        match trip.start_time {
            Some(start) => {
                trip.hour = Some(start.hour());
                let weekday_index = start.date().weekday().num_days_from_monday();
                trip.is_weekend = weekday_index >= 5;
                trip.is_weekday = weekday_index < 5;
            }
            None => {
                trip.hour = None;
                trip.is_weekend = false;
                trip.is_weekday = false;
            }
        }
    }
}
