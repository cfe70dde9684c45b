//! Persona classification: rule cascade and K-Means clustering

use crate::trip::{derive_time_features, PersonaLabel, Trip};
use linfa::prelude::*;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use tracing::{debug, warn};

/// Default number of clusters; matches the five named personas.
pub const DEFAULT_CLUSTERS: usize = 5;

/// Seed for the K-Means initialization, fixed for reproducible runs.
pub const KMEANS_SEED: u64 = 42;

const KMEANS_MAX_ITERATIONS: u64 = 300;
const KMEANS_TOLERANCE: f64 = 1e-4;

/// How a persona gets assigned to each trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Deterministic priority-ordered rule cascade.
    RuleBased,
    /// Standardize features, K-Means, fixed cluster-to-label mapping.
    /// Falls back to the rule cascade for the whole dataset if anything in
    /// the clustering pipeline fails.
    Clustering,
}

/// Fitted artifacts of one clustering run. Lives for a single `classify`
/// call; the scaler is fit on that call's dataset and must not be reused.
#[derive(Debug)]
pub struct PersonaProfile {
    pub scaler: StandardScaler,
    pub centroids: Array2<f64>,
    pub n_clusters: usize,
}

/// Assign a persona to every trip.
///
/// Returns a copy of the input with `persona` (and `cluster`, under the
/// clustering strategy) populated for every row. Time features are derived
/// from `start_time` unconditionally before either strategy runs.
///
/// Fails if the dataset is empty or carries no start times at all; once
/// validation passes, classification always succeeds (clustering failures
/// degrade to the rule cascade).
pub fn classify(trips: &[Trip], strategy: Strategy, n_clusters: usize) -> crate::Result<Vec<Trip>> {
    if trips.is_empty() {
        anyhow::bail!("cannot classify an empty dataset");
    }
    if trips.iter().all(|trip| trip.start_time.is_none()) {
        anyhow::bail!("dataset has no start_time values; cannot derive time features");
    }

    let mut classified = trips.to_vec();
    derive_time_features(&mut classified);

    match strategy {
        Strategy::RuleBased => apply_rules(&mut classified),
        Strategy::Clustering => match cluster_personas(&mut classified, n_clusters) {
            Ok(profile) => {
                debug!(
                    n_clusters = profile.n_clusters,
                    centroids = ?profile.centroids,
                    "clustering complete"
                );
            }
            Err(error) => {
                warn!(%error, "clustering failed, falling back to rule-based personas");
                for trip in classified.iter_mut() {
                    trip.cluster = None;
                }
                apply_rules(&mut classified);
            }
        },
    }

    Ok(classified)
}

fn apply_rules(trips: &mut [Trip]) {
    for trip in trips.iter_mut() {
        trip.persona = Some(rule_based_persona(
            trip.duration_minutes,
            trip.hour,
            trip.is_weekend,
            trip.is_weekday,
        ));
    }
}

struct Features {
    duration: f64,
    hour: u32,
    weekend: bool,
    weekday: bool,
}

/// Priority-ordered rule table, evaluated top to bottom, first match wins.
static RULES: [(fn(&Features) -> bool, PersonaLabel); 9] = [
    // Very long trips, any day
    (|f| f.duration > 90.0, PersonaLabel::TouristLongLeisure),
    // Weekend afternoon, moderate duration
    (
        |f| f.weekend && (30.0..=70.0).contains(&f.duration) && (12..=18).contains(&f.hour),
        PersonaLabel::WeekendExplorer,
    ),
    // Weekday afternoon, moderate-long duration
    (
        |f| f.weekday && (45.0..=80.0).contains(&f.duration) && (14..=19).contains(&f.hour),
        PersonaLabel::Fitness,
    ),
    // Short weekday evening rides
    (
        |f| f.weekday && f.duration < 30.0 && (16..=21).contains(&f.hour),
        PersonaLabel::EveningCommuter,
    ),
    // Short weekday morning rides
    (
        |f| f.weekday && f.duration < 30.0 && (6..=11).contains(&f.hour),
        PersonaLabel::MorningCommuter,
    ),
    // Weekend morning leisure
    (
        |f| f.weekend && (20.0..=60.0).contains(&f.duration) && (7..=12).contains(&f.hour),
        PersonaLabel::WeekendExplorer,
    ),
    // Late-night weekday rides
    (
        |f| f.weekday && f.duration < 35.0 && (f.hour >= 22 || f.hour <= 2),
        PersonaLabel::EveningCommuter,
    ),
    // Early-morning weekday workouts
    (
        |f| f.weekday && (30.0..=70.0).contains(&f.duration) && (5..=8).contains(&f.hour),
        PersonaLabel::Fitness,
    ),
    // Long weekend rides
    (
        |f| f.weekend && (60.0..=90.0).contains(&f.duration),
        PersonaLabel::TouristLongLeisure,
    ),
];

/// Evaluate the rule cascade for a single trip's features.
///
/// Trips whose duration or hour cannot be derived are terminal
/// `GeneralUser`s and skip the cascade entirely.
pub fn rule_based_persona(
    duration_minutes: Option<f64>,
    hour: Option<u32>,
    is_weekend: bool,
    is_weekday: bool,
) -> PersonaLabel {
    let (Some(duration), Some(hour)) = (duration_minutes, hour) else {
        return PersonaLabel::GeneralUser;
    };
    let features = Features {
        duration,
        hour,
        weekend: is_weekend,
        weekday: is_weekday,
    };

    for (matches, label) in &RULES {
        if matches(&features) {
            return *label;
        }
    }

    // Fallback by the most common pattern for the time of day
    if features.weekend {
        PersonaLabel::WeekendExplorer
    } else if features.hour < 12 {
        PersonaLabel::MorningCommuter
    } else if features.hour >= 16 {
        PersonaLabel::EveningCommuter
    } else {
        PersonaLabel::Fitness
    }
}

/// Fixed cluster-index-to-persona lookup. The indices assume the ordering
/// observed in the original cluster analysis and are not re-derived from
/// centroid characteristics at runtime.
pub fn persona_for_cluster(cluster: usize) -> PersonaLabel {
    match cluster {
        0 => PersonaLabel::EveningCommuter,
        1 => PersonaLabel::WeekendExplorer,
        2 => PersonaLabel::MorningCommuter,
        3 => PersonaLabel::TouristLongLeisure,
        4 => PersonaLabel::Fitness,
        other => PersonaLabel::Cluster(other),
    }
}

/// Per-column standardization to zero mean and unit variance.
///
/// Population standard deviation, with zero-variance columns left unscaled.
/// Always fit fresh on the dataset being classified.
#[derive(Debug)]
pub struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(features: &Array2<f64>) -> StandardScaler {
        let n_rows = features.nrows().max(1) as f64;
        let mut means = Vec::with_capacity(features.ncols());
        let mut stds = Vec::with_capacity(features.ncols());

        for column in features.columns() {
            let mean = column.sum() / n_rows;
            let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n_rows;
            let std = variance.sqrt();
            means.push(mean);
            stds.push(if std > 0.0 { std } else { 1.0 });
        }

        StandardScaler { means, stds }
    }

    pub fn transform(&self, features: &Array2<f64>) -> Array2<f64> {
        let mut scaled = features.clone();
        for (col_idx, mut column) in scaled.columns_mut().into_iter().enumerate() {
            let mean = self.means[col_idx];
            let std = self.stds[col_idx];
            column.mapv_inplace(|v| (v - mean) / std);
        }
        scaled
    }
}

/// Build the 4-feature matrix (duration, hour, is_weekend, is_weekday) with
/// missing values imputed by the column mean. Errors if an entire feature
/// column is absent from the dataset.
fn feature_matrix(trips: &[Trip]) -> crate::Result<Array2<f64>> {
    let durations: Vec<Option<f64>> = trips.iter().map(|t| t.duration_minutes).collect();
    let hours: Vec<Option<f64>> = trips.iter().map(|t| t.hour.map(f64::from)).collect();

    let durations = impute_mean(&durations)
        .ok_or_else(|| anyhow::anyhow!("no duration values available for clustering"))?;
    let hours =
        impute_mean(&hours).ok_or_else(|| anyhow::anyhow!("no hour values available for clustering"))?;

    let mut data = Vec::with_capacity(trips.len() * 4);
    for (idx, trip) in trips.iter().enumerate() {
        data.push(durations[idx]);
        data.push(hours[idx]);
        data.push(if trip.is_weekend { 1.0 } else { 0.0 });
        data.push(if trip.is_weekday { 1.0 } else { 0.0 });
    }

    Ok(Array2::from_shape_vec((trips.len(), 4), data)?)
}

/// Replace missing entries with the column mean; `None` when the column has
/// no values at all.
fn impute_mean(values: &[Option<f64>]) -> Option<Vec<f64>> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    let mean = present.iter().sum::<f64>() / present.len() as f64;
    Some(values.iter().map(|v| v.unwrap_or(mean)).collect())
}

fn cluster_personas(trips: &mut [Trip], n_clusters: usize) -> crate::Result<PersonaProfile> {
    if n_clusters == 0 {
        anyhow::bail!("number of clusters must be at least 1");
    }
    if trips.len() < n_clusters {
        anyhow::bail!(
            "number of trips ({}) must be at least the number of clusters ({})",
            trips.len(),
            n_clusters
        );
    }

    let raw_features = feature_matrix(trips)?;
    let scaler = StandardScaler::fit(&raw_features);
    let scaled = scaler.transform(&raw_features);

    let targets: Array1<usize> = Array1::zeros(trips.len());
    let dataset = Dataset::new(scaled.clone(), targets);

    let rng = SmallRng::seed_from_u64(KMEANS_SEED);
    let model = KMeans::params_with(n_clusters, rng, L2Dist)
        .max_n_iterations(KMEANS_MAX_ITERATIONS)
        .tolerance(KMEANS_TOLERANCE)
        .fit(&dataset)?;

    let labels = model.predict(&scaled);
    for (trip, &cluster) in trips.iter_mut().zip(labels.iter()) {
        trip.cluster = Some(cluster);
        trip.persona = Some(persona_for_cluster(cluster));
    }

    Ok(PersonaProfile {
        scaler,
        centroids: model.centroids().clone(),
        n_clusters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn trip_at(id: i64, y: i32, m: u32, d: u32, h: u32, duration: f64) -> Trip {
        let start = NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 15, 0)
            .unwrap();
        Trip::new(id, "Start", "End", Some(start), Some(duration))
    }

    #[test]
    fn test_rule_priority_long_trip_wins() {
        // Matches both the long-trip rule and (duration aside) commuter hours;
        // the long-trip rule is first and must win.
        let label = rule_based_persona(Some(95.0), Some(17), false, true);
        assert_eq!(label, PersonaLabel::TouristLongLeisure);
    }

    #[test]
    fn test_rule_cascade_scenarios() {
        // Weekday short morning ride
        assert_eq!(
            rule_based_persona(Some(10.0), Some(8), false, true),
            PersonaLabel::MorningCommuter
        );
        // Long midday trip
        assert_eq!(
            rule_based_persona(Some(95.0), Some(13), false, true),
            PersonaLabel::TouristLongLeisure
        );
        // Weekday 50 min at 16:00 hits the afternoon-workout rule before the
        // evening-commute rule can be considered
        assert_eq!(
            rule_based_persona(Some(50.0), Some(16), false, true),
            PersonaLabel::Fitness
        );
        // Short weekday ride at 16:00 is an evening commute
        assert_eq!(
            rule_based_persona(Some(25.0), Some(16), false, true),
            PersonaLabel::EveningCommuter
        );
        // Weekend afternoon moderate ride
        assert_eq!(
            rule_based_persona(Some(45.0), Some(14), true, false),
            PersonaLabel::WeekendExplorer
        );
        // Late night short weekday ride
        assert_eq!(
            rule_based_persona(Some(20.0), Some(23), false, true),
            PersonaLabel::EveningCommuter
        );
        // Early weekday workout
        assert_eq!(
            rule_based_persona(Some(55.0), Some(6), false, true),
            PersonaLabel::Fitness
        );
        // Long weekend ride under the tourist threshold
        assert_eq!(
            rule_based_persona(Some(75.0), Some(10), true, false),
            PersonaLabel::TouristLongLeisure
        );
    }

    #[test]
    fn test_rule_fallbacks() {
        // No rule matches: weekend default
        assert_eq!(
            rule_based_persona(Some(10.0), Some(3), true, false),
            PersonaLabel::WeekendExplorer
        );
        // No rule matches: weekday morning default
        assert_eq!(
            rule_based_persona(Some(80.0), Some(9), false, true),
            PersonaLabel::MorningCommuter
        );
        // No rule matches: weekday evening default
        assert_eq!(
            rule_based_persona(Some(40.0), Some(20), false, true),
            PersonaLabel::EveningCommuter
        );
        // No rule matches: weekday midday default
        assert_eq!(
            rule_based_persona(Some(40.0), Some(13), false, true),
            PersonaLabel::Fitness
        );
    }

    #[test]
    fn test_missing_features_mean_general_user() {
        assert_eq!(
            rule_based_persona(None, Some(8), false, true),
            PersonaLabel::GeneralUser
        );
        assert_eq!(
            rule_based_persona(Some(20.0), None, false, true),
            PersonaLabel::GeneralUser
        );
    }

    #[test]
    fn test_classify_rejects_empty_dataset() {
        assert!(classify(&[], Strategy::RuleBased, DEFAULT_CLUSTERS).is_err());
    }

    #[test]
    fn test_classify_rejects_dataset_without_start_times() {
        let trips = vec![Trip::new(1, "A", "B", None, Some(10.0))];
        assert!(classify(&trips, Strategy::RuleBased, DEFAULT_CLUSTERS).is_err());
    }

    #[test]
    fn test_classify_rule_based_labels_every_trip() {
        let trips = vec![
            trip_at(1, 2022, 6, 1, 8, 10.0),
            trip_at(2, 2022, 6, 1, 13, 95.0),
            trip_at(3, 2022, 6, 4, 14, 45.0),
            Trip::new(4, "A", "B", Some(trip_at(0, 2022, 6, 2, 9, 0.0).start_time.unwrap()), None),
        ];
        let classified = classify(&trips, Strategy::RuleBased, DEFAULT_CLUSTERS).unwrap();

        assert_eq!(classified.len(), trips.len());
        for trip in &classified {
            let persona = trip.persona.expect("persona must be assigned");
            assert!(PersonaLabel::NAMED.contains(&persona));
        }
        // Missing duration is a terminal General User
        assert_eq!(classified[3].persona, Some(PersonaLabel::GeneralUser));
    }

    #[test]
    fn test_classify_does_not_mutate_input() {
        let trips = vec![trip_at(1, 2022, 6, 1, 8, 10.0)];
        let _ = classify(&trips, Strategy::RuleBased, DEFAULT_CLUSTERS).unwrap();
        assert!(trips[0].persona.is_none());
    }

    #[test]
    fn test_clustering_assigns_mapped_labels() {
        let mut trips = Vec::new();
        for week in 0..3 {
            let day = 6 + week * 7; // Mondays in June 2022
            trips.push(trip_at(trips.len() as i64, 2022, 6, day, 8, 12.0));
            trips.push(trip_at(trips.len() as i64, 2022, 6, day, 18, 15.0));
            trips.push(trip_at(trips.len() as i64, 2022, 6, day, 15, 60.0));
            trips.push(trip_at(trips.len() as i64, 2022, 6, day, 12, 150.0));
            trips.push(trip_at(trips.len() as i64, 2022, 6, day + 5, 14, 45.0));
        }

        let classified = classify(&trips, Strategy::Clustering, DEFAULT_CLUSTERS).unwrap();
        for trip in &classified {
            let cluster = trip.cluster.expect("cluster must be assigned");
            assert!(cluster < DEFAULT_CLUSTERS);
            assert_eq!(trip.persona, Some(persona_for_cluster(cluster)));
            // With k = 5 every label comes from the fixed table
            assert!(PersonaLabel::NAMED.contains(&trip.persona.unwrap()));
        }
    }

    #[test]
    fn test_clustering_is_reproducible() {
        let trips: Vec<Trip> = (0..30)
            .map(|i| trip_at(i, 2022, 6, 1 + (i as u32 % 28), (i as u32 * 3) % 24, 5.0 + i as f64 * 4.0))
            .collect();

        let first = classify(&trips, Strategy::Clustering, DEFAULT_CLUSTERS).unwrap();
        let second = classify(&trips, Strategy::Clustering, DEFAULT_CLUSTERS).unwrap();
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.cluster, b.cluster);
            assert_eq!(a.persona, b.persona);
        }
    }

    #[test]
    fn test_clustering_falls_back_to_rules_without_durations() {
        // No trip carries any duration source: clustering cannot run and the
        // whole dataset degrades to the rule cascade.
        let mut trips: Vec<Trip> = (0..10)
            .map(|i| trip_at(i, 2022, 6, 1 + i as u32, 8, 0.0))
            .collect();
        for trip in trips.iter_mut() {
            trip.duration_minutes = None;
        }

        let classified = classify(&trips, Strategy::Clustering, DEFAULT_CLUSTERS).unwrap();
        for trip in &classified {
            assert_eq!(trip.cluster, None);
            assert_eq!(trip.persona, Some(PersonaLabel::GeneralUser));
        }
    }

    #[test]
    fn test_clustering_falls_back_when_too_few_trips() {
        let trips = vec![trip_at(1, 2022, 6, 1, 8, 10.0), trip_at(2, 2022, 6, 1, 18, 20.0)];
        let classified = classify(&trips, Strategy::Clustering, DEFAULT_CLUSTERS).unwrap();
        for trip in &classified {
            assert!(trip.cluster.is_none());
            assert!(trip.persona.is_some());
        }
    }

    #[test]
    fn test_extra_clusters_get_placeholder_labels() {
        assert_eq!(persona_for_cluster(4), PersonaLabel::Fitness);
        assert_eq!(persona_for_cluster(6), PersonaLabel::Cluster(6));
        assert_eq!(persona_for_cluster(6).to_string(), "Cluster_6");
    }

    #[test]
    fn test_scaler_standardizes_columns() {
        let features =
            Array2::from_shape_vec((4, 2), vec![1.0, 10.0, 2.0, 10.0, 3.0, 10.0, 4.0, 10.0])
                .unwrap();
        let scaler = StandardScaler::fit(&features);
        let scaled = scaler.transform(&features);

        let mean: f64 = scaled.column(0).sum() / 4.0;
        assert!(mean.abs() < 1e-9);
        let variance: f64 = scaled.column(0).iter().map(|v| v * v).sum::<f64>() / 4.0;
        assert!((variance - 1.0).abs() < 1e-9);
        // Constant column stays untouched instead of dividing by zero
        assert!(scaled.column(1).iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn test_impute_mean() {
        let values = vec![Some(2.0), None, Some(4.0)];
        assert_eq!(impute_mean(&values), Some(vec![2.0, 3.0, 4.0]));
        assert_eq!(impute_mean(&[None, None]), None);
    }
}
