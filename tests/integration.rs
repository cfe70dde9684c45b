//! End-to-end tests for the persona pipeline

use std::io::Write;
use tempfile::NamedTempFile;
use trip_personas::{
    brand_recommendations, classify, clean_trips, compute_stats, demo_trips, load_trips_csv,
    PersonaFilter, PersonaLabel, StatsResult, Strategy, DEFAULT_CLUSTERS, NO_DATA_ERROR,
};

/// Create a test CSV file with a handful of trips over two stations
fn create_test_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "rental_id,start_station_name,end_station_name,start_date,duration,start_lat,start_lon,end_lat,end_lon"
    )
    .unwrap();

    // Weekday morning commutes (2022-06-01 is a Wednesday)
    for id in 0..3 {
        writeln!(
            file,
            "{},Hyde Park Corner,Waterloo Station,2022-06-01T08:{:02}:00,720,51.5027,-0.1527,51.5036,-0.1143",
            id, 10 + id
        )
        .unwrap();
    }
    // Weekend afternoon ride (2022-06-04 is a Saturday)
    writeln!(
        file,
        "10,Waterloo Station,Hyde Park Corner,2022-06-04T14:30:00,2700,51.5036,-0.1143,51.5027,-0.1527"
    )
    .unwrap();
    // Long midweek leisure trip
    writeln!(
        file,
        "11,Waterloo Station,Hyde Park Corner,2022-06-01T13:00:00,6600,51.5036,-0.1143,51.5027,-0.1527"
    )
    .unwrap();

    file
}

#[test]
fn test_csv_to_stats_pipeline() {
    let file = create_test_csv();
    let trips = load_trips_csv(file.path().to_str().unwrap()).unwrap();
    let trips = clean_trips(trips);
    assert_eq!(trips.len(), 5);

    let classified = classify(&trips, Strategy::RuleBased, DEFAULT_CLUSTERS).unwrap();
    for trip in &classified {
        assert!(trip.persona.is_some());
    }
    assert_eq!(classified[0].persona, Some(PersonaLabel::MorningCommuter));
    assert_eq!(classified[3].persona, Some(PersonaLabel::WeekendExplorer));
    assert_eq!(classified[4].persona, Some(PersonaLabel::TouristLongLeisure));

    let result = compute_stats(&classified, &PersonaFilter::parse("Morning Commuter"));
    let stats = result.stats().expect("stats for morning commuters");
    assert_eq!(stats.trip_count, 3);
    assert_eq!(stats.top_start_stations[0].name, "Hyde Park Corner");
    assert_eq!(stats.top_travel_corridors[0].route_name, "Hyde Park Corner → Waterloo Station");
    assert_eq!(stats.trips_by_hour[8], 3);
    assert_eq!(stats.trips_by_day_of_week[2], 3); // Wednesday
    assert!((stats.monthly_usage_percentages.iter().sum::<f64>() - 100.0).abs() < 1e-6);
}

#[test]
fn test_demo_pipeline_with_clustering() {
    let trips = clean_trips(demo_trips(500));
    let classified = classify(&trips, Strategy::Clustering, DEFAULT_CLUSTERS).unwrap();

    for trip in &classified {
        let persona = trip.persona.expect("every trip labeled");
        // With k = 5 every label comes from the fixed mapping table
        assert!(PersonaLabel::NAMED.contains(&persona));
    }

    // Stats for the full set plus one per assigned persona
    let all = compute_stats(&classified, &PersonaFilter::All);
    let stats = all.stats().unwrap();
    assert_eq!(stats.trip_count, classified.len());
    assert_eq!(stats.trips_by_hour.iter().sum::<usize>(), stats.trip_count);
    assert_eq!(
        stats.trips_by_day_of_week.iter().sum::<usize>(),
        stats.trip_count
    );
    assert!(stats.opportunity_stations.is_empty());
    assert!(stats.persona_stations_with_coords.is_empty());

    let personas: std::collections::HashSet<String> = classified
        .iter()
        .filter_map(|t| t.persona.map(|p| p.to_string()))
        .collect();
    for persona in personas {
        let result = compute_stats(&classified, &PersonaFilter::parse(&persona));
        let stats = result.stats().expect("stats for assigned persona");
        assert!(stats.trip_count > 0);
        assert!(!stats.persona_stations_with_coords.is_empty());
    }
}

#[test]
fn test_rule_based_and_clustering_agree_on_shape() {
    let trips = clean_trips(demo_trips(200));
    let rules = classify(&trips, Strategy::RuleBased, DEFAULT_CLUSTERS).unwrap();
    let clusters = classify(&trips, Strategy::Clustering, DEFAULT_CLUSTERS).unwrap();

    assert_eq!(rules.len(), clusters.len());
    for trip in &rules {
        assert!(trip.cluster.is_none());
    }
}

#[test]
fn test_unknown_persona_yields_no_data_sentinel() {
    let trips = clean_trips(demo_trips(100));
    let classified = classify(&trips, Strategy::RuleBased, DEFAULT_CLUSTERS).unwrap();

    let result = compute_stats(&classified, &PersonaFilter::parse("Astronaut"));
    assert_eq!(
        result,
        StatsResult::NoData {
            error: NO_DATA_ERROR.to_string()
        }
    );
}

#[test]
fn test_brand_lookup_follows_persona_distribution() {
    let trips = clean_trips(demo_trips(300));
    let classified = classify(&trips, Strategy::RuleBased, DEFAULT_CLUSTERS).unwrap();

    for trip in &classified {
        let persona = trip.persona.unwrap().to_string();
        let brands = brand_recommendations(&persona);
        if persona != "General User" {
            assert!(!brands.is_empty(), "no brands for {persona}");
        }
    }
    assert!(!brand_recommendations("ALL").is_empty());
}

#[test]
fn test_stats_bundle_serializes_to_json() {
    let trips = clean_trips(demo_trips(100));
    let classified = classify(&trips, Strategy::RuleBased, DEFAULT_CLUSTERS).unwrap();
    let result = compute_stats(&classified, &PersonaFilter::All);

    let json = serde_json::to_value(&result).unwrap();
    assert!(json.get("trip_count").is_some());
    assert_eq!(json["trips_by_hour"].as_array().unwrap().len(), 24);
    assert_eq!(
        json["monthly_usage_percentages"].as_array().unwrap().len(),
        12
    );
}
