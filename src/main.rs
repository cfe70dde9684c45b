//! Pipeline entrypoint: load trips, assign personas, report marketing
//! statistics for the selected persona.

use anyhow::Result;
use clap::Parser;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use trip_personas::{
    brand_recommendations, classify, clean_trips, compute_stats, demo_trips, load_trips_csv,
    Args, PersonaFilter, StatsResult,
};

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let start_time = Instant::now();

    // Step 1: load trips
    let trips = match &args.input {
        Some(path) => {
            if args.verbose {
                println!("Loading trips from: {path}");
            }
            load_trips_csv(path)?
        }
        None => {
            if args.verbose {
                println!("No input file given, generating {} demo trips", args.demo_size);
            }
            demo_trips(args.demo_size)
        }
    };
    let trips = clean_trips(trips);
    println!("✓ Data ready: {} trips", trips.len());

    // Step 2: assign personas
    if args.verbose {
        println!("\nAssigning personas using {:?} (k = {})", args.method, args.clusters);
    }
    let classify_start = Instant::now();
    let classified = classify(&trips, args.strategy(), args.clusters)?;
    println!(
        "✓ Personas assigned in {:.2}s",
        classify_start.elapsed().as_secs_f64()
    );

    let mut persona_counts: BTreeMap<String, usize> = BTreeMap::new();
    for trip in &classified {
        if let Some(persona) = trip.persona {
            *persona_counts.entry(persona.to_string()).or_insert(0) += 1;
        }
    }
    println!("\n=== Persona Distribution ===");
    for (persona, count) in &persona_counts {
        let percentage = *count as f64 / classified.len() as f64 * 100.0;
        println!("{persona}: {count} trips ({percentage:.1}%)");
    }

    // Step 3: marketing statistics for the selected persona
    let filter = PersonaFilter::parse(&args.persona);
    let result = compute_stats(&classified, &filter);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    match &result {
        StatsResult::NoData { error } => println!("\n{error}"),
        StatsResult::Stats(stats) => {
            println!("\n=== Marketing Statistics: {filter} ===");
            println!("Trip count: {}", stats.trip_count);

            println!("\nTop start stations:");
            for station in &stats.top_start_stations {
                println!("  {} ({} trips)", station.name, station.count);
            }
            println!("\nTop travel corridors:");
            for corridor in &stats.top_travel_corridors {
                println!("  {} ({} trips)", corridor.route_name, corridor.count);
            }
            if !stats.opportunity_stations.is_empty() {
                println!("\nOpportunity stations:");
                for station in &stats.opportunity_stations {
                    println!(
                        "  {}: {:.1}% of trips, {:.2}x concentration ({} trips)",
                        station.station,
                        station.concentration_pct,
                        station.relative_concentration,
                        station.persona_trips
                    );
                }
            }
            if let Some(duration) = &stats.trip_duration {
                println!(
                    "\nDuration (min): mean {:.2}, median {:.2}, p25 {:.2}, p75 {:.2}",
                    duration.mean_min, duration.median_min, duration.p25_min, duration.p75_min
                );
            }

            let brands = brand_recommendations(&args.persona);
            if !brands.is_empty() {
                println!("\nSuggested partner brands:");
                for brand in brands {
                    println!("  {brand}");
                }
            }
        }
    }

    println!(
        "\nTotal processing time: {:.2}s",
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}
