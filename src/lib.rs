//! trip-personas: persona classification and marketing statistics for
//! bicycle-rental trips
//!
//! The core takes an in-memory tabular set of trips, assigns each trip a
//! behavioral persona (rule cascade or K-Means clustering with a fixed
//! cluster-to-label mapping) and aggregates per-persona marketing
//! statistics: top stations, travel corridors, opportunity stations and
//! time/duration distributions.

pub mod brands;
pub mod classifier;
pub mod cli;
pub mod data;
pub mod stats;
pub mod trip;

// Re-export public items for easier access
pub use brands::brand_recommendations;
pub use classifier::{classify, rule_based_persona, Strategy, DEFAULT_CLUSTERS};
pub use cli::Args;
pub use data::{clean_trips, demo_trips, load_trips_csv};
pub use stats::{compute_stats, MarketingStats, StatsResult, NO_DATA_ERROR};
pub use trip::{derive_time_features, PersonaFilter, PersonaLabel, Trip};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
