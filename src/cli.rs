//! Command-line interface definitions and argument parsing

use crate::classifier::Strategy;
use clap::{Parser, ValueEnum};

/// Bicycle-trip persona classification and marketing statistics
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input trips CSV file; omit to use the demo dataset
    #[arg(short, long)]
    pub input: Option<String>,

    /// Number of trips in the generated demo dataset
    #[arg(long, default_value_t = 10_000)]
    pub demo_size: usize,

    /// Persona assignment method
    #[arg(short, long, value_enum, default_value_t = Method::Clustering)]
    pub method: Method,

    /// Number of clusters for K-Means
    #[arg(short = 'k', long, default_value_t = 5)]
    pub clusters: usize,

    /// Persona to compute statistics for ("ALL" for the full dataset)
    #[arg(short, long, default_value = "ALL")]
    pub persona: String,

    /// Print the full statistics bundle as JSON instead of a summary
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    /// Deterministic rule cascade
    Rules,
    /// K-Means clustering with the fixed persona mapping
    Clustering,
}

impl Args {
    pub fn strategy(&self) -> Strategy {
        match self.method {
            Method::Rules => Strategy::RuleBased,
            Method::Clustering => Strategy::Clustering,
        }
    }
}
