//! Static partner-brand recommendations per persona

/// Suggested partner brands for a persona, keyed by display name.
///
/// `"ALL"` returns a generic multi-segment list; unrecognized names return
/// an empty slice.
pub fn brand_recommendations(persona: &str) -> &'static [&'static str] {
    match persona {
        "ALL" => &[
            "Multi-segment brands",
            "Universal platforms",
            "Community-focused brands",
        ],
        "Morning Commuter" => &[
            "Starbucks",
            "Dunkin'",
            "Fitbit",
            "Apple Watch",
            "Nike",
            "Under Armour",
            "Transit apps",
            "Premium coffee brands",
            "Fitness trackers",
        ],
        "Evening Commuter" => &[
            "Uber Eats",
            "DoorDash",
            "Netflix",
            "Spotify",
            "Social media platforms",
            "Restaurant chains",
            "Entertainment apps",
        ],
        "Weekend Explorer" => &[
            "Instagram",
            "TikTok",
            "Airbnb",
            "Eventbrite",
            "Local breweries",
            "Adventure gear brands",
            "Tourist attractions",
            "Social platforms",
        ],
        "Fitness" => &[
            "Peloton",
            "MyFitnessPal",
            "Garmin",
            "Lululemon",
            "CrossFit",
            "Protein brands",
            "Gym chains",
            "Fitness apps",
        ],
        "Tourist/Long Leisure" => &[
            "TripAdvisor",
            "Booking.com",
            "Museums",
            "Cultural institutions",
            "Tourism boards",
            "Local experiences",
            "Travel brands",
        ],
        _ => &[],
    }
}
