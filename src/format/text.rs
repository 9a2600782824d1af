//! Human-readable text output formatter

use crate::error::Result;
use crate::feed::{FeedState, NearbyListing};
use crate::format::OutputFormatter;

/// Currency every price is listed in
const CURRENCY: &str = "ETB";

/// Text formatter - outputs a ranked list of nearby listings
pub struct TextFormatter;

impl OutputFormatter for TextFormatter {
    fn name(&self) -> &str {
        "text"
    }

    fn description(&self) -> &str {
        "Human-readable listing table"
    }

    fn format(&self, state: &FeedState) -> Result<String> {
        let mut output = String::new();

        output.push_str(&format!("Nearby listings [{}]", state.phase));
        if state.round > 1 {
            output.push_str(&format!(" (round {})", state.round));
        }
        output.push('\n');

        if let Some(location) = &state.location {
            output.push_str(&format!(
                "From: ({}) via {}\n",
                location.coordinate, location.source
            ));
        }
        if let Some(error) = &state.error {
            output.push_str(&format!("Error: {}\n", error));
        }
        output.push('\n');

        if state.listings.is_empty() {
            output.push_str("No listings nearby.\n");
            return Ok(output);
        }

        for (i, entry) in state.listings.iter().enumerate() {
            output.push_str(&format!("{:>3}. {}\n", i + 1, format_entry(entry)));
        }

        Ok(output)
    }
}

fn format_entry(entry: &NearbyListing) -> String {
    let listing = &entry.listing;
    let mut line = format!(
        "{:>7.2} km  {} [{}]",
        entry.distance_km, listing.title, listing.category
    );

    if let Some(price) = listing.price {
        line.push_str(&format!("  {} {}", format_price(price), CURRENCY));
        if let Some(period) = listing.price_period {
            line.push_str(&format!("/{}", period));
        }
    }

    line
}

/// Whole-number price with thousands separators, e.g. 18000 -> "18,000"
fn format_price(price: f64) -> String {
    let digits = format!("{:.0}", price.max(0.0));
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    grouped
}
