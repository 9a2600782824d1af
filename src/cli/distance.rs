//! Distance command handler

use crate::coord::{distance_km, is_nearby, parse_location_string, Coordinates};
use crate::error::{Error, Result};
use clap::Args;

/// Distance command arguments
#[derive(Args)]
pub struct DistanceArgs {
    /// First point, "<lat>, <lng>"
    #[arg(allow_hyphen_values = true)]
    pub from: String,

    /// Second point, "<lat>, <lng>"
    #[arg(allow_hyphen_values = true)]
    pub to: String,

    /// Also report whether the points are within this many kilometers
    #[arg(long, short = 'r')]
    pub radius: Option<f64>,
}

/// Run the distance command
pub fn run(args: DistanceArgs) -> Result<()> {
    let from = parse_point(&args.from)?;
    let to = parse_point(&args.to)?;
    let distance = distance_km(from, to);

    println!("{:.3} km", distance);
    if let Some(radius) = args.radius {
        let verdict = if is_nearby(distance, radius) {
            "within"
        } else {
            "outside"
        };
        println!("{} {} km radius", verdict, radius);
    }

    Ok(())
}

fn parse_point(s: &str) -> Result<Coordinates> {
    parse_location_string(Some(s)).ok_or_else(|| {
        Error::InvalidCoordinates(format!("Expected \"<lat>, <lng>\", got \"{}\"", s))
    })
}
