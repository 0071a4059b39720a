use std::path::PathBuf;

use clap::Parser;
use roadwatch::providers::demo::{DemoDirections, DemoGeocoder, DemoPoiLookup, DemoWeather};
use roadwatch::trip::{TripPlanner, TripProviders};
use shared::{Coordinate, HosStopKind, PlanTripRequest};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Plan an HOS-compliant trip offline with the demo providers"
)]
struct Args {
    #[arg(long, allow_hyphen_values = true)]
    origin_lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    origin_lon: f64,
    #[arg(long, allow_hyphen_values = true)]
    dest_lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    dest_lon: f64,

    /// Departure time, RFC 3339 or YYYY-MM-DDTHH:MM (UTC)
    #[arg(long)]
    depart: String,

    /// Average driving speed in mph
    #[arg(long, default_value_t = shared::default_avg_speed_mph())]
    speed: f64,

    /// Driving hours left in the current shift
    #[arg(long)]
    hours_available: Option<f64>,

    /// Write the planned trip JSON here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let request = PlanTripRequest {
        origin: Coordinate::new(args.origin_lat, args.origin_lon),
        destination: Coordinate::new(args.dest_lat, args.dest_lon),
        origin_label: None,
        destination_label: None,
        depart_at: args.depart,
        avg_speed_mph: args.speed,
        drive_hours_available: args.hours_available,
    };

    let providers = TripProviders {
        directions: &DemoDirections,
        pois: &DemoPoiLookup,
        geocoder: &DemoGeocoder,
        weather: &DemoWeather,
    };
    let trip = TripPlanner::default()
        .plan(&request, providers, &CancellationToken::new())
        .await?;

    tracing::info!(
        "{:.0} mi, {} breaks, {} resets, arriving {}",
        trip.summary.miles,
        trip.plan.count(HosStopKind::Break),
        trip.plan.count(HosStopKind::OffDutyReset),
        trip.plan.arrival
    );

    let json = serde_json::to_string_pretty(&trip)?;
    match args.output {
        Some(path) => {
            std::fs::write(&path, json)?;
            tracing::info!("wrote planned trip to {:?}", path);
        }
        None => println!("{json}"),
    }
    Ok(())
}
