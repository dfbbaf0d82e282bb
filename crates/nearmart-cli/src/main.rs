mod provider;
mod query;
mod surface;
mod watch;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "nearmart")]
#[command(about = "Nearby marketplace listings around a location")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Great-circle distance between two points
    Distance {
        #[arg(allow_negative_numbers = true)]
        lat1: f64,
        #[arg(allow_negative_numbers = true)]
        lng1: f64,
        #[arg(allow_negative_numbers = true)]
        lat2: f64,
        #[arg(allow_negative_numbers = true)]
        lng2: f64,
    },
    /// List active listings within the radius of a point, nearest first
    Nearby {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
        /// Search radius in km (defaults to NEARMART_RADIUS_KM)
        #[arg(long)]
        radius: Option<f64>,
    },
    /// Run the discovery loop and report every cycle
    Watch {
        /// Fixed device latitude; without it the device reports no location
        /// capability and the default location is used
        #[arg(long, allow_negative_numbers = true, requires = "lng")]
        lat: Option<f64>,
        #[arg(long, allow_negative_numbers = true, requires = "lat")]
        lng: Option<f64>,
        /// Stop after this many cycles instead of waiting for ctrl-c
        #[arg(long)]
        ticks: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = nearmart_core::load_engine_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Distance {
            lat1,
            lng1,
            lat2,
            lng2,
        } => {
            query::run_distance(lat1, lng1, lat2, lng2);
            Ok(())
        }
        Commands::Nearby { lat, lng, radius } => query::run_nearby(&config, lat, lng, radius),
        Commands::Watch { lat, lng, ticks } => watch::run_watch(config, lat.zip(lng), ticks).await,
    }
}
