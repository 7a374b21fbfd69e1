use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::BufReader;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

use parkwatch::api::{PayloadStyle, PredictionClient};
use parkwatch::config::{FileConfig, MIN_INTERVAL_SECS};
use parkwatch::domain::{Coordinate, ParkingSpot};
use parkwatch::feed::{FeedError, SpotFeed, SpotSource};
use parkwatch::location::{LocationHints, LocationResolver, PROMPT_TEXT, choose_location};
use parkwatch::map::geojson::write_snapshot;
use parkwatch::map::{IconSet, MapView, Scene, format_rate};
use parkwatch::session::{ConsoleSink, Session, StatusBoard};

/// Watch live parking availability around you
///
/// Examples:
///   # Poll around explicit coordinates every 30 seconds
///   parkwatch --lat 26.1445 --lon 91.7362
///
///   # Locate by city name, write a GeoJSON map snapshot on every refresh
///   parkwatch -c "Guwahati" -C "India" -o spots.geojson
///
///   # Single fetch against a local backend, sending coordinates
///   parkwatch --endpoint http://localhost:8000/predict --payload coordinates --cycles 1
///
///   # Use a config file
///   parkwatch --config my-settings.toml
#[derive(Parser, Debug)]
#[command(name = "parkwatch")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to config file (optional, auto-searches parkwatch.toml if not provided)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Latitude of your position (use with --lon)
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Longitude of your position (use with --lat)
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,

    /// City to locate you by (use with --country)
    #[arg(short = 'c', long, requires = "country")]
    city: Option<String>,

    /// Country of --city
    #[arg(short = 'C', long)]
    country: Option<String>,

    /// Prediction endpoint URL
    #[arg(long)]
    endpoint: Option<String>,

    /// Seconds between refreshes
    #[arg(short = 'i', long)]
    interval: Option<u64>,

    /// Stop after this many refreshes (runs until `q` is entered if omitted)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    cycles: Option<u64>,

    /// GeoJSON file rewritten after every successful refresh
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Request body layout sent to the endpoint
    #[arg(long)]
    payload: Option<PayloadStyle>,

    /// Value of the `city` key in the request body
    #[arg(long)]
    payload_city: Option<String>,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let total_start = Instant::now();

    let mut config = match args.config {
        Some(ref path) => FileConfig::from_path(path)?,
        None => FileConfig::load().unwrap_or_default(),
    };

    config.verbose |= args.verbose;
    init_tracing(config.verbose);

    if let Some(endpoint) = args.endpoint.clone() {
        config.endpoint = endpoint;
    }
    if let Some(interval) = args.interval {
        config.interval_secs = interval;
    }
    if let Some(style) = args.payload {
        config.payload.style = style;
    }
    if let Some(city) = args.payload_city.clone() {
        config.payload.city = city;
    }
    if args.output.is_some() {
        config.output = args.output.clone();
    }
    config.validate().context("Invalid configuration")?;

    if config.city.is_some() && config.country.is_none() {
        bail!("config `city` requires `country`");
    }
    let cli_hints = LocationHints {
        lat: args.lat,
        lon: args.lon,
        city: args.city.clone(),
        country: args.country.clone(),
    };
    let file_hints = LocationHints {
        lat: config.lat,
        lon: config.lon,
        city: config.city.clone(),
        country: config.country.clone(),
    };

    println!("parkwatch - Live Parking Availability");
    println!("=====================================");
    println!();

    if config.verbose {
        println!("Configuration:");
        println!("  Endpoint: {}", config.endpoint);
        println!("  Payload: {:?} (city = {})", config.payload.style, config.payload.city);
        println!("  Interval: {}s", config.interval_secs);
        println!("  Request timeout: {}s", config.request_timeout_secs);
        println!("  Fallback: {}", config.fallback);
        if let Some(ref out) = config.output {
            println!("  Output: {}", out.display());
        }
        println!();
    }

    let location_timeout = Duration::from_secs(config.location_timeout_secs);
    let choice = choose_location(&cli_hints, &file_hints);
    tracing::debug!(?choice, "location source selected");
    let source = choice.into_source(location_timeout);

    let board = StatusBoard::new(
        Some(Box::new(ConsoleSink::new("status"))),
        Some(Box::new(ConsoleSink::new("refresh"))),
    );

    let icons = IconSet {
        template: config.map.icon_template.clone(),
        shadow_url: config.map.shadow_url.clone(),
    };
    let currency = config.map.currency.clone();
    let output = config.output.clone();

    let view = MapView::new(Scene::new(config.map.width, config.map.height, config.map.max_zoom))
        .with_zoom(config.map.zoom)
        .with_padding(config.map.padding);

    let mut session = Session::new(view, board).on_redraw(Box::new(
        |view: &MapView<Scene>, spots: &[ParkingSpot], at: DateTime<Local>| {
            print_spots(spots, &currency);
            if let Some(ref path) = output {
                let stamp = at.format("%H:%M:%S").to_string();
                match write_snapshot(path, view.backend(), &icons, &currency, Some(&stamp)) {
                    Ok(()) => tracing::debug!(path = %path.display(), "snapshot written"),
                    Err(e) => tracing::error!("Failed to write snapshot: {:#}", e),
                }
            }
        },
    ));

    session.status_board().set_status(PROMPT_TEXT);
    let spinner = create_spinner("Resolving location...");
    let start = Instant::now();
    let resolution = LocationResolver::new(source)
        .with_fallback(config.fallback)
        // Geocoding spends 1s on rate limiting before its request
        .with_timeout(location_timeout + Duration::from_secs(1))
        .resolve();
    spinner.finish_with_message(format!(
        "Location: {} ({}) [{:.1}s]",
        resolution.coordinate,
        if resolution.succeeded { "resolved" } else { "fallback" },
        start.elapsed().as_secs_f32()
    ));

    session.open(&resolution);

    if let Some(ref path) = config.output {
        write_snapshot(path, session.view().backend(), &icons, &currency, None)
            .context("Output path is not writable")?;
    }

    let client = PredictionClient::new(
        config.endpoint.clone(),
        Duration::from_secs(config.request_timeout_secs),
    )?
    .with_payload(config.payload.style, config.payload.city.clone())
    .with_aliases(config.fields.clone());

    let feed_endpoint = client.endpoint().to_string();
    let mut feed = SpotFeed::new(Spinning(client));
    if let Some(cycles) = args.cycles {
        feed = feed.with_max_cycles(cycles);
    }

    // Detached: the reader may still be blocked on stdin when polling ends
    let _ = feed
        .stopper()
        .stop_on_command(BufReader::new(std::io::stdin()), "q");
    if args.cycles.is_none() {
        println!("Enter q to stop.");
    }

    let interval = Duration::from_secs(config.interval_secs.max(MIN_INTERVAL_SECS));
    tracing::info!(
        endpoint = %feed_endpoint,
        interval_secs = interval.as_secs(),
        "polling started"
    );
    let cycles = feed.start(resolution.coordinate, interval, |outcome| session.apply(outcome));

    let last = session.last_refresh();
    session.close();

    println!();
    println!(
        "Done! {} refresh(es) in {:.1}s",
        cycles,
        total_start.elapsed().as_secs_f32()
    );
    if let Some(at) = last {
        println!("Last successful refresh: {}", at.format("%H:%M:%S"));
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "parkwatch=debug" } else { "parkwatch=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Shows a spinner while each fetch is in flight
struct Spinning<S>(S);

impl<S: SpotSource> SpotSource for Spinning<S> {
    fn fetch(&self, center: Coordinate) -> Result<Vec<ParkingSpot>, FeedError> {
        let spinner = create_spinner("Fetching parking predictions...");
        let result = self.0.fetch(center);
        spinner.finish_and_clear();
        result
    }
}

fn print_spots(spots: &[ParkingSpot], currency: &str) {
    let mut sorted: Vec<&ParkingSpot> = spots.iter().collect();
    sorted.sort_by(|a, b| {
        a.distance_km
            .unwrap_or(f64::MAX)
            .total_cmp(&b.distance_km.unwrap_or(f64::MAX))
    });

    println!();
    println!(
        "{:<32} {:>9} {:>10} {:>9}  {}",
        "Spot", "Available", "Rate/hr", "Distance", "Status"
    );
    for spot in sorted {
        let distance = spot
            .distance_km
            .map(|d| format!("{:.1} km", d))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<32} {:>9} {:>10} {:>9}  {} ({})",
            truncate(&spot.name, 32),
            spot.available,
            format!("{}{}", currency, format_rate(spot.hourly_rate)),
            distance,
            spot.status_label(),
            spot.availability().label()
        );
    }
    println!();
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max - 1).collect();
        out.push('…');
        out
    }
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}
