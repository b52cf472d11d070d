//! uavo-map: run detection feeds, shelters and threat summaries through the
//! geo engine and print what the map would draw.

mod settings;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use uavo_geo::{
    analyze_incidents, haversine_km, project_events, rank_shelters_by_safety, resolve_order,
    score_shelters, AnalysisInput, ClusteredIncident, DetectionEvent, EvacuationOrder, GeoPoint,
    MotionHint, ProjectedTrajectory, Shelter, TrajectoryPoint, Viewport,
};
use uavo_telemetry::{timed_span, LogFormat};

use settings::Settings;

#[derive(Parser)]
#[command(name = "uavo-map")]
#[command(about = "Geospatial analysis for aerial-object sightings")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to uavo.toml, .uavo.toml or .config/uavo.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
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
    /// Project the future path of a detection track
    Project {
        /// JSON array of detection events, `-` for stdin
        input: PathBuf,
        /// Heading hint for a single fix, degrees
        #[arg(long, requires = "speed")]
        heading: Option<f64>,
        /// Speed hint for a single fix, km/h
        #[arg(long, requires = "heading")]
        speed: Option<f64>,
    },
    /// Cluster detections, fold in summaries and rank shelters
    Analyze {
        /// JSON object with `detections`, `summaries` and `shelters`, `-` for stdin
        input: PathBuf,
    },
    /// Rank shelters by mean distance to threats
    Rank {
        /// JSON array of shelters
        #[arg(long)]
        shelters: PathBuf,
        /// JSON array of threat positions `{lat, lng}`
        #[arg(long)]
        threats: PathBuf,
        /// Number of shelters to return (defaults to config)
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Visible tiles and marker screen positions for a viewport
    Viewport {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
        #[arg(long, default_value_t = 12)]
        zoom: u8,
        #[arg(long, default_value_t = 1280.0)]
        width: f64,
        #[arg(long, default_value_t = 720.0)]
        height: f64,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        pan_x: f64,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        pan_y: f64,
        /// JSON array of marker positions `{lat, lng}`
        #[arg(long)]
        markers: Option<PathBuf>,
    },
    /// Resolve an evacuation order into zone and route geometry
    Order {
        /// JSON evacuation order
        order: PathBuf,
        /// Analysis input the order refers to
        #[arg(long)]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    let mut telemetry = settings.telemetry.clone();
    if cli.verbose > 0 || cli.quiet {
        telemetry = telemetry.with_verbosity(cli.verbose, cli.quiet);
    }
    if cli.log_json {
        telemetry.format = LogFormat::Json;
    }
    uavo_telemetry::init_with_config(telemetry)?;

    if let Some(path) = &settings.path {
        tracing::info!(config = %path.display(), "Loaded configuration");
    }

    match cli.command {
        Commands::Distance { lat1, lng1, lat2, lng2 } => {
            let km = haversine_km(&GeoPoint::new(lat1, lng1), &GeoPoint::new(lat2, lng2));
            if cli.json {
                print_json(&serde_json::json!({ "distanceKm": km }))?;
            } else {
                println!("{:.3} km", km);
            }
        }

        Commands::Project { input, heading, speed } => {
            let events: Vec<DetectionEvent> = read_json(&input)?;
            let projection = {
                timed_span!("project", events = events.len());
                match (heading, speed) {
                    (Some(heading_deg), Some(speed_kmh)) => {
                        let track: Vec<TrajectoryPoint> = events
                            .iter()
                            .map(|e| TrajectoryPoint::observed(e.position, e.timestamp_utc))
                            .collect();
                        let hint = MotionHint { heading_deg, speed_kmh };
                        uavo_geo::project_trajectory(&track, Some(hint), &settings.engine.trajectory)
                    }
                    _ => project_events(&events, &settings.engine.trajectory),
                }
            };

            if cli.json {
                print_json(&projection)?;
            } else {
                print_projection(&projection);
            }
        }

        Commands::Analyze { input } => {
            let input: AnalysisInput = read_json(&input)?;
            let report = {
                timed_span!("analyze", detections = input.detections.len());
                analyze_incidents(&input, &settings.engine)
            };

            if cli.json {
                print_json(&report)?;
            } else {
                println!("{} incidents", report.incidents.len());
                for analysis in &report.incidents {
                    print_incident(&analysis.incident, analysis.nearest_shelter_id.as_deref());
                }
                if !report.safest_shelter_ids.is_empty() {
                    println!("\nSafest shelters: {}", report.safest_shelter_ids.join(", "));
                }
            }
        }

        Commands::Rank { shelters, threats, top_k } => {
            let shelters: Vec<Shelter> = read_json(&shelters)?;
            let threats: Vec<GeoPoint> = read_json(&threats)?;
            let top_k = top_k.unwrap_or(settings.engine.shelters.top_k);

            let ranked = rank_shelters_by_safety(&shelters, &threats, top_k);
            let scores = score_shelters(&shelters, &threats);
            let mean_of = |id: &str| {
                scores
                    .iter()
                    .find(|s| s.shelter.id == id)
                    .map(|s| s.mean_distance_km)
                    .unwrap_or(f64::NAN)
            };

            if cli.json {
                let rows: Vec<_> = ranked
                    .iter()
                    .map(|s| serde_json::json!({ "shelter": s, "meanDistanceKm": mean_of(&s.id) }))
                    .collect();
                print_json(&rows)?;
            } else {
                for (rank, shelter) in ranked.iter().enumerate() {
                    println!(
                        "{:>2}. {} ({}) {:.1} km",
                        rank + 1,
                        shelter.name,
                        shelter.id,
                        mean_of(&shelter.id)
                    );
                }
            }
        }

        Commands::Viewport { lat, lng, zoom, width, height, pan_x, pan_y, markers } => {
            let viewport = Viewport::new(GeoPoint::new(lat, lng), zoom, width, height).with_pan(pan_x, pan_y);
            if !viewport.is_valid() {
                bail!("Invalid viewport: center ({}, {}), size {}x{}", lat, lng, width, height);
            }
            let tiles = viewport.visible_tiles();
            let markers: Vec<GeoPoint> = match markers {
                Some(path) => read_json(&path)?,
                None => Vec::new(),
            };
            let positions: Vec<_> = markers
                .iter()
                .map(|m| viewport.marker_screen_position(m))
                .collect();

            if cli.json {
                print_json(&serde_json::json!({
                    "viewport": viewport,
                    "tiles": tiles,
                    "markers": positions,
                }))?;
            } else {
                println!("Zoom {} with {} visible tiles", viewport.zoom, tiles.len());
                for (marker, pos) in markers.iter().zip(&positions) {
                    println!("({:.5}, {:.5}) -> ({:.1}, {:.1})", marker.lat, marker.lng, pos.x, pos.y);
                }
            }
        }

        Commands::Order { order, input } => {
            let order: EvacuationOrder = read_json(&order)?;
            let input: AnalysisInput = read_json(&input)?;
            let report = analyze_incidents(&input, &settings.engine);
            let incidents: Vec<ClusteredIncident> =
                report.incidents.into_iter().map(|a| a.incident).collect();

            let Some(plan) = resolve_order(&order, &incidents, &input.shelters) else {
                bail!(
                    "Order {} does not resolve: incident {} or shelter {} unknown",
                    order.id,
                    order.incident_id,
                    order.target_shelter_id
                );
            };

            if cli.json {
                print_json(&plan)?;
            } else {
                println!(
                    "{} [{}] evacuate {:.1} km around incident to {} ({:.1} km)",
                    plan.order_id, plan.priority, plan.zone.radius_km, plan.shelter_name, plan.route_distance_km
                );
            }
        }
    }

    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read stdin")?;
        buffer
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?
    };
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_projection(projection: &ProjectedTrajectory) {
    println!(
        "Heading {:.1}°, speed {:.1} km/h",
        projection.projected_heading_deg, projection.estimated_speed_kmh
    );
    for point in &projection.trajectory {
        let marker = if point.is_projected { "projected" } else { "observed" };
        println!(
            "{} ({:.5}, {:.5}) {}",
            point.timestamp_utc.format("%H:%M:%S"),
            point.position.lat,
            point.position.lng,
            marker
        );
    }
}

fn print_incident(incident: &ClusteredIncident, nearest_shelter: Option<&str>) {
    println!(
        "{} [{}] {:?} at ({:.4}, {:.4}), {} signals, nearest shelter {}",
        incident.id,
        incident.risk_level,
        incident.pattern,
        incident.centroid.lat,
        incident.centroid.lng,
        incident.signal_count(),
        nearest_shelter.unwrap_or("-")
    );
}
