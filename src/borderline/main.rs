use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use territory::output::{hulls_to_feature_collection, regions_to_feature_collection};
use territory::{ClaimStore, EngineConfig, LatLng, QueryConfig, TerritoryEngine, ViewRange};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// RON file overriding engine defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Write exclusive claim regions as GeoJSON
    Partition {
        #[arg(long)]
        claims: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Write beacon hulls as GeoJSON
    Hulls {
        #[arg(long)]
        claims: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List every claim and hull containing a point
    Query {
        #[arg(long)]
        claims: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        #[arg(long)]
        no_hulls: bool,
        /// Viewer position as "lat,lng"; requires --view-range-km
        #[arg(long, requires = "view_range_km")]
        viewer: Option<String>,
        #[arg(long)]
        view_range_km: Option<f64>,
    },
}

fn load_claims(path: &Path, config: &EngineConfig) -> Result<ClaimStore> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read claims from {}", path.display()))?;
    let store = ClaimStore::from_json(&json, config)
        .with_context(|| format!("Failed to decode claims in {}", path.display()))?;
    if !store.rejected().is_empty() {
        warn!(
            rejected = store.rejected().len(),
            "some claims were excluded"
        );
    }
    info!(claims = store.len(), "loaded claims");
    Ok(store)
}

fn write_output(output: Option<&Path>, body: &str) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, body)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            println!("{body}");
            Ok(())
        }
    }
}

fn parse_viewer(viewer: &str) -> Result<LatLng> {
    let (lat, lng) = viewer
        .split_once(',')
        .context("viewer must be formatted as lat,lng")?;
    Ok(LatLng::new(
        lat.trim().parse().context("viewer latitude")?,
        lng.trim().parse().context("viewer longitude")?,
    ))
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = match &args.config {
        Some(path) => EngineConfig::from_ron_file(path)?,
        None => EngineConfig::default(),
    };
    let engine = TerritoryEngine::new(config);

    match args.command {
        Commands::Partition { claims, output } => {
            let store = load_claims(&claims, engine.config())?;
            let regions = engine.partition(&store);
            let collection = regions_to_feature_collection(&regions);
            write_output(
                output.as_deref(),
                &serde_json::to_string_pretty(&collection)?,
            )?;
        }
        Commands::Hulls { claims, output } => {
            let store = load_claims(&claims, engine.config())?;
            let hulls = engine.hulls(&store);
            let collection = hulls_to_feature_collection(&hulls);
            write_output(
                output.as_deref(),
                &serde_json::to_string_pretty(&collection)?,
            )?;
        }
        Commands::Query {
            claims,
            lat,
            lng,
            no_hulls,
            viewer,
            view_range_km,
        } => {
            let store = load_claims(&claims, engine.config())?;
            let hulls = if no_hulls {
                Vec::new()
            } else {
                engine.hulls(&store)
            };
            let view_range = match (viewer, view_range_km) {
                (Some(viewer), Some(radius_km)) => Some(ViewRange {
                    origin: parse_viewer(&viewer)?,
                    radius_km,
                }),
                _ => None,
            };
            let service = engine.query_service(
                &store,
                &hulls,
                QueryConfig {
                    include_hulls: !no_hulls,
                    view_range,
                },
            );

            let result = service.query(LatLng::new(lat, lng));
            if result.has_conflict() {
                warn!(
                    matches = result.matches.len(),
                    owners = result.owners().len(),
                    "point is claimed more than once"
                );
            }
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
