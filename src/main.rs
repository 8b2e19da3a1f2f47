use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use maprouter::model::processor::load_osm_file;
use maprouter::raster::MAX_DEPTH;
use maprouter::{MapError, PathFinder, RasterConfig, RasterRequest, Rasterer, RouteConfig, VertexId};

#[derive(Parser)]
#[command(author, version, about = "Tile selection and routing over OpenStreetMap roads", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select the grid of tiles covering a bounding box
    Raster {
        /// Upper-left longitude of the query box
        #[arg(long, allow_negative_numbers = true)]
        ullon: f64,

        /// Upper-left latitude of the query box
        #[arg(long, allow_negative_numbers = true)]
        ullat: f64,

        /// Lower-right longitude of the query box
        #[arg(long, allow_negative_numbers = true)]
        lrlon: f64,

        /// Lower-right latitude of the query box
        #[arg(long, allow_negative_numbers = true)]
        lrlat: f64,

        /// Viewport width in pixels
        #[arg(short, long)]
        width: f64,

        /// Viewport height in pixels, defaults to the width
        #[arg(long)]
        height: Option<f64>,

        /// Prefix prepended to every tile file reference
        #[arg(long, default_value = "")]
        image_root: String,

        /// Tile image extension
        #[arg(long, default_value = "png")]
        extension: String,

        /// Depth of the smallest tiles
        #[arg(long, default_value_t = MAX_DEPTH)]
        max_depth: u32,
    },

    /// Find the shortest path between two points
    Route {
        /// Path to the input OSM PBF file
        #[arg(short, long)]
        input: PathBuf,

        #[arg(long, allow_negative_numbers = true)]
        start_lon: f64,

        #[arg(long, allow_negative_numbers = true)]
        start_lat: f64,

        #[arg(long, allow_negative_numbers = true)]
        end_lon: f64,

        #[arg(long, allow_negative_numbers = true)]
        end_lat: f64,

        /// Stop searching after this many vertex expansions
        #[arg(long)]
        max_expansions: Option<usize>,
    },

    /// Look up named locations
    Search {
        /// Path to the input OSM PBF file
        #[arg(short, long)]
        input: PathBuf,

        /// List names starting with this prefix
        #[arg(short, long, conflicts_with = "name")]
        prefix: Option<String>,

        /// List locations with exactly this name
        #[arg(short, long)]
        name: Option<String>,
    },
}

#[derive(Serialize)]
struct RouteOutput {
    found: bool,
    vertices: Vec<VertexId>,
    coordinates: Vec<[f64; 2]>,
    cost: Option<f64>,
    error: Option<String>,
}

fn main() -> Result<()> {
    // Initialize logger
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Raster { ullon, ullat, lrlon, lrlat, width, height, image_root, extension, max_depth } => {
            let config = RasterConfig {
                image_root,
                image_extension: extension,
                max_depth,
                ..Default::default()
            };
            let rasterer = Rasterer::new(config).context("Failed to build tile quadtree")?;

            let request = RasterRequest {
                ullon,
                ullat,
                lrlon,
                lrlat,
                width,
                height: height.unwrap_or(width),
            };
            let result = rasterer.rasterize(&request);
            print_json(&result)?;
        }

        Commands::Route { input, start_lon, start_lat, end_lon, end_lat, max_expansions } => {
            let graph = load_osm_file(&input)
                .with_context(|| format!("Failed to load graph from {}", input.display()))?;
            info!("Loaded graph with {} vertices", graph.len());

            let finder = PathFinder::with_config(&graph, RouteConfig { max_expansions });
            let output = match finder.shortest_path(start_lon, start_lat, end_lon, end_lat) {
                Ok(route) => {
                    let coordinates = route
                        .vertices
                        .iter()
                        .map(|&v| -> Result<[f64; 2], MapError> { Ok([graph.lon(v)?, graph.lat(v)?]) })
                        .collect::<Result<Vec<_>, MapError>>()?;
                    RouteOutput {
                        found: true,
                        cost: Some(route.cost),
                        vertices: route.vertices,
                        coordinates,
                        error: None,
                    }
                }
                Err(e @ (MapError::NoPathFound { .. } | MapError::SearchLimitExceeded(_))) => RouteOutput {
                    found: false,
                    vertices: Vec::new(),
                    coordinates: Vec::new(),
                    cost: None,
                    error: Some(e.to_string()),
                },
                Err(e) => return Err(e).context("Failed to route"),
            };
            print_json(&output)?;
        }

        Commands::Search { input, prefix, name } => {
            let graph = load_osm_file(&input)
                .with_context(|| format!("Failed to load graph from {}", input.display()))?;

            match (prefix, name) {
                (Some(prefix), _) => print_json(&graph.names_with_prefix(&prefix))?,
                (None, Some(name)) => print_json(&graph.locations(&name))?,
                (None, None) => bail!("Either --prefix or --name is required"),
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
