//! `tiledmap load` - load a viewport from a JSON dataset.
//!
//! Builds an in-memory database and style from the dataset, looks up the
//! tiles covering the bounding box, loads their data and prints per tile
//! completeness together with the merged object counts.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Args;
use tiledmap::config::MapServiceConfig;
use tiledmap::coord::{GeoBox, Magnification};
use tiledmap::database::Dataset;
use tiledmap::service::{AreaSearchParameter, MapData, MapService};
use tiledmap::style::StyleSheet;
use tiledmap::tile::{Category, TileRef};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::common::{load_config, parse_bbox, validate_level, validate_tile_count};
use crate::error::CliError;

/// Arguments of the `load` command.
#[derive(Debug, Args)]
pub struct LoadArgs {
    /// JSON dataset describing types, style and objects
    #[arg(long)]
    pub dataset: PathBuf,

    /// Magnification level (0-25)
    #[arg(long)]
    pub level: u32,

    /// Bounding box as minlat,minlon,maxlat,maxlon
    #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true)]
    pub bbox: GeoBox,

    /// Disable the low zoom optimization
    #[arg(long)]
    pub no_low_zoom: bool,

    /// Dispatch asynchronously and follow progress through tile callbacks
    #[arg(long = "async")]
    pub asynchronous: bool,

    /// Seconds to wait for an asynchronous load
    #[arg(long, default_value = "30")]
    pub timeout: u64,
}

pub fn run(args: &LoadArgs, config_path: Option<&Path>) -> Result<(), CliError> {
    let level = validate_level(args.level)?;
    let magnification = Magnification::from_level(level);
    validate_tile_count(magnification, &args.bbox)?;
    let mut config = MapServiceConfig::from(&load_config(config_path)?);
    if args.no_low_zoom {
        config = config.with_low_zoom_optimization(false);
    }

    let (database, style) = Dataset::load(&args.dataset)?.into_database()?;
    let service = MapService::new(Arc::new(database), &config)?;

    let cancellation = CancellationToken::new();
    let handler_token = cancellation.clone();
    ctrlc::set_handler(move || {
        eprintln!("Received interrupt, cancelling load...");
        handler_token.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let parameter = service.default_parameter().with_cancellation(cancellation.clone());
    let tiles = service.lookup_tiles(magnification, &args.bbox);
    info!(tiles = tiles.len(), %magnification, "Loading viewport");

    let started = Instant::now();
    let success = if args.asynchronous {
        load_async(&service, &parameter, &style, &tiles, Duration::from_secs(args.timeout))
    } else {
        service.load_missing_tile_data(&parameter, &style, &tiles)
    };
    let elapsed = started.elapsed();

    print_tiles(&tiles);

    let mut data = MapData::new();
    service.add_tile_data_to_map_data(&tiles, &mut data);
    println!();
    println!(
        "Map data: {} nodes, {} ways, {} areas, {} routes ({} ms)",
        data.nodes.len(),
        data.ways.len(),
        data.areas.len(),
        data.routes.len(),
        elapsed.as_millis()
    );
    println!(
        "Cache: {} of {} tiles",
        service.current_cache_size(),
        service.cache_size()
    );

    if cancellation.is_cancelled() {
        println!("Load was cancelled.");
    }

    let incomplete = tiles.iter().filter(|tile| !tile.is_complete()).count();
    if !success || incomplete > 0 {
        return Err(CliError::LoadIncomplete {
            tiles: tiles.len(),
            incomplete,
        });
    }

    Ok(())
}

/// Dispatches the load and waits for the tile callbacks to report every
/// tile complete.
fn load_async(
    service: &MapService,
    parameter: &AreaSearchParameter,
    style: &StyleSheet,
    tiles: &[TileRef],
    timeout: Duration,
) -> bool {
    let (sender, receiver) = mpsc::channel();
    let callback = service.register_tile_state_callback(move |tile: &TileRef| {
        let _ = sender.send(tile.id());
    });

    let mut success = service.load_missing_tile_data_async(parameter, style, tiles);
    let deadline = Instant::now() + timeout;

    while success && !tiles.iter().all(|tile| tile.is_complete()) {
        if parameter.is_aborted() {
            success = false;
            break;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            success = false;
            break;
        }
        if let Ok(id) = receiver.recv_timeout(remaining.min(Duration::from_millis(100))) {
            println!("  updated {}", id.display_text());
        }
    }

    service.deregister_tile_state_callback(callback);
    success
}

fn print_tiles(tiles: &[TileRef]) {
    println!();
    println!(
        "{:<16} {:>8} {:>6} {:>6} {:>6} {:>6} {:>6} {:>6}",
        "TILE", "COMPLETE", "NODE", "WAY", "WAY*", "AREA", "AREA*", "ROUTE"
    );
    for tile in tiles {
        let count = |category: Category| {
            let len = match category {
                Category::Node => tile.nodes().data_len(),
                Category::Way => tile.ways().data_len(),
                Category::OptimizedWay => tile.optimized_ways().data_len(),
                Category::Area => tile.areas().data_len(),
                Category::OptimizedArea => tile.optimized_areas().data_len(),
                Category::Route => tile.routes().data_len(),
            };
            if tile.is_category_complete(category) {
                len.to_string()
            } else {
                format!("{}?", len)
            }
        };
        println!(
            "{:<16} {:>8} {:>6} {:>6} {:>6} {:>6} {:>6} {:>6}",
            tile.id().display_text(),
            if tile.is_complete() { "yes" } else { "no" },
            count(Category::Node),
            count(Category::Way),
            count(Category::OptimizedWay),
            count(Category::Area),
            count(Category::OptimizedArea),
            count(Category::Route),
        );
    }
}
