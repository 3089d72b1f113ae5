//! `tiledmap tiles` - list the tiles covering a bounding box.

use clap::Args;
use tiledmap::coord::{tiles_covering, GeoBox, Magnification};

use super::common::{parse_bbox, validate_level, validate_tile_count};
use crate::error::CliError;

/// Arguments of the `tiles` command.
#[derive(Debug, Args)]
pub struct TilesArgs {
    /// Magnification level (0-25)
    #[arg(long)]
    pub level: u32,

    /// Bounding box as minlat,minlon,maxlat,maxlon
    #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true)]
    pub bbox: GeoBox,
}

pub fn run(args: &TilesArgs) -> Result<(), CliError> {
    let level = validate_level(args.level)?;
    let magnification = Magnification::from_level(level);
    validate_tile_count(magnification, &args.bbox)?;
    let tiles = tiles_covering(magnification, &args.bbox);

    println!("{} tiles at level {}:", tiles.len(), level);
    for id in &tiles {
        let bbox = id.bounding_box();
        println!(
            "  {:<16} lat {:>11.6} .. {:>11.6}  lon {:>11.6} .. {:>11.6}",
            id.display_text(),
            bbox.min.lat,
            bbox.max.lat,
            bbox.min.lon,
            bbox.max.lon
        );
    }

    Ok(())
}
