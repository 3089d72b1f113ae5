//! CLI command implementations.
//!
//! - [`tiles`] - List the tiles covering a bounding box
//! - [`load`] - Load a viewport from a JSON dataset
//! - [`config`] - Print the effective configuration

pub mod common;
pub mod config;
pub mod load;
pub mod tiles;
