//! `tiledmap config` - print the effective configuration.

use std::path::Path;

use super::common::{load_config, resolve_config_path};
use crate::error::CliError;

/// Print the configuration file path and its effective contents as INI.
pub fn run(config_path: Option<&Path>) -> Result<(), CliError> {
    let path = resolve_config_path(config_path);
    let config = load_config(Some(&path))?;

    if path.exists() {
        println!("; Loaded from {}", path.display());
    } else {
        println!("; {} not found, showing defaults", path.display());
    }
    println!();
    print!("{}", config.to_config_string());

    Ok(())
}
