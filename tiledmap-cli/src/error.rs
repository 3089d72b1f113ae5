//! CLI error handling with user-friendly messages.
//!
//! Every command returns `Result<(), CliError>`; `main` prints the error and
//! exits with code 1.

use std::fmt;
use std::process;

use tiledmap::config::ConfigFileError;
use tiledmap::database::DatasetError;
use tiledmap::error::ServiceError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(std::io::Error),
    /// Configuration error
    Config(String),
    /// Failed to read the configuration file
    ConfigFile(ConfigFileError),
    /// Failed to load the dataset
    Dataset(DatasetError),
    /// Failed to create the map service
    ServiceCreation(ServiceError),
    /// Some tile data could not be loaded
    LoadIncomplete { tiles: usize, incomplete: usize },
}

impl CliError {
    /// Exit the process with an error message and code 1.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::LoadIncomplete { .. } = self {
            eprintln!();
            eprintln!("Run with RUST_LOG=tiledmap=debug for details on failed categories.");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Dataset(e) => write!(f, "Failed to load dataset: {}", e),
            CliError::ServiceCreation(e) => write!(f, "Failed to create map service: {}", e),
            CliError::LoadIncomplete { tiles, incomplete } => write!(
                f,
                "Loading was incomplete: {} of {} tiles are missing data",
                incomplete, tiles
            ),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::LoggingInit(e) => Some(e),
            CliError::ConfigFile(e) => Some(e),
            CliError::Dataset(e) => Some(e),
            CliError::ServiceCreation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<DatasetError> for CliError {
    fn from(e: DatasetError) -> Self {
        CliError::Dataset(e)
    }
}

impl From<ServiceError> for CliError {
    fn from(e: ServiceError) -> Self {
        CliError::ServiceCreation(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = CliError::Config("bad bbox".to_string());
        assert_eq!(err.to_string(), "Configuration error: bad bbox");

        let err = CliError::LoadIncomplete {
            tiles: 4,
            incomplete: 1,
        };
        assert_eq!(
            err.to_string(),
            "Loading was incomplete: 1 of 4 tiles are missing data"
        );
    }

    #[test]
    fn test_source_is_exposed() {
        let err: CliError = DatasetError::EmptyGeometry(7).into();
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("object 7 has no geometry"));
    }
}
