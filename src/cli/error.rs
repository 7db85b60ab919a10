//! CLI error types

use crate::error::Hdf5JsonError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to read {0}: {1}")]
    FileReadError(PathBuf, String),

    #[error("Invalid configuration in {0}: {1}")]
    ConfigError(PathBuf, String),

    #[error(transparent)]
    Codec(#[from] Hdf5JsonError),
}
