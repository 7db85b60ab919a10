//! CLI module for the hdf5-json binary

pub mod commands;
pub mod config;
pub mod error;
pub mod output;

pub use config::CliConfig;
pub use error::CliError;
