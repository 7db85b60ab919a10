//! hdf5-json CLI - validate HDF5/JSON documents and round-trip them through the codec

use anyhow::Context;
use clap::{Parser, Subcommand};
use hdf5_json::cli::CliConfig;
use hdf5_json::cli::commands::{roundtrip, validate};
use hdf5_json::{IdentifierPolicy, ValidationMode, ValueMode};
use std::path::PathBuf;
use tracing::Level;

/// hdf5-json: lossless HDF5 <-> JSON codec
#[derive(Parser)]
#[command(name = "hdf5-json")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// TOML file with [encoder] and [validator] tables
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate documents against the HDF5/JSON schema
    Validate {
        /// Documents, or folders whose *.json files are validated
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,

        /// Report only the first violation of each document
        #[arg(long)]
        stop: bool,

        /// Skip the cross-reference checks
        #[arg(long)]
        schema_only: bool,
    },

    /// Decode a document into memory and print it encoded again
    Roundtrip {
        /// Document path, or - for stdin
        #[arg(value_name = "DOC")]
        input: String,

        /// Suppress dataset values
        #[arg(short = 'd', conflicts_with = "structure_only")]
        no_dataset_values: bool,

        /// Suppress dataset and attribute values
        #[arg(short = 'D')]
        structure_only: bool,

        /// Derive identifiers from object paths instead of keeping the input ones
        #[arg(long)]
        deterministic_ids: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .with_target(false)
        .init();

    let config = CliConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Validate {
            paths,
            stop,
            schema_only,
        } => {
            let mut validator = config.validator;
            if stop {
                validator = validator.with_mode(ValidationMode::StopOnFirst);
            }
            if schema_only {
                validator = validator.with_integrity(false);
            }
            let valid = validate::handle_validate(&paths, validator)?;
            if !valid {
                std::process::exit(1);
            }
        }
        Commands::Roundtrip {
            input,
            no_dataset_values,
            structure_only,
            deterministic_ids,
        } => {
            let mut encoder = config.encoder;
            if structure_only {
                encoder = encoder.with_value_mode(ValueMode::StructureOnly);
            } else if no_dataset_values {
                encoder = encoder.with_value_mode(ValueMode::AttributeValuesOnly);
            }
            if deterministic_ids {
                encoder = encoder
                    .with_identifier_policy(IdentifierPolicy::PathDerived)
                    .with_reuse_identifiers(false);
            }
            let output = roundtrip::handle_roundtrip(&input, encoder)
                .with_context(|| format!("round-tripping {}", input))?;
            println!("{}", output);
        }
    }
    Ok(())
}
