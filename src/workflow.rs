//! Steps shared by every subcommand: load config, ingest history, emit JSON.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use nimbus_markov::{ForecastSession, MatrixOutput, to_json};

use crate::cli::IoArgs;
use crate::config::NimbusConfig;
use crate::convert;

/// Loads the config file and applies `--input` / `--output`.
pub fn load_config(io: &IoArgs) -> Result<NimbusConfig> {
    let mut config = NimbusConfig::load(io.config.as_deref())?;
    config.apply_io_overrides(io);
    Ok(config)
}

/// Reads the historical payload and builds the session's transition matrix.
pub fn build_session(config: &NimbusConfig) -> Result<(ForecastSession, MatrixOutput)> {
    let input =
        config.io.input.as_ref().ok_or_else(|| {
            anyhow::anyhow!("no input path: set [io].input in config or use --input")
        })?;
    let classifier = convert::build_classifier(&config.classifier)?;
    let markov_cfg = convert::build_markov_config(config)?;

    info!(path = %input.display(), "reading weather history");
    let payload = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read payload: {}", input.display()))?;

    let mut session = ForecastSession::new(classifier, markov_cfg);
    let matrix = session
        .build_matrix_from_json(&payload)
        .with_context(|| format!("failed to build transition matrix from {}", input.display()))?;
    Ok((session, matrix))
}

/// Writes `value` as pretty JSON to `output`, or to stdout when unset.
pub fn emit<T: Serialize + ?Sized>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = to_json(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, json + "\n")
                .with_context(|| format!("failed to write output: {}", path.display()))?;
            info!(path = %path.display(), "output written");
        }
        None => println!("{json}"),
    }
    Ok(())
}
