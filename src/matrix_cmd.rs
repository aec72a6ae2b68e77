//! Matrix command: estimate the transition matrix from a weather history.

use anyhow::Result;
use tracing::{info, info_span};

use crate::cli::MatrixArgs;
use crate::workflow;

/// Build the matrix and emit it as `{ matrix, states, rows, cols }`.
pub fn run(args: MatrixArgs) -> Result<()> {
    let _cmd = info_span!("matrix").entered();
    let config = workflow::load_config(&args.io)?;
    let (_session, matrix) = workflow::build_session(&config)?;
    info!(states = ?matrix.states, "transition matrix estimated");
    workflow::emit(&matrix, config.io.output.as_deref())
}
