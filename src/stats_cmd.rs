//! Stats command: steady state, simulated distribution and streak lengths.

use anyhow::{Context, Result, bail};
use tracing::{info, info_span, warn};

use nimbus_markov::forecast;

use crate::cli::StatsArgs;
use crate::convert;
use crate::workflow;

/// Simulate one trajectory alongside the steady-state solve and emit the
/// keyed statistics.
pub fn run(args: StatsArgs) -> Result<()> {
    let _cmd = info_span!("stats").entered();
    let mut config = workflow::load_config(&args.io)?;
    config.apply_forecast_overrides(&args.forecast);
    let request = convert::build_request(&config.simulation)?;
    let (session, _) = workflow::build_session(&config)?;

    let Some(matrix) = session.matrix() else {
        bail!("no transition matrix available");
    };
    let result = forecast(matrix, &request, session.config()).context("forecast failed")?;

    if !result.steady_state.is_converged() {
        warn!(
            source = ?result.steady_state.source(),
            residual = result.steady_state.residual(),
            "reporting a fallback steady state"
        );
    }
    info!(
        iterations = result.steady_state.iterations(),
        days = result.trajectory.len(),
        "statistics computed"
    );
    workflow::emit(&result.report.to_output(), config.io.output.as_deref())
}
