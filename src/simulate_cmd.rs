//! Simulate command: draw one trajectory, or a seeded ensemble.

use anyhow::{Context, Result, bail};
use tracing::{info, info_span};

use nimbus_markov::{SimulatedDay, Trajectory, simulate_ensemble};

use crate::cli::SimulateArgs;
use crate::convert;
use crate::workflow;

/// Run the simulation and emit the list of simulated days.
///
/// With `--members N > 1` the output is a list of N such lists; member `k`
/// is seeded with `seed + k`.
pub fn run(args: SimulateArgs) -> Result<()> {
    let _cmd = info_span!("simulate").entered();
    if args.members == 0 {
        bail!("--members must be at least 1");
    }

    let mut config = workflow::load_config(&args.io)?;
    config.apply_forecast_overrides(&args.forecast);
    let request = convert::build_request(&config.simulation)?;
    let (mut session, _) = workflow::build_session(&config)?;

    if args.members == 1 {
        let days = session
            .run_simulation(&request)
            .context("simulation failed")?;
        info!(days = days.len(), "trajectory simulated");
        return workflow::emit(&days, config.io.output.as_deref());
    }

    let Some(base) = request.seed else {
        bail!("ensemble simulation needs a seed: set [simulation].seed or use --seed");
    };
    let seeds: Vec<u64> = (0..args.members as u64)
        .map(|k| base.wrapping_add(k))
        .collect();
    let start_ms = request.resolved_start_ms();
    let Some(matrix) = session.matrix() else {
        bail!("no transition matrix available");
    };
    let members = simulate_ensemble(
        matrix,
        &request.initial_state,
        request.days,
        start_ms,
        session.config(),
        &seeds,
    )
    .context("ensemble simulation failed")?;
    info!(members = members.len(), days = request.days, "ensemble simulated");

    let out: Vec<Vec<SimulatedDay>> = members.iter().map(Trajectory::to_days).collect();
    workflow::emit(&out, config.io.output.as_deref())
}
