//! Simulation options consumed by a session.

use serde::{Deserialize, Serialize};

use clamp_engine::Method;
use clamp_protocol::ExprErrorPolicy;

/// Options governing one simulator session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimOptions {
    /// Propagation method.
    #[serde(alias = "Method")]
    pub method: Method,
    /// Number of Monte-Carlo chains generated per simulation and run.
    #[serde(alias = "# Monte Carlo runs")]
    pub num_monte_carlo_runs: usize,
    /// Append chains to those of prior runs instead of replacing them.
    #[serde(alias = "Accumulate Monte Carlo runs")]
    pub accumulate_monte_carlo_runs: bool,
    /// Reconstruct P(t) from the generated chains.
    #[serde(alias = "Sample probability from Monte Carlo event chains")]
    pub sample_probability_from_event_chains: bool,
    /// How per-pulse expression failures are handled.
    pub expr_errors: ExprErrorPolicy,
    /// Master seed for every per-simulation RNG substream.
    pub master_seed: u64,
    /// Worker threads for the parallel stages (0 = rayon default).
    pub threads: usize,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            method: Method::EigenSolver,
            num_monte_carlo_runs: 100,
            accumulate_monte_carlo_runs: false,
            sample_probability_from_event_chains: true,
            expr_errors: ExprErrorPolicy::OneShot,
            master_seed: 0,
            threads: 0,
        }
    }
}
