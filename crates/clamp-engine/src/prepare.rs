//! Per-unique-epoch model queries and decomposition.

use nalgebra::RowDVector;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use clamp_core::{AbortFlag, ClampError, ModelProvider, Result};
use clamp_protocol::EpochPool;

use crate::spectral::spectral_expansion;

/// Elementary charges per second expressed in pA.
const CHARGE_CURRENT_PA: f64 = 6.242e-6;

/// Propagation method for a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    /// Closed-form propagation via the spectral expansion of Q.
    #[default]
    #[serde(alias = "Eigen Solver")]
    EigenSolver,
    /// Monte-Carlo sampled dwell chains.
    #[serde(alias = "Monte Carlo")]
    MonteCarlo,
}

/// Prepares every unique epoch for one variable set.
///
/// Model queries run serially (the provider is stateful); the spectral
/// decompositions then fan out in parallel, each task touching one disjoint
/// pool entry.
pub fn prepare_epochs(
    pool: &mut EpochPool,
    model: &mut dyn ModelProvider,
    variable_set: usize,
    method: Method,
    abort: &AbortFlag,
) -> Result<()> {
    for epoch in pool.entries_mut() {
        if abort.is_set() {
            return Err(ClampError::aborted());
        }
        model.eval_variables(&epoch.stimuli, variable_set)?;
        epoch.state_probabilities = model.state_probabilities()?;
        epoch.state_attributes = model.state_attributes()?;
        epoch.transition_rates = model.transition_rates()?;
        epoch.transition_charges = model.transition_charges()?;
        let num_states = epoch.transition_rates.ncols();
        epoch.state_charge_currents = if epoch.transition_charges.iter().any(|&c| c != 0.0) {
            RowDVector::from_iterator(
                num_states,
                (0..num_states).map(|i| {
                    (0..num_states)
                        .map(|j| epoch.transition_rates[(i, j)] * epoch.transition_charges[(i, j)])
                        .sum::<f64>()
                        * CHARGE_CURRENT_PA
                }),
            )
        } else {
            RowDVector::zeros(num_states)
        };
        match method {
            Method::EigenSolver => {
                epoch.exit_rates.clear();
            }
            Method::MonteCarlo => {
                epoch.exit_rates = (0..num_states)
                    .map(|i| -epoch.transition_rates[(i, i)])
                    .collect();
                epoch.eigenvalues = nalgebra::DVector::zeros(0);
                epoch.spectral_matrices.clear();
            }
        }
    }
    if method == Method::EigenSolver {
        pool.entries_mut()
            .par_iter_mut()
            .map(|epoch| {
                if abort.is_set() {
                    return Err(ClampError::aborted());
                }
                let (eigenvalues, matrices) = spectral_expansion(&epoch.transition_rates, abort)?;
                epoch.eigenvalues = eigenvalues;
                epoch.spectral_matrices = matrices;
                Ok(())
            })
            .collect::<Result<Vec<()>>>()?;
    }
    Ok(())
}
