//! Closed-form occupancy propagation via the spectral expansion.

use nalgebra::{DMatrix, DVector, RowDVector};

use clamp_core::{AbortFlag, ClampError, Result};
use clamp_protocol::{EpochPool, Simulation};

/// Propagates P(t) across every epoch of a simulation for one variable set.
///
/// Within an epoch `P(t) = Σ_i exp(λ_i·τ)·(p·A_i)` with `τ = t - epochStart`;
/// the starting probability for the next epoch is propagated analytically
/// over the full epoch duration. With `start_equilibrated` the starting
/// probability is projected onto the stationary eigenspace (`p·A_0`) and the
/// first epoch is filled with that constant row.
pub fn spectral_simulation(
    sim: &mut Simulation,
    pool: &EpochPool,
    starting_probability: RowDVector<f64>,
    start_equilibrated: bool,
    variable_set: usize,
    abort: &AbortFlag,
) -> Result<()> {
    let num_pts = sim.time.len();
    let num_states = starting_probability.len();
    sim.ensure_probability_slot(variable_set, num_states);
    let p_mat = &mut sim.probability[variable_set];
    *p_mat = DMatrix::zeros(num_pts, num_states);
    let mut p = starting_probability;
    let num_epochs = sim.epochs.len();
    for (epoch_counter, epoch) in sim.epochs.iter().enumerate() {
        if abort.is_set() {
            return Err(ClampError::aborted());
        }
        let unique = pool.get(epoch.unique);
        if epoch_counter == 0 && start_equilibrated {
            p = &p * &unique.spectral_matrices[0];
            for row in epoch.first_pt..epoch.first_pt + epoch.num_pts {
                p_mat.row_mut(row).copy_from(&p);
            }
            continue;
        }
        if epoch.num_pts > 0 {
            for i in 0..num_states {
                if abort.is_set() {
                    return Err(ClampError::aborted());
                }
                let lambda = unique.eigenvalues[i];
                let weights = &p * &unique.spectral_matrices[i];
                let decay = DVector::from_iterator(
                    epoch.num_pts,
                    sim.time[epoch.first_pt..epoch.first_pt + epoch.num_pts]
                        .iter()
                        .map(|t| ((t - epoch.start) * lambda).exp()),
                );
                let mut block = p_mat.view_mut((epoch.first_pt, 0), (epoch.num_pts, num_states));
                block += decay * weights;
            }
        }
        if epoch_counter + 1 < num_epochs {
            let mut next = RowDVector::zeros(num_states);
            for i in 0..num_states {
                if abort.is_set() {
                    return Err(ClampError::aborted());
                }
                let lambda = unique.eigenvalues[i];
                next += (&p * &unique.spectral_matrices[i]) * (lambda * epoch.duration).exp();
            }
            p = next;
        }
    }
    Ok(())
}

/// Largest deviation of any probability row sum from one, across every
/// variable set of a simulation.
pub fn max_probability_error(sim: &Simulation) -> f64 {
    let mut max_error = 0.0f64;
    for p_mat in &sim.probability {
        for row in 0..p_mat.nrows() {
            let sum: f64 = (0..p_mat.ncols()).map(|col| p_mat[(row, col)]).sum();
            max_error = max_error.max((sum - 1.0).abs());
        }
    }
    max_error
}
