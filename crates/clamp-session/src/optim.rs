//! Variable-mapping transforms for the outer simplex optimiser.
//!
//! Bounded free variables travel through the optimiser in an angular
//! parameterisation so the simplex can wander freely while the linear value
//! stays inside its box; unbounded variables pass through unchanged. The
//! transform is gradient-free by construction, which is all a simplex needs.

use clamp_core::{FreeVariables, Result};

use crate::session::Session;

/// Maps an angular coordinate back into the linear box `[lo, hi]`.
pub fn angular_to_linear(theta: f64, lo: f64, hi: f64) -> f64 {
    if !lo.is_finite() || !hi.is_finite() {
        return theta;
    }
    lo + (hi - lo) * (theta.sin() + 1.0) / 2.0
}

/// Maps a linear value into its angular coordinate.
///
/// The arcsine argument is clamped to `[-1, 1]`, so values at (or a rounding
/// error beyond) the bounds map to ±π/2.
pub fn linear_to_angular(x: f64, lo: f64, hi: f64) -> f64 {
    if !lo.is_finite() || !hi.is_finite() {
        return x;
    }
    (2.0 * (x - lo) / (hi - lo) - 1.0).clamp(-1.0, 1.0).asin()
}

/// Maps an angular simplex point to linear free-variable values.
pub fn map_to_linear(angular: &[f64], bounds: &FreeVariables) -> Vec<f64> {
    angular
        .iter()
        .zip(bounds.xmin.iter().zip(&bounds.xmax))
        .map(|(&theta, (&lo, &hi))| angular_to_linear(theta, lo, hi))
        .collect()
}

/// Maps linear free-variable values to an angular simplex point.
pub fn map_to_angular(linear: &[f64], bounds: &FreeVariables) -> Vec<f64> {
    linear
        .iter()
        .zip(bounds.xmin.iter().zip(&bounds.xmax))
        .map(|(&x, (&lo, &hi))| linear_to_angular(x, lo, hi))
        .collect()
}

/// Cost function consumed by the outer optimiser: applies an angular point
/// to the model's free variables, re-runs the session and returns the χ²
/// cost.
pub fn evaluate_cost(session: &mut Session, angular: &[f64], bounds: &FreeVariables) -> Result<f64> {
    let linear = map_to_linear(angular, bounds);
    session.model_mut().set_free_variables(&linear)?;
    session.run()?;
    Ok(session.cost())
}
