//! Spectral decomposition of transition-rate matrices.

use nalgebra::linalg::Schur;
use nalgebra::{DMatrix, DVector};

use clamp_core::{AbortFlag, ClampError, ErrorInfo, Result};

fn numerical(code: &str, message: impl Into<String>) -> ClampError {
    ClampError::Numerical(ErrorInfo::new(code, message))
}

/// Computes the spectral expansion `Q = Σ_i λ_i A_i` of a rate matrix.
///
/// Eigenpairs are sorted by ascending |λ| so the stationary eigenvalue comes
/// first; `A_i = v_i·u_iᵀ` with `v_i` the i-th right eigenvector and `u_i`
/// the matching row of `V⁻¹`. Rate matrices of detailed-balance kinetic
/// schemes have real spectra; a significantly complex eigenvalue, a
/// non-convergent Schur iteration or a degenerate eigenvector set all report
/// [`ClampError::Numerical`], as does a matrix with fewer than two states.
pub fn spectral_expansion(
    q: &DMatrix<f64>,
    abort: &AbortFlag,
) -> Result<(DVector<f64>, Vec<DMatrix<f64>>)> {
    let n = q.nrows();
    if n < 2 {
        return Err(numerical(
            "spectral_size",
            "spectral expansion for less than two states does not make sense",
        ));
    }
    let schur = Schur::try_new(q.clone(), 1e-12, 10_000)
        .ok_or_else(|| numerical("schur_convergence", "eigenvalue iteration did not converge"))?;
    if abort.is_set() {
        return Err(ClampError::aborted());
    }
    let complex = schur.complex_eigenvalues();
    let scale = q.amax().max(1.0);
    for value in complex.iter() {
        if value.im.abs() > 1e-9 * scale {
            return Err(numerical(
                "complex_spectrum",
                "rate matrix has a complex eigenvalue pair",
            ));
        }
    }
    let eigenvalues: Vec<f64> = complex.iter().map(|c| c.re).collect();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        eigenvalues[a]
            .abs()
            .partial_cmp(&eigenvalues[b].abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Right eigenvectors, one per eigenvalue, from the null space of Q - λI.
    let mut v = DMatrix::<f64>::zeros(n, n);
    for (i, &j) in order.iter().enumerate() {
        if abort.is_set() {
            return Err(ClampError::aborted());
        }
        let shifted = q - DMatrix::<f64>::identity(n, n) * eigenvalues[j];
        let svd = shifted.svd(true, true);
        let v_t = svd
            .v_t
            .ok_or_else(|| numerical("svd", "singular vectors unavailable"))?;
        let mut column = v_t.row(n - 1).transpose();
        // Fix the sign so repeated decompositions are bit-identical.
        let mut lead = 0;
        for (k, value) in column.iter().enumerate() {
            if value.abs() > column[lead].abs() {
                lead = k;
            }
        }
        if column[lead] < 0.0 {
            column.neg_mut();
        }
        v.set_column(i, &column);
    }
    let v_inv = v.clone().try_inverse().ok_or_else(|| {
        numerical(
            "degenerate_eigenvectors",
            "eigenvector matrix is not invertible",
        )
    })?;
    let sorted = DVector::from_iterator(n, order.iter().map(|&j| eigenvalues[j]));
    let matrices: Vec<DMatrix<f64>> = (0..n).map(|i| v.column(i) * v_inv.row(i)).collect();
    Ok((sorted, matrices))
}
