use std::collections::BTreeMap;

use nalgebra::{DMatrix, RowDVector};

use clamp_core::{sample_grid, AbortFlag, ClampError, RngHandle};
use clamp_engine::{max_probability_error, spectral_expansion, spectral_simulation};
use clamp_protocol::{find_epochs, EpochPool, Simulation};

fn build_simulation(
    stimuli: BTreeMap<String, Vec<f64>>,
    start: f64,
    duration: f64,
    dt: f64,
) -> (Simulation, EpochPool) {
    let time = sample_grid(start, duration, dt).unwrap();
    let end_time = start + duration;
    let mut epochs = find_epochs(&time, end_time, &stimuli);
    let mut pool = EpochPool::new();
    for epoch in &mut epochs {
        epoch.unique = pool.intern(&epoch.stimuli);
    }
    let sim = Simulation {
        time,
        end_time,
        weight: Vec::new(),
        mask: Vec::new(),
        stimuli,
        epochs,
        probability: Vec::new(),
        waveforms: Vec::new(),
        events: Vec::new(),
        reference: Vec::new(),
        rng: RngHandle::from_seed(1),
    };
    (sim, pool)
}

fn prepare_spectral(pool: &mut EpochPool, rates: &[DMatrix<f64>]) {
    let abort = AbortFlag::new();
    for (entry, q) in pool.entries_mut().iter_mut().zip(rates) {
        let (eigenvalues, matrices) = spectral_expansion(q, &abort).unwrap();
        entry.transition_rates = q.clone();
        entry.eigenvalues = eigenvalues;
        entry.spectral_matrices = matrices;
    }
}

#[test]
fn two_state_relaxation_matches_the_analytic_solution() {
    let q = DMatrix::from_row_slice(2, 2, &[-1.0, 1.0, 2.0, -2.0]);
    let (mut sim, mut pool) = build_simulation(BTreeMap::new(), 0.0, 5.0, 0.01);
    prepare_spectral(&mut pool, &[q]);
    let abort = AbortFlag::new();
    spectral_simulation(
        &mut sim,
        &pool,
        RowDVector::from_row_slice(&[1.0, 0.0]),
        false,
        0,
        &abort,
    )
    .unwrap();
    let p = &sim.probability[0];
    let mut worst = 0.0f64;
    for (k, &t) in sim.time.iter().enumerate() {
        let expected = 2.0 / 3.0 + (-3.0 * t).exp() / 3.0;
        worst = worst.max((p[(k, 0)] - expected).abs());
    }
    assert!(worst <= 1e-8, "max deviation {worst}");
    assert!(max_probability_error(&sim) <= 1e-6);
}

#[test]
fn start_equilibrated_holds_the_stationary_distribution() {
    let q = DMatrix::from_row_slice(2, 2, &[-1.0, 1.0, 2.0, -2.0]);
    let (mut sim, mut pool) = build_simulation(BTreeMap::new(), 0.0, 5.0, 0.01);
    prepare_spectral(&mut pool, &[q]);
    let abort = AbortFlag::new();
    spectral_simulation(
        &mut sim,
        &pool,
        RowDVector::from_row_slice(&[1.0, 0.0]),
        true,
        0,
        &abort,
    )
    .unwrap();
    let p = &sim.probability[0];
    for k in 0..sim.time.len() {
        assert!((p[(k, 0)] - 2.0 / 3.0).abs() <= 1e-10);
        assert!((p[(k, 1)] - 1.0 / 3.0).abs() <= 1e-10);
    }
}

#[test]
fn absorbing_state_drains_the_source() {
    let q = DMatrix::from_row_slice(2, 2, &[0.0, 0.0, 1.0, -1.0]);
    let (mut sim, mut pool) = build_simulation(BTreeMap::new(), 0.0, 3.0, 0.01);
    prepare_spectral(&mut pool, &[q]);
    let abort = AbortFlag::new();
    spectral_simulation(
        &mut sim,
        &pool,
        RowDVector::from_row_slice(&[0.0, 1.0]),
        false,
        0,
        &abort,
    )
    .unwrap();
    let p = &sim.probability[0];
    for (k, &t) in sim.time.iter().enumerate() {
        assert!((p[(k, 1)] - (-t).exp()).abs() <= 1e-8);
        assert!((p[(k, 0)] - (1.0 - (-t).exp())).abs() <= 1e-8);
    }
}

#[test]
fn propagation_carries_probability_across_epoch_boundaries() {
    // Channel steps at t = 1: slow relaxation first, fast afterwards.
    let time = sample_grid(0.0, 2.0, 0.01).unwrap();
    let v: Vec<f64> = time.iter().map(|&t| if t < 1.0 { 0.0 } else { 1.0 }).collect();
    let mut stimuli = BTreeMap::new();
    stimuli.insert("v".to_string(), v);
    let (mut sim, mut pool) = build_simulation(stimuli, 0.0, 2.0, 0.01);
    assert_eq!(sim.epochs.len(), 2);
    assert_eq!(pool.len(), 2);
    let q1 = DMatrix::from_row_slice(2, 2, &[-1.0, 1.0, 1.0, -1.0]);
    let q2 = DMatrix::from_row_slice(2, 2, &[-6.0, 6.0, 2.0, -2.0]);
    prepare_spectral(&mut pool, &[q1, q2]);
    let abort = AbortFlag::new();
    spectral_simulation(
        &mut sim,
        &pool,
        RowDVector::from_row_slice(&[1.0, 0.0]),
        false,
        0,
        &abort,
    )
    .unwrap();
    let p = &sim.probability[0];
    // First epoch: p_inf = 1/2, rate 2.
    let p_at =
        |p_inf: f64, p0: f64, rate: f64, tau: f64| p_inf + (p0 - p_inf) * (-rate * tau).exp();
    for (k, &t) in sim.time.iter().enumerate() {
        let expected = if t < 1.0 {
            p_at(0.5, 1.0, 2.0, t)
        } else {
            let boundary = p_at(0.5, 1.0, 2.0, 1.0);
            p_at(0.25, boundary, 8.0, t - 1.0)
        };
        assert!(
            (p[(k, 0)] - expected).abs() <= 1e-8,
            "t = {t}: {} vs {expected}",
            p[(k, 0)]
        );
    }
    assert!(max_probability_error(&sim) <= 1e-6);
}

#[test]
fn single_state_matrix_is_a_numerical_failure() {
    let q = DMatrix::from_row_slice(1, 1, &[0.0]);
    let abort = AbortFlag::new();
    match spectral_expansion(&q, &abort) {
        Err(ClampError::Numerical(_)) => {}
        other => panic!("expected a numerical failure, got {other:?}"),
    }
}

#[test]
fn spectral_matrices_reassemble_q() {
    // Linear three-state chain; tridiagonal rate matrices have real spectra.
    let q = DMatrix::from_row_slice(3, 3, &[-2.0, 2.0, 0.0, 1.0, -1.5, 0.5, 0.0, 1.0, -1.0]);
    let abort = AbortFlag::new();
    let (eigenvalues, matrices) = spectral_expansion(&q, &abort).unwrap();
    let mut reassembled = DMatrix::<f64>::zeros(3, 3);
    for (lambda, a) in eigenvalues.iter().zip(&matrices) {
        reassembled += a * *lambda;
    }
    assert!((reassembled - &q).amax() < 1e-8);
    // Eigenvalues sorted by ascending magnitude; the stationary one first.
    assert!(eigenvalues[0].abs() < 1e-9);
    assert!(eigenvalues[0].abs() <= eigenvalues[1].abs());
    assert!(eigenvalues[1].abs() <= eigenvalues[2].abs());
}
