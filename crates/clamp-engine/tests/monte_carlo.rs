use std::collections::BTreeMap;

use nalgebra::{DMatrix, RowDVector};

use clamp_core::{sample_grid, AbortFlag, RngHandle};
use clamp_engine::{
    equilibrium_probability, monte_carlo_simulation, probability_from_event_chains,
    spectral_expansion, spectral_simulation, MonteCarloOptions,
};
use clamp_protocol::{find_epochs, EpochPool, Simulation};

fn build_simulation(
    stimuli: BTreeMap<String, Vec<f64>>,
    duration: f64,
    dt: f64,
    seed: u64,
) -> (Simulation, EpochPool) {
    let time = sample_grid(0.0, duration, dt).unwrap();
    let mut epochs = find_epochs(&time, duration, &stimuli);
    let mut pool = EpochPool::new();
    for epoch in &mut epochs {
        epoch.unique = pool.intern(&epoch.stimuli);
    }
    let sim = Simulation {
        time,
        end_time: duration,
        weight: Vec::new(),
        mask: Vec::new(),
        stimuli,
        epochs,
        probability: Vec::new(),
        waveforms: Vec::new(),
        events: Vec::new(),
        reference: Vec::new(),
        rng: RngHandle::from_seed(seed),
    };
    (sim, pool)
}

fn prepare_monte_carlo(pool: &mut EpochPool, rates: &[DMatrix<f64>]) {
    for (entry, q) in pool.entries_mut().iter_mut().zip(rates) {
        entry.transition_rates = q.clone();
        entry.exit_rates = (0..q.nrows()).map(|i| -q[(i, i)]).collect();
    }
}

#[test]
fn chain_durations_sum_to_the_end_time() {
    let q = DMatrix::from_row_slice(2, 2, &[-1.0, 1.0, 2.0, -2.0]);
    let (mut sim, mut pool) = build_simulation(BTreeMap::new(), 5.0, 0.01, 11);
    prepare_monte_carlo(&mut pool, &[q]);
    let abort = AbortFlag::new();
    let opts = MonteCarloOptions {
        num_runs: 200,
        accumulate_runs: false,
        sample_runs: false,
    };
    monte_carlo_simulation(
        &mut sim,
        &pool,
        RowDVector::from_row_slice(&[1.0, 0.0]),
        &opts,
        false,
        0,
        &abort,
    )
    .unwrap();
    assert_eq!(sim.events[0].len(), 200);
    for chain in &sim.events[0] {
        assert!(!chain.is_empty());
        let total: f64 = chain.iter().map(|e| e.duration).sum();
        assert!((total - 5.0).abs() < 1e-9, "chain sums to {total}");
    }
}

#[test]
fn accumulate_appends_and_replace_replaces() {
    let q = DMatrix::from_row_slice(2, 2, &[-1.0, 1.0, 2.0, -2.0]);
    let (mut sim, mut pool) = build_simulation(BTreeMap::new(), 1.0, 0.1, 5);
    prepare_monte_carlo(&mut pool, &[q]);
    let abort = AbortFlag::new();
    let mut opts = MonteCarloOptions {
        num_runs: 10,
        accumulate_runs: true,
        sample_runs: false,
    };
    let p0 = RowDVector::from_row_slice(&[1.0, 0.0]);
    monte_carlo_simulation(&mut sim, &pool, p0.clone(), &opts, false, 0, &abort).unwrap();
    monte_carlo_simulation(&mut sim, &pool, p0.clone(), &opts, false, 0, &abort).unwrap();
    assert_eq!(sim.events[0].len(), 20);
    opts.accumulate_runs = false;
    monte_carlo_simulation(&mut sim, &pool, p0, &opts, false, 0, &abort).unwrap();
    assert_eq!(sim.events[0].len(), 10);
}

#[test]
fn sampled_probability_rows_sum_to_one() {
    let q = DMatrix::from_row_slice(2, 2, &[-1.0, 1.0, 2.0, -2.0]);
    let (mut sim, mut pool) = build_simulation(BTreeMap::new(), 2.0, 0.05, 7);
    prepare_monte_carlo(&mut pool, &[q]);
    let abort = AbortFlag::new();
    let opts = MonteCarloOptions {
        num_runs: 500,
        accumulate_runs: false,
        sample_runs: true,
    };
    monte_carlo_simulation(
        &mut sim,
        &pool,
        RowDVector::from_row_slice(&[1.0, 0.0]),
        &opts,
        false,
        0,
        &abort,
    )
    .unwrap();
    let p = &sim.probability[0];
    for row in 0..p.nrows() {
        let sum: f64 = (0..p.ncols()).map(|col| p[(row, col)]).sum();
        assert!((sum - 1.0).abs() < 1e-9, "row {row} sums to {sum}");
        for col in 0..p.ncols() {
            let value = p[(row, col)];
            assert!((-1e-12..=1.0 + 1e-12).contains(&value));
        }
    }
}

#[test]
fn fixed_seed_replays_identical_chains() {
    let q = DMatrix::from_row_slice(2, 2, &[-1.0, 1.0, 2.0, -2.0]);
    let opts = MonteCarloOptions {
        num_runs: 50,
        accumulate_runs: false,
        sample_runs: false,
    };
    let abort = AbortFlag::new();
    let p0 = RowDVector::from_row_slice(&[0.5, 0.5]);
    let run = |seed: u64| {
        let (mut sim, mut pool) = build_simulation(BTreeMap::new(), 2.0, 0.1, seed);
        prepare_monte_carlo(&mut pool, &[q.clone()]);
        monte_carlo_simulation(&mut sim, &pool, p0.clone(), &opts, false, 0, &abort).unwrap();
        sim.events[0].clone()
    };
    let a = run(42);
    let b = run(42);
    let c = run(43);
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn absorbing_state_yields_a_single_dwell() {
    // State 0 has no exits; chains started there dwell to the end.
    let q = DMatrix::from_row_slice(2, 2, &[0.0, 0.0, 1.0, -1.0]);
    let (mut sim, mut pool) = build_simulation(BTreeMap::new(), 3.0, 0.1, 3);
    prepare_monte_carlo(&mut pool, &[q]);
    let abort = AbortFlag::new();
    let opts = MonteCarloOptions {
        num_runs: 20,
        accumulate_runs: false,
        sample_runs: false,
    };
    monte_carlo_simulation(
        &mut sim,
        &pool,
        RowDVector::from_row_slice(&[1.0, 0.0]),
        &opts,
        false,
        0,
        &abort,
    )
    .unwrap();
    for chain in &sim.events[0] {
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].state, 0);
        assert!((chain[0].duration - 3.0).abs() < 1e-12);
    }
}

#[test]
fn equilibrium_distribution_of_a_two_state_scheme() {
    let q = DMatrix::from_row_slice(2, 2, &[-1.0, 1.0, 2.0, -2.0]);
    let pi = equilibrium_probability(&q).unwrap();
    assert!((pi[0] - 2.0 / 3.0).abs() < 1e-12);
    assert!((pi[1] - 1.0 / 3.0).abs() < 1e-12);
}

#[test]
fn monte_carlo_converges_to_the_spectral_solution() {
    let q = DMatrix::from_row_slice(2, 2, &[-1.0, 1.0, 2.0, -2.0]);
    let abort = AbortFlag::new();
    let p0 = RowDVector::from_row_slice(&[1.0, 0.0]);

    let (mut spectral_sim, mut spectral_pool) =
        build_simulation(BTreeMap::new(), 2.0, 0.05, 1);
    let (eigenvalues, matrices) = spectral_expansion(&q, &abort).unwrap();
    {
        let entry = &mut spectral_pool.entries_mut()[0];
        entry.transition_rates = q.clone();
        entry.eigenvalues = eigenvalues;
        entry.spectral_matrices = matrices;
    }
    spectral_simulation(&mut spectral_sim, &spectral_pool, p0.clone(), false, 0, &abort).unwrap();

    let (mut mc_sim, mut mc_pool) = build_simulation(BTreeMap::new(), 2.0, 0.05, 1234);
    prepare_monte_carlo(&mut mc_pool, &[q]);
    let opts = MonteCarloOptions {
        num_runs: 50_000,
        accumulate_runs: false,
        sample_runs: true,
    };
    monte_carlo_simulation(&mut mc_sim, &mc_pool, p0, &opts, false, 0, &abort).unwrap();

    let ps = &spectral_sim.probability[0];
    let pm = &mc_sim.probability[0];
    let mut worst = 0.0f64;
    for row in 0..ps.nrows() {
        for col in 0..ps.ncols() {
            worst = worst.max((ps[(row, col)] - pm[(row, col)]).abs());
        }
    }
    assert!(worst <= 0.02, "max deviation {worst}");
}

#[test]
fn sampler_averages_over_chains() {
    // Two hand-written chains covering [0, 1): all state 0 and all state 1.
    use clamp_protocol::MonteCarloEvent;
    let time = sample_grid(0.0, 1.0, 0.25).unwrap();
    let chains = vec![
        vec![MonteCarloEvent {
            state: 0,
            duration: 1.0,
        }],
        vec![MonteCarloEvent {
            state: 1,
            duration: 1.0,
        }],
    ];
    let abort = AbortFlag::new();
    let p = probability_from_event_chains(&time, 1.0, 2, &chains, &abort).unwrap();
    for row in 0..p.nrows() {
        assert!((p[(row, 0)] - 0.5).abs() < 1e-12);
        assert!((p[(row, 1)] - 0.5).abs() < 1e-12);
    }
}

#[test]
fn sampler_splits_partial_overlaps() {
    use clamp_protocol::MonteCarloEvent;
    let time = sample_grid(0.0, 1.0, 0.5).unwrap();
    // Switch from state 0 to 1 at t = 0.25: first interval splits 50/50.
    let chains = vec![vec![
        MonteCarloEvent {
            state: 0,
            duration: 0.25,
        },
        MonteCarloEvent {
            state: 1,
            duration: 0.75,
        },
    ]];
    let abort = AbortFlag::new();
    let p = probability_from_event_chains(&time, 1.0, 2, &chains, &abort).unwrap();
    assert!((p[(0, 0)] - 0.5).abs() < 1e-12);
    assert!((p[(0, 1)] - 0.5).abs() < 1e-12);
    assert!((p[(1, 0)] - 0.0).abs() < 1e-12);
    assert!((p[(1, 1)] - 1.0).abs() < 1e-12);
}
