use std::collections::BTreeMap;

use criterion::{criterion_group, criterion_main, Criterion};
use nalgebra::{DMatrix, RowDVector};

use clamp_core::{sample_grid, AbortFlag, RngHandle};
use clamp_engine::{spectral_expansion, spectral_simulation};
use clamp_protocol::{find_epochs, EpochPool, Simulation};

fn four_state_chain() -> DMatrix<f64> {
    DMatrix::from_row_slice(
        4,
        4,
        &[
            -2.0, 2.0, 0.0, 0.0, //
            1.0, -3.0, 2.0, 0.0, //
            0.0, 1.5, -2.5, 1.0, //
            0.0, 0.0, 0.5, -0.5,
        ],
    )
}

fn bench_spectral_propagation(c: &mut Criterion) {
    let duration = 10.0;
    let time = sample_grid(0.0, duration, 0.001).unwrap();
    let v: Vec<f64> = time
        .iter()
        .map(|&t| if t < 3.0 { 0.0 } else if t < 6.0 { 1.0 } else { 0.0 })
        .collect();
    let mut stimuli = BTreeMap::new();
    stimuli.insert("v".to_string(), v);
    let mut epochs = find_epochs(&time, duration, &stimuli);
    let mut pool = EpochPool::new();
    for epoch in &mut epochs {
        epoch.unique = pool.intern(&epoch.stimuli);
    }
    let abort = AbortFlag::new();
    let q = four_state_chain();
    for entry in pool.entries_mut() {
        let (eigenvalues, matrices) = spectral_expansion(&q, &abort).unwrap();
        entry.transition_rates = q.clone();
        entry.eigenvalues = eigenvalues;
        entry.spectral_matrices = matrices;
    }
    let mut sim = Simulation {
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
        rng: RngHandle::from_seed(0),
    };
    let p0 = RowDVector::from_row_slice(&[1.0, 0.0, 0.0, 0.0]);

    c.bench_function("spectral_propagation_4state_10k", |b| {
        b.iter(|| {
            spectral_simulation(&mut sim, &pool, p0.clone(), false, 0, &abort).unwrap();
        })
    });
}

criterion_group!(benches, bench_spectral_propagation);
criterion_main!(benches);
