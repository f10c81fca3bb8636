//! Per-condition simulation state.

use std::collections::BTreeMap;

use nalgebra::DMatrix;

use clamp_core::{RngHandle, SampleRange};

use crate::epoch::Epoch;

/// One state dwell in a Monte-Carlo chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonteCarloEvent {
    /// Occupied state index.
    pub state: usize,
    /// Dwell duration.
    pub duration: f64,
}

/// Ordered dwell sequence whose durations sum to the simulation end time.
pub type MonteCarloEventChain = Vec<MonteCarloEvent>;

/// A reference curve resampled onto the simulation grid.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlignedReference {
    /// Trimmed, normalised and scaled reference values.
    pub waveform: Vec<f64>,
    /// Simulation-grid range the values cover.
    pub range: SampleRange,
    /// Global cost weight of the curve.
    pub weight: f64,
}

/// One cell of a protocol's condition grid.
///
/// Per-variable-set outputs (`probability`, `waveforms`, `events`,
/// `reference`) are indexed by variable set; slots are grown on demand.
#[derive(Debug, Clone)]
pub struct Simulation {
    /// Uniform sample grid.
    pub time: Vec<f64>,
    /// End of the simulated interval (`start + duration`, grid-exclusive).
    pub end_time: f64,
    /// Per-sample cost weights.
    pub weight: Vec<f64>,
    /// Per-sample cost participation (false = masked out).
    pub mask: Vec<bool>,
    /// Rendered stimulus channels.
    pub stimuli: BTreeMap<String, Vec<f64>>,
    /// Constant-stimulus epochs partitioning the grid.
    pub epochs: Vec<Epoch>,
    /// Occupancy probabilities, one `N × S` matrix per variable set.
    pub probability: Vec<DMatrix<f64>>,
    /// Derived waveforms per variable set.
    pub waveforms: Vec<BTreeMap<String, Vec<f64>>>,
    /// Monte-Carlo event chains per variable set.
    pub events: Vec<Vec<MonteCarloEventChain>>,
    /// Aligned reference curves per variable set, keyed by name.
    pub reference: Vec<BTreeMap<String, AlignedReference>>,
    /// Simulation-owned RNG substream.
    pub rng: RngHandle,
}

impl Simulation {
    /// Number of samples on the grid.
    pub fn num_points(&self) -> usize {
        self.time.len()
    }

    /// Occupancy matrix for a variable set, if it has been produced and has
    /// the expected shape.
    pub fn probability_for(&self, variable_set: usize, num_states: usize) -> Option<&DMatrix<f64>> {
        self.probability.get(variable_set).filter(|p| {
            p.nrows() == self.num_points() && p.ncols() == num_states
        })
    }

    /// Grows the per-variable-set probability slots up to `variable_set`.
    pub fn ensure_probability_slot(&mut self, variable_set: usize, num_states: usize) {
        while self.probability.len() <= variable_set {
            self.probability
                .push(DMatrix::zeros(self.num_points(), num_states));
        }
    }
}
