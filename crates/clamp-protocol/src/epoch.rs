//! Epoch segmentation and the interned unique-epoch pool.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector, RowDVector};

/// Maximal contiguous run of samples over which every stimulus channel is
/// constant. Holds a pool index to its interned [`UniqueEpoch`].
#[derive(Debug, Clone, PartialEq)]
pub struct Epoch {
    /// Absolute start time of the epoch.
    pub start: f64,
    /// Epoch duration.
    pub duration: f64,
    /// First sample index covered by the epoch.
    pub first_pt: usize,
    /// Number of samples covered by the epoch.
    pub num_pts: usize,
    /// Stimulus values sampled at the epoch's first point.
    pub stimuli: BTreeMap<String, f64>,
    /// Index of the interned [`UniqueEpoch`] in the session pool.
    pub unique: usize,
}

/// Interned epoch identity: owns the model quantities evaluated at one
/// distinct stimulus tuple, filled in by the epoch preparer.
#[derive(Debug, Clone, Default)]
pub struct UniqueEpoch {
    /// The stimulus tuple this epoch was interned under.
    pub stimuli: BTreeMap<String, f64>,
    /// Starting occupancy probabilities reported by the model.
    pub state_probabilities: RowDVector<f64>,
    /// Named per-state attribute rows reported by the model.
    pub state_attributes: BTreeMap<String, RowDVector<f64>>,
    /// Transition-rate matrix Q at this operating point.
    pub transition_rates: DMatrix<f64>,
    /// Per-transition elementary charges (same layout as Q).
    pub transition_charges: DMatrix<f64>,
    /// Eigenvalues of Q sorted by ascending magnitude.
    pub eigenvalues: DVector<f64>,
    /// Spectral matrices `A_i = v_i·u_iᵀ`, one per eigenvalue.
    pub spectral_matrices: Vec<DMatrix<f64>>,
    /// Per-state exit rates `-Q_ii` for Monte-Carlo dwell sampling.
    pub exit_rates: Vec<f64>,
    /// Per-state charge currents in pA.
    pub state_charge_currents: RowDVector<f64>,
}

impl UniqueEpoch {
    fn new(stimuli: BTreeMap<String, f64>) -> Self {
        Self {
            stimuli,
            ..Self::default()
        }
    }

    /// Number of model states, taken from the rate matrix.
    pub fn num_states(&self) -> usize {
        self.transition_rates.ncols()
    }
}

/// Session-owned pool of interned [`UniqueEpoch`]s.
///
/// The pool is written during protocol compilation (interning) and by the
/// epoch preparer (disjoint per-entry fields); it must outlive every
/// simulation holding indices into it.
#[derive(Debug, Clone, Default)]
pub struct EpochPool {
    entries: Vec<UniqueEpoch>,
}

impl EpochPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of interned epochs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been interned yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every interned epoch.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns the interned epoch at `index`.
    pub fn get(&self, index: usize) -> &UniqueEpoch {
        &self.entries[index]
    }

    /// Immutable view of every entry.
    pub fn entries(&self) -> &[UniqueEpoch] {
        &self.entries
    }

    /// Mutable view of every entry (used by the epoch preparer).
    pub fn entries_mut(&mut self) -> &mut [UniqueEpoch] {
        &mut self.entries
    }

    /// Interns a stimulus tuple, returning the index of the matching entry.
    ///
    /// Two epochs share an entry iff their stimulus maps are equal
    /// key-for-key and value-for-value.
    pub fn intern(&mut self, stimuli: &BTreeMap<String, f64>) -> usize {
        if let Some(index) = self.entries.iter().position(|e| &e.stimuli == stimuli) {
            return index;
        }
        self.entries.push(UniqueEpoch::new(stimuli.clone()));
        self.entries.len() - 1
    }
}

/// Scans per-sample stimuli into a list of constant-stimulus epochs.
///
/// A new epoch opens at sample `i` whenever any channel's value differs from
/// sample `i-1` by exact inequality. Epochs partition `[time[0], end_time)`
/// and their `num_pts` sum to the grid length.
pub fn find_epochs(
    time: &[f64],
    end_time: f64,
    stimuli: &BTreeMap<String, Vec<f64>>,
) -> Vec<Epoch> {
    let num_pts = time.len();
    if num_pts == 0 {
        return Vec::new();
    }
    let snapshot = |i: usize| -> BTreeMap<String, f64> {
        stimuli
            .iter()
            .map(|(name, values)| (name.clone(), values[i]))
            .collect()
    };
    let open = |i: usize| Epoch {
        start: time[i],
        duration: 0.0,
        first_pt: i,
        num_pts: 0,
        stimuli: snapshot(i),
        unique: 0,
    };
    let mut epochs = Vec::new();
    let mut current = open(0);
    for i in 1..num_pts {
        let changed = stimuli.values().any(|values| values[i] != values[i - 1]);
        if changed {
            current.duration = time[i] - current.start;
            current.num_pts = i - current.first_pt;
            epochs.push(current);
            current = open(i);
        }
    }
    current.duration = end_time - current.start;
    current.num_pts = num_pts - current.first_pt;
    epochs.push(current);
    epochs
}
