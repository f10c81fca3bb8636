//! Model-provider seam between the simulator core and a Markov model.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, RowDVector};
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Named collection of state indices exposed to the waveform evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateGroup {
    /// Binding name for the summed occupancy of the group.
    pub name: String,
    /// State indices contributing to the group.
    pub state_indexes: Vec<usize>,
    /// Inactive groups are skipped entirely.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Initial values and box bounds of the model's free variables.
///
/// A bound of `±inf` marks the variable as unbounded in that direction; the
/// optimiser bridge passes such variables through untransformed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FreeVariables {
    /// Initial values.
    pub x0: Vec<f64>,
    /// Lower bounds.
    pub xmin: Vec<f64>,
    /// Upper bounds.
    pub xmax: Vec<f64>,
}

impl FreeVariables {
    /// Number of free variables.
    pub fn len(&self) -> usize {
        self.x0.len()
    }

    /// True when the model exposes no free variables.
    pub fn is_empty(&self) -> bool {
        self.x0.is_empty()
    }
}

/// Interface the simulator consumes from a parametrised Markov model.
///
/// `eval_variables` fixes the model at one stimulus operating point for one
/// variable set; the subsequent getters report quantities at that point. The
/// transition-rate matrix `Q` uses the row-vector convention: `Q[(from, to)]`
/// is the rate from state `from` to state `to`, diagonal entries are negative
/// row sums, and occupancies propagate as `dp/dt = p · Q`.
pub trait ModelProvider: Send {
    /// Number of parameter variable sets; every simulation runs once per set.
    fn num_variable_sets(&self) -> usize;

    /// Prepares the model and returns the ordered state names.
    fn init(&mut self) -> Result<Vec<String>>;

    /// Evaluates model variables at a stimulus operating point.
    fn eval_variables(
        &mut self,
        stimuli: &BTreeMap<String, f64>,
        variable_set: usize,
    ) -> Result<()>;

    /// Starting occupancy probabilities (row vector over states).
    fn state_probabilities(&self) -> Result<RowDVector<f64>>;

    /// Named per-state attribute rows (e.g. conductance, charge).
    fn state_attributes(&self) -> Result<BTreeMap<String, RowDVector<f64>>>;

    /// Transition-rate matrix Q at the current operating point.
    fn transition_rates(&self) -> Result<DMatrix<f64>>;

    /// Per-transition elementary charges (same layout as Q; may be all zero).
    fn transition_charges(&self) -> Result<DMatrix<f64>>;

    /// State groupings exposed to the waveform evaluator.
    fn state_groups(&self) -> Vec<StateGroup>;

    /// Scalar model parameters bound into waveform expressions.
    fn parameters(&self) -> BTreeMap<String, f64>;

    /// Free variables offered to the outer optimiser.
    fn free_variables(&self) -> FreeVariables;

    /// Applies optimiser-proposed values to the free variables.
    fn set_free_variables(&mut self, x: &[f64]) -> Result<()>;
}
