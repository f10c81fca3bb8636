#![deny(missing_docs)]
//! Table-driven Markov model provider.
//!
//! A [`TableModel`] is configured with named states, transitions whose rates
//! are arithmetic expressions over stimulus scalars and model parameters,
//! per-variable-set parameter assignments, optional transition charges,
//! state groups and free-variable bounds for the optimiser bridge. It
//! implements [`ModelProvider`] so the session can drive it like any other
//! model.

use std::collections::{BTreeMap, BTreeSet};

use nalgebra::{DMatrix, RowDVector};
use serde::{Deserialize, Serialize};

use clamp_core::{
    ClampError, ErrorInfo, FreeVariables, ModelProvider, Result, StateGroup,
};
use clamp_expr::{Bindings, Expr};

/// One named model state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// State name, bound to its occupancy column in waveform expressions.
    pub name: String,
    /// Unnormalised starting occupancy.
    #[serde(default)]
    pub probability: f64,
    /// Named per-state attribute values (e.g. conductance).
    #[serde(default)]
    pub attributes: BTreeMap<String, f64>,
}

/// One directed transition with an expression-valued rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionConfig {
    /// Source state name.
    pub from: String,
    /// Destination state name.
    pub to: String,
    /// Rate expression over stimulus names and model parameters.
    pub rate: String,
    /// Elementary charge moved by the transition.
    #[serde(default)]
    pub charge: f64,
}

/// Bounds of one free variable offered to the optimiser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreeVariableConfig {
    /// Parameter name the variable overrides.
    pub name: String,
    /// Lower bound; omit for unbounded.
    #[serde(default = "neg_infinity")]
    pub min: f64,
    /// Upper bound; omit for unbounded.
    #[serde(default = "infinity")]
    pub max: f64,
}

fn neg_infinity() -> f64 {
    f64::NEG_INFINITY
}

fn infinity() -> f64 {
    f64::INFINITY
}

/// Serialisable model description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name.
    #[serde(default)]
    pub name: String,
    /// Ordered states.
    pub states: Vec<StateConfig>,
    /// Directed transitions.
    #[serde(default)]
    pub transitions: Vec<TransitionConfig>,
    /// Parameter assignments, one map per variable set. An empty list means
    /// a single parameterless set.
    #[serde(default)]
    pub parameters: Vec<BTreeMap<String, f64>>,
    /// State groups exposed to the waveform evaluator.
    #[serde(default)]
    pub groups: Vec<StateGroup>,
    /// Free variables offered to the optimiser.
    #[serde(default)]
    pub free: Vec<FreeVariableConfig>,
}

struct ParsedTransition {
    from: usize,
    to: usize,
    rate: Expr,
    charge: f64,
}

fn model_error(code: &str, message: impl Into<String>) -> ClampError {
    ClampError::Model(ErrorInfo::new(code, message))
}

/// A [`ModelProvider`] backed by a [`ModelConfig`].
pub struct TableModel {
    config: ModelConfig,
    state_names: Vec<String>,
    transitions: Vec<ParsedTransition>,
    attributes: BTreeMap<String, RowDVector<f64>>,
    probabilities: RowDVector<f64>,
    free_overrides: BTreeMap<String, f64>,
    current_parameters: BTreeMap<String, f64>,
    current_rates: DMatrix<f64>,
    current_charges: DMatrix<f64>,
}

impl TableModel {
    /// Creates a model from its configuration; call
    /// [`ModelProvider::init`] before use.
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            state_names: Vec::new(),
            transitions: Vec::new(),
            attributes: BTreeMap::new(),
            probabilities: RowDVector::zeros(0),
            free_overrides: BTreeMap::new(),
            current_parameters: BTreeMap::new(),
            current_rates: DMatrix::zeros(0, 0),
            current_charges: DMatrix::zeros(0, 0),
        }
    }

    fn state_index(&self, name: &str) -> Result<usize> {
        self.state_names
            .iter()
            .position(|s| s == name)
            .ok_or_else(|| {
                ClampError::Model(
                    ErrorInfo::new("unknown_state", "transition names an unknown state")
                        .with_context("state", name),
                )
            })
    }

    fn parameters_for(&self, variable_set: usize) -> BTreeMap<String, f64> {
        let mut params = self
            .config
            .parameters
            .get(variable_set)
            .cloned()
            .unwrap_or_default();
        for (name, value) in &self.free_overrides {
            params.insert(name.clone(), *value);
        }
        params
    }
}

impl ModelProvider for TableModel {
    fn num_variable_sets(&self) -> usize {
        self.config.parameters.len().max(1)
    }

    fn init(&mut self) -> Result<Vec<String>> {
        if self.config.states.is_empty() {
            return Err(model_error("no_states", "model has no states"));
        }
        self.state_names = self.config.states.iter().map(|s| s.name.clone()).collect();
        let num_states = self.state_names.len();

        let mut transitions = Vec::with_capacity(self.config.transitions.len());
        for transition in self.config.transitions.clone() {
            let from = self.state_index(&transition.from)?;
            let to = self.state_index(&transition.to)?;
            let rate = clamp_expr::parse(&transition.rate).map_err(|err| {
                ClampError::Model(
                    ErrorInfo::new("rate_expr", err.to_string())
                        .with_context("expr", &transition.rate),
                )
            })?;
            transitions.push(ParsedTransition {
                from,
                to,
                rate,
                charge: transition.charge,
            });
        }
        self.transitions = transitions;

        let mut attribute_names = BTreeSet::new();
        for state in &self.config.states {
            attribute_names.extend(state.attributes.keys().cloned());
        }
        self.attributes = attribute_names
            .into_iter()
            .map(|name| {
                let row = RowDVector::from_iterator(
                    num_states,
                    self.config
                        .states
                        .iter()
                        .map(|s| s.attributes.get(&name).copied().unwrap_or(0.0)),
                );
                (name, row)
            })
            .collect();

        let mut probabilities = RowDVector::from_iterator(
            num_states,
            self.config.states.iter().map(|s| s.probability),
        );
        let total: f64 = probabilities.iter().sum();
        if total > 0.0 {
            probabilities /= total;
        }
        self.probabilities = probabilities;
        self.current_parameters = self.parameters_for(0);
        self.current_rates = DMatrix::zeros(num_states, num_states);
        self.current_charges = DMatrix::zeros(num_states, num_states);
        Ok(self.state_names.clone())
    }

    fn eval_variables(
        &mut self,
        stimuli: &BTreeMap<String, f64>,
        variable_set: usize,
    ) -> Result<()> {
        let params = self.parameters_for(variable_set);
        let mut bindings = Bindings::new();
        for (name, value) in &params {
            bindings.set_scalar(name.clone(), *value);
        }
        for (name, value) in stimuli {
            bindings.set_scalar(name.clone(), *value);
        }
        let num_states = self.state_names.len();
        let mut rates = DMatrix::<f64>::zeros(num_states, num_states);
        let mut charges = DMatrix::<f64>::zeros(num_states, num_states);
        for transition in &self.transitions {
            let value = transition.rate.eval(&bindings).map_err(|err| {
                model_error("rate_eval", err.to_string())
            })?;
            let rate = value.as_scalar().ok_or_else(|| {
                model_error("rate_shape", "rate expression did not reduce to a scalar")
            })?;
            if !rate.is_finite() || rate < 0.0 {
                return Err(ClampError::Model(
                    ErrorInfo::new("rate_value", "rate must be finite and non-negative")
                        .with_context("rate", rate.to_string()),
                ));
            }
            rates[(transition.from, transition.to)] += rate;
            charges[(transition.from, transition.to)] = transition.charge;
        }
        for i in 0..num_states {
            let leaving: f64 = (0..num_states)
                .filter(|&j| j != i)
                .map(|j| rates[(i, j)])
                .sum();
            rates[(i, i)] = -leaving;
        }
        self.current_rates = rates;
        self.current_charges = charges;
        self.current_parameters = params;
        Ok(())
    }

    fn state_probabilities(&self) -> Result<RowDVector<f64>> {
        Ok(self.probabilities.clone())
    }

    fn state_attributes(&self) -> Result<BTreeMap<String, RowDVector<f64>>> {
        Ok(self.attributes.clone())
    }

    fn transition_rates(&self) -> Result<DMatrix<f64>> {
        Ok(self.current_rates.clone())
    }

    fn transition_charges(&self) -> Result<DMatrix<f64>> {
        Ok(self.current_charges.clone())
    }

    fn state_groups(&self) -> Vec<StateGroup> {
        self.config.groups.clone()
    }

    fn parameters(&self) -> BTreeMap<String, f64> {
        self.current_parameters.clone()
    }

    fn free_variables(&self) -> FreeVariables {
        let defaults = self.parameters_for(0);
        let mut free = FreeVariables::default();
        for variable in &self.config.free {
            free.x0
                .push(defaults.get(&variable.name).copied().unwrap_or(0.0));
            free.xmin.push(variable.min);
            free.xmax.push(variable.max);
        }
        free
    }

    fn set_free_variables(&mut self, x: &[f64]) -> Result<()> {
        if x.len() != self.config.free.len() {
            return Err(model_error(
                "free_variables",
                "free-variable count does not match the model",
            ));
        }
        for (variable, value) in self.config.free.iter().zip(x) {
            self.free_overrides.insert(variable.name.clone(), *value);
        }
        Ok(())
    }
}
