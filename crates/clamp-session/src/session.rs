//! Session orchestration across protocols, variable sets and the task pool.

use rayon::prelude::*;

use clamp_core::{AbortFlag, ClampError, ErrorInfo, ModelProvider, Result};
use clamp_engine::{
    max_probability_error, monte_carlo_simulation, prepare_epochs, spectral_simulation, Method,
    MonteCarloOptions,
};
use clamp_protocol::{EpochPool, Protocol, Simulation};

use crate::cost::{align_summary_references, protocol_cost};
use crate::options::SimOptions;
use crate::waveform::build_waveforms_and_summaries;

/// A simulator session: one model, a set of protocols, the shared
/// unique-epoch pool and the options and abort flag every task observes.
///
/// The pool is owned here so it outlives every simulation holding indices
/// into it; it is rebuilt by [`Session::init`] and dropped with the session.
pub struct Session {
    model: Box<dyn ModelProvider>,
    /// Protocols simulated by this session.
    pub protocols: Vec<Protocol>,
    /// Session options.
    pub options: SimOptions,
    /// First task error captured during an aborted run.
    pub message: Option<String>,
    pool: EpochPool,
    abort: AbortFlag,
    state_names: Vec<String>,
}

impl Session {
    /// Creates a session over a model and its protocols.
    pub fn new(model: Box<dyn ModelProvider>, protocols: Vec<Protocol>, options: SimOptions) -> Self {
        Self {
            model,
            protocols,
            options,
            message: None,
            pool: EpochPool::new(),
            abort: AbortFlag::new(),
            state_names: Vec::new(),
        }
    }

    /// Clone of the shared cancellation flag, for the host to trigger.
    pub fn abort_flag(&self) -> AbortFlag {
        self.abort.clone()
    }

    /// Ordered state names reported by the model.
    pub fn state_names(&self) -> &[String] {
        &self.state_names
    }

    /// The shared unique-epoch pool.
    pub fn pool(&self) -> &EpochPool {
        &self.pool
    }

    /// Mutable access to the model, for the optimiser bridge.
    pub fn model_mut(&mut self) -> &mut dyn ModelProvider {
        self.model.as_mut()
    }

    /// Initialises the model, rebuilds the epoch pool and compiles every
    /// protocol into its condition grid.
    pub fn init(&mut self) -> Result<()> {
        self.abort.reset();
        self.message = None;
        self.state_names = self.model.init()?;
        self.pool.clear();
        for (index, protocol) in self.protocols.iter_mut().enumerate() {
            protocol.compile(
                &mut self.pool,
                self.options.master_seed,
                index,
                self.options.expr_errors,
            )?;
        }
        tracing::debug!(
            protocols = self.protocols.len(),
            unique_epochs = self.pool.len(),
            "session compiled"
        );
        Ok(())
    }

    /// Compiles and runs the session in one step.
    pub fn simulate(&mut self) -> Result<()> {
        let result = self.init().and_then(|()| self.run_inner());
        self.finish(result)
    }

    /// Re-runs an already-compiled session (used by the optimiser loop,
    /// where only model parameters change between iterations).
    pub fn run(&mut self) -> Result<()> {
        let result = self.run_inner();
        self.finish(result)
    }

    fn finish(&mut self, result: Result<()>) -> Result<()> {
        if let Err(err) = &result {
            self.abort.trigger();
            self.message = Some(err.to_string());
        }
        result
    }

    fn run_inner(&mut self) -> Result<()> {
        if self.options.threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.options.threads)
                .build()
                .map_err(|err| {
                    ClampError::Internal(ErrorInfo::new("thread_pool", err.to_string()))
                })?;
            pool.install(|| self.run_stages())
        } else {
            self.run_stages()
        }
    }

    fn run_stages(&mut self) -> Result<()> {
        let method = self.options.method;
        let mc_opts = MonteCarloOptions {
            num_runs: self.options.num_monte_carlo_runs,
            accumulate_runs: self.options.accumulate_monte_carlo_runs,
            sample_runs: self.options.sample_probability_from_event_chains,
        };
        let num_variable_sets = self.model.num_variable_sets();
        for variable_set in 0..num_variable_sets {
            tracing::debug!(variable_set, "preparing unique epochs");
            prepare_epochs(
                &mut self.pool,
                self.model.as_mut(),
                variable_set,
                method,
                &self.abort,
            )?;

            tracing::debug!(variable_set, "running simulations");
            let pool = &self.pool;
            let abort = &self.abort;
            let mut cells: Vec<(bool, &mut Simulation)> = Vec::new();
            for protocol in self.protocols.iter_mut() {
                let start_equilibrated = protocol.start_equilibrated;
                for sim in protocol.simulations.iter_mut().flatten() {
                    cells.push((start_equilibrated, sim));
                }
            }
            cells
                .into_par_iter()
                .map(|(start_equilibrated, sim)| {
                    if abort.is_set() {
                        return Err(ClampError::aborted());
                    }
                    if sim.epochs.is_empty() {
                        return Ok(());
                    }
                    let starting = pool.get(sim.epochs[0].unique).state_probabilities.clone();
                    let result = match method {
                        Method::EigenSolver => spectral_simulation(
                            sim,
                            pool,
                            starting,
                            start_equilibrated,
                            variable_set,
                            abort,
                        ),
                        Method::MonteCarlo => monte_carlo_simulation(
                            sim,
                            pool,
                            starting,
                            &mc_opts,
                            start_equilibrated,
                            variable_set,
                            abort,
                        ),
                    };
                    if result.is_err() {
                        abort.trigger();
                    }
                    result
                })
                .collect::<Result<Vec<()>>>()?;

            tracing::debug!(variable_set, "building waveforms and summaries");
            let state_groups = self.model.state_groups();
            let parameters = self.model.parameters();
            for protocol in self.protocols.iter_mut() {
                build_waveforms_and_summaries(
                    protocol,
                    &self.pool,
                    &self.state_names,
                    &state_groups,
                    &parameters,
                    num_variable_sets,
                    variable_set,
                    method,
                    &self.abort,
                )?;
            }
        }
        for protocol in self.protocols.iter_mut() {
            align_summary_references(protocol, num_variable_sets)?;
        }
        Ok(())
    }

    /// Total χ² cost across every protocol.
    pub fn cost(&self) -> f64 {
        self.protocols
            .iter()
            .map(|protocol| protocol_cost(protocol, &self.state_names))
            .sum()
    }

    /// Largest deviation of any probability row sum from one.
    pub fn max_probability_error(&self) -> f64 {
        self.protocols
            .iter()
            .flat_map(|protocol| protocol.simulations.iter().flatten())
            .map(max_probability_error)
            .fold(0.0, f64::max)
    }
}
