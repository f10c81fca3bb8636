#![deny(missing_docs)]
//! Numerical engine for stimulus-clamp simulations: per-epoch model
//! preparation, closed-form spectral propagation and Monte-Carlo dwell-chain
//! generation with its probability sampler.

/// Event-chain export in the `.dwt` dwell-table format.
pub mod dwt;
/// Monte-Carlo dwell-chain generation and sampling.
pub mod monte_carlo;
/// Per-unique-epoch model queries and decomposition.
pub mod prepare;
/// Closed-form occupancy propagation.
pub mod propagate;
/// Spectral decomposition of rate matrices.
pub mod spectral;

pub use dwt::write_event_chains_dwt;
pub use monte_carlo::{
    equilibrium_probability, monte_carlo_simulation, probability_from_event_chains,
    MonteCarloOptions,
};
pub use prepare::{prepare_epochs, Method};
pub use propagate::{max_probability_error, spectral_simulation};
pub use spectral::spectral_expansion;
