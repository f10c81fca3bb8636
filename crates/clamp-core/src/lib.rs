#![deny(missing_docs)]
//! Core primitives for the clampsim stimulus-clamp simulator: structured
//! errors, deterministic RNG substreams, sample-grid helpers, the shared
//! cancellation flag and the model-provider seam.

/// Shared cancellation flag polled at task-safe points.
pub mod abort;
/// Structured error types and the workspace `Result` alias.
pub mod errors;
/// Sample grids, range lookup and the reference resampler.
pub mod grid;
/// Model-provider trait and free-variable descriptors.
pub mod model;
/// Per-simulation RNG substreams.
pub mod rng;

pub use abort::AbortFlag;
pub use errors::{ClampError, ErrorInfo, Result};
pub use grid::{
    alignment_epsilon, default_epsilon, find_indexes_in_range, index_at_or_after, sample_array,
    sample_grid, SampleRange,
};
pub use model::{FreeVariables, ModelProvider, StateGroup};
pub use rng::{simulation_seed, RngHandle};
