#![deny(missing_docs)]
//! Stimulus-clamp protocol tree: condition matrices, pulse synthesis,
//! compilation to a condition grid, epoch segmentation and reference data.

/// Epoch segmentation and the interned unique-epoch pool.
pub mod epoch;
/// Condition-matrix string parsing and padding.
pub mod matrix;
/// The protocol tree and its compilation.
pub mod protocol;
/// Stimulus channels and pulse-train synthesis.
pub mod pulse;
/// Reference-data tables and normalisation.
pub mod reference;
/// Per-condition simulation state.
pub mod sim;

pub use epoch::{find_epochs, Epoch, EpochPool, UniqueEpoch};
pub use matrix::{mat_lims, pad_matrix, parse_numeric_matrix, parse_string_matrix};
pub use protocol::{Protocol, SummaryNormalization, SummarySpec, WaveformSpec};
pub use pulse::{ExprErrorPolicy, Stimulus};
pub use reference::{Normalization, ReferenceData};
pub use sim::{AlignedReference, MonteCarloEvent, MonteCarloEventChain, Simulation};
