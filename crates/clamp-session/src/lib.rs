#![deny(missing_docs)]
//! Session layer of the clampsim workspace: parallel dispatch over
//! protocols and variable sets, derived waveforms and summaries, reference
//! cost and the optimiser variable-mapping bridge.

/// Summary reference alignment and the χ² cost.
pub mod cost;
/// Simulation options.
pub mod options;
/// Optimiser variable-mapping transforms and cost bridge.
pub mod optim;
/// Session orchestration.
pub mod session;
/// Derived waveforms, state groups and summaries.
pub mod waveform;

pub use cost::{align_summary_references, protocol_cost, simulation_waveform};
pub use optim::{
    angular_to_linear, evaluate_cost, linear_to_angular, map_to_angular, map_to_linear,
};
pub use options::SimOptions;
pub use session::Session;
pub use waveform::build_waveforms_and_summaries;
