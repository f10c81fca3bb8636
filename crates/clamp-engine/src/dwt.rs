//! Export of Monte-Carlo event chains in the `.dwt` dwell-table format.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use clamp_core::{ClampError, ErrorInfo, Result};
use clamp_protocol::Simulation;

/// Writes one `.dwt` file per (variable set, row, col) of a simulation grid.
///
/// Files are named `<base> (v,r,c).dwt`; a `.dwt` extension on `base` is
/// stripped first. Each chain becomes a 1-based segment whose dwell count
/// excludes the final event, followed by one `state<TAB>duration_ms` line per
/// event; lines end with CRLF and durations are in milliseconds.
pub fn write_event_chains_dwt(base: &Path, simulations: &[Vec<Simulation>]) -> Result<()> {
    let base_str = base.display().to_string();
    let base_str = base_str.strip_suffix(".dwt").unwrap_or(&base_str).to_string();
    for (row, columns) in simulations.iter().enumerate() {
        for (col, sim) in columns.iter().enumerate() {
            for (variable_set, chains) in sim.events.iter().enumerate() {
                let path = format!("{base_str} ({variable_set},{row},{col}).dwt");
                let mut out = String::new();
                for (segment, chain) in chains.iter().enumerate() {
                    let _ = write!(
                        out,
                        "Segment: {} Dwells: {} Sampling(ms): 1\r\n",
                        segment + 1,
                        chain.len().saturating_sub(1)
                    );
                    for event in chain {
                        let _ = write!(out, "{}\t{}\r\n", event.state, event.duration * 1000.0);
                    }
                    out.push_str("\r\n");
                }
                fs::write(&path, out).map_err(|err| {
                    ClampError::Internal(
                        ErrorInfo::new("dwt_write", err.to_string()).with_context("path", path),
                    )
                })?;
            }
        }
    }
    Ok(())
}
