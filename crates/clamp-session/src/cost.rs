//! Reference alignment for summaries and the χ² cost.

use clamp_core::{alignment_epsilon, sample_array, Result};
use clamp_protocol::{AlignedReference, Protocol, Simulation};

/// Resolves the simulated buffer a reference curve compares against:
/// a state occupancy column by name, else a stimulus, else a derived
/// waveform.
pub fn simulation_waveform(
    sim: &Simulation,
    state_names: &[String],
    variable_set: usize,
    name: &str,
) -> Option<Vec<f64>> {
    if let Some(state) = state_names.iter().position(|s| s == name) {
        let p = sim.probability.get(variable_set)?;
        if state < p.ncols() {
            return Some((0..p.nrows()).map(|k| p[(k, state)]).collect());
        }
        return None;
    }
    if let Some(stimulus) = sim.stimuli.get(name) {
        return Some(stimulus.clone());
    }
    sim.waveforms.get(variable_set)?.get(name).cloned()
}

/// Aligns reference curves to the X rows of same-named summaries.
///
/// Runs after every summary has been evaluated; each reference row is
/// resampled onto the summary's X values, trimmed, normalised, scaled and
/// stored for the cost.
pub fn align_summary_references(protocol: &mut Protocol, num_variable_sets: usize) -> Result<()> {
    let rows = protocol.rows();
    let cols = protocol.cols();
    for reference in &protocol.references {
        let Some(summary) = protocol
            .summaries
            .iter_mut()
            .find(|s| s.active && s.name == reference.name)
        else {
            continue;
        };
        let variable_set = reference.variable_set_index;
        if variable_set >= summary.data_x.len() {
            continue;
        }
        while summary.reference.len() < num_variable_sets {
            summary.reference.push(Vec::new());
        }
        let first_row = reference.row_index;
        for (i, (col_x, col_y)) in reference.column_pairs_xy().into_iter().enumerate() {
            let row = first_row + i;
            if row >= rows {
                break;
            }
            let ref_x = &reference.column_data[col_x];
            let ref_y = &reference.column_data[col_y];
            let x: Vec<f64> = (0..cols)
                .map(|col| summary.data_x[variable_set][(row, col)])
                .collect();
            let epsilon = alignment_epsilon(&x, ref_x);
            let mut resampled = vec![0.0; cols];
            let range = sample_array(ref_x, ref_y, &x, &mut resampled, reference.x0, epsilon);
            let slots = &mut summary.reference[variable_set];
            if slots.len() < rows {
                slots.resize(rows, AlignedReference::default());
            }
            if range.num_pts == 0 {
                continue;
            }
            let mut waveform = resampled[range.first_pt..range.end()].to_vec();
            reference.apply_normalization(&mut waveform);
            slots[row] = AlignedReference {
                waveform,
                range,
                weight: reference.weight,
            };
        }
    }
    Ok(())
}

/// Weighted sum-of-squares cost of one protocol.
///
/// Per-sample references contribute `(sim - ref)² · simWeight · refWeight`
/// over their aligned range, with masked samples excluded; summary
/// references contribute `(y - ref)² · refWeight` (no per-sample weights).
pub fn protocol_cost(protocol: &Protocol, state_names: &[String]) -> f64 {
    let mut cost = 0.0;
    for grid_row in &protocol.simulations {
        for sim in grid_row {
            for (variable_set, references) in sim.reference.iter().enumerate() {
                for (name, aligned) in references {
                    if aligned.range.num_pts == 0 {
                        continue;
                    }
                    let Some(data) = simulation_waveform(sim, state_names, variable_set, name)
                    else {
                        continue;
                    };
                    for k in 0..aligned.range.num_pts {
                        let index = aligned.range.first_pt + k;
                        if !sim.mask[index] {
                            continue;
                        }
                        let d = data[index] - aligned.waveform[k];
                        cost += d * d * sim.weight[index] * aligned.weight;
                    }
                }
            }
        }
    }
    for summary in protocol.summaries.iter().filter(|s| s.active) {
        for (variable_set, slots) in summary.reference.iter().enumerate() {
            let Some(data_y) = summary.data_y.get(variable_set) else {
                continue;
            };
            for (row, aligned) in slots.iter().enumerate() {
                if aligned.range.num_pts == 0 {
                    continue;
                }
                for k in 0..aligned.range.num_pts {
                    let d = data_y[(row, aligned.range.first_pt + k)] - aligned.waveform[k];
                    cost += d * d * aligned.weight;
                }
            }
        }
    }
    cost
}
