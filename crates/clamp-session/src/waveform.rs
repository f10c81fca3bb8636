//! Derived waveforms, state groups and per-condition summary scalars.

use std::collections::BTreeMap;

use nalgebra::DMatrix;

use clamp_core::{AbortFlag, ClampError, ErrorInfo, Result, SampleRange, StateGroup};
use clamp_engine::{probability_from_event_chains, Method};
use clamp_expr::{Bindings, ExprError, Value};
use clamp_protocol::Protocol;

fn shape_error(what: &str, name: &str, expr: &str) -> ClampError {
    ClampError::Shape(
        ErrorInfo::new("expr_shape", format!("invalid dimensions for {what} '{name}'"))
            .with_context("expr", expr),
    )
}

fn eval_error(expr: &str, err: ExprError) -> ClampError {
    let info = ErrorInfo::new("expr_eval", err.to_string()).with_context("expr", expr);
    match err {
        ExprError::Shape { .. } => ClampError::Shape(info),
        ExprError::Parse { .. }
        | ExprError::UnknownIdentifier(_)
        | ExprError::UnknownFunction(_)
        | ExprError::Arity { .. } => ClampError::Parse(info),
    }
}

/// Binds everything a waveform or summary expression may reference, sliced
/// to `range` when evaluating over a sub-window. Slice bindings alias the
/// caller's buffers; nothing is copied.
#[allow(clippy::too_many_arguments)]
fn bind_all<'a>(
    parameters: &BTreeMap<String, f64>,
    time: &'a [f64],
    stimuli: &'a BTreeMap<String, Vec<f64>>,
    state_names: &[String],
    state_columns: &'a [Vec<f64>],
    waveforms: &'a BTreeMap<String, Vec<f64>>,
    range: Option<SampleRange>,
) -> Bindings<'a> {
    let window = |v: &'a [f64]| -> &'a [f64] {
        match range {
            Some(r) => &v[r.first_pt..r.end()],
            None => v,
        }
    };
    let mut bindings = Bindings::new();
    for (name, value) in parameters {
        bindings.set_scalar(name.clone(), *value);
    }
    bindings.set_slice("t", window(time));
    for (name, values) in stimuli {
        bindings.set_slice(name.clone(), window(values));
    }
    for (index, column) in state_columns.iter().enumerate() {
        bindings.set_slice(state_names[index].clone(), window(column));
    }
    for (name, values) in waveforms {
        bindings.set_slice(name.clone(), window(values));
    }
    bindings
}

/// Builds derived waveforms and evaluates summary scalars for one variable
/// set of a protocol.
///
/// Per-state occupancies come from the stored probability matrix; Monte-Carlo
/// runs that only kept event chains are first reconstructed. Attribute
/// waveforms are assembled epoch-wise (attributes may vary with the
/// stimulus), state groups are summed, then Waveform children evaluate in
/// order so later expressions can reference earlier results. Summary
/// expressions evaluate over their X/Y sub-windows and must reduce to a
/// scalar.
#[allow(clippy::too_many_arguments)]
pub fn build_waveforms_and_summaries(
    protocol: &mut Protocol,
    pool: &clamp_protocol::EpochPool,
    state_names: &[String],
    state_groups: &[StateGroup],
    parameters: &BTreeMap<String, f64>,
    num_variable_sets: usize,
    variable_set: usize,
    method: Method,
    abort: &AbortFlag,
) -> Result<()> {
    let rows = protocol.rows();
    let cols = protocol.cols();
    for summary in protocol.summaries.iter_mut().filter(|s| s.active) {
        while summary.data_x.len() <= variable_set {
            summary.data_x.push(DMatrix::zeros(rows, cols));
        }
        while summary.data_y.len() <= variable_set {
            summary.data_y.push(DMatrix::zeros(rows, cols));
        }
        summary.data_x[variable_set] = DMatrix::zeros(rows, cols);
        summary.data_y[variable_set] = DMatrix::zeros(rows, cols);
        while summary.reference.len() < num_variable_sets {
            summary.reference.push(Vec::new());
        }
        let slots = &mut summary.reference[variable_set];
        if slots.len() < rows {
            slots.resize(rows, Default::default());
        }
        for slot in slots.iter_mut() {
            slot.range = SampleRange::default();
        }
    }

    for row in 0..rows {
        for col in 0..cols {
            if abort.is_set() {
                return Err(ClampError::aborted());
            }
            let sim = &mut protocol.simulations[row][col];
            let num_pts = sim.time.len();
            let num_states = pool.get(sim.epochs[0].unique).num_states();
            let stored = sim
                .probability
                .get(variable_set)
                .map_or(false, |p| p.nrows() == num_pts && p.ncols() == num_states);
            let probability: Option<DMatrix<f64>> = if stored {
                Some(sim.probability[variable_set].clone())
            } else if method == Method::MonteCarlo
                && sim
                    .events
                    .get(variable_set)
                    .map_or(false, |chains| !chains.is_empty())
            {
                Some(probability_from_event_chains(
                    &sim.time,
                    sim.end_time,
                    num_states,
                    &sim.events[variable_set],
                    abort,
                )?)
            } else {
                None
            };
            let state_columns: Vec<Vec<f64>> = match &probability {
                Some(p) => (0..num_states)
                    .map(|s| (0..num_pts).map(|k| p[(k, s)]).collect())
                    .collect(),
                None => Vec::new(),
            };

            while sim.waveforms.len() < num_variable_sets {
                sim.waveforms.push(BTreeMap::new());
            }
            sim.waveforms[variable_set].clear();
            if let Some(p) = &probability {
                // Attribute waveforms, epoch-wise.
                for epoch in &sim.epochs {
                    let unique = pool.get(epoch.unique);
                    for (attr_name, attr_row) in &unique.state_attributes {
                        let wave = sim.waveforms[variable_set]
                            .entry(attr_name.clone())
                            .or_insert_with(|| vec![0.0; num_pts]);
                        for k in epoch.first_pt..epoch.first_pt + epoch.num_pts {
                            wave[k] = (0..num_states).map(|s| p[(k, s)] * attr_row[s]).sum();
                        }
                    }
                }
                for group in state_groups.iter().filter(|g| g.active) {
                    let mut wave = vec![0.0; num_pts];
                    for &state in &group.state_indexes {
                        for (value, column_value) in wave.iter_mut().zip(&state_columns[state]) {
                            *value += column_value;
                        }
                    }
                    sim.waveforms[variable_set].insert(group.name.clone(), wave);
                }
            }

            for spec in &protocol.waveforms {
                if !spec.active {
                    continue;
                }
                if abort.is_set() {
                    return Err(ClampError::aborted());
                }
                let result = {
                    let bindings = bind_all(
                        parameters,
                        &sim.time,
                        &sim.stimuli,
                        state_names,
                        &state_columns,
                        &sim.waveforms[variable_set],
                        None,
                    );
                    let value =
                        clamp_expr::eval(&spec.expr, &bindings).map_err(|e| eval_error(&spec.expr, e))?;
                    match value {
                        Value::Vector(v) if v.len() == num_pts => v,
                        Value::Scalar(s) if num_pts == 1 => vec![s],
                        _ => return Err(shape_error("waveform", &spec.name, &spec.expr)),
                    }
                };
                sim.waveforms[variable_set].insert(spec.name.clone(), result);
            }

            for summary in protocol.summaries.iter_mut() {
                if !summary.active {
                    continue;
                }
                if abort.is_set() {
                    return Err(ClampError::aborted());
                }
                let expr_x = summary.expr_x_at(row, col).to_string();
                let expr_y = summary.expr_y_at(row, col).to_string();
                let scalar_at = |expr: &str, range: SampleRange| -> Result<f64> {
                    let bindings = bind_all(
                        parameters,
                        &sim.time,
                        &sim.stimuli,
                        state_names,
                        &state_columns,
                        &sim.waveforms[variable_set],
                        Some(range),
                    );
                    let value = clamp_expr::eval(expr, &bindings).map_err(|e| eval_error(expr, e))?;
                    value
                        .as_scalar()
                        .ok_or_else(|| shape_error("summary", &summary.name, expr))
                };
                let x = scalar_at(&expr_x, summary.range_x[row][col])?;
                let y = scalar_at(&expr_y, summary.range_y[row][col])?;
                summary.data_x[variable_set][(row, col)] = x;
                summary.data_y[variable_set][(row, col)] = y;
            }
        }
    }

    // Summary normalisation for this variable set; a zero denominator is
    // treated as one.
    for summary in protocol.summaries.iter_mut().filter(|s| s.active) {
        let data_y = &mut summary.data_y[variable_set];
        match summary.normalization {
            clamp_protocol::SummaryNormalization::None => {}
            clamp_protocol::SummaryNormalization::PerRow => {
                for row in 0..data_y.nrows() {
                    let mut denominator = 0.0f64;
                    for col in 0..data_y.ncols() {
                        denominator = denominator.max(data_y[(row, col)].abs());
                    }
                    if denominator != 0.0 {
                        for col in 0..data_y.ncols() {
                            data_y[(row, col)] /= denominator;
                        }
                    }
                }
            }
            clamp_protocol::SummaryNormalization::AllRows => {
                let denominator = data_y.amax();
                if denominator != 0.0 {
                    *data_y /= denominator;
                }
            }
        }
    }
    Ok(())
}
