//! Stimulus channels and pulse-train synthesis onto a sample grid.

use clamp_expr::{Bindings, ExprError};
use serde::{Deserialize, Serialize};

use clamp_core::{default_epsilon, index_at_or_after, ClampError, ErrorInfo, Result};

use crate::matrix::{parse_numeric_matrix, parse_string_matrix};

/// How per-pulse expression evaluation failures are handled.
///
/// Optimiser sweeps can transiently hit undefined parameter regions, so
/// failures there contribute zero; a one-shot simulation surfaces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExprErrorPolicy {
    /// Surface expression errors to the caller.
    #[default]
    OneShot,
    /// Swallow expression errors; the failed pulse contributes zero.
    Sweep,
}

pub(crate) fn expr_error(context: &str, expr: &str, err: ExprError) -> ClampError {
    let info = ErrorInfo::new(context, err.to_string()).with_context("expr", expr);
    match err {
        ExprError::Shape { .. } => ClampError::Shape(info),
        _ => ClampError::Parse(info),
    }
}

/// One named stimulus channel of a protocol.
///
/// Every field is a condition-matrix string; the parsed matrices are filled
/// in during protocol compilation. The names `weight` and `mask` are
/// reserved: their waveforms feed the per-sample weights and the cost mask
/// instead of becoming stimulus channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stimulus {
    /// Channel name (stimuli with equal names are summed).
    pub name: String,
    /// Inactive stimuli are skipped during compilation.
    #[serde(default = "default_active")]
    pub active: bool,
    /// Pulse onset times.
    #[serde(default = "zero_string")]
    pub start: String,
    /// Pulse durations.
    #[serde(default = "zero_string")]
    pub duration: String,
    /// Pulse amplitudes.
    #[serde(default = "zero_string")]
    pub amplitude: String,
    /// Repetition periods.
    #[serde(default = "zero_string")]
    pub period: String,
    /// Repetition counts.
    #[serde(default = "one_string")]
    pub repeats: String,
    /// Optional expression over local time `t` shaping the pulse onset.
    #[serde(default)]
    pub onset_expr: String,
    /// Optional expression over local time `t` shaping the pulse tail.
    #[serde(default)]
    pub offset_expr: String,

    #[serde(skip)]
    pub(crate) starts: Vec<Vec<f64>>,
    #[serde(skip)]
    pub(crate) durations: Vec<Vec<f64>>,
    #[serde(skip)]
    pub(crate) amplitudes: Vec<Vec<f64>>,
    #[serde(skip)]
    pub(crate) periods: Vec<Vec<f64>>,
    #[serde(skip)]
    pub(crate) repeat_counts: Vec<Vec<f64>>,
    #[serde(skip)]
    pub(crate) onset_exprs: Vec<Vec<String>>,
    #[serde(skip)]
    pub(crate) offset_exprs: Vec<Vec<String>>,
}

fn default_active() -> bool {
    true
}

fn zero_string() -> String {
    "0".to_string()
}

fn one_string() -> String {
    "1".to_string()
}

impl Stimulus {
    /// Creates a square-pulse stimulus from condition-matrix strings.
    pub fn new(
        name: impl Into<String>,
        start: impl Into<String>,
        duration: impl Into<String>,
        amplitude: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            active: true,
            start: start.into(),
            duration: duration.into(),
            amplitude: amplitude.into(),
            period: zero_string(),
            repeats: one_string(),
            onset_expr: String::new(),
            offset_expr: String::new(),
            starts: Vec::new(),
            durations: Vec::new(),
            amplitudes: Vec::new(),
            periods: Vec::new(),
            repeat_counts: Vec::new(),
            onset_exprs: Vec::new(),
            offset_exprs: Vec::new(),
        }
    }

    /// Parses the condition-matrix strings; called during protocol
    /// compilation, before [`Stimulus::waveform`].
    pub fn parse_conditions(&mut self) -> Result<()> {
        self.starts = parse_numeric_matrix(&self.start)?;
        self.durations = parse_numeric_matrix(&self.duration)?;
        self.amplitudes = parse_numeric_matrix(&self.amplitude)?;
        self.periods = parse_numeric_matrix(&self.period)?;
        self.repeat_counts = parse_numeric_matrix(&self.repeats)?;
        self.onset_exprs = parse_string_matrix(&self.onset_expr);
        self.offset_exprs = parse_string_matrix(&self.offset_expr);
        Ok(())
    }

    /// Renders this channel's pulse train for condition (row, col) onto `time`.
    pub fn waveform(
        &self,
        time: &[f64],
        row: usize,
        col: usize,
        policy: ExprErrorPolicy,
    ) -> Result<Vec<f64>> {
        let n = time.len();
        let mut wave = vec![0.0; n];
        let epsilon = default_epsilon();
        let duration = self.durations[row][col];
        let amplitude = self.amplitudes[row][col];
        if duration <= epsilon || amplitude.abs() <= epsilon {
            return Ok(wave);
        }
        let repeats = self.repeat_counts[row][col].max(0.0) as usize;
        let period = self.periods[row][col];
        let onset_expr = &self.onset_exprs[row][col];
        let offset_expr = &self.offset_exprs[row][col];
        for rep in 0..repeats {
            let onset = self.starts[row][col] + rep as f64 * period;
            let offset = onset + duration;
            let first_onset_pt = index_at_or_after(time, onset, epsilon);
            if first_onset_pt >= n {
                continue;
            }
            let first_offset_pt = index_at_or_after(time, offset, epsilon).min(n);
            let num_onset_pts = first_offset_pt.saturating_sub(first_onset_pt);
            let num_offset_pts = n - first_offset_pt;
            if onset_expr.is_empty() && offset_expr.is_empty() {
                // Square pulse.
                for y in &mut wave[first_onset_pt..first_offset_pt] {
                    *y += amplitude;
                }
                continue;
            }
            if num_onset_pts > 0 && !onset_expr.is_empty() {
                self.add_shaped_segment(
                    onset_expr,
                    &time[first_onset_pt..first_offset_pt],
                    onset,
                    amplitude,
                    &mut wave[first_onset_pt..first_offset_pt],
                    policy,
                )?;
            }
            if num_offset_pts > 0 && !offset_expr.is_empty() {
                self.add_shaped_segment(
                    offset_expr,
                    &time[first_offset_pt..],
                    offset,
                    amplitude,
                    &mut wave[first_offset_pt..],
                    policy,
                )?;
            }
        }
        Ok(wave)
    }

    fn add_shaped_segment(
        &self,
        expr: &str,
        segment_time: &[f64],
        origin: f64,
        amplitude: f64,
        out: &mut [f64],
        policy: ExprErrorPolicy,
    ) -> Result<()> {
        let local_time: Vec<f64> = segment_time.iter().map(|t| t - origin).collect();
        let mut bindings = Bindings::new();
        bindings.set_slice("t", &local_time);
        let evaluated = clamp_expr::eval(expr, &bindings)
            .and_then(|value| value.add_scaled_into(out, amplitude));
        match evaluated {
            Ok(()) => Ok(()),
            Err(_) if policy == ExprErrorPolicy::Sweep => Ok(()),
            Err(err) => Err(expr_error("pulse_expr", expr, err)),
        }
    }
}
