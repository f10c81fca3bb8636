//! The protocol tree and its compilation into a condition grid.

use std::collections::BTreeMap;
use std::path::Path;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use clamp_core::{
    alignment_epsilon, find_indexes_in_range, sample_array, sample_grid, Result, RngHandle,
    SampleRange,
};

use crate::epoch::{find_epochs, EpochPool};
use crate::matrix::{mat_lims, pad_matrix, parse_numeric_matrix, parse_string_matrix};
use crate::pulse::{ExprErrorPolicy, Stimulus};
use crate::reference::ReferenceData;
use crate::sim::{AlignedReference, Simulation};

/// A derived waveform evaluated over the full sample grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveformSpec {
    /// Binding name the result is stored and re-exposed under.
    pub name: String,
    /// Inactive waveforms are skipped.
    #[serde(default = "default_active")]
    pub active: bool,
    /// Expression over t, stimuli, state occupancies and prior waveforms.
    pub expr: String,
}

/// Normalisation applied to a summary's Y matrix after evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryNormalization {
    /// Leave the matrix untouched.
    #[default]
    None,
    /// Divide each row by its largest absolute value.
    PerRow,
    /// Divide the whole matrix by its largest absolute value.
    AllRows,
}

/// A per-condition scalar pair (X, Y) evaluated over time sub-windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarySpec {
    /// Summary name; reference data of the same name aligns to its X row.
    pub name: String,
    /// Inactive summaries are skipped.
    #[serde(default = "default_active")]
    pub active: bool,
    /// X expression condition matrix.
    pub expr_x: String,
    /// Y expression condition matrix.
    pub expr_y: String,
    /// Start of the X evaluation window.
    #[serde(default = "zero_string")]
    pub start_x: String,
    /// Duration of the X evaluation window.
    #[serde(default = "zero_string")]
    pub duration_x: String,
    /// Start of the Y evaluation window.
    #[serde(default = "zero_string")]
    pub start_y: String,
    /// Duration of the Y evaluation window.
    #[serde(default = "zero_string")]
    pub duration_y: String,
    /// Normalisation of the Y matrix.
    #[serde(default)]
    pub normalization: SummaryNormalization,

    #[serde(skip)]
    pub(crate) expr_xs: Vec<Vec<String>>,
    #[serde(skip)]
    pub(crate) expr_ys: Vec<Vec<String>>,
    /// X-window sample ranges per condition cell.
    #[serde(skip)]
    pub range_x: Vec<Vec<SampleRange>>,
    /// Y-window sample ranges per condition cell.
    #[serde(skip)]
    pub range_y: Vec<Vec<SampleRange>>,
    /// Evaluated X scalars, one R×C matrix per variable set.
    #[serde(skip)]
    pub data_x: Vec<DMatrix<f64>>,
    /// Evaluated Y scalars, one R×C matrix per variable set.
    #[serde(skip)]
    pub data_y: Vec<DMatrix<f64>>,
    /// Aligned reference rows per variable set.
    #[serde(skip)]
    pub reference: Vec<Vec<AlignedReference>>,
}

impl SummarySpec {
    /// Creates an active summary with zero-length default windows.
    pub fn new(
        name: impl Into<String>,
        expr_x: impl Into<String>,
        expr_y: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            active: true,
            expr_x: expr_x.into(),
            expr_y: expr_y.into(),
            start_x: zero_string(),
            duration_x: zero_string(),
            start_y: zero_string(),
            duration_y: zero_string(),
            normalization: SummaryNormalization::default(),
            expr_xs: Vec::new(),
            expr_ys: Vec::new(),
            range_x: Vec::new(),
            range_y: Vec::new(),
            data_x: Vec::new(),
            data_y: Vec::new(),
            reference: Vec::new(),
        }
    }

    /// Expression for cell (row, col) of the X matrix.
    pub fn expr_x_at(&self, row: usize, col: usize) -> &str {
        &self.expr_xs[row][col]
    }

    /// Expression for cell (row, col) of the Y matrix.
    pub fn expr_y_at(&self, row: usize, col: usize) -> &str {
        &self.expr_ys[row][col]
    }
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

fn default_duration() -> String {
    "1".to_string()
}

fn default_sample_interval() -> String {
    "0.001".to_string()
}

/// A named stimulus-clamp protocol: condition matrices, stimulus children,
/// derived waveforms, summaries and reference data, compiled into an R×C
/// grid of [`Simulation`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Protocol {
    /// Protocol name.
    pub name: String,
    /// Simulation start times (condition matrix).
    #[serde(default = "zero_string")]
    pub start: String,
    /// Simulated durations (condition matrix).
    #[serde(default = "default_duration")]
    pub duration: String,
    /// Sample intervals (condition matrix).
    #[serde(default = "default_sample_interval")]
    pub sample_interval: String,
    /// Scalar cost weights (condition matrix).
    #[serde(default = "one_string")]
    pub weight: String,
    /// Replace the starting probabilities by the first epoch's stationary
    /// distribution.
    #[serde(default)]
    pub start_equilibrated: bool,
    /// Stimulus channels.
    #[serde(default)]
    pub stimuli: Vec<Stimulus>,
    /// Derived waveform children.
    #[serde(default)]
    pub waveforms: Vec<WaveformSpec>,
    /// Summary children.
    #[serde(default)]
    pub summaries: Vec<SummarySpec>,
    /// Reference data children.
    #[serde(default)]
    pub references: Vec<ReferenceData>,

    /// Compiled condition grid.
    #[serde(skip)]
    pub simulations: Vec<Vec<Simulation>>,
}

impl Protocol {
    /// Creates an empty protocol with the default condition matrices.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: zero_string(),
            duration: default_duration(),
            sample_interval: default_sample_interval(),
            weight: one_string(),
            start_equilibrated: false,
            stimuli: Vec::new(),
            waveforms: Vec::new(),
            summaries: Vec::new(),
            references: Vec::new(),
            simulations: Vec::new(),
        }
    }

    /// Number of condition rows after compilation.
    pub fn rows(&self) -> usize {
        self.simulations.len()
    }

    /// Number of condition columns after compilation.
    pub fn cols(&self) -> usize {
        self.simulations.first().map_or(0, Vec::len)
    }

    /// Loads every reference child's data file relative to `base_dir`.
    pub fn load_reference_files(&mut self, base_dir: &Path) -> Result<()> {
        for reference in &mut self.references {
            reference.load(base_dir)?;
        }
        Ok(())
    }

    /// Compiles condition matrices into the R×C simulation grid.
    ///
    /// Interns every epoch into the shared `pool`; simulations keep indices
    /// into it, so the pool must outlive them.
    pub fn compile(
        &mut self,
        pool: &mut EpochPool,
        master_seed: u64,
        protocol_index: usize,
        policy: ExprErrorPolicy,
    ) -> Result<()> {
        let mut starts = parse_numeric_matrix(&self.start)?;
        let mut durations = parse_numeric_matrix(&self.duration)?;
        let mut sample_intervals = parse_numeric_matrix(&self.sample_interval)?;
        let mut weights = parse_numeric_matrix(&self.weight)?;
        for stimulus in self.stimuli.iter_mut().filter(|s| s.active) {
            stimulus.parse_conditions()?;
        }
        for summary in self.summaries.iter_mut().filter(|s| s.active) {
            summary.expr_xs = parse_string_matrix(&summary.expr_x);
            summary.expr_ys = parse_string_matrix(&summary.expr_y);
        }

        // Maximum extent over the protocol and stimulus condition matrices.
        let mut rows = 1;
        let mut cols = 1;
        mat_lims(&starts, &mut rows, &mut cols);
        mat_lims(&durations, &mut rows, &mut cols);
        mat_lims(&sample_intervals, &mut rows, &mut cols);
        mat_lims(&weights, &mut rows, &mut cols);
        for stimulus in self.stimuli.iter().filter(|s| s.active) {
            mat_lims(&stimulus.starts, &mut rows, &mut cols);
            mat_lims(&stimulus.durations, &mut rows, &mut cols);
            mat_lims(&stimulus.amplitudes, &mut rows, &mut cols);
            mat_lims(&stimulus.periods, &mut rows, &mut cols);
            mat_lims(&stimulus.repeat_counts, &mut rows, &mut cols);
            mat_lims(&stimulus.onset_exprs, &mut rows, &mut cols);
            mat_lims(&stimulus.offset_exprs, &mut rows, &mut cols);
        }

        pad_matrix(&mut starts, rows, cols, 0.0);
        pad_matrix(&mut durations, rows, cols, 0.0);
        pad_matrix(&mut sample_intervals, rows, cols, 0.0);
        pad_matrix(&mut weights, rows, cols, 1.0);
        for stimulus in self.stimuli.iter_mut().filter(|s| s.active) {
            pad_matrix(&mut stimulus.starts, rows, cols, 0.0);
            pad_matrix(&mut stimulus.durations, rows, cols, 0.0);
            pad_matrix(&mut stimulus.amplitudes, rows, cols, 0.0);
            pad_matrix(&mut stimulus.periods, rows, cols, 0.0);
            pad_matrix(&mut stimulus.repeat_counts, rows, cols, 1.0);
            pad_matrix(&mut stimulus.onset_exprs, rows, cols, String::new());
            pad_matrix(&mut stimulus.offset_exprs, rows, cols, String::new());
        }
        let mut summary_starts = Vec::with_capacity(self.summaries.len());
        for summary in self.summaries.iter_mut() {
            if !summary.active {
                summary_starts.push((Vec::new(), Vec::new(), Vec::new(), Vec::new()));
                continue;
            }
            pad_matrix(&mut summary.expr_xs, rows, cols, String::new());
            pad_matrix(&mut summary.expr_ys, rows, cols, String::new());
            let mut start_xs = parse_numeric_matrix(&summary.start_x)?;
            let mut duration_xs = parse_numeric_matrix(&summary.duration_x)?;
            let mut start_ys = parse_numeric_matrix(&summary.start_y)?;
            let mut duration_ys = parse_numeric_matrix(&summary.duration_y)?;
            pad_matrix(&mut start_xs, rows, cols, 0.0);
            pad_matrix(&mut duration_xs, rows, cols, 0.0);
            pad_matrix(&mut start_ys, rows, cols, 0.0);
            pad_matrix(&mut duration_ys, rows, cols, 0.0);
            summary.range_x = vec![vec![SampleRange::default(); cols]; rows];
            summary.range_y = vec![vec![SampleRange::default(); cols]; rows];
            summary.data_x.clear();
            summary.data_y.clear();
            summary.reference.clear();
            summary_starts.push((
                start_xs.into_iter().flatten().collect(),
                duration_xs.into_iter().flatten().collect(),
                start_ys.into_iter().flatten().collect(),
                duration_ys.into_iter().flatten().collect(),
            ));
        }

        let mut grid: Vec<Vec<Simulation>> = Vec::with_capacity(rows);
        for row in 0..rows {
            let mut grid_row = Vec::with_capacity(cols);
            for col in 0..cols {
                let time = sample_grid(
                    starts[row][col],
                    durations[row][col],
                    sample_intervals[row][col],
                )?;
                let end_time = starts[row][col] + durations[row][col];
                let n = time.len();
                let mut weight = vec![weights[row][col]; n];
                let mut mask_accum = vec![0.0; n];
                let mut stimuli: BTreeMap<String, Vec<f64>> = BTreeMap::new();
                for stimulus in self.stimuli.iter().filter(|s| s.active) {
                    let wave = stimulus.waveform(&time, row, col, policy)?;
                    if stimulus.name.eq_ignore_ascii_case("weight") {
                        for (w, x) in weight.iter_mut().zip(&wave) {
                            *w += x;
                        }
                    } else if stimulus.name.eq_ignore_ascii_case("mask") {
                        for (m, x) in mask_accum.iter_mut().zip(&wave) {
                            *m += x;
                        }
                    } else if let Some(channel) = stimuli.get_mut(&stimulus.name) {
                        for (y, x) in channel.iter_mut().zip(&wave) {
                            *y += x;
                        }
                    } else {
                        stimuli.insert(stimulus.name.clone(), wave);
                    }
                }
                let mask: Vec<bool> = mask_accum.iter().map(|&m| m == 0.0).collect();
                let mut epochs = find_epochs(&time, end_time, &stimuli);
                for epoch in &mut epochs {
                    epoch.unique = pool.intern(&epoch.stimuli);
                }
                for (summary, windows) in self.summaries.iter_mut().zip(&summary_starts) {
                    if !summary.active {
                        continue;
                    }
                    let idx = row * cols + col;
                    let (start_xs, duration_xs, start_ys, duration_ys) = windows;
                    let sx = start_xs[idx];
                    summary.range_x[row][col] =
                        find_indexes_in_range(&time, sx, sx + duration_xs[idx], 0.0);
                    let sy = start_ys[idx];
                    summary.range_y[row][col] =
                        find_indexes_in_range(&time, sy, sy + duration_ys[idx], 0.0);
                }
                grid_row.push(Simulation {
                    time,
                    end_time,
                    weight,
                    mask,
                    stimuli,
                    epochs,
                    probability: Vec::new(),
                    waveforms: Vec::new(),
                    events: Vec::new(),
                    reference: Vec::new(),
                    rng: RngHandle::for_simulation(master_seed, protocol_index, row, col),
                });
            }
            grid.push(grid_row);
        }

        self.attach_references(&mut grid, rows, cols);
        self.simulations = grid;
        Ok(())
    }

    /// Resamples non-summary reference children onto their target grids.
    fn attach_references(&self, grid: &mut [Vec<Simulation>], rows: usize, cols: usize) {
        let summary_names: Vec<&str> = self.summaries.iter().map(|s| s.name.as_str()).collect();
        for reference in &self.references {
            if summary_names.contains(&reference.name.as_str()) {
                continue;
            }
            let row = reference.row_index;
            if row >= rows {
                continue;
            }
            for (i, (col_x, col_y)) in reference.column_pairs_xy().into_iter().enumerate() {
                let col = reference.column_index + i;
                if col >= cols {
                    break;
                }
                let sim = &mut grid[row][col];
                let ref_x = &reference.column_data[col_x];
                let ref_y = &reference.column_data[col_y];
                let epsilon = alignment_epsilon(&sim.time, ref_x);
                let mut resampled = vec![0.0; sim.time.len()];
                let range =
                    sample_array(ref_x, ref_y, &sim.time, &mut resampled, reference.x0, epsilon);
                if range.num_pts == 0 {
                    continue;
                }
                let mut waveform = resampled[range.first_pt..range.end()].to_vec();
                reference.apply_normalization(&mut waveform);
                let slot = reference.variable_set_index;
                while sim.reference.len() <= slot {
                    sim.reference.push(BTreeMap::new());
                }
                sim.reference[slot].insert(
                    reference.name.clone(),
                    AlignedReference {
                        waveform,
                        range,
                        weight: reference.weight,
                    },
                );
            }
        }
    }
}
