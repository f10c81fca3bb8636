//! Reference-data tables and their normalisation settings.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use clamp_core::{ClampError, ErrorInfo, Result};

/// Normalisation applied to an aligned reference curve before scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Normalization {
    /// Leave values untouched.
    #[default]
    None,
    /// Divide by the maximum value.
    ToMax,
    /// Divide by the minimum value.
    ToMin,
    /// Divide by whichever of min/max has the larger absolute value.
    ToAbsMinMax,
}

/// External measured data attached to a protocol.
///
/// The name selects what the curve is compared against: a state, stimulus or
/// derived waveform for per-sample references, or a summary of the same name
/// for summary references. Column data is loaded from a tab/space separated
/// text file whose path resolves relative to the protocol file's directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceData {
    /// Name of the simulated buffer or summary this curve is compared to.
    pub name: String,
    /// Data file path, resolved against the protocol directory when relative.
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// Shift applied to the reference x axis (`y(x)` reads `yref(xref - x0)`).
    #[serde(default)]
    pub x0: f64,
    /// Scale applied after normalisation.
    #[serde(default = "one")]
    pub scale: f64,
    /// Global weight of this curve's cost contribution.
    #[serde(default = "one")]
    pub weight: f64,
    /// Normalisation applied to the aligned curve.
    #[serde(default)]
    pub normalization: Normalization,
    /// Variable set the curve belongs to.
    #[serde(default)]
    pub variable_set_index: usize,
    /// Condition row the first (x, y) pair maps to.
    #[serde(default)]
    pub row_index: usize,
    /// Condition column the first (x, y) pair maps to.
    #[serde(default)]
    pub column_index: usize,

    /// Column titles from the data file's first non-empty line.
    #[serde(skip)]
    pub column_titles: Vec<String>,
    /// Column vectors from the data file.
    #[serde(skip)]
    pub column_data: Vec<Vec<f64>>,
}

fn one() -> f64 {
    1.0
}

impl ReferenceData {
    /// Loads the reference file, resolving relative paths against `base_dir`.
    pub fn load(&mut self, base_dir: &Path) -> Result<()> {
        let Some(file) = &self.file else {
            return Ok(());
        };
        let path = if file.is_relative() {
            base_dir.join(file)
        } else {
            file.clone()
        };
        let text = fs::read_to_string(&path).map_err(|err| {
            ClampError::Parse(
                ErrorInfo::new("reference_file", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        self.parse_text(&text)
    }

    /// Parses tab/space separated reference text.
    ///
    /// The first non-empty line holds tab-separated column titles (empty
    /// parts skipped). Each later line is a numeric row; rows with fewer
    /// fields than titles are zero-filled, and a non-numeric field fails
    /// with the offending text.
    pub fn parse_text(&mut self, text: &str) -> Result<()> {
        let mut lines = text.lines().filter(|line| !line.trim().is_empty());
        let Some(header) = lines.next() else {
            self.column_titles.clear();
            self.column_data.clear();
            return Ok(());
        };
        let titles: Vec<String> = header
            .split('\t')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect();
        let num_columns = titles.len();
        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); num_columns];
        for line in lines {
            let fields: Vec<&str> = line
                .split(|c| c == ' ' || c == '\t')
                .filter(|field| !field.is_empty())
                .collect();
            for col in 0..num_columns {
                let value = match fields.get(col) {
                    Some(field) => field.parse::<f64>().map_err(|_| {
                        ClampError::Parse(
                            ErrorInfo::new("reference_field", "non-numeric reference data")
                                .with_context("field", *field),
                        )
                    })?,
                    None => 0.0,
                };
                columns[col].push(value);
            }
        }
        self.column_titles = titles;
        self.column_data = columns;
        Ok(())
    }

    /// Infers (x, y) column pairings from the column titles.
    ///
    /// With an even column count and `titles[0] == titles[2]` the layout is
    /// XYXY… and pairs are (0,1), (2,3), …; otherwise column 0 is x and each
    /// later column is a separate y.
    pub fn column_pairs_xy(&self) -> Vec<(usize, usize)> {
        let n = self.column_data.len();
        if n == 0 {
            return Vec::new();
        }
        if n % 2 == 0 && self.column_titles.len() > 2 && self.column_titles[0] == self.column_titles[2]
        {
            (0..n / 2).map(|i| (2 * i, 2 * i + 1)).collect()
        } else {
            (1..n).map(|i| (0, i)).collect()
        }
    }

    /// Applies normalisation and scale to an aligned curve in place.
    pub fn apply_normalization(&self, wave: &mut [f64]) {
        if wave.is_empty() {
            return;
        }
        let denominator = match self.normalization {
            Normalization::None => 1.0,
            Normalization::ToMax => wave.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Normalization::ToMin => wave.iter().copied().fold(f64::INFINITY, f64::min),
            Normalization::ToAbsMinMax => {
                let min = wave.iter().copied().fold(f64::INFINITY, f64::min);
                let max = wave.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                if max.abs() >= min.abs() {
                    max
                } else {
                    min
                }
            }
        };
        if denominator != 1.0 {
            for y in wave.iter_mut() {
                *y /= denominator;
            }
        }
        if self.scale != 1.0 {
            for y in wave.iter_mut() {
                *y *= self.scale;
            }
        }
    }
}
