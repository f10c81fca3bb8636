//! Uniform sample grids, range lookup and reference resampling.

use crate::errors::{ClampError, ErrorInfo, Result};

/// Default comparison tolerance: five machine epsilons.
pub fn default_epsilon() -> f64 {
    f64::EPSILON * 5.0
}

/// A contiguous index range into a sample grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleRange {
    /// Index of the first sample in the range.
    pub first_pt: usize,
    /// Number of samples in the range (zero when the range is empty).
    pub num_pts: usize,
}

impl SampleRange {
    /// Exclusive end index of the range.
    pub fn end(&self) -> usize {
        self.first_pt + self.num_pts
    }
}

/// Builds the uniform time grid for one protocol condition.
///
/// `N = 1 + floor(duration / sample_interval)` points starting at `start`;
/// the grid is endpoint-exclusive with respect to `start + duration`.
pub fn sample_grid(start: f64, duration: f64, sample_interval: f64) -> Result<Vec<f64>> {
    if duration <= 0.0 {
        // Cells padded out beyond a protocol's specified extent degenerate to
        // a single sample.
        return Ok(vec![start]);
    }
    if !(sample_interval > 0.0) {
        return Err(ClampError::Parse(
            ErrorInfo::new("sample_interval", "sample interval must be positive")
                .with_context("value", sample_interval.to_string()),
        ));
    }
    let num_steps = (duration / sample_interval).floor() as usize;
    Ok((0..=num_steps)
        .map(|i| start + i as f64 * sample_interval)
        .collect())
}

fn closest_index(time: &[f64], target: f64) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, &t) in time.iter().enumerate() {
        let dist = (t - target).abs();
        if dist < best_dist {
            best_dist = dist;
            best = i;
        }
    }
    best
}

/// Index-selection rule shared by the pulse synthesiser and range lookup:
/// the closest grid index to `target`, advanced by one when the closest
/// sample lies below `target - epsilon`. May return `time.len()` when the
/// target lies past the grid.
pub fn index_at_or_after(time: &[f64], target: f64, epsilon: f64) -> usize {
    if time.is_empty() {
        return 0;
    }
    let mut index = closest_index(time, target);
    if time[index] < target - epsilon {
        index += 1;
    }
    index
}

/// Locates the sample range covering `[start, stop)` on `time`.
///
/// The closest grid index to each bound is used; when the closest sample lies
/// below `target - epsilon` the index advances by one. Pass `epsilon = 0.0`
/// to use [`default_epsilon`].
pub fn find_indexes_in_range(time: &[f64], start: f64, stop: f64, epsilon: f64) -> SampleRange {
    let epsilon = if epsilon == 0.0 {
        default_epsilon()
    } else {
        epsilon
    };
    if time.is_empty() {
        return SampleRange::default();
    }
    let first_pt = index_at_or_after(time, start, epsilon);
    let mut num_pts = 0;
    if first_pt < time.len() {
        let end_pt = index_at_or_after(time, stop, epsilon);
        num_pts = end_pt.saturating_sub(first_pt);
    }
    SampleRange { first_pt, num_pts }
}

/// Resamples a reference curve `yref(xref - x0)` onto the grid `x`.
///
/// Writes interpolated values into `y` and returns the range of `x` indices
/// that received reference data. Both `x` and `xref` must be densely packed
/// and monotonic; either may increase or decrease independently (decreasing
/// arrays are iterated in reverse). Samples outside the reference domain are
/// left untouched. Pass `epsilon = 0.0` to use [`default_epsilon`].
pub fn sample_array(
    xref: &[f64],
    yref: &[f64],
    x: &[f64],
    y: &mut [f64],
    x0: f64,
    epsilon: f64,
) -> SampleRange {
    let epsilon = if epsilon == 0.0 {
        default_epsilon()
    } else {
        epsilon
    };
    let n = x.len() as i64;
    let nref = xref.len() as i64;
    let increasing = n < 2 || x[1] - x[0] >= 0.0;
    let ref_increasing = nref < 2 || xref[1] - xref[0] >= 0.0;
    let mut i: i64 = if increasing { 0 } else { n - 1 };
    let mut iref: i64 = if ref_increasing { 0 } else { nref - 1 };
    let di: i64 = if increasing { 1 } else { -1 };
    let diref: i64 = if ref_increasing { 1 } else { -1 };
    let mut first_pt: i64 = -1;
    while i >= 0 && i < n && iref >= 0 && iref < nref {
        let xi = x[i as usize];
        let xr = xref[iref as usize] - x0;
        if xi < xr - epsilon {
            // Sample point before the start of the reference data.
            i += di;
        } else if (xi - xr).abs() < epsilon {
            y[i as usize] = yref[iref as usize];
            if first_pt == -1 {
                first_pt = i;
            }
            i += di;
            iref += diref;
        } else {
            let jref = iref + diref;
            if jref >= 0 && jref < nref && xref[jref as usize] - x0 > xi {
                // The next reference point brackets the sample; interpolate.
                let dx = xref[jref as usize] - xref[iref as usize];
                let dy = yref[jref as usize] - yref[iref as usize];
                y[i as usize] = yref[iref as usize] + (dy / dx) * (xi - xr);
                if first_pt == -1 {
                    first_pt = i;
                }
                i += di;
            }
            iref = jref;
        }
    }
    if first_pt == -1 {
        SampleRange::default()
    } else if increasing {
        SampleRange {
            first_pt: first_pt as usize,
            num_pts: (i - first_pt) as usize,
        }
    } else {
        SampleRange {
            first_pt: (i + 1) as usize,
            num_pts: (first_pt - i) as usize,
        }
    }
}

/// Alignment tolerance used when resampling reference data: 1e-5 of the
/// smallest consecutive spacing of either grid.
pub fn alignment_epsilon(x: &[f64], xref: &[f64]) -> f64 {
    let min_spacing = |v: &[f64]| {
        v.windows(2)
            .map(|w| (w[1] - w[0]).abs())
            .fold(f64::INFINITY, f64::min)
    };
    let eps = min_spacing(x).min(min_spacing(xref)) * 1e-5;
    if eps.is_finite() && eps > 0.0 {
        eps
    } else {
        default_epsilon()
    }
}
