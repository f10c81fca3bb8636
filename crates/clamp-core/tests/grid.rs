use clamp_core::{find_indexes_in_range, sample_array, sample_grid};

fn uniform_grid(start: f64, stop: f64, step: f64) -> Vec<f64> {
    let n = ((stop - start) / step).round() as usize;
    (0..=n).map(|i| start + i as f64 * step).collect()
}

#[test]
fn sample_grid_has_one_plus_floor_points() {
    let time = sample_grid(0.0, 5.0, 0.01).unwrap();
    assert_eq!(time.len(), 501);
    assert_eq!(time[0], 0.0);
    assert!((time[500] - 5.0).abs() < 1e-12);
    let time = sample_grid(1.0, 0.95, 0.1).unwrap();
    assert_eq!(time.len(), 10);
}

#[test]
fn sample_grid_rejects_bad_interval() {
    assert!(sample_grid(0.0, 1.0, 0.0).is_err());
    assert!(sample_grid(0.0, 1.0, -0.5).is_err());
}

#[test]
fn sample_grid_degenerates_for_padded_cells() {
    let time = sample_grid(2.0, 0.0, 0.0).unwrap();
    assert_eq!(time, vec![2.0]);
}

#[test]
fn find_indexes_covers_half_open_window() {
    let time = uniform_grid(0.0, 10.0, 0.1);
    let range = find_indexes_in_range(&time, 1.0, 3.0, 0.0);
    assert_eq!(range.first_pt, 10);
    assert_eq!(range.num_pts, 20);
}

#[test]
fn find_indexes_advances_past_offgrid_start() {
    let time = uniform_grid(0.0, 1.0, 0.1);
    // 0.55 sits between samples; the closest sample 0.5 lies below the
    // target, so the range starts at 0.6.
    let range = find_indexes_in_range(&time, 0.55, 0.85, 0.0);
    assert_eq!(range.first_pt, 6);
    assert_eq!(range.num_pts, 3);
}

#[test]
fn find_indexes_empty_window() {
    let time = uniform_grid(0.0, 1.0, 0.1);
    let range = find_indexes_in_range(&time, 0.5, 0.5, 0.0);
    assert_eq!(range.num_pts, 0);
}

#[test]
fn sample_array_identity_roundtrip() {
    // Reference on the simulation's own grid maps back exactly.
    let x = uniform_grid(0.0, 1.0, 0.1);
    let yref: Vec<f64> = x.iter().map(|t| t * t).collect();
    let mut y = vec![0.0; x.len()];
    let range = sample_array(&x, &yref, &x, &mut y, 0.0, 0.0);
    assert_eq!(range.first_pt, 0);
    assert_eq!(range.num_pts, x.len());
    for (a, b) in y.iter().zip(&yref) {
        assert_eq!(a, b);
    }
}

#[test]
fn sample_array_interpolates_between_reference_points() {
    let xref = [0.0, 1.0, 2.0, 3.0];
    let yref = [0.0, 10.0, 20.0, 30.0];
    let x = [0.5, 1.5, 2.5];
    let mut y = vec![0.0; 3];
    let range = sample_array(&xref, &yref, &x, &mut y, 0.0, 0.0);
    assert_eq!(range.first_pt, 0);
    assert_eq!(range.num_pts, 3);
    assert!((y[0] - 5.0).abs() < 1e-12);
    assert!((y[1] - 15.0).abs() < 1e-12);
    assert!((y[2] - 25.0).abs() < 1e-12);
}

#[test]
fn sample_array_shift_truncates_tail() {
    let xref = [0.0, 1.0, 2.0, 3.0];
    let yref = [0.0, 10.0, 20.0, 30.0];
    let x = [0.5, 1.5, 2.5];
    let mut y = vec![0.0; 3];
    // With x0 = 1 the sample at 2.5 would need xref = 3.5 and is dropped.
    let range = sample_array(&xref, &yref, &x, &mut y, 1.0, 0.0);
    assert_eq!(range.first_pt, 0);
    assert_eq!(range.num_pts, 2);
    assert!((y[0] - 15.0).abs() < 1e-12);
    assert!((y[1] - 25.0).abs() < 1e-12);
}

#[test]
fn sample_array_handles_decreasing_reference() {
    let xref = [3.0, 2.0, 1.0, 0.0];
    let yref = [30.0, 20.0, 10.0, 0.0];
    let x = [0.5, 1.5, 2.5];
    let mut y = vec![0.0; 3];
    let range = sample_array(&xref, &yref, &x, &mut y, 0.0, 0.0);
    assert_eq!(range.first_pt, 0);
    assert_eq!(range.num_pts, 3);
    assert!((y[0] - 5.0).abs() < 1e-12);
    assert!((y[2] - 25.0).abs() < 1e-12);
}
