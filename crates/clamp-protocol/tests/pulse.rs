use clamp_core::sample_grid;
use clamp_protocol::{ExprErrorPolicy, Stimulus};

fn prepared(mut stimulus: Stimulus) -> Stimulus {
    stimulus.parse_conditions().unwrap();
    stimulus
}

#[test]
fn repeated_square_pulse_train() {
    let mut stimulus = Stimulus::new("v", "1", "2", "5");
    stimulus.period = "3".to_string();
    stimulus.repeats = "3".to_string();
    let stimulus = prepared(stimulus);
    let time = sample_grid(0.0, 10.0, 0.1).unwrap();
    let wave = stimulus.waveform(&time, 0, 0, ExprErrorPolicy::OneShot).unwrap();
    // 5 on [1,3) ∪ [4,6) ∪ [7,9), zero elsewhere.
    let nonzero = wave.iter().filter(|&&y| y != 0.0).count();
    assert_eq!(nonzero, 60);
    assert!(wave.iter().all(|&y| y == 0.0 || y == 5.0));
    assert_eq!(wave[9], 0.0);
    assert_eq!(wave[10], 5.0);
    assert_eq!(wave[29], 5.0);
    assert_eq!(wave[30], 0.0);
    assert_eq!(wave[40], 5.0);
    assert_eq!(wave[70], 5.0);
    assert_eq!(wave[90], 0.0);
}

#[test]
fn onset_expression_shapes_the_pulse() {
    let mut stimulus = Stimulus::new("ramp", "0", "1", "2");
    stimulus.onset_expr = "t".to_string();
    let stimulus = prepared(stimulus);
    let time = sample_grid(0.0, 2.0, 0.1).unwrap();
    let wave = stimulus.waveform(&time, 0, 0, ExprErrorPolicy::OneShot).unwrap();
    for (k, expected) in (0..10).map(|k| (k, k as f64 * 0.1 * 2.0)) {
        assert!((wave[k] - expected).abs() < 1e-12, "sample {k}");
    }
    for &y in &wave[10..] {
        assert_eq!(y, 0.0);
    }
}

#[test]
fn offset_expression_runs_to_the_end_of_the_grid() {
    let mut stimulus = Stimulus::new("decay", "0", "1", "3");
    stimulus.onset_expr = "t * 0 + 1".to_string();
    stimulus.offset_expr = "exp(-t)".to_string();
    let stimulus = prepared(stimulus);
    let time = sample_grid(0.0, 3.0, 0.5).unwrap();
    let wave = stimulus.waveform(&time, 0, 0, ExprErrorPolicy::OneShot).unwrap();
    // Plateau of 3 over [0,1), then a decaying tail from the offset.
    assert!((wave[0] - 3.0).abs() < 1e-12);
    assert!((wave[1] - 3.0).abs() < 1e-12);
    assert!((wave[2] - 3.0).abs() < 1e-12);
    for (k, t) in [(3usize, 0.5f64), (4, 1.0), (5, 1.5), (6, 2.0)] {
        assert!((wave[k] - 3.0 * (-t).exp()).abs() < 1e-12, "sample {k}");
    }
}

#[test]
fn tiny_duration_or_amplitude_renders_nothing() {
    let time = sample_grid(0.0, 1.0, 0.1).unwrap();
    let stimulus = prepared(Stimulus::new("v", "0", "0", "5"));
    assert!(stimulus
        .waveform(&time, 0, 0, ExprErrorPolicy::OneShot)
        .unwrap()
        .iter()
        .all(|&y| y == 0.0));
    let stimulus = prepared(Stimulus::new("v", "0", "1", "0"));
    assert!(stimulus
        .waveform(&time, 0, 0, ExprErrorPolicy::OneShot)
        .unwrap()
        .iter()
        .all(|&y| y == 0.0));
}

#[test]
fn sweep_mode_swallows_expression_errors() {
    let mut stimulus = Stimulus::new("v", "0", "1", "2");
    stimulus.onset_expr = "no_such_var".to_string();
    let stimulus = prepared(stimulus);
    let time = sample_grid(0.0, 2.0, 0.1).unwrap();
    let wave = stimulus.waveform(&time, 0, 0, ExprErrorPolicy::Sweep).unwrap();
    assert!(wave.iter().all(|&y| y == 0.0));
    assert!(stimulus.waveform(&time, 0, 0, ExprErrorPolicy::OneShot).is_err());
}
