use clamp_expr::{eval, parse, Bindings, ExprError, Value};

fn scalar(src: &str, bindings: &Bindings<'_>) -> f64 {
    match eval(src, bindings).unwrap() {
        Value::Scalar(s) => s,
        Value::Vector(v) => panic!("expected scalar, got vector of length {}", v.len()),
    }
}

fn vector(src: &str, bindings: &Bindings<'_>) -> Vec<f64> {
    match eval(src, bindings).unwrap() {
        Value::Vector(v) => v,
        Value::Scalar(s) => panic!("expected vector, got scalar {s}"),
    }
}

#[test]
fn precedence_and_associativity() {
    let bindings = Bindings::new();
    assert_eq!(scalar("1 + 2 * 3", &bindings), 7.0);
    assert_eq!(scalar("(1 + 2) * 3", &bindings), 9.0);
    assert_eq!(scalar("2 ^ 3 ^ 2", &bindings), 512.0);
    assert_eq!(scalar("-2 ^ 2", &bindings), -4.0);
    assert_eq!(scalar("2 ^ -1", &bindings), 0.5);
    assert_eq!(scalar("6 / 3 / 2", &bindings), 1.0);
}

#[test]
fn scientific_literals() {
    let bindings = Bindings::new();
    assert_eq!(scalar("1.5e3", &bindings), 1500.0);
    assert_eq!(scalar("2E-2", &bindings), 0.02);
}

#[test]
fn scalar_vector_broadcast() {
    let t = [0.0, 1.0, 2.0];
    let mut bindings = Bindings::new();
    bindings.set_slice("t", &t);
    assert_eq!(vector("2 * t + 1", &bindings), vec![1.0, 3.0, 5.0]);
    assert_eq!(vector("t - t", &bindings), vec![0.0, 0.0, 0.0]);
}

#[test]
fn vector_length_mismatch_is_a_shape_error() {
    let a = [1.0, 2.0];
    let b = [1.0, 2.0, 3.0];
    let mut bindings = Bindings::new();
    bindings.set_slice("a", &a);
    bindings.set_slice("b", &b);
    match eval("a + b", &bindings) {
        Err(ExprError::Shape { left: 2, right: 3 }) => {}
        other => panic!("expected shape error, got {other:?}"),
    }
}

#[test]
fn elementwise_functions_and_reductions() {
    let t = [1.0, 2.0, 3.0, 4.0];
    let mut bindings = Bindings::new();
    bindings.set_slice("t", &t);
    assert_eq!(scalar("sum(t)", &bindings), 10.0);
    assert_eq!(scalar("mean(t)", &bindings), 2.5);
    assert_eq!(scalar("min(t)", &bindings), 1.0);
    assert_eq!(scalar("max(t)", &bindings), 4.0);
    let e = vector("exp(t * 0)", &bindings);
    assert_eq!(e, vec![1.0; 4]);
    assert!((scalar("ln(exp(1))", &bindings) - 1.0).abs() < 1e-12);
    assert_eq!(scalar("sqrt(4) + abs(-2)", &bindings), 4.0);
}

#[test]
fn unknown_identifier_and_function() {
    let bindings = Bindings::new();
    assert!(matches!(
        eval("nope", &bindings),
        Err(ExprError::UnknownIdentifier(_))
    ));
    assert!(matches!(
        eval("frobnicate(1)", &bindings),
        Err(ExprError::UnknownFunction(_))
    ));
}

#[test]
fn parse_errors_carry_position() {
    match parse("1 + ") {
        Err(ExprError::Parse { position, .. }) => assert_eq!(position, 4),
        other => panic!("expected parse error, got {other:?}"),
    }
    assert!(parse("").is_err());
    assert!(parse("1 2").is_err());
}

#[test]
fn rebinding_a_subrange_is_a_view() {
    let t = [0.0, 1.0, 2.0, 3.0, 4.0];
    let mut bindings = Bindings::new();
    bindings.set_slice("t", &t[1..4]);
    assert_eq!(vector("t", &bindings), vec![1.0, 2.0, 3.0]);
    assert_eq!(scalar("sum(t)", &bindings), 6.0);
}

#[test]
fn add_scaled_into_broadcasts_and_checks_length() {
    let mut out = vec![1.0, 1.0, 1.0];
    Value::Scalar(2.0).add_scaled_into(&mut out, 3.0).unwrap();
    assert_eq!(out, vec![7.0, 7.0, 7.0]);
    Value::Vector(vec![1.0, 2.0, 3.0])
        .add_scaled_into(&mut out, 1.0)
        .unwrap();
    assert_eq!(out, vec![8.0, 9.0, 10.0]);
    assert!(Value::Vector(vec![1.0])
        .add_scaled_into(&mut out, 1.0)
        .is_err());
}
