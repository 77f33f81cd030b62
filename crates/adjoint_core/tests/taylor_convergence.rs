//! Taylor remainder convergence of recorded functionals.
//!
//! A correct derivative makes the remainder of the truncated Taylor
//! expansion shrink one order faster than the truncation order; these tests
//! use that as the oracle for the whole engine.

use adjoint_core::tape::push_tape;
use adjoint_core::{
    taylor_test, taylor_test_multiple, taylor_test_with_config, AdjFloat, AdjVector, AdjointError,
    Control, ReducedFunctional, Tape, TaylorConfig, TaylorFirstOrder, TaylorSecondOrder, Value,
};
use approx::assert_abs_diff_eq;

/// J(x) = x² at x = 1.
fn square() -> ReducedFunctional {
    let _scope = push_tape(Tape::shared());
    let x = AdjFloat::new(1.0);
    let j = x * x;
    ReducedFunctional::new(&j, vec![Control::new(&x).unwrap()]).unwrap()
}

fn run_square(first: TaylorFirstOrder, second: TaylorSecondOrder) -> f64 {
    let mut rf = square();
    taylor_test(&mut rf, &Value::from(1.0), &Value::from(1.0), first, second)
        .unwrap()
        .min_rate()
}

// ============================================================================
// f(x) = x²
// ============================================================================

#[test]
fn test_square_without_derivative_converges_at_first_order() {
    let rate = run_square(TaylorFirstOrder::Omit, TaylorSecondOrder::Omit);
    assert_abs_diff_eq!(rate, 1.0, epsilon = 0.05);
}

#[test]
fn test_square_with_gradient_converges_at_second_order() {
    let rate = run_square(TaylorFirstOrder::Computed, TaylorSecondOrder::Omit);
    assert_abs_diff_eq!(rate, 2.0, epsilon = 0.05);

    let rate = run_square(TaylorFirstOrder::Supplied(2.0), TaylorSecondOrder::Omit);
    assert_abs_diff_eq!(rate, 2.0, epsilon = 0.05);
}

#[test]
fn test_square_with_hessian_converges_at_third_order() {
    let rate = run_square(TaylorFirstOrder::Computed, TaylorSecondOrder::Supplied(2.0));
    assert_abs_diff_eq!(rate, 3.0, epsilon = 0.05);

    let rate = run_square(TaylorFirstOrder::Computed, TaylorSecondOrder::Computed);
    assert_abs_diff_eq!(rate, 3.0, epsilon = 0.05);
}

#[test]
fn test_direction_shape_checked_first() {
    let mut rf = square();
    let revision = rf.tape().borrow().revision();
    let err = taylor_test(
        &mut rf,
        &Value::from(1.0),
        &Value::from(vec![1.0, 0.0]),
        TaylorFirstOrder::Computed,
        TaylorSecondOrder::Omit,
    )
    .unwrap_err();
    assert!(matches!(err, AdjointError::DimensionMismatch { .. }));
    assert_eq!(rf.tape().borrow().revision(), revision);
}

// ============================================================================
// Nonlinear multi-control functional
// ============================================================================

/// J(u, a) = a · Σ tanh(u_k) u_k + ln(1 + |u|²)
fn nonlinear() -> (ReducedFunctional, Vec<Value>) {
    let _scope = push_tape(Tape::shared());
    let u0 = vec![0.2, -0.4, 0.9];
    let u = AdjVector::new(u0.clone());
    let a = AdjFloat::new(1.7);
    let first = u.tanh().mul(&u).unwrap().scale(a).sum();
    let second = (u.norm_squared() + 1.0).ln();
    let j = first + second;
    let rf = ReducedFunctional::new(
        &j,
        vec![Control::new(&u).unwrap(), Control::new(&a).unwrap()],
    )
    .unwrap();
    (rf, vec![Value::from(u0), Value::from(1.7)])
}

#[test]
fn test_multi_control_orders() {
    let (mut rf, base) = nonlinear();
    let directions = [Value::from(vec![0.3, 0.1, -0.2]), Value::from(-0.5)];

    let zeroth = taylor_test_multiple(
        &mut rf,
        &base,
        &directions,
        TaylorFirstOrder::Omit,
        TaylorSecondOrder::Omit,
    )
    .unwrap();
    assert_abs_diff_eq!(zeroth.min_rate(), 1.0, epsilon = 0.1);

    let first = taylor_test_multiple(
        &mut rf,
        &base,
        &directions,
        TaylorFirstOrder::Computed,
        TaylorSecondOrder::Omit,
    )
    .unwrap();
    assert_abs_diff_eq!(first.min_rate(), 2.0, epsilon = 0.1);

    let second = taylor_test_multiple(
        &mut rf,
        &base,
        &directions,
        TaylorFirstOrder::Computed,
        TaylorSecondOrder::Computed,
    )
    .unwrap();
    assert_abs_diff_eq!(second.min_rate(), 3.0, epsilon = 0.1);
    assert!(second.passed(0.1));
}

#[test]
fn test_wrong_hessian_is_reported_not_raised() {
    let (mut rf, base) = nonlinear();
    let directions = [Value::from(vec![0.3, 0.1, -0.2]), Value::from(-0.5)];
    let result = taylor_test_multiple(
        &mut rf,
        &base,
        &directions,
        TaylorFirstOrder::Computed,
        TaylorSecondOrder::Supplied(100.0),
    )
    .unwrap();
    assert!(!result.passed(0.1));
    assert_abs_diff_eq!(result.min_rate(), 2.0, epsilon = 0.1);
}

#[test]
fn test_custom_config() {
    let (mut rf, base) = nonlinear();
    let directions = [Value::from(vec![1.0, 1.0, 1.0]), Value::from(1.0)];
    let config = TaylorConfig::builder()
        .initial_epsilon(1e-3)
        .steps(5)
        .build()
        .unwrap();
    let result = taylor_test_with_config(
        &mut rf,
        &base,
        &directions,
        TaylorFirstOrder::Computed,
        TaylorSecondOrder::Omit,
        &config,
    )
    .unwrap();
    assert_eq!(result.residuals.len(), 5);
    assert_eq!(result.rates.len(), 4);
    assert_abs_diff_eq!(result.min_rate(), 2.0, epsilon = 0.05);
    assert_abs_diff_eq!(rf.value().unwrap(), {
        let u: [f64; 3] = [0.2, -0.4, 0.9];
        let norm: f64 = u.iter().map(|v| v * v).sum();
        1.7 * u.iter().map(|v| v.tanh() * v).sum::<f64>() + (1.0 + norm).ln()
    }, epsilon = 1e-12);
}
