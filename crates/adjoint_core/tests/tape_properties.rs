//! End-to-end properties of recording, replay and derivative sweeps.
//!
//! # Test Categories
//!
//! 1. **Replay**: idempotence and placeholder isolation
//! 2. **Reverse mode**: fan-in accumulation and linearity in the seed
//! 3. **Forward mode**: tangent-linear values agree with the adjoint
//! 4. **Working tape**: nested tapes are restored on every exit path and ids
//!    never leak between tapes

use adjoint_core::tape::{get_working_tape, push_tape, TapeHandle};
use adjoint_core::{
    compute_gradient, compute_hessian, AdjFloat, AdjVector, AdjointError, AdjointResult, Control,
    Overloaded, Placeholder, ReducedFunctional, Tape, Value,
};
use approx::assert_relative_eq;
use proptest::prelude::*;
use std::rc::Rc;

/// J(x, y) = x e^y + sin(xy) + y²/2, recorded on the working tape.
fn model(x: f64, y: f64) -> (AdjFloat, AdjFloat, AdjFloat) {
    let xa = AdjFloat::new(x);
    let ya = AdjFloat::new(y);
    let j = xa * ya.exp() + (xa * ya).sin() + ya * ya * 0.5;
    (xa, ya, j)
}

fn model_gradient(x: f64, y: f64) -> [f64; 2] {
    [
        y.exp() + y * (x * y).cos(),
        x * y.exp() + x * (x * y).cos() + y,
    ]
}

fn recorded_model(x: f64, y: f64) -> (TapeHandle, ReducedFunctional) {
    let tape = Tape::shared();
    let _scope = push_tape(tape.clone());
    let (xa, ya, j) = model(x, y);
    let controls = vec![Control::new(&xa).unwrap(), Control::new(&ya).unwrap()];
    (tape, ReducedFunctional::new(&j, controls).unwrap())
}

fn scalar(values: &[Value], index: usize) -> f64 {
    values[index].to_scalar().unwrap()
}

// ============================================================================
// Replay
// ============================================================================

#[test]
fn test_recorded_gradient_matches_analytical() {
    let (_tape, rf) = recorded_model(0.7, -0.3);
    let dj = rf.derivative().unwrap();
    let expected = model_gradient(0.7, -0.3);
    assert_relative_eq!(scalar(&dj, 0), expected[0], epsilon = 1e-12);
    assert_relative_eq!(scalar(&dj, 1), expected[1], epsilon = 1e-12);
}

#[test]
fn test_derivative_follows_latest_call() {
    let (_tape, mut rf) = recorded_model(0.7, -0.3);
    rf.call(&[Value::from(1.1), Value::from(0.4)]).unwrap();
    let dj = rf.derivative().unwrap();
    let expected = model_gradient(1.1, 0.4);
    assert_relative_eq!(scalar(&dj, 0), expected[0], epsilon = 1e-12);
    assert_relative_eq!(scalar(&dj, 1), expected[1], epsilon = 1e-12);
}

#[test]
fn test_placeholder_isolation() {
    let tape = Tape::shared();
    let _scope = push_tape(tape.clone());

    let x = AdjFloat::new(2.0);
    let mut a = x.exp();
    let b = a * 3.0;
    let a_origin = a.annotated_id().unwrap();
    let p = Placeholder::new(&mut a).unwrap();
    let c = a * a;
    let d = c + b;
    let later = AdjFloat::new(0.5);

    let upstream = [x.annotated_id().unwrap(), a_origin, b.annotated_id().unwrap()];
    let before: Vec<Value> = upstream
        .iter()
        .map(|id| tape.borrow().saved_output(*id).unwrap().clone())
        .collect();

    p.set_value(&later).unwrap();
    let c_id = c.annotated_id().unwrap();
    let start = tape.borrow().block_variable(c_id).unwrap().creator().unwrap();
    tape.borrow_mut().recompute_from(start).unwrap();

    let tape = tape.borrow();
    for (id, old) in upstream.iter().zip(&before) {
        assert_eq!(tape.saved_output(*id).unwrap(), old);
    }
    assert_eq!(tape.saved_output(c_id).unwrap(), &Value::Scalar(0.25));
    let d_value = tape.saved_output(d.annotated_id().unwrap()).unwrap().to_scalar().unwrap();
    assert_relative_eq!(d_value, 0.25 + 3.0 * 2.0_f64.exp());
}

#[test]
fn test_stale_after_clear() {
    let (tape, rf) = recorded_model(0.7, -0.3);
    tape.borrow_mut().clear();
    assert_eq!(rf.derivative().unwrap_err(), AdjointError::StaleEvaluation);
}

#[test]
fn test_optimized_tape_keeps_gradient() {
    let tape = Tape::shared();
    let _scope = push_tape(tape.clone());
    let x = AdjFloat::new(0.4);
    let noise = AdjFloat::new(3.0);
    let _unrelated = noise.exp() * noise;
    let j = x.sin() * x;

    let mut rf = ReducedFunctional::new(&j, vec![Control::new(&x).unwrap()]).unwrap();
    let removed = rf.optimize_tape().unwrap();
    assert_eq!(removed, 2);
    assert_eq!(tape.borrow().len(), 2);

    let value = rf.call(&[Value::from(0.9)]).unwrap();
    assert_relative_eq!(value, 0.9 * 0.9_f64.sin());
    let dj = rf.derivative().unwrap();
    assert_relative_eq!(scalar(&dj, 0), 0.9_f64.sin() + 0.9 * 0.9_f64.cos());
}

// ============================================================================
// Reverse mode
// ============================================================================

#[test]
fn test_fan_in_accumulates() {
    let _scope = push_tape(Tape::shared());
    let x = AdjFloat::new(1.3);
    // x feeds three separate blocks
    let j = x * x + x.sin() + 3.0 * x;
    let dj = compute_gradient(&j, &[Control::new(&x).unwrap()]).unwrap();
    assert_relative_eq!(scalar(&dj, 0), 2.0 * 1.3 + 1.3_f64.cos() + 3.0, epsilon = 1e-12);
}

#[test]
fn test_vector_gradient_and_hessian() {
    let _scope = push_tape(Tape::shared());
    let u = AdjVector::new(vec![0.5, -1.0, 2.0]);
    // J = Σ u_k³
    let j = u.powf(3.0).sum();
    let controls = [Control::new(&u).unwrap()];

    let dj = compute_gradient(&j, &controls).unwrap();
    assert_eq!(dj[0], Value::from(vec![0.75, 3.0, 12.0]));

    let hv = compute_hessian(&j, &controls, &[Value::from(vec![1.0, 0.0, -1.0])]).unwrap();
    assert_eq!(hv[0], Value::from(vec![3.0, 0.0, -12.0]));
}

#[test]
fn test_missing_rule_surfaces_in_sweep() {
    use adjoint_core::{Block, BlockVariableId};

    /// y = x with no derivative rules.
    #[derive(Debug)]
    struct Opaque {
        deps: [BlockVariableId; 1],
        outs: [BlockVariableId; 1],
    }

    impl Block for Opaque {
        fn name(&self) -> &str {
            "Opaque"
        }
        fn dependencies(&self) -> &[BlockVariableId] {
            &self.deps
        }
        fn outputs(&self) -> &[BlockVariableId] {
            &self.outs
        }
    }

    let tape = Tape::shared();
    let _scope = push_tape(tape.clone());
    let x = AdjFloat::new(2.0);
    let mut y = AdjFloat::constant(2.0);
    {
        let mut t = tape.borrow_mut();
        let out = t.create_block_variable(Value::from(2.0));
        t.add_block(Opaque {
            deps: [x.annotated_id().unwrap()],
            outs: [out],
        })
        .unwrap();
        y.set_block_variable(out);
    }
    let j = y * y;

    let err = compute_gradient(&j, &[Control::new(&x).unwrap()]).unwrap_err();
    assert_eq!(
        err,
        AdjointError::UnsupportedOperation {
            block: "Opaque".to_string(),
            rule: "adjoint"
        }
    );
}

/// j = p·x where p is linked to v = 2x, recorded after j. Each call reads
/// the v left by the previous call.
fn linked_model() -> (TapeHandle, ReducedFunctional) {
    let tape = Tape::shared();
    let _scope = push_tape(tape.clone());
    let x = AdjFloat::new(1.0);
    let mut u = AdjFloat::new(1.0);
    let p = Placeholder::new(&mut u).unwrap();
    let j = u * x;
    let v = x * 2.0;
    p.set_value(&v).unwrap();
    let noise = AdjFloat::new(3.0);
    let _unrelated = noise.exp();
    let rf = ReducedFunctional::new(&j, vec![Control::new(&x).unwrap()]).unwrap();
    (tape, rf)
}

#[test]
fn test_optimized_tape_follows_placeholder_links() {
    let (_plain_tape, mut plain) = linked_model();
    let (_tape, mut optimized) = linked_model();
    assert_eq!(optimized.optimize_tape().unwrap(), 1);

    for (m, expected) in [(3.0, 6.0), (4.0, 24.0), (5.0, 40.0)] {
        assert_relative_eq!(plain.call(&[Value::from(m)]).unwrap(), expected);
        assert_relative_eq!(optimized.call(&[Value::from(m)]).unwrap(), expected);
    }
}

#[test]
fn test_placeholder_is_not_a_control() {
    let tape = Tape::shared();
    let _scope = push_tape(tape.clone());
    let mut u = AdjFloat::new(2.0);
    let origin = u.annotated_id().unwrap();
    let p = Placeholder::new(&mut u).unwrap();
    let j = u * u;

    assert_eq!(
        Control::new(&u).unwrap_err(),
        AdjointError::PlaceholderCheckpoint(p.id())
    );
    assert_eq!(
        tape.borrow_mut()
            .set_saved_output(p.id(), Value::from(5.0))
            .unwrap_err(),
        AdjointError::PlaceholderCheckpoint(p.id())
    );

    let control = Control::from_id(&mut tape.borrow_mut(), origin).unwrap();
    let mut rf = ReducedFunctional::new(&j, vec![control]).unwrap();
    assert_relative_eq!(rf.call(&[Value::from(5.0)]).unwrap(), 25.0);
    assert_relative_eq!(scalar(&rf.derivative().unwrap(), 0), 10.0);
}

// ============================================================================
// Working tape
// ============================================================================

#[test]
fn test_nested_tapes_are_restored() {
    let outer = Tape::shared();
    let _outer_scope = push_tape(outer.clone());
    let x = AdjFloat::new(1.5);
    let j = x * x;

    {
        let inner = Tape::shared();
        let _inner_scope = push_tape(inner.clone());
        let y = AdjFloat::new(2.0);
        let k = y * y * y;
        let h = compute_hessian(&k, &[Control::new(&y).unwrap()], &[Value::from(1.0)]).unwrap();
        assert_relative_eq!(scalar(&h, 0), 12.0);
        assert_eq!(inner.borrow().len(), 2);
    }
    assert!(Rc::ptr_eq(&get_working_tape(), &outer));
    assert_eq!(outer.borrow().len(), 1);

    fn failing_scope() -> AdjointResult<AdjVector> {
        let _scope = push_tape(Tape::shared());
        let u = AdjVector::new(vec![1.0]);
        u.add(&AdjVector::new(vec![1.0, 2.0]))
    }
    assert!(failing_scope().is_err());
    assert!(Rc::ptr_eq(&get_working_tape(), &outer));

    let dj = compute_gradient(&j, &[Control::new(&x).unwrap()]).unwrap();
    assert_relative_eq!(scalar(&dj, 0), 3.0);
}

#[test]
fn test_ids_from_before_clear_enter_as_constants() {
    let tape = Tape::shared();
    let _scope = push_tape(tape.clone());
    let x = AdjFloat::new(2.0);
    let stale = x.annotated_id().unwrap();
    tape.borrow_mut().clear();

    let y = AdjFloat::new(3.0);
    assert_eq!(y.annotated_id().unwrap().index(), stale.index());
    let z = x * y;
    assert_relative_eq!(z.value(), 6.0);
    assert_eq!(Control::new(&x).unwrap_err(), AdjointError::UnknownVariable(stale));

    let controls = [Control::new(&y).unwrap()];
    let dz = compute_gradient(&z, &controls).unwrap();
    assert_relative_eq!(scalar(&dz, 0), 2.0);
    let mut rf = ReducedFunctional::new(&z, controls.to_vec()).unwrap();
    assert_relative_eq!(rf.call(&[Value::from(5.0)]).unwrap(), 10.0);
}

#[test]
fn test_ids_from_another_tape_enter_as_constants() {
    let x = {
        let _scope = push_tape(Tape::shared());
        AdjFloat::new(2.0)
    };
    let tape = Tape::shared();
    let _scope = push_tape(tape.clone());
    let y = AdjFloat::new(3.0);
    assert_eq!(
        x.annotated_id().unwrap().index(),
        y.annotated_id().unwrap().index()
    );

    let z = x * y;
    assert_relative_eq!(z.value(), 6.0);
    let controls = [Control::new(&y).unwrap()];
    let dz = compute_gradient(&z, &controls).unwrap();
    assert_relative_eq!(scalar(&dz, 0), 2.0);
    let mut rf = ReducedFunctional::new(&z, controls.to_vec()).unwrap();
    assert_relative_eq!(rf.call(&[Value::from(5.0)]).unwrap(), 10.0);
    assert_eq!(tape.borrow().len(), 1);
}

// ============================================================================
// Property tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Calling twice at the same point gives bit-identical values.
    #[test]
    fn prop_replay_idempotent(x in -2.0f64..2.0, y in -2.0f64..2.0) {
        let (_tape, mut rf) = recorded_model(0.1, 0.2);
        let point = [Value::from(x), Value::from(y)];
        let first = rf.call(&point).unwrap();
        let second = rf.call(&point).unwrap();
        prop_assert_eq!(first.to_bits(), second.to_bits());
    }

    /// The adjoint sweep is linear in its seed.
    #[test]
    fn prop_adjoint_linear_in_seed(x in -2.0f64..2.0, y in -2.0f64..2.0, seed in -5.0f64..5.0) {
        let tape = Tape::shared();
        let _scope = push_tape(tape.clone());
        let (xa, ya, j) = model(x, y);
        let ids = [xa.annotated_id().unwrap(), ya.annotated_id().unwrap()];
        let j_id = j.annotated_id().unwrap();

        let mut t = tape.borrow_mut();
        t.evaluate_adj(j_id, Value::from(1.0)).unwrap();
        let unit: Vec<f64> = ids
            .iter()
            .map(|id| t.adj_value(*id).unwrap().unwrap().to_scalar().unwrap())
            .collect();
        t.evaluate_adj(j_id, Value::from(seed)).unwrap();
        for (id, g) in ids.iter().zip(&unit) {
            let scaled = t.adj_value(*id).unwrap().unwrap().to_scalar().unwrap();
            prop_assert!((scaled - seed * g).abs() <= 1e-12 * (1.0 + (seed * g).abs()));
        }
    }

    /// The tangent-linear value of J equals the gradient dotted with the
    /// direction.
    #[test]
    fn prop_tlm_matches_adjoint(
        x in -2.0f64..2.0,
        y in -2.0f64..2.0,
        hx in -1.0f64..1.0,
        hy in -1.0f64..1.0,
    ) {
        let tape = Tape::shared();
        let _scope = push_tape(tape.clone());
        let (xa, ya, j) = model(x, y);
        let rf = ReducedFunctional::new(
            &j,
            vec![Control::new(&xa).unwrap(), Control::new(&ya).unwrap()],
        )
        .unwrap();
        let dj = rf.derivative().unwrap();
        let via_adjoint = scalar(&dj, 0) * hx + scalar(&dj, 1) * hy;

        let mut t = tape.borrow_mut();
        t.set_tlm_value(xa.annotated_id().unwrap(), Some(Value::from(hx))).unwrap();
        t.set_tlm_value(ya.annotated_id().unwrap(), Some(Value::from(hy))).unwrap();
        t.evaluate_tlm().unwrap();
        let via_tlm = t
            .tlm_value(j.annotated_id().unwrap())
            .unwrap()
            .unwrap()
            .to_scalar()
            .unwrap();
        prop_assert!((via_tlm - via_adjoint).abs() <= 1e-10 * (1.0 + via_adjoint.abs()));
    }
}
