//! Taylor remainder convergence tests.
//!
//! For a perturbation `ε h` of the controls the remainders
//!
//! ```text
//! r0(ε) = |J(m + εh) - J(m)|
//! r1(ε) = |J(m + εh) - J(m) - ε dJ/dm·h|
//! r2(ε) = |J(m + εh) - J(m) - ε dJ/dm·h - ½ε² hᵀHh|
//! ```
//!
//! shrink like `ε`, `ε²` and `ε³` when the supplied derivatives are
//! correct. The observed rate between successive perturbations is
//! `ln(r_k / r_{k+1}) / ln(1 / shrink_factor)`, so a correct gradient gives
//! a first-order rate near 2 and a wrong one collapses towards 1.
//!
//! Low rates are reported in the result, never raised as errors.
//!
//! # Example
//!
//! ```rust
//! use adjoint_core::{taylor_test, AdjFloat, Control, ReducedFunctional, Value};
//! use adjoint_core::{TaylorFirstOrder, TaylorSecondOrder};
//!
//! let x = AdjFloat::new(1.0);
//! let j = x.sin() * x;
//! let mut rf = ReducedFunctional::new(&j, vec![Control::new(&x).unwrap()]).unwrap();
//!
//! let result = taylor_test(
//!     &mut rf,
//!     &Value::from(1.0),
//!     &Value::from(1.0),
//!     TaylorFirstOrder::Computed,
//!     TaylorSecondOrder::Omit,
//! )
//! .unwrap();
//! assert_eq!(result.order(), 1);
//! assert!(result.min_rate() > 1.9);
//! ```

mod config;

pub use config::{
    TaylorConfig, TaylorConfigBuilder, DEFAULT_INITIAL_EPSILON, DEFAULT_RESIDUAL_FLOOR,
    DEFAULT_SHRINK_FACTOR, DEFAULT_STEPS,
};

use crate::error::{AdjointError, AdjointResult};
use crate::reduced_functional::ReducedFunctional;
use crate::value::Value;
use tracing::{debug, info};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// First-order term `dJ/dm · h` of the expansion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TaylorFirstOrder {
    /// No derivative; zeroth-order test unless a second-order term is given.
    Omit,
    /// A precomputed directional derivative.
    Supplied(f64),
    /// Computed from [`ReducedFunctional::derivative`] at the base point.
    Computed,
}

/// Second-order term `hᵀ H h` of the expansion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TaylorSecondOrder {
    /// No second-order term.
    Omit,
    /// A precomputed value of `hᵀ H h`.
    Supplied(f64),
    /// Computed from [`ReducedFunctional::hessian_vector_product`].
    Computed,
}

/// Outcome of a Taylor test.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TaylorTestResult {
    /// Truncation order of the remainder (0, 1 or 2)
    pub order: usize,
    /// Perturbation sizes, largest first
    pub epsilons: Vec<f64>,
    /// Remainder for each perturbation
    pub residuals: Vec<f64>,
    /// Observed rate between successive perturbations
    pub rates: Vec<f64>,
}

impl TaylorTestResult {
    /// Truncation order of the remainder.
    #[inline]
    pub fn order(&self) -> usize {
        self.order
    }

    /// Rate a correct derivative achieves: `order + 1`.
    #[inline]
    pub fn expected_rate(&self) -> f64 {
        (self.order + 1) as f64
    }

    /// Smallest observed rate.
    pub fn min_rate(&self) -> f64 {
        self.rates.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Whether every rate is within `tolerance` of the expected rate or
    /// above it.
    pub fn passed(&self, tolerance: f64) -> bool {
        self.min_rate() >= self.expected_rate() - tolerance
    }
}

/// Taylor test of a single-control functional with the default
/// [`TaylorConfig`].
pub fn taylor_test(
    rf: &mut ReducedFunctional,
    base: &Value,
    direction: &Value,
    first_order: TaylorFirstOrder,
    second_order: TaylorSecondOrder,
) -> AdjointResult<TaylorTestResult> {
    taylor_test_multiple(
        rf,
        std::slice::from_ref(base),
        std::slice::from_ref(direction),
        first_order,
        second_order,
    )
}

/// Taylor test over every control of `rf` with the default
/// [`TaylorConfig`].
pub fn taylor_test_multiple(
    rf: &mut ReducedFunctional,
    base: &[Value],
    directions: &[Value],
    first_order: TaylorFirstOrder,
    second_order: TaylorSecondOrder,
) -> AdjointResult<TaylorTestResult> {
    taylor_test_with_config(
        rf,
        base,
        directions,
        first_order,
        second_order,
        &TaylorConfig::default(),
    )
}

/// Taylor test over every control of `rf`.
///
/// Evaluates `rf` at `base` and at `base + ε_k directions`, then evaluates
/// it at `base` once more so the tape is left at the base point. Shapes of
/// `base` and `directions` are checked against the controls before any
/// perturbation is evaluated. Supplying a second-order term implies a
/// first-order one; [`TaylorFirstOrder::Omit`] is then treated as
/// [`TaylorFirstOrder::Computed`].
pub fn taylor_test_with_config(
    rf: &mut ReducedFunctional,
    base: &[Value],
    directions: &[Value],
    first_order: TaylorFirstOrder,
    second_order: TaylorSecondOrder,
    config: &TaylorConfig,
) -> AdjointResult<TaylorTestResult> {
    config.validate()?;
    check_shapes(rf, base, directions)?;

    let first_order = match (first_order, second_order) {
        (TaylorFirstOrder::Omit, TaylorSecondOrder::Supplied(_) | TaylorSecondOrder::Computed) => {
            TaylorFirstOrder::Computed
        }
        (first, _) => first,
    };
    let order = match (first_order, second_order) {
        (_, TaylorSecondOrder::Supplied(_) | TaylorSecondOrder::Computed) => 2,
        (TaylorFirstOrder::Omit, _) => 0,
        _ => 1,
    };

    let j0 = rf.call(base)?;
    let dj_dm = match first_order {
        TaylorFirstOrder::Omit => 0.0,
        TaylorFirstOrder::Supplied(value) => value,
        TaylorFirstOrder::Computed => pairwise_inner(&rf.derivative()?, directions)?,
    };
    let hm = match second_order {
        TaylorSecondOrder::Omit => 0.0,
        TaylorSecondOrder::Supplied(value) => value,
        TaylorSecondOrder::Computed => {
            pairwise_inner(&rf.hessian_vector_product(directions)?, directions)?
        }
    };
    debug!(j0, dj_dm, hm, order, "starting taylor test");

    let epsilons = config.epsilons();
    let mut residuals = Vec::with_capacity(epsilons.len());
    for &eps in &epsilons {
        let perturbed = base
            .iter()
            .zip(directions)
            .map(|(m, h)| {
                let mut point = m.clone();
                point.axpy(eps, h)?;
                Ok(point)
            })
            .collect::<AdjointResult<Vec<_>>>()?;
        let jp = rf.call(&perturbed)?;
        let residual = (jp - j0 - eps * dj_dm - 0.5 * eps * eps * hm).abs();
        debug!(eps, residual, "taylor residual");
        residuals.push(residual);
    }
    rf.call(base)?;

    let expected = (order + 1) as f64;
    let floor = config.residual_floor() * j0.abs().max(1.0);
    let log_shrink = (1.0 / config.shrink_factor()).ln();
    let rates: Vec<f64> = residuals
        .windows(2)
        .map(|pair| {
            if pair[0] <= floor && pair[1] <= floor {
                expected
            } else {
                (pair[0] / pair[1]).ln() / log_shrink
            }
        })
        .collect();

    let result = TaylorTestResult {
        order,
        epsilons,
        residuals,
        rates,
    };
    info!(
        order,
        residuals = ?result.residuals,
        rates = ?result.rates,
        min_rate = result.min_rate(),
        "taylor test finished"
    );
    Ok(result)
}

fn check_shapes(rf: &ReducedFunctional, base: &[Value], directions: &[Value]) -> AdjointResult<()> {
    let expected = rf.controls().len();
    for actual in [base.len(), directions.len()] {
        if actual != expected {
            return Err(AdjointError::ControlCountMismatch { expected, actual });
        }
    }
    for ((current, m), h) in rf.control_values()?.iter().zip(base).zip(directions) {
        current.check_same_shape(m)?;
        current.check_same_shape(h)?;
    }
    Ok(())
}

fn pairwise_inner(lhs: &[Value], rhs: &[Value]) -> AdjointResult<f64> {
    lhs.iter()
        .zip(rhs)
        .map(|(a, b)| a.inner(b))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tape::{push_tape, Tape};
    use crate::{AdjFloat, AdjVector, Control};
    use approx::assert_abs_diff_eq;

    fn square() -> ReducedFunctional {
        let tape = Tape::shared();
        let _scope = push_tape(tape);
        let x = AdjFloat::new(1.0);
        let j = x * x;
        ReducedFunctional::new(&j, vec![Control::new(&x).unwrap()]).unwrap()
    }

    fn run(rf: &mut ReducedFunctional, first: TaylorFirstOrder, second: TaylorSecondOrder) -> TaylorTestResult {
        taylor_test(rf, &Value::from(1.0), &Value::from(1.0), first, second).unwrap()
    }

    #[test]
    fn test_zeroth_order_rate() {
        let mut rf = square();
        let result = run(&mut rf, TaylorFirstOrder::Omit, TaylorSecondOrder::Omit);
        assert_eq!(result.order(), 0);
        assert_eq!(result.rates.len(), 3);
        assert_abs_diff_eq!(result.min_rate(), 1.0, epsilon = 0.1);
        assert!(result.passed(0.1));
    }

    #[test]
    fn test_first_order_rate() {
        let mut rf = square();
        let result = run(&mut rf, TaylorFirstOrder::Supplied(2.0), TaylorSecondOrder::Omit);
        assert_eq!(result.order(), 1);
        for rate in &result.rates {
            assert_abs_diff_eq!(*rate, 2.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_second_order_rate() {
        let mut rf = square();
        let result = run(&mut rf, TaylorFirstOrder::Computed, TaylorSecondOrder::Computed);
        assert_eq!(result.order(), 2);
        assert_abs_diff_eq!(result.min_rate(), 3.0, epsilon = 0.1);
    }

    #[test]
    fn test_wrong_gradient_collapses() {
        let mut rf = square();
        let result = run(&mut rf, TaylorFirstOrder::Supplied(1.5), TaylorSecondOrder::Omit);
        assert!(result.min_rate() < 1.2);
        assert!(!result.passed(0.1));
    }

    #[test]
    fn test_second_order_implies_computed_gradient() {
        let mut rf = square();
        let result = run(&mut rf, TaylorFirstOrder::Omit, TaylorSecondOrder::Supplied(2.0));
        assert_eq!(result.order(), 2);
        assert!(result.passed(0.1));
    }

    #[test]
    fn test_restores_base_point() {
        let mut rf = square();
        taylor_test(
            &mut rf,
            &Value::from(0.5),
            &Value::from(1.0),
            TaylorFirstOrder::Computed,
            TaylorSecondOrder::Omit,
        )
        .unwrap();
        assert_abs_diff_eq!(rf.value().unwrap(), 0.25);
        assert!(rf.derivative().is_ok());
    }

    #[test]
    fn test_shape_mismatch_reported_before_evaluation() {
        let mut rf = square();
        let err = taylor_test(
            &mut rf,
            &Value::from(1.0),
            &Value::from(vec![1.0, 1.0]),
            TaylorFirstOrder::Omit,
            TaylorSecondOrder::Omit,
        )
        .unwrap_err();
        assert_eq!(
            err,
            AdjointError::DimensionMismatch {
                expected: 1,
                actual: 2
            }
        );
        // the tape was never replayed, so the recording point is still fresh
        assert!(rf.derivative().is_ok());
    }

    #[test]
    fn test_multiple_vector_controls() {
        let tape = Tape::shared();
        let _scope = push_tape(tape);
        let u = AdjVector::new(vec![0.3, 0.7]);
        let a = AdjFloat::new(1.2);
        let j = u.exp().scale(a).inner(&u).unwrap();
        let mut rf = ReducedFunctional::new(
            &j,
            vec![Control::new(&u).unwrap(), Control::new(&a).unwrap()],
        )
        .unwrap();

        let base = [Value::from(vec![0.3, 0.7]), Value::from(1.2)];
        let directions = [Value::from(vec![0.5, -0.25]), Value::from(0.4)];
        let result = taylor_test_multiple(
            &mut rf,
            &base,
            &directions,
            TaylorFirstOrder::Computed,
            TaylorSecondOrder::Computed,
        )
        .unwrap();
        assert_abs_diff_eq!(result.min_rate(), 3.0, epsilon = 0.15);
    }

    #[test]
    fn test_control_count_mismatch() {
        let mut rf = square();
        let err = taylor_test_multiple(
            &mut rf,
            &[],
            &[],
            TaylorFirstOrder::Omit,
            TaylorSecondOrder::Omit,
        )
        .unwrap_err();
        assert_eq!(
            err,
            AdjointError::ControlCountMismatch {
                expected: 1,
                actual: 0
            }
        );
    }
}
