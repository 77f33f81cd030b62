//! Recorded scalar.

use super::ops::{BinaryBlock, BinaryOp, UnaryBlock, UnaryOp};
use super::{record, register, Overloaded};
use crate::block_variable::BlockVariableId;
use crate::value::Value;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// An `f64` whose arithmetic is recorded on the working tape.
///
/// `AdjFloat` is `Copy`; copies share the same block variable. Mixing with
/// plain `f64` operands records the `f64` as an unrecorded constant.
///
/// # Example
///
/// ```rust
/// use adjoint_core::AdjFloat;
///
/// let x = AdjFloat::new(2.0);
/// let y = 3.0 * x.powf(2.0) - x / 4.0;
/// assert_eq!(y.value(), 11.5);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdjFloat {
    value: f64,
    block_variable: Option<BlockVariableId>,
}

impl AdjFloat {
    /// Creates a value and, while annotating, registers it on the working
    /// tape.
    pub fn new(value: f64) -> Self {
        Self {
            value,
            block_variable: register(Value::Scalar(value)),
        }
    }

    /// Creates a value that is never registered on a tape.
    pub fn constant(value: f64) -> Self {
        Self {
            value,
            block_variable: None,
        }
    }

    /// The current value.
    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    fn unary(self, op: UnaryOp) -> Self {
        let value = op.eval(self.value);
        let block_variable = record(
            &Value::Scalar(value),
            &[(self.block_variable, Value::Scalar(self.value))],
            |deps, out| Box::new(UnaryBlock::new(op, deps[0], out)),
        );
        Self {
            value,
            block_variable,
        }
    }

    fn binary(self, rhs: AdjFloat, op: BinaryOp) -> Self {
        let value = op.eval(self.value, rhs.value);
        let block_variable = record(
            &Value::Scalar(value),
            &[
                (self.block_variable, Value::Scalar(self.value)),
                (rhs.block_variable, Value::Scalar(rhs.value)),
            ],
            |deps, out| Box::new(BinaryBlock::new(op, deps[0], deps[1], out)),
        );
        Self {
            value,
            block_variable,
        }
    }

    /// `e^self`
    pub fn exp(self) -> Self {
        self.unary(UnaryOp::Exp)
    }

    /// Natural logarithm.
    pub fn ln(self) -> Self {
        self.unary(UnaryOp::Ln)
    }

    /// Sine.
    pub fn sin(self) -> Self {
        self.unary(UnaryOp::Sin)
    }

    /// Cosine.
    pub fn cos(self) -> Self {
        self.unary(UnaryOp::Cos)
    }

    /// Square root.
    pub fn sqrt(self) -> Self {
        self.unary(UnaryOp::Sqrt)
    }

    /// Hyperbolic tangent.
    pub fn tanh(self) -> Self {
        self.unary(UnaryOp::Tanh)
    }

    /// `self^n` for a constant exponent.
    pub fn powf(self, n: f64) -> Self {
        self.unary(UnaryOp::Powf(n))
    }

    /// `self^exponent` with a recorded exponent.
    pub fn pow(self, exponent: AdjFloat) -> Self {
        self.binary(exponent, BinaryOp::Pow)
    }
}

impl Overloaded for AdjFloat {
    fn block_variable(&self) -> Option<BlockVariableId> {
        self.block_variable
    }

    fn set_block_variable(&mut self, id: BlockVariableId) {
        self.block_variable = Some(id);
    }

    fn to_value(&self) -> Value {
        Value::Scalar(self.value)
    }
}

impl From<f64> for AdjFloat {
    fn from(value: f64) -> Self {
        AdjFloat::new(value)
    }
}

impl fmt::Display for AdjFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl Neg for AdjFloat {
    type Output = AdjFloat;

    fn neg(self) -> AdjFloat {
        self.unary(UnaryOp::Neg)
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl $trait for AdjFloat {
            type Output = AdjFloat;

            fn $method(self, rhs: AdjFloat) -> AdjFloat {
                self.binary(rhs, $op)
            }
        }

        impl $trait<f64> for AdjFloat {
            type Output = AdjFloat;

            fn $method(self, rhs: f64) -> AdjFloat {
                self.binary(AdjFloat::constant(rhs), $op)
            }
        }

        impl $trait<AdjFloat> for f64 {
            type Output = AdjFloat;

            fn $method(self, rhs: AdjFloat) -> AdjFloat {
                AdjFloat::constant(self).binary(rhs, $op)
            }
        }
    };
}

impl_binary_op!(Add, add, BinaryOp::Add);
impl_binary_op!(Sub, sub, BinaryOp::Sub);
impl_binary_op!(Mul, mul, BinaryOp::Mul);
impl_binary_op!(Div, div, BinaryOp::Div);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tape::{get_working_tape, push_tape, stop_annotating};
    use crate::Tape;
    use approx::assert_relative_eq;

    #[test]
    fn test_arithmetic_records_blocks() {
        let tape = Tape::shared();
        let _scope = push_tape(tape.clone());

        let x = AdjFloat::new(2.0);
        let y = x * x + 1.0;
        assert_eq!(y.value(), 5.0);
        assert_eq!(tape.borrow().len(), 2);

        let names: Vec<String> = tape.borrow().blocks().map(|b| b.name().to_string()).collect();
        assert_eq!(names, vec!["Mul", "Add"]);
    }

    #[test]
    fn test_no_recording_while_suppressed() {
        let tape = Tape::shared();
        let _scope = push_tape(tape.clone());
        let _guard = stop_annotating();

        let x = AdjFloat::new(2.0);
        let y = (x * 3.0).exp();
        assert!(x.block_variable().is_none());
        assert!(y.block_variable().is_none());
        assert!(tape.borrow().is_empty());
        assert_eq!(tape.borrow().num_variables(), 0);
    }

    #[test]
    fn test_gradient_through_transcendentals() {
        let _scope = push_tape(Tape::shared());
        let x = AdjFloat::new(0.5);
        let j = x.exp() * x.sin() + x.ln() - x.sqrt() / x.tanh();

        let tape = get_working_tape();
        let mut tape = tape.borrow_mut();
        tape.evaluate_adj(j.annotated_id().unwrap(), Value::from(1.0)).unwrap();
        let dj = tape.adj_value(x.annotated_id().unwrap()).unwrap().unwrap().to_scalar().unwrap();

        let v: f64 = 0.5;
        let expected = v.exp() * v.sin() + v.exp() * v.cos() + 1.0 / v
            - (0.5 / v.sqrt()) / v.tanh()
            + v.sqrt() * (1.0 - v.tanh().powi(2)) / v.tanh().powi(2);
        assert_relative_eq!(dj, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_operands_on_both_sides() {
        let _scope = push_tape(Tape::shared());
        let x = AdjFloat::new(4.0);
        let y = 2.0 / x - (1.0 - x) * 3.0;
        assert_relative_eq!(y.value(), 0.5 + 9.0);

        let tape = get_working_tape();
        let mut tape = tape.borrow_mut();
        tape.evaluate_adj(y.annotated_id().unwrap(), Value::from(1.0)).unwrap();
        let dy = tape.adj_value(x.annotated_id().unwrap()).unwrap().unwrap().to_scalar().unwrap();
        assert_relative_eq!(dy, -2.0 / 16.0 + 3.0);
    }

    #[test]
    fn test_display() {
        assert_eq!(AdjFloat::constant(1.5).to_string(), "1.5");
    }
}
