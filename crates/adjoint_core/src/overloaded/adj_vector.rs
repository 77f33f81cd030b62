//! Recorded dense vector.

use super::adj_float::AdjFloat;
use super::ops::{BinaryBlock, BinaryOp, UnaryBlock, UnaryOp};
use super::reductions::{InnerBlock, ScaleBlock, SumBlock};
use super::{record, register, Overloaded};
use crate::block_variable::BlockVariableId;
use crate::error::{AdjointError, AdjointResult};
use crate::value::Value;

/// A dense `f64` vector whose operations are recorded on the working tape.
///
/// Elementwise binary operations require equal lengths and return
/// [`AdjointError::DimensionMismatch`] otherwise; nothing is recorded for a
/// failed operation.
///
/// # Example
///
/// ```rust
/// use adjoint_core::AdjVector;
///
/// let u = AdjVector::new(vec![1.0, 2.0]);
/// let v = AdjVector::new(vec![3.0, 4.0]);
/// let s = u.mul(&v).unwrap().sum();
/// assert_eq!(s.value(), 11.0);
/// assert!(u.add(&AdjVector::new(vec![1.0])).is_err());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct AdjVector {
    values: Vec<f64>,
    block_variable: Option<BlockVariableId>,
}

impl AdjVector {
    /// Creates a vector and, while annotating, registers it on the working
    /// tape.
    pub fn new(values: Vec<f64>) -> Self {
        let block_variable = register(Value::Vector(values.clone()));
        Self {
            values,
            block_variable,
        }
    }

    /// Creates a vector that is never registered on a tape.
    pub fn constant(values: Vec<f64>) -> Self {
        Self {
            values,
            block_variable: None,
        }
    }

    /// Components.
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of components.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the vector has no components.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn operand(&self) -> (Option<BlockVariableId>, Value) {
        (self.block_variable, self.to_value())
    }

    fn check_len(&self, other: &AdjVector) -> AdjointResult<()> {
        if self.len() != other.len() {
            return Err(AdjointError::DimensionMismatch {
                expected: self.len(),
                actual: other.len(),
            });
        }
        Ok(())
    }

    fn unary(&self, op: UnaryOp) -> Self {
        let values: Vec<f64> = self.values.iter().map(|x| op.eval(*x)).collect();
        let block_variable = record(
            &Value::Vector(values.clone()),
            &[self.operand()],
            |deps, out| Box::new(UnaryBlock::new(op, deps[0], out)),
        );
        Self {
            values,
            block_variable,
        }
    }

    fn binary(&self, other: &AdjVector, op: BinaryOp) -> AdjointResult<Self> {
        self.check_len(other)?;
        let values: Vec<f64> = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| op.eval(*a, *b))
            .collect();
        let block_variable = record(
            &Value::Vector(values.clone()),
            &[self.operand(), other.operand()],
            |deps, out| Box::new(BinaryBlock::new(op, deps[0], deps[1], out)),
        );
        Ok(Self {
            values,
            block_variable,
        })
    }

    /// Elementwise `self + other`.
    pub fn add(&self, other: &AdjVector) -> AdjointResult<Self> {
        self.binary(other, BinaryOp::Add)
    }

    /// Elementwise `self - other`.
    pub fn sub(&self, other: &AdjVector) -> AdjointResult<Self> {
        self.binary(other, BinaryOp::Sub)
    }

    /// Elementwise `self * other`.
    pub fn mul(&self, other: &AdjVector) -> AdjointResult<Self> {
        self.binary(other, BinaryOp::Mul)
    }

    /// Elementwise `self / other`.
    pub fn div(&self, other: &AdjVector) -> AdjointResult<Self> {
        self.binary(other, BinaryOp::Div)
    }

    /// Elementwise `e^x`.
    pub fn exp(&self) -> Self {
        self.unary(UnaryOp::Exp)
    }

    /// Elementwise natural logarithm.
    pub fn ln(&self) -> Self {
        self.unary(UnaryOp::Ln)
    }

    /// Elementwise sine.
    pub fn sin(&self) -> Self {
        self.unary(UnaryOp::Sin)
    }

    /// Elementwise cosine.
    pub fn cos(&self) -> Self {
        self.unary(UnaryOp::Cos)
    }

    /// Elementwise square root.
    pub fn sqrt(&self) -> Self {
        self.unary(UnaryOp::Sqrt)
    }

    /// Elementwise hyperbolic tangent.
    pub fn tanh(&self) -> Self {
        self.unary(UnaryOp::Tanh)
    }

    /// Elementwise `x^n`.
    pub fn powf(&self, n: f64) -> Self {
        self.unary(UnaryOp::Powf(n))
    }

    /// Elementwise negation.
    pub fn neg(&self) -> Self {
        self.unary(UnaryOp::Neg)
    }

    /// Euclidean inner product.
    pub fn inner(&self, other: &AdjVector) -> AdjointResult<AdjFloat> {
        self.check_len(other)?;
        let value: f64 = self.values.iter().zip(&other.values).map(|(a, b)| a * b).sum();
        let block_variable = record(
            &Value::Scalar(value),
            &[self.operand(), other.operand()],
            |deps, out| Box::new(InnerBlock::new(deps[0], deps[1], out)),
        );
        Ok(scalar_result(value, block_variable))
    }

    /// `factor * self`
    pub fn scale(&self, factor: AdjFloat) -> Self {
        let a = factor.value();
        let values: Vec<f64> = self.values.iter().map(|x| a * x).collect();
        let block_variable = record(
            &Value::Vector(values.clone()),
            &[(factor.block_variable(), factor.to_value()), self.operand()],
            |deps, out| Box::new(ScaleBlock::new(deps[0], deps[1], out)),
        );
        Self {
            values,
            block_variable,
        }
    }

    /// Sum of components.
    pub fn sum(&self) -> AdjFloat {
        let value: f64 = self.values.iter().sum();
        let block_variable = record(&Value::Scalar(value), &[self.operand()], |deps, out| {
            Box::new(SumBlock::new(deps[0], out))
        });
        scalar_result(value, block_variable)
    }

    /// `self · self`
    pub fn norm_squared(&self) -> AdjFloat {
        let value: f64 = self.values.iter().map(|x| x * x).sum();
        // both operands share one variable, so fan-in doubles the adjoint
        let operand = self.operand();
        let block_variable = record(
            &Value::Scalar(value),
            &[operand.clone(), operand],
            |deps, out| Box::new(InnerBlock::new(deps[0], deps[1], out)),
        );
        scalar_result(value, block_variable)
    }
}

fn scalar_result(value: f64, block_variable: Option<BlockVariableId>) -> AdjFloat {
    let mut result = AdjFloat::constant(value);
    if let Some(id) = block_variable {
        result.set_block_variable(id);
    }
    result
}

impl Overloaded for AdjVector {
    fn block_variable(&self) -> Option<BlockVariableId> {
        self.block_variable
    }

    fn set_block_variable(&mut self, id: BlockVariableId) {
        self.block_variable = Some(id);
    }

    fn to_value(&self) -> Value {
        Value::Vector(self.values.clone())
    }
}

impl From<Vec<f64>> for AdjVector {
    fn from(values: Vec<f64>) -> Self {
        AdjVector::new(values)
    }
}
