//! Values flowing through the computational graph.
//!
//! The tape never interprets values beyond the small capability set it
//! needs for sweeps and verification: deep copy, in-place assignment,
//! accumulation, scaling and an inner product.

use crate::error::{AdjointError, AdjointResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A checkpointed value, adjoint, tangent-linear or Hessian slot.
///
/// # Example
///
/// ```rust
/// use adjoint_core::Value;
///
/// let u = Value::from(vec![1.0, 2.0]);
/// let v = Value::from(vec![3.0, 4.0]);
/// assert_eq!(u.inner(&v).unwrap(), 11.0);
/// assert_eq!(Value::from(2.0).scaled(3.0), Value::Scalar(6.0));
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Value {
    /// A real number
    Scalar(f64),
    /// A dense vector of reals
    Vector(Vec<f64>),
}

impl Value {
    /// Returns the scalar, or `None` for vectors.
    #[inline]
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(x) => Some(*x),
            Value::Vector(_) => None,
        }
    }

    /// The single component of a one-dimensional value.
    pub fn to_scalar(&self) -> AdjointResult<f64> {
        match self.as_slice() {
            [x] => Ok(*x),
            other => Err(AdjointError::DimensionMismatch {
                expected: 1,
                actual: other.len(),
            }),
        }
    }

    /// Builds a value shaped like `self` from flat components.
    pub(crate) fn like(&self, components: Vec<f64>) -> Value {
        match self {
            Value::Scalar(_) => Value::Scalar(components.first().copied().unwrap_or(0.0)),
            Value::Vector(_) => Value::Vector(components),
        }
    }

    /// Views the value as a flat slice of components.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        match self {
            Value::Scalar(x) => std::slice::from_ref(x),
            Value::Vector(v) => v,
        }
    }

    /// Number of components.
    #[inline]
    pub fn dim(&self) -> usize {
        self.as_slice().len()
    }

    /// A zero value with the same shape.
    pub fn zeros_like(&self) -> Value {
        match self {
            Value::Scalar(_) => Value::Scalar(0.0),
            Value::Vector(v) => Value::Vector(vec![0.0; v.len()]),
        }
    }

    /// Whether every component is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.as_slice().iter().all(|x| *x == 0.0)
    }

    /// Sum of all components.
    pub fn sum(&self) -> f64 {
        self.as_slice().iter().sum()
    }

    /// Fails with [`AdjointError::DimensionMismatch`] unless both values
    /// have the same number of components.
    pub fn check_same_shape(&self, other: &Value) -> AdjointResult<()> {
        if self.dim() != other.dim() {
            return Err(AdjointError::DimensionMismatch {
                expected: self.dim(),
                actual: other.dim(),
            });
        }
        Ok(())
    }

    /// Overwrites the components of this value with those of `other`.
    ///
    /// The variant is kept: a scalar assigned a one-element vector stays a
    /// scalar.
    pub fn assign(&mut self, other: &Value) -> AdjointResult<()> {
        self.check_same_shape(other)?;
        *self = self.like(other.as_slice().to_vec());
        Ok(())
    }

    /// `self += other`
    pub fn add_assign(&mut self, other: &Value) -> AdjointResult<()> {
        self.axpy(1.0, other)
    }

    /// `self += a * x`
    pub fn axpy(&mut self, a: f64, x: &Value) -> AdjointResult<()> {
        self.check_same_shape(x)?;
        match self {
            Value::Scalar(s) => *s += a * x.as_slice()[0],
            Value::Vector(v) => {
                for (vi, xi) in v.iter_mut().zip(x.as_slice()) {
                    *vi += a * xi;
                }
            }
        }
        Ok(())
    }

    /// Returns `a * self`.
    pub fn scaled(&self, a: f64) -> Value {
        self.map(|x| a * x)
    }

    /// Euclidean inner product.
    pub fn inner(&self, other: &Value) -> AdjointResult<f64> {
        self.check_same_shape(other)?;
        Ok(self
            .as_slice()
            .iter()
            .zip(other.as_slice())
            .map(|(a, b)| a * b)
            .sum())
    }

    /// Applies `f` componentwise, preserving shape.
    pub fn map<F: Fn(f64) -> f64>(&self, f: F) -> Value {
        match self {
            Value::Scalar(x) => Value::Scalar(f(*x)),
            Value::Vector(v) => Value::Vector(v.iter().map(|x| f(*x)).collect()),
        }
    }

    /// Combines two equally shaped values componentwise.
    pub fn zip_map<F: Fn(f64, f64) -> f64>(&self, other: &Value, f: F) -> AdjointResult<Value> {
        self.check_same_shape(other)?;
        Ok(match self {
            Value::Scalar(x) => Value::Scalar(f(*x, other.as_slice()[0])),
            Value::Vector(v) => Value::Vector(
                v.iter()
                    .zip(other.as_slice())
                    .map(|(a, b)| f(*a, *b))
                    .collect(),
            ),
        })
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Scalar(x)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::Vector(v)
    }
}

impl From<&[f64]> for Value {
    fn from(v: &[f64]) -> Self {
        Value::Vector(v.to_vec())
    }
}
