//! Built-in model problems
//!
//! Each problem records a scalar functional on a fresh tape and hands back
//! the [`ReducedFunctional`] over its controls.

use adjoint_core::tape::push_tape;
use adjoint_core::{AdjFloat, AdjVector, Control, ReducedFunctional, Tape, Value};

use crate::{CliError, Result};

/// A recorded test functional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Problem {
    /// `J(x) = x²`
    Square,
    /// `J(x, y) = (1 - x)² + 100 (y - x²)²`
    Rosenbrock,
    /// `J(u) = ln Σ e^{u_k} + ½ |u|²`
    LogSumExp,
    /// `J(u, a) = a Σ tanh(u_k) u_k + ln(1 + |u|²)`
    Mixed,
}

impl Problem {
    /// Every built-in problem, in listing order.
    pub const ALL: [Problem; 4] = [
        Problem::Square,
        Problem::Rosenbrock,
        Problem::LogSumExp,
        Problem::Mixed,
    ];

    /// Name used on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Problem::Square => "square",
            Problem::Rosenbrock => "rosenbrock",
            Problem::LogSumExp => "logsumexp",
            Problem::Mixed => "mixed",
        }
    }

    /// One-line formula.
    pub fn description(&self) -> &'static str {
        match self {
            Problem::Square => "J(x) = x^2",
            Problem::Rosenbrock => "J(x, y) = (1 - x)^2 + 100 (y - x^2)^2",
            Problem::LogSumExp => "J(u) = ln sum exp(u_k) + |u|^2 / 2",
            Problem::Mixed => "J(u, a) = a sum tanh(u_k) u_k + ln(1 + |u|^2)",
        }
    }

    /// Look up a problem by its command-line name.
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == name.to_lowercase())
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|p| p.name()).collect();
                CliError::InvalidArgument(format!(
                    "Unknown problem: {}. Supported: {}",
                    name,
                    known.join(", ")
                ))
            })
    }

    /// Control values the problem is recorded at by default.
    pub fn default_point(&self) -> Vec<Value> {
        match self {
            Problem::Square => vec![Value::from(1.0)],
            Problem::Rosenbrock => vec![Value::from(-1.2), Value::from(1.0)],
            Problem::LogSumExp => vec![Value::from(vec![0.1, -0.3, 0.8])],
            Problem::Mixed => vec![Value::from(vec![0.2, -0.4, 0.9]), Value::from(1.7)],
        }
    }

    /// Perturbation direction used when none is given.
    pub fn default_direction(&self) -> Vec<Value> {
        match self {
            Problem::Square => vec![Value::from(1.0)],
            Problem::Rosenbrock => vec![Value::from(0.5), Value::from(-0.25)],
            Problem::LogSumExp => vec![Value::from(vec![0.3, 0.1, -0.2])],
            Problem::Mixed => vec![Value::from(vec![0.3, 0.1, -0.2]), Value::from(-0.5)],
        }
    }

    /// Record the functional at `point` on a fresh tape.
    pub fn record(&self, point: &[Value]) -> Result<ReducedFunctional> {
        let template = self.default_point();
        if point.len() != template.len() {
            return Err(CliError::InvalidArgument(format!(
                "{} takes {} controls, got {}",
                self.name(),
                template.len(),
                point.len()
            )));
        }
        for (value, expected) in point.iter().zip(&template) {
            expected.check_same_shape(value)?;
        }

        let _scope = push_tape(Tape::shared());
        let rf = match self {
            Problem::Square => {
                let x = AdjFloat::new(point[0].to_scalar()?);
                let j = x * x;
                ReducedFunctional::new(&j, vec![Control::new(&x)?])?
            }
            Problem::Rosenbrock => {
                let x = AdjFloat::new(point[0].to_scalar()?);
                let y = AdjFloat::new(point[1].to_scalar()?);
                let a = 1.0 - x;
                let b = y - x * x;
                let j = a * a + 100.0 * (b * b);
                ReducedFunctional::new(&j, vec![Control::new(&x)?, Control::new(&y)?])?
            }
            Problem::LogSumExp => {
                let u = AdjVector::new(point[0].as_slice().to_vec());
                let j = u.exp().sum().ln() + 0.5 * u.norm_squared();
                ReducedFunctional::new(&j, vec![Control::new(&u)?])?
            }
            Problem::Mixed => {
                let u = AdjVector::new(point[0].as_slice().to_vec());
                let a = AdjFloat::new(point[1].to_scalar()?);
                let j = u.tanh().mul(&u)?.scale(a).sum() + (u.norm_squared() + 1.0).ln();
                ReducedFunctional::new(&j, vec![Control::new(&u)?, Control::new(&a)?])?
            }
        };
        Ok(rf)
    }
}

impl std::fmt::Display for Problem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Split comma-separated numbers into values shaped like `template`.
///
/// Components are consumed in control order; a scalar control takes one
/// number and a vector control takes as many as its length.
pub fn parse_values(text: &str, template: &[Value]) -> Result<Vec<Value>> {
    let numbers = text
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .map_err(|_| CliError::InvalidArgument(format!("Not a number: {}", s)))
        })
        .collect::<Result<Vec<f64>>>()?;

    let expected: usize = template.iter().map(Value::dim).sum();
    if numbers.len() != expected {
        return Err(CliError::InvalidArgument(format!(
            "Expected {} numbers, got {}",
            expected,
            numbers.len()
        )));
    }

    let mut rest = numbers.as_slice();
    let values = template
        .iter()
        .map(|shape| {
            let (head, tail) = rest.split_at(shape.dim());
            rest = tail;
            match shape {
                Value::Scalar(_) => Value::Scalar(head[0]),
                Value::Vector(_) => Value::Vector(head.to_vec()),
            }
        })
        .collect();
    Ok(values)
}

/// Parse `text` when given, otherwise fall back to `default`.
pub fn values_or(text: Option<&str>, default: Vec<Value>) -> Result<Vec<Value>> {
    match text {
        Some(text) => parse_values(text, &default),
        None => Ok(default),
    }
}
