//! Tangent-linear command implementation
//!
//! Compares the directional derivative from a forward tangent-linear sweep
//! against the adjoint gradient dotted with the same direction.

use adjoint_core::{ReducedFunctional, Value};
use serde::Serialize;
use tracing::{debug, info};

use super::{emit, format_values};
use crate::config::OutputFormat;
use crate::problems::{values_or, Problem};
use crate::{CliError, Result};

/// Relative agreement required between the two directional derivatives.
pub const AGREEMENT_TOLERANCE: f64 = 1e-10;

/// Forward and reverse directional derivatives.
#[derive(Debug, Serialize)]
pub struct TlmReport {
    /// Problem name.
    pub problem: &'static str,
    /// Perturbation direction.
    pub direction: Vec<Value>,
    /// `dJ/dm · h` from the tangent-linear sweep.
    pub tangent_linear: f64,
    /// `dJ/dm · h` from the adjoint gradient.
    pub adjoint: f64,
    /// Whether the two agree to [`AGREEMENT_TOLERANCE`].
    pub consistent: bool,
}

/// `dJ/dm · h` via a forward sweep seeded with `directions`.
pub fn directional_derivative(rf: &ReducedFunctional, directions: &[Value]) -> Result<f64> {
    if directions.len() != rf.controls().len() {
        return Err(CliError::InvalidArgument(format!(
            "Expected {} directions, got {}",
            rf.controls().len(),
            directions.len()
        )));
    }

    let mut tape = rf.tape().borrow_mut();
    tape.reset_tlm_values();
    for (control, h) in rf.controls().iter().zip(directions) {
        tape.set_tlm_value(control.block_variable(), Some(h.clone()))?;
    }
    tape.evaluate_tlm()?;

    let derivative = match tape.tlm_value(rf.functional())? {
        Some(value) => value.to_scalar()?,
        None => 0.0,
    };
    Ok(rf.scale() * derivative)
}

/// Evaluate both directional derivatives of `problem`.
pub fn compute(problem: Problem, point: Option<&str>, direction: Option<&str>) -> Result<TlmReport> {
    let point = values_or(point, problem.default_point())?;
    let direction = values_or(direction, problem.default_direction())?;
    let rf = problem.record(&point)?;

    let gradient = rf.derivative()?;
    let mut adjoint = 0.0;
    for (g, h) in gradient.iter().zip(&direction) {
        adjoint += g.inner(h)?;
    }
    let tangent_linear = directional_derivative(&rf, &direction)?;
    debug!(tangent_linear, adjoint, "directional derivatives");

    let consistent =
        (tangent_linear - adjoint).abs() <= AGREEMENT_TOLERANCE * (1.0 + adjoint.abs());
    Ok(TlmReport {
        problem: problem.name(),
        direction,
        tangent_linear,
        adjoint,
        consistent,
    })
}

/// Run the tlm command
pub fn run(
    problem: Problem,
    point: Option<&str>,
    direction: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    info!("Running tangent-linear sweep on {}", problem);
    let report = compute(problem, point, direction)?;
    emit(format, &report, |report| {
        println!("problem:         {}", report.problem);
        println!("direction:       {}", format_values(&report.direction));
        println!("tangent linear:  {:.12e}", report.tangent_linear);
        println!("adjoint:         {:.12e}", report.adjoint);
        println!("consistent:      {}", report.consistent);
    })
}
