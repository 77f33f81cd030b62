//! Hessian command implementation

use adjoint_core::Value;
use serde::Serialize;
use tracing::info;

use super::{emit, format_values};
use crate::config::OutputFormat;
use crate::problems::{values_or, Problem};
use crate::Result;

/// Hessian action at a point.
#[derive(Debug, Serialize)]
pub struct HessianReport {
    /// Problem name.
    pub problem: &'static str,
    /// Control values.
    pub point: Vec<Value>,
    /// Direction `h`.
    pub direction: Vec<Value>,
    /// `H h`, one entry per control.
    pub action: Vec<Value>,
}

/// Evaluate the Hessian action of `problem` on `direction`.
pub fn compute(
    problem: Problem,
    point: Option<&str>,
    direction: Option<&str>,
) -> Result<HessianReport> {
    let point = values_or(point, problem.default_point())?;
    let direction = values_or(direction, problem.default_direction())?;
    let rf = problem.record(&point)?;
    let action = rf.hessian_vector_product(&direction)?;
    Ok(HessianReport {
        problem: problem.name(),
        point,
        direction,
        action,
    })
}

/// Run the hessian command
pub fn run(
    problem: Problem,
    point: Option<&str>,
    direction: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    info!("Computing Hessian action of {}", problem);
    let report = compute(problem, point, direction)?;
    emit(format, &report, |report| {
        println!("problem:    {}", report.problem);
        println!("point:      {}", format_values(&report.point));
        println!("direction:  {}", format_values(&report.direction));
        println!("H h:        {}", format_values(&report.action));
    })
}
