//! Gradient command implementation
//!
//! Records a model problem and runs one adjoint sweep.

use adjoint_core::Value;
use serde::Serialize;
use tracing::info;

use super::{emit, format_values};
use crate::config::OutputFormat;
use crate::problems::{values_or, Problem};
use crate::Result;

/// Functional value and gradient at a point.
#[derive(Debug, Serialize)]
pub struct GradientReport {
    /// Problem name.
    pub problem: &'static str,
    /// Control values.
    pub point: Vec<Value>,
    /// `J(point)`
    pub value: f64,
    /// `dJ/dm`, one entry per control.
    pub gradient: Vec<Value>,
}

/// Evaluate the gradient of `problem` at `point` (default point if `None`).
pub fn compute(problem: Problem, point: Option<&str>) -> Result<GradientReport> {
    let point = values_or(point, problem.default_point())?;
    let rf = problem.record(&point)?;
    let value = rf.value()?;
    let gradient = rf.derivative()?;
    Ok(GradientReport {
        problem: problem.name(),
        point,
        value,
        gradient,
    })
}

/// Run the gradient command
pub fn run(problem: Problem, point: Option<&str>, format: OutputFormat) -> Result<()> {
    info!("Computing gradient of {}", problem);
    let report = compute(problem, point)?;
    emit(format, &report, |report| {
        println!("problem:  {}", report.problem);
        println!("point:    {}", format_values(&report.point));
        println!("J:        {:.12e}", report.value);
        println!("dJ/dm:    {}", format_values(&report.gradient));
    })
}
