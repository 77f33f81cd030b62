//! Taylor command implementation
//!
//! Runs the Taylor remainder test on a model problem at truncation order
//! 0, 1 or 2.

use adjoint_core::{
    taylor_test_with_config, TaylorConfig, TaylorFirstOrder, TaylorSecondOrder, TaylorTestResult,
    Value,
};
use serde::Serialize;
use tracing::info;

use super::{emit, format_values};
use crate::config::OutputFormat;
use crate::problems::{values_or, Problem};
use crate::{CliError, Result};

/// Outcome of one Taylor test.
#[derive(Debug, Serialize)]
pub struct TaylorReport {
    /// Problem name.
    pub problem: &'static str,
    /// Perturbation direction.
    pub direction: Vec<Value>,
    /// Residuals and rates.
    pub result: TaylorTestResult,
    /// `order + 1`
    pub expected_rate: f64,
    /// Smallest observed rate.
    pub min_rate: f64,
    /// Whether the smallest rate is within tolerance of the expected one.
    pub passed: bool,
}

/// Derivative terms included at each truncation order.
pub fn terms_for_order(order: usize) -> Result<(TaylorFirstOrder, TaylorSecondOrder)> {
    match order {
        0 => Ok((TaylorFirstOrder::Omit, TaylorSecondOrder::Omit)),
        1 => Ok((TaylorFirstOrder::Computed, TaylorSecondOrder::Omit)),
        2 => Ok((TaylorFirstOrder::Computed, TaylorSecondOrder::Computed)),
        other => Err(CliError::InvalidArgument(format!(
            "Unsupported Taylor order: {}. Supported: 0, 1, 2",
            other
        ))),
    }
}

/// Run the Taylor test of `problem` at `order`.
pub fn compute(
    problem: Problem,
    order: usize,
    point: Option<&str>,
    direction: Option<&str>,
    config: &TaylorConfig,
    tolerance: f64,
) -> Result<TaylorReport> {
    let (first, second) = terms_for_order(order)?;
    let point = values_or(point, problem.default_point())?;
    let direction = values_or(direction, problem.default_direction())?;

    let mut rf = problem.record(&point)?;
    let result = taylor_test_with_config(&mut rf, &point, &direction, first, second, config)?;

    Ok(TaylorReport {
        problem: problem.name(),
        direction,
        expected_rate: result.expected_rate(),
        min_rate: result.min_rate(),
        passed: result.passed(tolerance),
        result,
    })
}

/// Print the residual table of a report.
pub(crate) fn print_table(report: &TaylorReport) {
    println!(
        "problem: {}  order: {}  direction: {}",
        report.problem,
        report.result.order,
        format_values(&report.direction)
    );
    println!("{:>12} {:>14} {:>8}", "epsilon", "residual", "rate");
    for (k, (eps, residual)) in report
        .result
        .epsilons
        .iter()
        .zip(&report.result.residuals)
        .enumerate()
    {
        let rate = match k.checked_sub(1).and_then(|i| report.result.rates.get(i)) {
            Some(rate) => format!("{:.4}", rate),
            None => "-".to_string(),
        };
        println!("{:>12.4e} {:>14.6e} {:>8}", eps, residual, rate);
    }
    println!(
        "min rate {:.4} (expected {:.1}): {}",
        report.min_rate,
        report.expected_rate,
        if report.passed { "PASS" } else { "FAIL" }
    );
}

/// Run the taylor command
pub fn run(
    problem: Problem,
    order: usize,
    point: Option<&str>,
    direction: Option<&str>,
    config: &TaylorConfig,
    tolerance: f64,
    format: OutputFormat,
) -> Result<()> {
    info!("Taylor test of {} at order {}", problem, order);
    let report = compute(problem, order, point, direction, config, tolerance)?;
    emit(format, &report, print_table)
}
