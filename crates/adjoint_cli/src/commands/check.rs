//! Check command implementation
//!
//! Runs every built-in problem through the tangent-linear consistency check
//! and the Taylor test at orders 0, 1 and 2.

use serde::Serialize;
use tracing::{info, warn};

use super::{emit, taylor, tlm};
use crate::config::CliConfig;
use crate::problems::Problem;
use crate::{CliError, Result};

/// One line of the check summary.
#[derive(Debug, Serialize)]
pub struct CheckRow {
    /// Problem name.
    pub problem: &'static str,
    /// `tlm`, `taylor-0`, `taylor-1` or `taylor-2`.
    pub check: String,
    /// Expected rate, or the adjoint directional derivative for `tlm`.
    pub expected: f64,
    /// Observed minimum rate, or the tangent-linear directional derivative.
    pub observed: f64,
    /// Pass/fail.
    pub passed: bool,
}

/// Run every check on every problem.
pub fn compute(config: &CliConfig) -> Result<Vec<CheckRow>> {
    let mut rows = Vec::new();
    for problem in Problem::ALL {
        let report = tlm::compute(problem, None, None)?;
        rows.push(CheckRow {
            problem: problem.name(),
            check: "tlm".to_string(),
            expected: report.adjoint,
            observed: report.tangent_linear,
            passed: report.consistent,
        });

        for order in 0..=2 {
            let report =
                taylor::compute(problem, order, None, None, &config.taylor, config.tolerance)?;
            rows.push(CheckRow {
                problem: problem.name(),
                check: format!("taylor-{}", order),
                expected: report.expected_rate,
                observed: report.min_rate,
                passed: report.passed,
            });
        }
    }
    Ok(rows)
}

/// Run the check command
pub fn run(config: &CliConfig) -> Result<()> {
    info!("Checking derivatives of {} problems", Problem::ALL.len());
    let rows = compute(config)?;

    emit(config.format, &rows, |rows| {
        println!(
            "{:<12} {:<10} {:>14} {:>14}  status",
            "problem", "check", "expected", "observed"
        );
        for row in rows {
            println!(
                "{:<12} {:<10} {:>14.6e} {:>14.6e}  {}",
                row.problem,
                row.check,
                row.expected,
                row.observed,
                if row.passed { "ok" } else { "FAILED" }
            );
        }
    })?;

    let failed = rows.iter().filter(|row| !row.passed).count();
    if failed > 0 {
        for row in rows.iter().filter(|row| !row.passed) {
            warn!(problem = row.problem, check = %row.check, "check failed");
        }
        return Err(CliError::ChecksFailed {
            failed,
            total: rows.len(),
        });
    }

    info!("All {} checks passed", rows.len());
    Ok(())
}
