//! List command implementation

use serde::Serialize;

use super::{emit, format_values};
use crate::config::OutputFormat;
use crate::problems::Problem;
use crate::Result;

/// One row of the problem listing.
#[derive(Debug, Serialize)]
pub struct ProblemEntry {
    /// Command-line name.
    pub name: &'static str,
    /// Formula.
    pub description: &'static str,
    /// Number of controls.
    pub controls: usize,
    /// Components across all controls.
    pub dimension: usize,
}

/// Describe every built-in problem.
pub fn compute() -> Vec<ProblemEntry> {
    Problem::ALL
        .iter()
        .map(|problem| {
            let point = problem.default_point();
            ProblemEntry {
                name: problem.name(),
                description: problem.description(),
                controls: point.len(),
                dimension: point.iter().map(|v| v.dim()).sum(),
            }
        })
        .collect()
}

/// Run the list command
pub fn run(format: OutputFormat) -> Result<()> {
    let entries = compute();
    emit(format, &entries, |entries| {
        println!("{:<12} {:>8} {:>5}  formula", "problem", "controls", "dim");
        for entry in entries {
            println!(
                "{:<12} {:>8} {:>5}  {}",
                entry.name, entry.controls, entry.dimension, entry.description
            );
        }
        for problem in Problem::ALL {
            println!(
                "  {} default point: {}",
                problem,
                format_values(&problem.default_point())
            );
        }
    })
}
