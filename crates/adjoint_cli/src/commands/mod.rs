//! CLI command implementations
//!
//! Each submodule implements a specific CLI command. Commands split into a
//! `compute` step returning a serialisable report and a `run` step that
//! prints it in the configured format.

use adjoint_core::Value;
use serde::Serialize;

use crate::config::OutputFormat;
use crate::Result;

pub mod check;
pub mod gradient;
pub mod hessian;
pub mod list;
pub mod taylor;
pub mod tlm;

/// Print `report` as JSON, or call `table` for the human-readable form.
pub(crate) fn emit<T, F>(format: OutputFormat, report: &T, table: F) -> Result<()>
where
    T: Serialize,
    F: FnOnce(&T),
{
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Table => table(report),
    }
    Ok(())
}

/// Render control values as `[a, b]`, one entry per control.
pub(crate) fn format_values(values: &[Value]) -> String {
    values
        .iter()
        .map(|value| match value {
            Value::Scalar(x) => format!("{:.6e}", x),
            Value::Vector(v) => {
                let parts: Vec<String> = v.iter().map(|x| format!("{:.6e}", x)).collect();
                format!("({})", parts.join(", "))
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}
