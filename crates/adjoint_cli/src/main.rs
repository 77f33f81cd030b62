//! Adjoint CLI - derivative checks on recorded model problems
//!
//! Operational front end for the `adjoint_core` tape engine.
//!
//! # Commands
//!
//! - `adjoint list` - List the built-in model problems
//! - `adjoint gradient <problem>` - Functional value and adjoint gradient
//! - `adjoint tlm <problem>` - Tangent-linear vs adjoint directional derivative
//! - `adjoint hessian <problem>` - Hessian action on a direction
//! - `adjoint taylor <problem> --order <n>` - Taylor remainder convergence rates
//! - `adjoint check` - Every check on every problem; fails on a low rate
//!
//! # Configuration
//!
//! Settings come from `adjoint.toml` (or `--config`), then
//! `ADJOINT_LOG_LEVEL`, then command-line flags. `RUST_LOG` overrides the
//! log filter entirely.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod error;
mod problems;

pub use error::{CliError, Result};

use config::{build_config, CliArgs};
use problems::Problem;

/// Tape-based automatic differentiation checks
#[derive(Parser)]
#[command(name = "adjoint")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Output format (table, json)
    #[arg(short, long, global = true)]
    format: Option<String>,

    /// Allowed shortfall of a Taylor rate below the expected rate
    #[arg(long, global = true)]
    tolerance: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in model problems
    List,

    /// Evaluate a problem and its adjoint gradient
    Gradient {
        /// Problem name (square, rosenbrock, logsumexp, mixed)
        problem: String,

        /// Control values, comma-separated in control order
        #[arg(short, long, allow_hyphen_values = true)]
        point: Option<String>,
    },

    /// Compare tangent-linear and adjoint directional derivatives
    Tlm {
        /// Problem name
        problem: String,

        /// Control values, comma-separated in control order
        #[arg(short, long, allow_hyphen_values = true)]
        point: Option<String>,

        /// Direction, comma-separated in control order
        #[arg(short, long, allow_hyphen_values = true)]
        direction: Option<String>,
    },

    /// Apply the Hessian to a direction
    Hessian {
        /// Problem name
        problem: String,

        /// Control values, comma-separated in control order
        #[arg(short, long, allow_hyphen_values = true)]
        point: Option<String>,

        /// Direction, comma-separated in control order
        #[arg(short, long, allow_hyphen_values = true)]
        direction: Option<String>,
    },

    /// Run the Taylor remainder test
    Taylor {
        /// Problem name
        problem: String,

        /// Truncation order (0, 1 or 2)
        #[arg(short, long, default_value = "2")]
        order: usize,

        /// Control values, comma-separated in control order
        #[arg(short, long, allow_hyphen_values = true)]
        point: Option<String>,

        /// Direction, comma-separated in control order
        #[arg(short, long, allow_hyphen_values = true)]
        direction: Option<String>,

        /// First perturbation size
        #[arg(short, long)]
        epsilon: Option<f64>,

        /// Number of perturbations
        #[arg(short, long)]
        steps: Option<usize>,
    },

    /// Run every check on every problem
    Check,
}

impl Cli {
    fn config_args(&self) -> CliArgs {
        let (epsilon, steps) = match &self.command {
            Commands::Taylor { epsilon, steps, .. } => (*epsilon, *steps),
            _ => (None, None),
        };
        CliArgs {
            config_file: self.config.clone(),
            verbose: self.verbose,
            log_level: self.log_level.clone(),
            format: self.format.clone(),
            tolerance: self.tolerance,
            epsilon,
            steps,
        }
    }
}

fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = build_config(&cli.config_args())?;

    init_tracing(config.log_level.as_filter_str());
    debug!(?config, "configuration loaded");

    match cli.command {
        Commands::List => commands::list::run(config.format),
        Commands::Gradient { problem, point } => {
            commands::gradient::run(Problem::from_name(&problem)?, point.as_deref(), config.format)
        }
        Commands::Tlm {
            problem,
            point,
            direction,
        } => commands::tlm::run(
            Problem::from_name(&problem)?,
            point.as_deref(),
            direction.as_deref(),
            config.format,
        ),
        Commands::Hessian {
            problem,
            point,
            direction,
        } => commands::hessian::run(
            Problem::from_name(&problem)?,
            point.as_deref(),
            direction.as_deref(),
            config.format,
        ),
        Commands::Taylor {
            problem,
            order,
            point,
            direction,
            ..
        } => commands::taylor::run(
            Problem::from_name(&problem)?,
            order,
            point.as_deref(),
            direction.as_deref(),
            &config.taylor,
            config.tolerance,
            config.format,
        ),
        Commands::Check => commands::check::run(&config),
    }
}
