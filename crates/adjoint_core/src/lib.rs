//! # Adjoint Core
//!
//! A tape-based automatic differentiation engine.
//!
//! A computation written with the overloaded value types records every
//! differentiable operation on the working tape. The tape can then be
//! replayed forward at new control values, swept backward for gradients,
//! swept forward for directional derivatives and combined forward-over-reverse
//! for Hessian-vector products.
//!
//! ## Components
//!
//! - [`Value`]: scalar or dense vector carried through the graph
//! - [`BlockVariable`]: checkpoint, adjoint, tangent-linear and Hessian slots
//! - [`Block`]: one recorded operation and its derivative rules
//! - [`Tape`]: ordered blocks plus the variable arena; see [`tape`] for the
//!   working-tape stack and annotation control
//! - [`Placeholder`]: substitutes a recorded dependency after the fact
//! - [`ReducedFunctional`]: the tape as a function of its [`Control`]s
//! - [`compute_gradient`], [`compute_hessian`], [`Hessian`]: one-shot drivers
//! - [`taylor_test`]: Taylor remainder verification
//!
//! ## Usage Example
//!
//! ```rust
//! use adjoint_core::{compute_gradient, AdjFloat, Control};
//!
//! let x = AdjFloat::new(1.5);
//! let y = AdjFloat::new(-0.5);
//! let j = x * y.exp() + (x * x).sin();
//!
//! let controls = [Control::new(&x).unwrap(), Control::new(&y).unwrap()];
//! let dj = compute_gradient(&j, &controls).unwrap();
//!
//! let expected_x = (-0.5_f64).exp() + 2.0 * 1.5 * (1.5_f64 * 1.5).cos();
//! assert!((dj[0].to_scalar().unwrap() - expected_x).abs() < 1e-12);
//! ```
//!
//! ## Threading
//!
//! Tapes are single threaded. Each thread has its own working-tape stack
//! and annotation flag.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![allow(unknown_lints)]

pub mod block;
pub mod block_variable;
pub mod control;
pub mod drivers;
pub mod error;
pub mod overloaded;
pub mod placeholder;
pub mod reduced_functional;
pub mod tape;
pub mod value;
pub mod verification;

pub use block::{Block, BlockState};
pub use block_variable::{BlockVariable, BlockVariableId, VariableKind};
pub use control::Control;
pub use drivers::{compute_gradient, compute_hessian, Hessian};
pub use error::{AdjointError, AdjointResult};
pub use overloaded::{AdjFloat, AdjVector, Overloaded};
pub use placeholder::Placeholder;
pub use reduced_functional::ReducedFunctional;
pub use tape::Tape;
pub use value::Value;
pub use verification::{
    taylor_test, taylor_test_multiple, taylor_test_with_config, TaylorConfig, TaylorFirstOrder,
    TaylorSecondOrder, TaylorTestResult,
};
