//! The operation contract recorded on a tape.
//!
//! A [`Block`] is one differentiable operation: an ordered list of
//! dependency variables, an ordered list of output variables and the rules
//! that let the tape replay it and push first- and second-order
//! sensitivities through it. Dependency and output ids never change after
//! the block is recorded; only the variables' value slots do.
//!
//! # Implementing a block
//!
//! ```rust
//! use adjoint_core::{AdjointResult, Block, BlockState, BlockVariableId, Value};
//!
//! /// y = 3 x
//! #[derive(Debug)]
//! struct Triple {
//!     deps: [BlockVariableId; 1],
//!     outs: [BlockVariableId; 1],
//! }
//!
//! impl Block for Triple {
//!     fn name(&self) -> &str {
//!         "Triple"
//!     }
//!     fn dependencies(&self) -> &[BlockVariableId] {
//!         &self.deps
//!     }
//!     fn outputs(&self) -> &[BlockVariableId] {
//!         &self.outs
//!     }
//!     fn recompute(&self, inputs: &[Value]) -> AdjointResult<Vec<Value>> {
//!         Ok(vec![inputs[0].scaled(3.0)])
//!     }
//!     fn adjoint_contribution(
//!         &self,
//!         _state: &BlockState<'_>,
//!         _dependency: usize,
//!         adj_outputs: &[Value],
//!     ) -> AdjointResult<Value> {
//!         Ok(adj_outputs[0].scaled(3.0))
//!     }
//! }
//! ```

use crate::block_variable::BlockVariableId;
use crate::error::{AdjointError, AdjointResult};
use crate::value::Value;
use std::fmt;

/// Checkpointed values a block sees while a sweep visits it.
#[derive(Clone, Copy, Debug)]
pub struct BlockState<'a> {
    /// Dependency checkpoints, in dependency order (placeholders resolved)
    pub inputs: &'a [Value],
    /// Output checkpoints, in output order
    pub outputs: &'a [Value],
    /// Dependency tangent-linear values; `None` reads as zero
    pub tlm_inputs: &'a [Option<Value>],
}

impl BlockState<'_> {
    /// Tangent-linear value of dependency `index`, if one is defined.
    #[inline]
    pub fn tlm_input(&self, index: usize) -> Option<&Value> {
        self.tlm_inputs.get(index).and_then(Option::as_ref)
    }
}

/// One recorded differentiable operation.
///
/// Every rule has a default that fails with
/// [`AdjointError::UnsupportedOperation`], so a block kind only needs to
/// provide the rules its callers will actually sweep through. Blocks that
/// are linear in their dependencies must still implement
/// [`hessian_contribution`](Block::hessian_contribution) and return zero
/// explicitly.
pub trait Block: fmt::Debug {
    /// Human-readable name of the operation kind.
    fn name(&self) -> &str;

    /// Variables this block reads.
    fn dependencies(&self) -> &[BlockVariableId];

    /// Variables this block produces.
    fn outputs(&self) -> &[BlockVariableId];

    /// Recomputes every output from the dependency checkpoints.
    fn recompute(&self, inputs: &[Value]) -> AdjointResult<Vec<Value>> {
        let _ = inputs;
        Err(unsupported(self.name(), "recompute"))
    }

    /// `(∂outputs/∂dependency)ᵀ · adj_outputs` for one dependency.
    ///
    /// `adj_outputs` holds one entry per output; outputs that received no
    /// adjoint are passed as zeros.
    fn adjoint_contribution(
        &self,
        state: &BlockState<'_>,
        dependency: usize,
        adj_outputs: &[Value],
    ) -> AdjointResult<Value> {
        let _ = (state, dependency, adj_outputs);
        Err(unsupported(self.name(), "adjoint"))
    }

    /// `(∂output/∂dependency) · tlm_dependency` for one output and one
    /// dependency. The tape sums these over dependencies.
    fn tangent_linear_contribution(
        &self,
        state: &BlockState<'_>,
        output: usize,
        dependency: usize,
        tlm_dependency: &Value,
    ) -> AdjointResult<Value> {
        let _ = (state, output, dependency, tlm_dependency);
        Err(unsupported(self.name(), "tangent-linear"))
    }

    /// Second-order term for one dependency:
    /// `Σ_j adj_outputsᵀ · ∂²outputs/∂dep ∂dep_j · tlm(dep_j)`.
    ///
    /// The first-order part of the second-order adjoint is obtained by the
    /// tape from [`adjoint_contribution`](Block::adjoint_contribution)
    /// applied to the outputs' Hessian values.
    fn hessian_contribution(
        &self,
        state: &BlockState<'_>,
        dependency: usize,
        adj_outputs: &[Value],
    ) -> AdjointResult<Value> {
        let _ = (state, dependency, adj_outputs);
        Err(unsupported(self.name(), "hessian"))
    }
}

/// Builds the error returned by a missing block rule.
pub fn unsupported(block: &str, rule: &'static str) -> AdjointError {
    AdjointError::UnsupportedOperation {
        block: block.to_string(),
        rule,
    }
}
