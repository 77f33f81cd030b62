//! Elementwise operation blocks shared by [`AdjFloat`](super::AdjFloat)
//! and [`AdjVector`](super::AdjVector).
//!
//! Every operation is applied componentwise, so the Jacobian is diagonal
//! and each rule reduces to a product of per-component partial
//! derivatives.

use crate::block::{Block, BlockState};
use crate::block_variable::BlockVariableId;
use crate::error::AdjointResult;
use crate::value::Value;

// =============================================================================
// Unary operations
// =============================================================================

/// A componentwise function of one argument.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `e^x`
    Exp,
    /// `ln x`
    Ln,
    /// `sin x`
    Sin,
    /// `cos x`
    Cos,
    /// `√x`
    Sqrt,
    /// `tanh x`
    Tanh,
    /// `x^n` for a constant exponent
    Powf(f64),
}

impl UnaryOp {
    /// Operation name used in block names and logs.
    pub fn name(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "Neg",
            UnaryOp::Exp => "Exp",
            UnaryOp::Ln => "Ln",
            UnaryOp::Sin => "Sin",
            UnaryOp::Cos => "Cos",
            UnaryOp::Sqrt => "Sqrt",
            UnaryOp::Tanh => "Tanh",
            UnaryOp::Powf(_) => "Powf",
        }
    }

    /// f(x)
    #[inline]
    pub fn eval(&self, x: f64) -> f64 {
        match *self {
            UnaryOp::Neg => -x,
            UnaryOp::Exp => x.exp(),
            UnaryOp::Ln => x.ln(),
            UnaryOp::Sin => x.sin(),
            UnaryOp::Cos => x.cos(),
            UnaryOp::Sqrt => x.sqrt(),
            UnaryOp::Tanh => x.tanh(),
            UnaryOp::Powf(n) => x.powf(n),
        }
    }

    /// f'(x)
    #[inline]
    pub fn first(&self, x: f64) -> f64 {
        match *self {
            UnaryOp::Neg => -1.0,
            UnaryOp::Exp => x.exp(),
            UnaryOp::Ln => 1.0 / x,
            UnaryOp::Sin => x.cos(),
            UnaryOp::Cos => -x.sin(),
            UnaryOp::Sqrt => 0.5 / x.sqrt(),
            UnaryOp::Tanh => 1.0 - x.tanh().powi(2),
            UnaryOp::Powf(n) => n * x.powf(n - 1.0),
        }
    }

    /// f''(x)
    #[inline]
    pub fn second(&self, x: f64) -> f64 {
        match *self {
            UnaryOp::Neg => 0.0,
            UnaryOp::Exp => x.exp(),
            UnaryOp::Ln => -1.0 / (x * x),
            UnaryOp::Sin => -x.sin(),
            UnaryOp::Cos => -x.cos(),
            UnaryOp::Sqrt => -0.25 / (x * x.sqrt()),
            UnaryOp::Tanh => {
                let t = x.tanh();
                -2.0 * t * (1.0 - t * t)
            }
            UnaryOp::Powf(n) => n * (n - 1.0) * x.powf(n - 2.0),
        }
    }
}

/// Block applying a [`UnaryOp`] componentwise.
#[derive(Debug)]
pub struct UnaryBlock {
    op: UnaryOp,
    dependencies: [BlockVariableId; 1],
    outputs: [BlockVariableId; 1],
}

impl UnaryBlock {
    /// `output = op(input)`
    pub fn new(op: UnaryOp, input: BlockVariableId, output: BlockVariableId) -> Self {
        Self {
            op,
            dependencies: [input],
            outputs: [output],
        }
    }
}

impl Block for UnaryBlock {
    fn name(&self) -> &str {
        self.op.name()
    }

    fn dependencies(&self) -> &[BlockVariableId] {
        &self.dependencies
    }

    fn outputs(&self) -> &[BlockVariableId] {
        &self.outputs
    }

    fn recompute(&self, inputs: &[Value]) -> AdjointResult<Vec<Value>> {
        let op = self.op;
        Ok(vec![inputs[0].map(|x| op.eval(x))])
    }

    fn adjoint_contribution(
        &self,
        state: &BlockState<'_>,
        _dependency: usize,
        adj_outputs: &[Value],
    ) -> AdjointResult<Value> {
        let op = self.op;
        adj_outputs[0].zip_map(&state.inputs[0], |adj, x| adj * op.first(x))
    }

    fn tangent_linear_contribution(
        &self,
        state: &BlockState<'_>,
        _output: usize,
        _dependency: usize,
        tlm_dependency: &Value,
    ) -> AdjointResult<Value> {
        let op = self.op;
        tlm_dependency.zip_map(&state.inputs[0], |t, x| op.first(x) * t)
    }

    fn hessian_contribution(
        &self,
        state: &BlockState<'_>,
        _dependency: usize,
        adj_outputs: &[Value],
    ) -> AdjointResult<Value> {
        let x = &state.inputs[0];
        let Some(t) = state.tlm_input(0) else {
            return Ok(x.zeros_like());
        };
        x.check_same_shape(t)?;
        x.check_same_shape(&adj_outputs[0])?;
        let components = x
            .as_slice()
            .iter()
            .zip(t.as_slice())
            .zip(adj_outputs[0].as_slice())
            .map(|((x, t), adj)| adj * self.op.second(*x) * t)
            .collect();
        Ok(x.like(components))
    }
}

// =============================================================================
// Binary operations
// =============================================================================

/// A componentwise function of two equally shaped arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    /// `a + b`
    Add,
    /// `a - b`
    Sub,
    /// `a * b`
    Mul,
    /// `a / b`
    Div,
    /// `a^b`
    Pow,
}

impl BinaryOp {
    /// Operation name used in block names and logs.
    pub fn name(&self) -> &'static str {
        match self {
            BinaryOp::Add => "Add",
            BinaryOp::Sub => "Sub",
            BinaryOp::Mul => "Mul",
            BinaryOp::Div => "Div",
            BinaryOp::Pow => "Pow",
        }
    }

    /// f(a, b)
    #[inline]
    pub fn eval(&self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Pow => a.powf(b),
        }
    }

    /// ∂f/∂a (`wrt == 0`) or ∂f/∂b (`wrt == 1`).
    #[inline]
    pub fn first(&self, a: f64, b: f64, wrt: usize) -> f64 {
        match (self, wrt) {
            (BinaryOp::Add, _) => 1.0,
            (BinaryOp::Sub, 0) => 1.0,
            (BinaryOp::Sub, _) => -1.0,
            (BinaryOp::Mul, 0) => b,
            (BinaryOp::Mul, _) => a,
            (BinaryOp::Div, 0) => 1.0 / b,
            (BinaryOp::Div, _) => -a / (b * b),
            (BinaryOp::Pow, 0) => b * a.powf(b - 1.0),
            (BinaryOp::Pow, _) => a.powf(b) * a.ln(),
        }
    }

    /// ∂²f/∂i∂j with argument indices `i`, `j` in `{0, 1}`.
    #[inline]
    pub fn second(&self, a: f64, b: f64, i: usize, j: usize) -> f64 {
        match (self, i.min(j), i.max(j)) {
            (BinaryOp::Add | BinaryOp::Sub, _, _) => 0.0,
            (BinaryOp::Mul, 0, 1) => 1.0,
            (BinaryOp::Mul, _, _) => 0.0,
            (BinaryOp::Div, 0, 0) => 0.0,
            (BinaryOp::Div, 0, _) => -1.0 / (b * b),
            (BinaryOp::Div, _, _) => 2.0 * a / (b * b * b),
            (BinaryOp::Pow, 0, 0) => b * (b - 1.0) * a.powf(b - 2.0),
            (BinaryOp::Pow, 0, _) => a.powf(b - 1.0) * (1.0 + b * a.ln()),
            (BinaryOp::Pow, _, _) => a.powf(b) * a.ln().powi(2),
        }
    }
}

/// Block applying a [`BinaryOp`] componentwise.
#[derive(Debug)]
pub struct BinaryBlock {
    op: BinaryOp,
    dependencies: [BlockVariableId; 2],
    outputs: [BlockVariableId; 1],
}

impl BinaryBlock {
    /// `output = op(lhs, rhs)`
    pub fn new(
        op: BinaryOp,
        lhs: BlockVariableId,
        rhs: BlockVariableId,
        output: BlockVariableId,
    ) -> Self {
        Self {
            op,
            dependencies: [lhs, rhs],
            outputs: [output],
        }
    }
}

impl Block for BinaryBlock {
    fn name(&self) -> &str {
        self.op.name()
    }

    fn dependencies(&self) -> &[BlockVariableId] {
        &self.dependencies
    }

    fn outputs(&self) -> &[BlockVariableId] {
        &self.outputs
    }

    fn recompute(&self, inputs: &[Value]) -> AdjointResult<Vec<Value>> {
        let op = self.op;
        Ok(vec![inputs[0].zip_map(&inputs[1], |a, b| op.eval(a, b))?])
    }

    fn adjoint_contribution(
        &self,
        state: &BlockState<'_>,
        dependency: usize,
        adj_outputs: &[Value],
    ) -> AdjointResult<Value> {
        let (a, b) = (&state.inputs[0], &state.inputs[1]);
        a.check_same_shape(b)?;
        a.check_same_shape(&adj_outputs[0])?;
        let components = a
            .as_slice()
            .iter()
            .zip(b.as_slice())
            .zip(adj_outputs[0].as_slice())
            .map(|((a, b), adj)| adj * self.op.first(*a, *b, dependency))
            .collect();
        Ok(state.inputs[dependency].like(components))
    }

    fn tangent_linear_contribution(
        &self,
        state: &BlockState<'_>,
        _output: usize,
        dependency: usize,
        tlm_dependency: &Value,
    ) -> AdjointResult<Value> {
        let (a, b) = (&state.inputs[0], &state.inputs[1]);
        a.check_same_shape(b)?;
        a.check_same_shape(tlm_dependency)?;
        let components = a
            .as_slice()
            .iter()
            .zip(b.as_slice())
            .zip(tlm_dependency.as_slice())
            .map(|((a, b), t)| self.op.first(*a, *b, dependency) * t)
            .collect();
        Ok(state.outputs[0].like(components))
    }

    fn hessian_contribution(
        &self,
        state: &BlockState<'_>,
        dependency: usize,
        adj_outputs: &[Value],
    ) -> AdjointResult<Value> {
        let (a, b) = (&state.inputs[0], &state.inputs[1]);
        a.check_same_shape(b)?;
        a.check_same_shape(&adj_outputs[0])?;
        let mut components = vec![0.0; a.dim()];
        for other in 0..2 {
            let Some(t) = state.tlm_input(other) else {
                continue;
            };
            a.check_same_shape(t)?;
            for (k, c) in components.iter_mut().enumerate() {
                let (ak, bk) = (a.as_slice()[k], b.as_slice()[k]);
                *c += adj_outputs[0].as_slice()[k]
                    * self.op.second(ak, bk, dependency, other)
                    * t.as_slice()[k];
            }
        }
        Ok(state.inputs[dependency].like(components))
    }
}
