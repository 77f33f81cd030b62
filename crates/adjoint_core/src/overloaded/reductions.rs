//! Blocks that mix scalars and vectors.

use crate::block::{Block, BlockState};
use crate::block_variable::BlockVariableId;
use crate::error::AdjointResult;
use crate::value::Value;

// =============================================================================
// Inner product
// =============================================================================

/// `s = u · v`
#[derive(Debug)]
pub struct InnerBlock {
    dependencies: [BlockVariableId; 2],
    outputs: [BlockVariableId; 1],
}

impl InnerBlock {
    /// Records `output = lhs · rhs`.
    pub fn new(lhs: BlockVariableId, rhs: BlockVariableId, output: BlockVariableId) -> Self {
        Self {
            dependencies: [lhs, rhs],
            outputs: [output],
        }
    }
}

impl Block for InnerBlock {
    fn name(&self) -> &str {
        "Inner"
    }

    fn dependencies(&self) -> &[BlockVariableId] {
        &self.dependencies
    }

    fn outputs(&self) -> &[BlockVariableId] {
        &self.outputs
    }

    fn recompute(&self, inputs: &[Value]) -> AdjointResult<Vec<Value>> {
        Ok(vec![Value::Scalar(inputs[0].inner(&inputs[1])?)])
    }

    fn adjoint_contribution(
        &self,
        state: &BlockState<'_>,
        dependency: usize,
        adj_outputs: &[Value],
    ) -> AdjointResult<Value> {
        let adj = adj_outputs[0].to_scalar()?;
        Ok(state.inputs[1 - dependency].scaled(adj))
    }

    fn tangent_linear_contribution(
        &self,
        state: &BlockState<'_>,
        _output: usize,
        dependency: usize,
        tlm_dependency: &Value,
    ) -> AdjointResult<Value> {
        Ok(Value::Scalar(
            tlm_dependency.inner(&state.inputs[1 - dependency])?,
        ))
    }

    fn hessian_contribution(
        &self,
        state: &BlockState<'_>,
        dependency: usize,
        adj_outputs: &[Value],
    ) -> AdjointResult<Value> {
        let other = 1 - dependency;
        match state.tlm_input(other) {
            Some(t) => {
                state.inputs[dependency].check_same_shape(t)?;
                Ok(t.scaled(adj_outputs[0].to_scalar()?))
            }
            None => Ok(state.inputs[dependency].zeros_like()),
        }
    }
}

// =============================================================================
// Scalar times vector
// =============================================================================

/// `w = a v` with a scalar `a`.
#[derive(Debug)]
pub struct ScaleBlock {
    dependencies: [BlockVariableId; 2],
    outputs: [BlockVariableId; 1],
}

impl ScaleBlock {
    /// Records `output = factor * vector`.
    pub fn new(factor: BlockVariableId, vector: BlockVariableId, output: BlockVariableId) -> Self {
        Self {
            dependencies: [factor, vector],
            outputs: [output],
        }
    }
}

impl Block for ScaleBlock {
    fn name(&self) -> &str {
        "Scale"
    }

    fn dependencies(&self) -> &[BlockVariableId] {
        &self.dependencies
    }

    fn outputs(&self) -> &[BlockVariableId] {
        &self.outputs
    }

    fn recompute(&self, inputs: &[Value]) -> AdjointResult<Vec<Value>> {
        let a = inputs[0].to_scalar()?;
        Ok(vec![inputs[1].scaled(a)])
    }

    fn adjoint_contribution(
        &self,
        state: &BlockState<'_>,
        dependency: usize,
        adj_outputs: &[Value],
    ) -> AdjointResult<Value> {
        if dependency == 0 {
            Ok(Value::Scalar(adj_outputs[0].inner(&state.inputs[1])?))
        } else {
            let a = state.inputs[0].to_scalar()?;
            state.inputs[1].check_same_shape(&adj_outputs[0])?;
            Ok(adj_outputs[0].scaled(a))
        }
    }

    fn tangent_linear_contribution(
        &self,
        state: &BlockState<'_>,
        _output: usize,
        dependency: usize,
        tlm_dependency: &Value,
    ) -> AdjointResult<Value> {
        if dependency == 0 {
            Ok(state.inputs[1].scaled(tlm_dependency.to_scalar()?))
        } else {
            state.inputs[1].check_same_shape(tlm_dependency)?;
            Ok(tlm_dependency.scaled(state.inputs[0].to_scalar()?))
        }
    }

    fn hessian_contribution(
        &self,
        state: &BlockState<'_>,
        dependency: usize,
        adj_outputs: &[Value],
    ) -> AdjointResult<Value> {
        if dependency == 0 {
            match state.tlm_input(1) {
                Some(t) => Ok(Value::Scalar(adj_outputs[0].inner(t)?)),
                None => Ok(Value::Scalar(0.0)),
            }
        } else {
            match state.tlm_input(0) {
                Some(t) => {
                    state.inputs[1].check_same_shape(&adj_outputs[0])?;
                    Ok(adj_outputs[0].scaled(t.to_scalar()?))
                }
                None => Ok(state.inputs[1].zeros_like()),
            }
        }
    }
}

// =============================================================================
// Sum of components
// =============================================================================

/// `s = Σ v_k`
#[derive(Debug)]
pub struct SumBlock {
    dependencies: [BlockVariableId; 1],
    outputs: [BlockVariableId; 1],
}

impl SumBlock {
    /// Records `output = Σ input_k`.
    pub fn new(input: BlockVariableId, output: BlockVariableId) -> Self {
        Self {
            dependencies: [input],
            outputs: [output],
        }
    }
}

impl Block for SumBlock {
    fn name(&self) -> &str {
        "Sum"
    }

    fn dependencies(&self) -> &[BlockVariableId] {
        &self.dependencies
    }

    fn outputs(&self) -> &[BlockVariableId] {
        &self.outputs
    }

    fn recompute(&self, inputs: &[Value]) -> AdjointResult<Vec<Value>> {
        Ok(vec![Value::Scalar(inputs[0].sum())])
    }

    fn adjoint_contribution(
        &self,
        state: &BlockState<'_>,
        _dependency: usize,
        adj_outputs: &[Value],
    ) -> AdjointResult<Value> {
        let adj = adj_outputs[0].to_scalar()?;
        Ok(state.inputs[0].map(|_| adj))
    }

    fn tangent_linear_contribution(
        &self,
        _state: &BlockState<'_>,
        _output: usize,
        _dependency: usize,
        tlm_dependency: &Value,
    ) -> AdjointResult<Value> {
        Ok(Value::Scalar(tlm_dependency.sum()))
    }

    fn hessian_contribution(
        &self,
        state: &BlockState<'_>,
        _dependency: usize,
        _adj_outputs: &[Value],
    ) -> AdjointResult<Value> {
        Ok(state.inputs[0].zeros_like())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<BlockVariableId> {
        (0..n).map(|i| BlockVariableId::new(0, i)).collect()
    }

    #[test]
    fn test_inner_rules() {
        let id = ids(3);
        let block = InnerBlock::new(id[0], id[1], id[2]);
        let inputs = [Value::from(vec![1.0, 2.0]), Value::from(vec![3.0, 4.0])];
        let outputs = block.recompute(&inputs).unwrap();
        assert_eq!(outputs[0], Value::Scalar(11.0));

        let tlm = [None, Some(Value::from(vec![1.0, -1.0]))];
        let state = BlockState {
            inputs: &inputs,
            outputs: &outputs,
            tlm_inputs: &tlm,
        };
        let adj = [Value::Scalar(2.0)];
        assert_eq!(
            block.adjoint_contribution(&state, 0, &adj).unwrap(),
            Value::from(vec![6.0, 8.0])
        );
        assert_eq!(
            block
                .tangent_linear_contribution(&state, 0, 1, tlm[1].as_ref().unwrap())
                .unwrap(),
            Value::Scalar(-1.0)
        );
        assert_eq!(
            block.hessian_contribution(&state, 0, &adj).unwrap(),
            Value::from(vec![2.0, -2.0])
        );
        assert!(block.hessian_contribution(&state, 1, &adj).unwrap().is_zero());
    }

    #[test]
    fn test_scale_rules() {
        let id = ids(3);
        let block = ScaleBlock::new(id[0], id[1], id[2]);
        let inputs = [Value::Scalar(2.0), Value::from(vec![1.0, 3.0])];
        let outputs = block.recompute(&inputs).unwrap();
        assert_eq!(outputs[0], Value::from(vec![2.0, 6.0]));

        let tlm = [Some(Value::Scalar(0.5)), Some(Value::from(vec![1.0, 1.0]))];
        let state = BlockState {
            inputs: &inputs,
            outputs: &outputs,
            tlm_inputs: &tlm,
        };
        let adj = [Value::from(vec![1.0, 2.0])];
        assert_eq!(block.adjoint_contribution(&state, 0, &adj).unwrap(), Value::Scalar(7.0));
        assert_eq!(
            block.adjoint_contribution(&state, 1, &adj).unwrap(),
            Value::from(vec![2.0, 4.0])
        );
        assert_eq!(block.hessian_contribution(&state, 0, &adj).unwrap(), Value::Scalar(3.0));
        assert_eq!(
            block.hessian_contribution(&state, 1, &adj).unwrap(),
            Value::from(vec![0.5, 1.0])
        );
    }

    #[test]
    fn test_sum_rules() {
        let id = ids(2);
        let block = SumBlock::new(id[0], id[1]);
        let inputs = [Value::from(vec![1.0, 2.0, 3.0])];
        let outputs = block.recompute(&inputs).unwrap();
        assert_eq!(outputs[0], Value::Scalar(6.0));

        let state = BlockState {
            inputs: &inputs,
            outputs: &outputs,
            tlm_inputs: &[None],
        };
        assert_eq!(
            block.adjoint_contribution(&state, 0, &[Value::Scalar(1.5)]).unwrap(),
            Value::from(vec![1.5, 1.5, 1.5])
        );
        assert!(block
            .hessian_contribution(&state, 0, &[Value::Scalar(1.5)])
            .unwrap()
            .is_zero());
    }
}
