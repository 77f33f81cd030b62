//! Overloaded value types that record their arithmetic on the working tape.
//!
//! These types sit on the computation side of the recording seam: each
//! operation computes its result eagerly and, while annotation is enabled,
//! registers a block plus an output variable on the working tape.
//!
//! - [`AdjFloat`]: a recorded `f64`
//! - [`AdjVector`]: a recorded dense vector
//!
//! # Example
//!
//! ```rust
//! use adjoint_core::{AdjFloat, Control, ReducedFunctional, Value};
//!
//! let x = AdjFloat::new(3.0);
//! let j = x * x + x.sin();
//!
//! let mut rf = ReducedFunctional::new(&j, vec![Control::new(&x).unwrap()]).unwrap();
//! let dj = rf.derivative().unwrap();
//! assert!((dj[0].to_scalar().unwrap() - (6.0 + 3.0_f64.cos())).abs() < 1e-12);
//!
//! let j2 = rf.call(&[Value::from(2.0)]).unwrap();
//! assert!((j2 - (4.0 + 2.0_f64.sin())).abs() < 1e-12);
//! ```

mod adj_float;
mod adj_vector;
mod ops;
mod reductions;

pub use adj_float::AdjFloat;
pub use adj_vector::AdjVector;
pub use ops::{BinaryBlock, BinaryOp, UnaryBlock, UnaryOp};
pub use reductions::{InnerBlock, ScaleBlock, SumBlock};

use crate::block::Block;
use crate::block_variable::BlockVariableId;
use crate::error::{AdjointError, AdjointResult};
use crate::tape::{annotate_tape, get_working_tape, Tape};
use crate::value::Value;

/// A value instance that can be associated with a block variable.
pub trait Overloaded {
    /// Block variable currently representing this value, if recorded.
    fn block_variable(&self) -> Option<BlockVariableId>;

    /// Re-associates this value with another block variable.
    fn set_block_variable(&mut self, id: BlockVariableId);

    /// Deep copy of the value in tape form.
    fn to_value(&self) -> Value;

    /// Block variable of this value, or [`AdjointError::NotAnnotated`].
    fn annotated_id(&self) -> AdjointResult<BlockVariableId> {
        self.block_variable().ok_or(AdjointError::NotAnnotated)
    }
}

/// Registers a fresh variable for `value` when annotation is on.
pub(crate) fn register(value: Value) -> Option<BlockVariableId> {
    if !annotate_tape() {
        return None;
    }
    let tape = get_working_tape();
    let id = tape.borrow_mut().create_block_variable(value);
    Some(id)
}

/// Id of an operand on `tape`. Operands that were never recorded, or whose
/// id belongs to another tape or to this tape before a clear, enter as
/// constants.
fn operand_id(tape: &mut Tape, id: Option<BlockVariableId>, value: &Value) -> BlockVariableId {
    match id {
        Some(id) if tape.block_variable(id).is_ok() => id,
        _ => tape.create_block_variable(value.clone()),
    }
}

/// Records one operation producing `value` from `operands`.
///
/// Returns the output variable, or `None` when annotation is off. If the
/// tape rejects the block, the variables allocated for it are released and
/// the error is kept on the tape (see [`Tape::recording_error`]), so later
/// sweeps fail instead of differentiating an incomplete graph.
pub(crate) fn record<F>(
    value: &Value,
    operands: &[(Option<BlockVariableId>, Value)],
    make: F,
) -> Option<BlockVariableId>
where
    F: FnOnce(&[BlockVariableId], BlockVariableId) -> Box<dyn Block>,
{
    if !annotate_tape() {
        return None;
    }
    let handle = get_working_tape();
    let mut tape = handle.borrow_mut();
    let mark = tape.num_variables();
    let dependencies: Vec<BlockVariableId> = operands
        .iter()
        .map(|(id, operand)| operand_id(&mut tape, *id, operand))
        .collect();
    let output = tape.create_block_variable(value.clone());
    let block = make(&dependencies, output);
    match tape.add_boxed_block(block) {
        Ok(()) => Some(output),
        Err(err) => {
            tape.truncate_variables(mark);
            tape.record_failure(err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tape::push_tape;

    #[test]
    fn test_rejected_operation_is_rolled_back() {
        let tape = Tape::shared();
        let _scope = push_tape(tape.clone());
        let x = AdjFloat::new(2.0);
        let x_id = x.annotated_id().unwrap();
        let p = tape.borrow_mut().create_placeholder(x_id).unwrap();
        let before = tape.borrow().num_variables();

        // a constant operand plus the output are allocated, then rejected
        let out = record(
            &Value::from(2.0),
            &[(Some(x_id), Value::from(2.0)), (None, Value::from(1.0))],
            |deps, _output| Box::new(BinaryBlock::new(BinaryOp::Mul, deps[0], deps[1], p)),
        );
        assert_eq!(out, None);

        let err = AdjointError::PlaceholderAsOutput(p);
        let mut tape = tape.borrow_mut();
        assert_eq!(tape.num_variables(), before);
        assert!(tape.is_empty());
        assert_eq!(tape.recording_error(), Some(&err));
        assert_eq!(tape.recompute().unwrap_err(), err);
    }

    #[test]
    fn test_failed_recording_surfaces_in_gradient() {
        let tape = Tape::shared();
        let _scope = push_tape(tape.clone());
        let x = AdjFloat::new(2.0);
        let x_id = x.annotated_id().unwrap();
        let p = tape.borrow_mut().create_placeholder(x_id).unwrap();
        record(&Value::from(4.0), &[(Some(x_id), Value::from(2.0))], |deps, _output| {
            Box::new(UnaryBlock::new(UnaryOp::Exp, deps[0], p))
        });
        let j = x * x;

        let err = crate::compute_gradient(&j, &[crate::Control::new(&x).unwrap()]).unwrap_err();
        assert_eq!(err, AdjointError::PlaceholderAsOutput(p));
    }
}
