//! Marking block variables as controls.

use crate::block_variable::BlockVariableId;
use crate::error::AdjointResult;
use crate::overloaded::Overloaded;
use crate::tape::{get_working_tape, Tape, TapeHandle};
use crate::value::Value;

/// An independent input a functional is differentiated with respect to.
///
/// Creating a control flags its block variable on the tape, so replay keeps
/// the control's checkpoint and the tangent-linear sweep keeps its seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Control {
    block_variable: BlockVariableId,
}

impl Control {
    /// Controls the current block variable of `value` on the working tape.
    pub fn new<T: Overloaded>(value: &T) -> AdjointResult<Self> {
        Self::on_tape(&get_working_tape(), value)
    }

    /// Controls the current block variable of `value` on `tape`.
    pub fn on_tape<T: Overloaded>(tape: &TapeHandle, value: &T) -> AdjointResult<Self> {
        Self::from_id(&mut tape.borrow_mut(), value.annotated_id()?)
    }

    /// Controls an existing block variable.
    ///
    /// Placeholders are rejected; control the variable they read instead.
    pub fn from_id(tape: &mut Tape, id: BlockVariableId) -> AdjointResult<Self> {
        tape.mark_control(id)?;
        Ok(Self { block_variable: id })
    }

    /// Id of the controlled block variable.
    #[inline]
    pub fn block_variable(&self) -> BlockVariableId {
        self.block_variable
    }

    /// Current checkpoint of the control.
    pub fn tape_value(&self, tape: &Tape) -> AdjointResult<Value> {
        tape.saved_output(self.block_variable).cloned()
    }

    /// Overwrites the control's checkpoint.
    pub fn update(&self, tape: &mut Tape, value: Value) -> AdjointResult<()> {
        tape.set_saved_output(self.block_variable, value)
    }
}
