//! Substituting a dependency after it has been recorded.
//!
//! A [`Placeholder`] takes over the block variable of an overloaded value.
//! Blocks recorded afterwards depend on the placeholder entry, whose
//! checkpoint reads are redirected by the tape: to the original variable
//! while unlinked, or to whatever variable [`Placeholder::set_value`] linked
//! it to. Recorded blocks are never rewritten.
//!
//! # Example
//!
//! ```rust
//! use adjoint_core::tape::{get_working_tape, push_tape};
//! use adjoint_core::{AdjFloat, Overloaded, Placeholder, Tape, Value};
//!
//! let _scope = push_tape(Tape::shared());
//! let mut u = AdjFloat::new(2.0);
//! let p = Placeholder::new(&mut u).unwrap();
//! let y = u * 3.0;
//!
//! let later = AdjFloat::new(5.0);
//! p.set_value(&later).unwrap();
//!
//! let tape = get_working_tape();
//! tape.borrow_mut().recompute().unwrap();
//! let y_id = y.annotated_id().unwrap();
//! assert_eq!(tape.borrow().saved_output(y_id).unwrap(), &Value::Scalar(15.0));
//! ```

use crate::block_variable::BlockVariableId;
use crate::error::AdjointResult;
use crate::overloaded::Overloaded;
use crate::tape::{get_working_tape, TapeHandle};
use tracing::debug;

/// Handle to a placeholder entry on a tape.
#[derive(Debug, Clone)]
pub struct Placeholder {
    tape: TapeHandle,
    id: BlockVariableId,
}

impl Placeholder {
    /// Installs a placeholder for `value` on the working tape.
    ///
    /// `value` is re-associated with the placeholder, so subsequent
    /// operations on it depend on the placeholder instead of its original
    /// block variable.
    pub fn new<T: Overloaded>(value: &mut T) -> AdjointResult<Self> {
        Self::on_tape(get_working_tape(), value)
    }

    /// Installs a placeholder for `value` on `tape`.
    pub fn on_tape<T: Overloaded>(tape: TapeHandle, value: &mut T) -> AdjointResult<Self> {
        let origin = value.annotated_id()?;
        let id = tape.borrow_mut().create_placeholder(origin)?;
        value.set_block_variable(id);
        debug!(placeholder = %id, origin = %origin, "created placeholder");
        Ok(Self { tape, id })
    }

    /// Redirects reads of this placeholder to the block variable of `other`.
    pub fn set_value<T: Overloaded>(&self, other: &T) -> AdjointResult<()> {
        let target = other.annotated_id()?;
        self.link(target)
    }

    /// Redirects reads of this placeholder to `target`.
    pub fn link(&self, target: BlockVariableId) -> AdjointResult<()> {
        self.tape.borrow_mut().link_placeholder(self.id, target)?;
        debug!(placeholder = %self.id, target = %target, "linked placeholder");
        Ok(())
    }

    /// Removes the current link; reads go back to the original variable.
    pub fn reset(&self) -> AdjointResult<()> {
        self.tape.borrow_mut().unlink_placeholder(self.id)
    }

    /// Id of the placeholder entry.
    pub fn id(&self) -> BlockVariableId {
        self.id
    }

    /// Variable currently linked, if any.
    pub fn linked(&self) -> Option<BlockVariableId> {
        self.tape.borrow().linked_variable(self.id)
    }
}
