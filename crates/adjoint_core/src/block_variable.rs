//! Graph nodes carrying one value through the tape.

use crate::error::AdjointResult;
use crate::value::Value;
use std::fmt;

/// Address of a [`BlockVariable`]: the identity of the tape that created it
/// plus its index in that tape's arena.
///
/// Tape identities are never reused, and clearing a tape gives it a fresh
/// one, so an id outlives neither a [`Tape::clear`](crate::Tape::clear) nor
/// a move to another tape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockVariableId {
    tape: u64,
    index: usize,
}

impl BlockVariableId {
    /// Builds an id from a tape identity and an arena index.
    #[inline]
    pub const fn new(tape: u64, index: usize) -> Self {
        Self { tape, index }
    }

    /// Identity of the tape the variable lives on.
    #[inline]
    pub fn tape(&self) -> u64 {
        self.tape
    }

    /// Position in the tape's arena.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for BlockVariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bv{}", self.index)
    }
}

/// Whether a variable holds its own checkpoint or stands in for another.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VariableKind {
    /// An ordinary variable with its own checkpoint
    Regular,
    /// A dependency-side stand-in created from `origin`
    Placeholder {
        /// Variable the placeholder was created from
        origin: BlockVariableId,
    },
}

/// A node wrapping one value flowing through the graph.
///
/// Holds the checkpoint from the last forward replay together with the
/// adjoint, tangent-linear and second-order adjoint slots written by the
/// tape sweeps. Absent slots (`None`) are read as zero by the sweeps.
#[derive(Clone, Debug)]
pub struct BlockVariable {
    pub(crate) checkpoint: Option<Value>,
    pub(crate) adj_value: Option<Value>,
    pub(crate) tlm_value: Option<Value>,
    pub(crate) hessian_value: Option<Value>,
    pub(crate) is_control: bool,
    pub(crate) creator: Option<usize>,
    pub(crate) kind: VariableKind,
}

impl BlockVariable {
    pub(crate) fn new(checkpoint: Value) -> Self {
        Self {
            checkpoint: Some(checkpoint),
            adj_value: None,
            tlm_value: None,
            hessian_value: None,
            is_control: false,
            creator: None,
            kind: VariableKind::Regular,
        }
    }

    pub(crate) fn placeholder(origin: BlockVariableId) -> Self {
        Self {
            checkpoint: None,
            adj_value: None,
            tlm_value: None,
            hessian_value: None,
            is_control: false,
            creator: None,
            kind: VariableKind::Placeholder { origin },
        }
    }

    /// The variable's own checkpoint.
    ///
    /// Placeholders have none; use [`Tape::saved_output`](crate::Tape::saved_output)
    /// to read through the redirect.
    #[inline]
    pub fn checkpoint(&self) -> Option<&Value> {
        self.checkpoint.as_ref()
    }

    /// Accumulated reverse-mode sensitivity.
    #[inline]
    pub fn adj_value(&self) -> Option<&Value> {
        self.adj_value.as_ref()
    }

    /// Forward-mode directional derivative.
    #[inline]
    pub fn tlm_value(&self) -> Option<&Value> {
        self.tlm_value.as_ref()
    }

    /// Second-order adjoint from the last Hessian sweep.
    #[inline]
    pub fn hessian_value(&self) -> Option<&Value> {
        self.hessian_value.as_ref()
    }

    /// Whether the variable has been registered as a control.
    #[inline]
    pub fn is_control(&self) -> bool {
        self.is_control
    }

    /// Index of the block that produced this variable, if any.
    #[inline]
    pub fn creator(&self) -> Option<usize> {
        self.creator
    }

    /// Regular variable or placeholder.
    #[inline]
    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    /// Whether this entry is a placeholder.
    #[inline]
    pub fn is_placeholder(&self) -> bool {
        matches!(self.kind, VariableKind::Placeholder { .. })
    }

    pub(crate) fn add_adj_output(&mut self, value: Value) -> AdjointResult<()> {
        accumulate(&mut self.adj_value, value)
    }

    pub(crate) fn add_hessian_output(&mut self, value: Value) -> AdjointResult<()> {
        accumulate(&mut self.hessian_value, value)
    }

    /// Clears the adjoint, tangent-linear and Hessian slots.
    pub(crate) fn reset_variables(&mut self) {
        self.adj_value = None;
        self.tlm_value = None;
        self.hessian_value = None;
    }
}

fn accumulate(slot: &mut Option<Value>, value: Value) -> AdjointResult<()> {
    match slot {
        Some(existing) => existing.add_assign(&value),
        None => {
            *slot = Some(value);
            Ok(())
        }
    }
}
