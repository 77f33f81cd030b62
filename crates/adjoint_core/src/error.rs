//! Error types for tape recording, replay and derivative sweeps.

use crate::block_variable::BlockVariableId;
use thiserror::Error;

/// Errors that can occur while recording or replaying a tape.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdjointError {
    /// A block was reached by a sweep that needs a rule it does not provide.
    #[error("Block '{block}' does not support {rule}")]
    UnsupportedOperation {
        /// Name of the block kind
        block: String,
        /// The missing rule (e.g. "adjoint", "tangent-linear", "hessian")
        rule: &'static str,
    },

    /// A derivative was requested without a forward evaluation at the
    /// current tape state.
    #[error("Derivative requested before a forward evaluation at the current point")]
    StaleEvaluation,

    /// Two values (or a value and a control) have incompatible shapes.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Dimension actually supplied
        actual: usize,
    },

    /// The id does not refer to a variable on this tape.
    #[error("Unknown block variable {0}")]
    UnknownVariable(BlockVariableId),

    /// A placeholder was listed as the output of a block.
    #[error("Placeholder {0} cannot be a block output")]
    PlaceholderAsOutput(BlockVariableId),

    /// A checkpoint write or a control was aimed at a placeholder.
    #[error("Placeholder {0} holds no checkpoint; link it to a variable instead")]
    PlaceholderCheckpoint(BlockVariableId),

    /// The id does not refer to a placeholder.
    #[error("Block variable {0} is not a placeholder")]
    NotAPlaceholder(BlockVariableId),

    /// Linking the placeholder would make it read its own value.
    #[error("Linking placeholder {0} would create a cycle")]
    PlaceholderCycle(BlockVariableId),

    /// Number of supplied values does not match the number of controls.
    #[error("Expected {expected} control values, got {actual}")]
    ControlCountMismatch {
        /// Number of controls
        expected: usize,
        /// Number of values supplied
        actual: usize,
    },

    /// A variable has no checkpointed value.
    #[error("Block variable {0} has no checkpoint")]
    MissingCheckpoint(BlockVariableId),

    /// The value is not associated with any block variable.
    #[error("Value is not recorded on a tape")]
    NotAnnotated,

    /// Partial replay was requested from a block that does not exist.
    #[error("Block index {index} out of range (tape holds {len} blocks)")]
    BlockIndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of blocks on the tape
        len: usize,
    },

    /// Configuration values are out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for adjoint operations.
pub type AdjointResult<T> = Result<T, AdjointError>;
