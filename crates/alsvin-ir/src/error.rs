//! Error types for the IR crate.

use thiserror::Error;

/// Errors that can occur in IR operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IrError {
    /// Contradictory or malformed instruction shape.
    ///
    /// Indicates an upstream grammar or classification bug; fatal.
    #[error("Malformed instruction at line {line}: {reason}")]
    MalformedInstruction {
        /// Source line of the offending instruction.
        line: u32,
        /// What was wrong with its shape.
        reason: String,
    },

    /// Looked up a parameter that is not present on an instruction.
    ///
    /// A programming error in the caller, not a recoverable condition.
    #[error("Parameter '{name}' not found on instruction at line {line}")]
    ParameterNotFound {
        /// The requested parameter name.
        name: String,
        /// Source line of the instruction.
        line: u32,
    },

    /// A dependency edge is present on one side only.
    #[error("Asymmetric dependency link for '{name}' at line {line}")]
    BrokenLink {
        /// Variable name carrying the edge.
        name: String,
        /// Source line of the instruction holding the one-sided edge.
        line: u32,
    },
}

/// Result type for IR operations.
pub type IrResult<T> = Result<T, IrError>;
