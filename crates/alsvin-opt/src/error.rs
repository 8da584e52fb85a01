//! Error types for analyses and transformations.

use alsvin_flow::FlowError;
use alsvin_ir::IrError;
use thiserror::Error;

/// Errors that can occur during optimization.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OptError {
    /// Complex (non-real) operands reached arithmetic constant folding.
    ///
    /// Signaled distinctly from structural faults so callers can skip
    /// folding the offending instruction instead of aborting the run.
    #[error("Complex operands are not supported in arithmetic folding (line {line})")]
    ComplexUnsupported {
        /// Line of the instruction that could not be folded.
        line: u32,
    },

    /// Underlying IR error.
    #[error(transparent)]
    Ir(#[from] IrError),

    /// Underlying flow-graph error.
    #[error(transparent)]
    Flow(#[from] FlowError),
}

/// Result type for optimization operations.
pub type OptResult<T> = Result<T, OptError>;
