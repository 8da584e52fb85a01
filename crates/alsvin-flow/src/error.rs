//! Error types for control-flow construction.

use alsvin_ir::IrError;
use thiserror::Error;

/// Errors that can occur while building or traversing the flow graph.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FlowError {
    /// A jump names a label the scope does not define.
    #[error("Jump at line {line} targets unknown label '{label}'")]
    UnknownLabel {
        /// The undefined target label.
        label: String,
        /// Line of the offending jump.
        line: u32,
    },

    /// The jump graph contains a loop.
    ///
    /// Ranking requires an acyclic dominance relation; cyclic programs are
    /// rejected at construction time rather than walked forever.
    #[error("Control-flow graph contains a cycle")]
    CyclicControlFlow,

    /// The graph has no entry block.
    #[error("Control-flow graph has no entry block")]
    MissingEntry,

    /// The ranking worklist made a full sweep without progress.
    #[error("Block ranking stalled: dominance relation is not well-founded")]
    RankingStalled,

    /// Parallel segment/executed-set inputs differ in length.
    #[error("Segment count mismatch: {segments} segments but {executed} executed sets")]
    SegmentCountMismatch {
        /// Number of segments supplied.
        segments: usize,
        /// Number of executed sets supplied.
        executed: usize,
    },

    /// Underlying IR error.
    #[error(transparent)]
    Ir(#[from] IrError),
}

/// Result type for flow operations.
pub type FlowResult<T> = Result<T, FlowError>;
