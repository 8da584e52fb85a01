//! Alsvin Control-Flow Construction
//!
//! This crate turns a classified program into the structures the optimizer
//! analyses run over: a graph of basic blocks, and the segmented
//! instruction list with per-variable dependency edges.
//!
//! # Pipeline
//!
//! ```text
//! ScopeTable + LineType map
//!       │
//!       ▼
//! ControlFlowBuilder ──► ControlFlowGraph (blocks, branches)
//!       │
//!       ├── splitter::split      homogeneous quantum/classical sub-blocks
//!       ├── ranker::rank         dominance sets + total order
//!       ▼
//! InstructionListBuilder ──► InstructionList (segments + dependency links)
//! ```
//!
//! # Example
//!
//! ```rust
//! use alsvin_flow::{ControlFlowBuilder, InstructionListBuilder, ranker, splitter};
//! use alsvin_ir::{ScopeTable, SyntaxNode, classify, rules};
//!
//! // 0: H q   1: MEASURE q ro[0]
//! let tree = SyntaxNode::new("program", "", 0)
//!     .with_child(
//!         SyntaxNode::new(rules::GATE, "H", 0)
//!             .with_child(SyntaxNode::new(rules::QUBIT, "q", 0)),
//!     )
//!     .with_child(
//!         SyntaxNode::new(rules::MEASURE, "MEASURE", 1)
//!             .with_child(SyntaxNode::new(rules::QUBIT, "q", 1))
//!             .with_child(SyntaxNode::new(rules::MEMORY_REF, "ro[0]", 1)),
//!     );
//!
//! let scope = ScopeTable::from_tree(&tree);
//! let classes = classify(&tree);
//!
//! let graph = ControlFlowBuilder::new(&scope, &classes).build()?;
//! let mut graph = splitter::split(&graph, &classes)?;
//! ranker::rank(&mut graph)?;
//!
//! let program = InstructionListBuilder::new(&graph, &classes, &tree).build()?;
//! assert_eq!(program.segments().len(), 1);
//! assert_eq!(program.num_instructions(), 2);
//! # Ok::<(), alsvin_flow::FlowError>(())
//! ```

pub mod block;
pub mod builder;
pub mod error;
pub mod linearize;
pub mod ranker;
pub mod splitter;

pub use block::{BlockId, ControlFlowBlock, ControlFlowGraph, ENTRY_BLOCK, HALT_BLOCK};
pub use builder::ControlFlowBuilder;
pub use error::{FlowError, FlowResult};
pub use linearize::{ExecutableInstructionsExtractor, InstructionListBuilder};
