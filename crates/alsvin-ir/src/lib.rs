//! Alsvin Hybrid Program Intermediate Representation
//!
//! This crate provides the core data structures for representing hybrid
//! quantum/classical programs in Alsvin. It forms the foundation of the
//! optimization stack.
//!
//! # Overview
//!
//! A program arrives as a parsed [`SyntaxNode`] tree, one instruction per
//! source line, mixing quantum gates and measurements with classical
//! arithmetic and control jumps. The IR layers on top of that tree:
//!
//! - **Line classification**: [`classify`] labels every line with a
//!   [`LineType`] from a fixed rule-tag table.
//! - **Instructions**: [`InstructionNode`] owns one instruction's subtree
//!   plus its classical and quantum parameters, each carrying
//!   previous/next dependency links to other instructions touching the
//!   same variable.
//! - **Segments**: [`InstructionList`] is the segmented program, an arena
//!   of instructions addressed by [`InstrId`] handles, partitioned into
//!   straight-line execution [`Segment`]s. It is the unit every analysis
//!   and transformation operates on, and it deep-copies with `clone()`.
//! - **Abstract qubit states**: [`CliffordState`] is the six-state
//!   stabilizer lattice used for quantum constant propagation;
//!   [`apply_gate`] is the Clifford group action on it.
//!
//! # Example: classifying a small program
//!
//! ```rust
//! use alsvin_ir::{classify, LineType, SyntaxNode, rules};
//!
//! let program = SyntaxNode::new("program", "", 0)
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
//! let classes = classify(&program);
//! assert_eq!(classes[&0], LineType::Quantum);
//! assert_eq!(classes[&1], LineType::QuantumInfluencesClassical);
//! ```
//!
//! # Example: walking the Clifford lattice
//!
//! ```rust
//! use alsvin_ir::{apply_gate, CliffordState};
//!
//! // H maps the X basis onto the Z basis, where measurement is definite.
//! let state = apply_gate("H", CliffordState::XPlus).unwrap();
//! assert_eq!(state, CliffordState::ZPlus);
//! assert_eq!(state.measurement_outcome(), Some(0));
//! ```

pub mod error;
pub mod instruction;
pub mod line;
pub mod state;
pub mod syntax;
pub mod variable;

pub use error::{IrError, IrResult};
pub use instruction::{InstrId, InstructionList, InstructionNode, MemoryKind, Segment};
pub use line::{LineType, classify, line_type_for_rule};
pub use state::{CliffordState, apply_gate};
pub use syntax::{ScopeTable, SyntaxNode, rules};
pub use variable::{ClassicalUsage, ClassicalVariable, QuantumUsage, QuantumVariable};
