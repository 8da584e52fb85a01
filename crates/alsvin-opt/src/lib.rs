//! Alsvin Hybrid Program Optimizer
//!
//! This crate provides the analyses and transformations that optimize a
//! segmented hybrid quantum/classical program. It implements a pass-based
//! architecture: each pass either analyzes the program into a shared
//! [`ReportSet`] or transforms the instruction list in place.
//!
//! # Pipeline
//!
//! ```text
//! InstructionList (from alsvin-flow)
//!       │
//!       ▼
//! ┌───────────┐
//! │ Optimizer │ ◄── ReportSet (dead lines, constants, hybrid deps)
//! └───────────┘
//!       │
//!       ├── DeadCodeAnalysis / DeadCodeEliminator
//!       ├── ConstantPropagation (classical values + Clifford states)
//!       ├── HybridDependencyAnalysis
//!       └── HybridReorderer
//!       │
//!       ▼
//! Optimized InstructionList + ReportSet
//! ```
//!
//! # Example: folding a classical program
//!
//! ```rust
//! use alsvin_ir::{SyntaxNode, rules};
//! use alsvin_opt::optimize;
//!
//! // 0: DECLARE a BIT   1: MOVE a 1   2: NOT a
//! let tree = SyntaxNode::new("program", "", 0)
//!     .with_child(
//!         SyntaxNode::new(rules::DECLARE, "DECLARE", 0)
//!             .with_child(SyntaxNode::new(rules::MEMORY_REF, "a", 0))
//!             .with_child(SyntaxNode::new(rules::MEMORY_KIND, "BIT", 0)),
//!     )
//!     .with_child(
//!         SyntaxNode::new(rules::MOVE, "MOVE", 1)
//!             .with_child(SyntaxNode::new(rules::MEMORY_REF, "a", 1))
//!             .with_child(SyntaxNode::new(rules::LITERAL, "1", 1)),
//!     )
//!     .with_child(
//!         SyntaxNode::new(rules::UNARY_OP, "NOT", 2)
//!             .with_child(SyntaxNode::new(rules::MEMORY_REF, "a", 2)),
//!     );
//!
//! // Keep a observable so liveness does not remove the chain.
//! let (program, report) = optimize(&tree, &["a"])?;
//! let folded = program.instruction_by_line(2).unwrap();
//! assert_eq!(program.node(folded).text, "MOVE a 0");
//! assert!(report.to_json().get("NewConstants").is_some());
//! # Ok::<(), alsvin_opt::OptError>(())
//! ```
//!
//! # Custom passes
//!
//! Implement the [`Pass`] trait to add a pass to the pipeline:
//!
//! ```rust
//! use alsvin_ir::InstructionList;
//! use alsvin_opt::{Optimizer, Pass, PassKind, OptResult, ReportSet};
//!
//! struct CountInstructions(usize);
//!
//! impl Pass for CountInstructions {
//!     fn name(&self) -> &str { "count_instructions" }
//!     fn kind(&self) -> PassKind { PassKind::Analysis }
//!
//!     fn run(&mut self, program: &mut InstructionList, _report: &mut ReportSet) -> OptResult<()> {
//!         self.0 = program.num_instructions();
//!         Ok(())
//!     }
//! }
//!
//! let mut optimizer = Optimizer::new();
//! optimizer.add_pass(CountInstructions(0));
//! ```

pub mod constprop;
pub mod deadcode;
pub mod error;
pub mod handlers;
pub mod manager;
pub mod pass;
pub mod reorder;
pub mod report;

pub use constprop::{ConstantPropagation, ConstantPropagator};
pub use deadcode::{DeadCodeAnalyser, DeadCodeAnalysis, DeadCodeEliminator};
pub use error::{OptError, OptResult};
pub use handlers::{Handler, HandlerContext, handler_for};
pub use manager::{Optimizer, OptimizerBuilder, optimize, optimize_scope};
pub use pass::{Pass, PassKind};
pub use reorder::{HybridDependencyAnalysis, HybridDependencyFinder, HybridReorderer};
pub use report::{ConstantEvent, ConstantValue, DeadVariableEvent, ReportSet};
