//! Optimizer pipeline orchestration.

use tracing::{debug, info, instrument};

use alsvin_flow::{ControlFlowBuilder, InstructionListBuilder, ranker, splitter};
use alsvin_ir::{InstructionList, ScopeTable, SyntaxNode, classify};

use crate::constprop::ConstantPropagation;
use crate::deadcode::{DeadCodeAnalysis, DeadCodeEliminator};
use crate::error::OptResult;
use crate::pass::Pass;
use crate::reorder::{HybridDependencyAnalysis, HybridReorderer};
use crate::report::ReportSet;

/// Manages and executes a sequence of optimization passes.
pub struct Optimizer {
    /// The passes to execute, in order.
    passes: Vec<Box<dyn Pass>>,
}

impl Optimizer {
    /// Create a new empty optimizer.
    pub fn new() -> Self {
        Self { passes: vec![] }
    }

    /// Add a pass to the pipeline.
    pub fn add_pass(&mut self, pass: impl Pass + 'static) {
        self.passes.push(Box::new(pass));
    }

    /// Run all passes on the given program.
    #[instrument(skip(self, program, report))]
    pub fn run(&mut self, program: &mut InstructionList, report: &mut ReportSet) -> OptResult<()> {
        info!(
            "Running optimizer with {} passes over {} segments",
            self.passes.len(),
            program.segments().len()
        );

        for pass in &mut self.passes {
            debug!("Running pass: {}", pass.name());
            pass.run(program, report)?;
            debug!(
                "Pass {} completed, instructions: {}",
                pass.name(),
                program.num_instructions()
            );
        }

        info!(
            "Optimizer completed, final instruction count: {}",
            program.num_instructions()
        );
        Ok(())
    }

    /// Get the number of passes.
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Check if the pipeline has no passes.
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for the standard pass pipeline.
pub struct OptimizerBuilder {
    readout: Vec<String>,
    eliminate_dead_code: bool,
    propagate_constants: bool,
    reorder_hybrids: bool,
}

impl OptimizerBuilder {
    /// Create a builder with every stage enabled and no readout names.
    pub fn new() -> Self {
        Self {
            readout: vec![],
            eliminate_dead_code: true,
            propagate_constants: true,
            reorder_hybrids: true,
        }
    }

    /// Set the externally observed variable names seeding liveness.
    #[must_use]
    pub fn with_readout<I, S>(mut self, readout: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.readout = readout.into_iter().map(Into::into).collect();
        self
    }

    /// Toggle dead-code analysis and elimination.
    #[must_use]
    pub fn with_dead_code_elimination(mut self, enabled: bool) -> Self {
        self.eliminate_dead_code = enabled;
        self
    }

    /// Toggle constant propagation and folding.
    #[must_use]
    pub fn with_constant_propagation(mut self, enabled: bool) -> Self {
        self.propagate_constants = enabled;
        self
    }

    /// Toggle hybrid dependency analysis and reordering.
    #[must_use]
    pub fn with_hybrid_reordering(mut self, enabled: bool) -> Self {
        self.reorder_hybrids = enabled;
        self
    }

    /// Build the pass pipeline.
    ///
    /// Constant propagation runs before dead-code elimination: folding
    /// needs the defining moves still present, and a resolved measurement
    /// turns the gates feeding it into dead code the eliminator can then
    /// pick up.
    pub fn build(self) -> Optimizer {
        let mut optimizer = Optimizer::new();
        if self.propagate_constants {
            optimizer.add_pass(ConstantPropagation::new());
        }
        if self.eliminate_dead_code {
            optimizer.add_pass(DeadCodeAnalysis::new(self.readout.clone()));
            optimizer.add_pass(DeadCodeEliminator);
        }
        if self.reorder_hybrids {
            optimizer.add_pass(HybridDependencyAnalysis::new());
            optimizer.add_pass(HybridReorderer);
        }
        optimizer
    }
}

impl Default for OptimizerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the full pipeline over a parsed program tree.
///
/// Classifies lines, builds, splits and ranks the control-flow graph,
/// linearizes it into segments, and runs the standard pass pipeline.
/// Returns the optimized program together with the accumulated report.
pub fn optimize(
    tree: &SyntaxNode,
    readout: &[&str],
) -> OptResult<(InstructionList, ReportSet)> {
    let scope = ScopeTable::from_tree(tree);
    optimize_scope(tree, &scope, readout)
}

/// Run the full pipeline over one lexical scope of a parsed program.
#[instrument(skip(tree, scope))]
pub fn optimize_scope(
    tree: &SyntaxNode,
    scope: &ScopeTable,
    readout: &[&str],
) -> OptResult<(InstructionList, ReportSet)> {
    let classes = classify(tree);
    debug!("classified {} lines", classes.len());

    let graph = ControlFlowBuilder::new(scope, &classes).build()?;
    let mut graph = splitter::split(&graph, &classes)?;
    ranker::rank(&mut graph)?;

    let mut program = InstructionListBuilder::new(&graph, &classes, tree).build()?;
    let mut report = ReportSet::new();
    let mut optimizer = OptimizerBuilder::new()
        .with_readout(readout.iter().copied())
        .build();
    optimizer.run(&mut program, &mut report)?;
    Ok((program, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_optimizer() {
        let optimizer = Optimizer::new();
        assert!(optimizer.is_empty());
        assert_eq!(optimizer.len(), 0);
    }

    #[test]
    fn test_builder_presets() {
        let optimizer = OptimizerBuilder::new().with_readout(["ro"]).build();
        assert_eq!(optimizer.len(), 5);

        let optimizer = OptimizerBuilder::new()
            .with_dead_code_elimination(false)
            .with_hybrid_reordering(false)
            .build();
        assert_eq!(optimizer.len(), 1);
    }

    #[test]
    fn test_optimizer_runs_on_empty_program() {
        let mut program = InstructionList::new();
        let mut report = ReportSet::new();
        let mut optimizer = OptimizerBuilder::new().build();
        optimizer.run(&mut program, &mut report).unwrap();
        assert!(report.removed_dead_lines.is_empty());
    }
}
