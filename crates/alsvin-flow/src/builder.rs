//! Control-flow graph construction.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use tracing::debug;

use alsvin_ir::{LineType, ScopeTable};

use crate::block::{BlockId, ControlFlowGraph, ENTRY_BLOCK, HALT_BLOCK};
use crate::error::{FlowError, FlowResult};

/// Builds the block graph from a scope's jump tables.
///
/// Walks code lines in order starting at the first line, opening blocks at
/// labels, closing them at jumps, and linking every unterminated block to a
/// synthetic `halt` block. The walk is cycle-safe: a block reached twice is
/// only walked once, and a cyclic jump graph is rejected after construction
/// since ranking requires an acyclic dominance relation.
pub struct ControlFlowBuilder<'a> {
    scope: &'a ScopeTable,
    classes: &'a FxHashMap<u32, LineType>,
}

impl<'a> ControlFlowBuilder<'a> {
    /// Create a builder over one scope.
    pub fn new(scope: &'a ScopeTable, classes: &'a FxHashMap<u32, LineType>) -> Self {
        Self { scope, classes }
    }

    /// Construct the graph.
    pub fn build(&self) -> FlowResult<ControlFlowGraph> {
        let mut graph = ControlFlowGraph::new();
        let entry = graph.ensure_block(ENTRY_BLOCK);
        let halt = graph.ensure_block(HALT_BLOCK);

        let label_lines: FxHashMap<u32, &str> = self
            .scope
            .labels
            .iter()
            .map(|(name, &line)| (line, name.as_str()))
            .collect();

        let Some(&first_line) = self.scope.code_lines.first() else {
            graph.add_branch(entry, halt);
            return Ok(graph);
        };

        // (block, start line, the block's own label line if it has one)
        let mut worklist: VecDeque<(BlockId, u32, Option<u32>)> = VecDeque::new();
        let mut opened: FxHashSet<BlockId> = FxHashSet::default();
        worklist.push_back((entry, first_line, None));

        while let Some((block, from, own_line)) = worklist.pop_front() {
            if !opened.insert(block) {
                continue;
            }

            let mut terminated = false;
            for &line in self.scope.code_lines.range(from..) {
                if let Some(label) = label_lines.get(&line) {
                    if own_line != Some(line) {
                        // A foreign label closes the running block.
                        let target = graph.ensure_block(label);
                        graph.add_branch(block, target);
                        worklist.push_back((target, line, Some(line)));
                        terminated = true;
                        break;
                    }
                    graph.block_mut(block).codelines.push(line);
                    continue;
                }

                graph.block_mut(block).codelines.push(line);

                if let Some(target_label) = self.scope.jumps.get(&line) {
                    let target_line = self.target_line(target_label, line)?;
                    let target = graph.ensure_block(target_label);
                    graph.add_branch(block, target);
                    worklist.push_back((target, target_line, Some(target_line)));
                    terminated = true;
                    break;
                }

                if let Some(target_label) = self.scope.conditional_jumps.get(&line) {
                    let target_line = self.target_line(target_label, line)?;
                    let target = graph.ensure_block(target_label);
                    graph.add_branch(block, target);
                    worklist.push_back((target, target_line, Some(target_line)));

                    // Jump target first, synthetic fallthrough second.
                    match self.scope.code_lines.range(line + 1..).next() {
                        Some(&fallthrough_line) => {
                            let name = format!("line{fallthrough_line}");
                            let fallthrough = graph.ensure_block(&name);
                            graph.add_branch(block, fallthrough);
                            worklist.push_back((fallthrough, fallthrough_line, None));
                        }
                        None => graph.add_branch(block, halt),
                    }
                    terminated = true;
                    break;
                }

                // Any other control line is a terminator (HALT).
                if self.classes.get(&line) == Some(&LineType::ControlStructure) {
                    graph.add_branch(block, halt);
                    terminated = true;
                    break;
                }
            }

            if !terminated {
                graph.add_branch(block, halt);
            }
        }

        if graph.is_cyclic() {
            return Err(FlowError::CyclicControlFlow);
        }
        debug!("built control-flow graph with {} blocks", graph.len());
        Ok(graph)
    }

    fn target_line(&self, label: &str, line: u32) -> FlowResult<u32> {
        self.scope
            .labels
            .get(label)
            .copied()
            .ok_or_else(|| FlowError::UnknownLabel {
                label: label.to_string(),
                line,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alsvin_ir::{SyntaxNode, classify, rules};

    fn program_with_branch() -> SyntaxNode {
        // 0: DECLARE flag BIT
        // 1: H q
        // 2: JUMP-WHEN @skip flag
        // 3: X q
        // 4: LABEL @skip
        // 5: HALT
        SyntaxNode::new("program", "", 0)
            .with_child(
                SyntaxNode::new(rules::DECLARE, "DECLARE", 0)
                    .with_child(SyntaxNode::new(rules::MEMORY_REF, "flag", 0))
                    .with_child(SyntaxNode::new(rules::MEMORY_KIND, "BIT", 0)),
            )
            .with_child(
                SyntaxNode::new(rules::GATE, "H", 1)
                    .with_child(SyntaxNode::new(rules::QUBIT, "q", 1)),
            )
            .with_child(
                SyntaxNode::new(rules::JUMP_WHEN, "@skip", 2)
                    .with_child(SyntaxNode::new(rules::MEMORY_REF, "flag", 2)),
            )
            .with_child(
                SyntaxNode::new(rules::GATE, "X", 3)
                    .with_child(SyntaxNode::new(rules::QUBIT, "q", 3)),
            )
            .with_child(SyntaxNode::new(rules::LABEL, "@skip", 4))
            .with_child(SyntaxNode::new(rules::HALT, "HALT", 5))
    }

    #[test]
    fn test_conditional_split() {
        let tree = program_with_branch();
        let scope = ScopeTable::from_tree(&tree);
        let classes = classify(&tree);
        let graph = ControlFlowBuilder::new(&scope, &classes).build().unwrap();

        let start = graph.entry().unwrap();
        assert_eq!(graph.block(start).codelines, vec![0, 1, 2]);

        // Jump target first, fallthrough second.
        let branches = &graph.block(start).branches;
        assert_eq!(branches.len(), 2);
        assert_eq!(graph.block(branches[0]).name, "@skip");
        assert_eq!(graph.block(branches[1]).name, "line3");

        // Both paths converge on the label block, which halts.
        let skip = graph.block_by_name("@skip").unwrap();
        let fallthrough = graph.block_by_name("line3").unwrap();
        assert_eq!(graph.block(fallthrough).branches, vec![skip]);
        assert_eq!(graph.block(skip).branches, vec![graph.halt().unwrap()]);
        assert_eq!(graph.block(skip).codelines, vec![4, 5]);
    }

    #[test]
    fn test_every_block_reaches_halt_or_branches() {
        let tree = program_with_branch();
        let scope = ScopeTable::from_tree(&tree);
        let classes = classify(&tree);
        let graph = ControlFlowBuilder::new(&scope, &classes).build().unwrap();

        let halt = graph.halt().unwrap();
        for (id, block) in graph.iter() {
            if id != halt {
                assert!(!block.branches.is_empty(), "block {} dangles", block.name);
            }
        }
        assert!(graph.block(halt).branches.is_empty());
    }

    #[test]
    fn test_unknown_label_rejected() {
        let tree = SyntaxNode::new("program", "", 0)
            .with_child(SyntaxNode::new(rules::JUMP, "@nowhere", 0));
        let scope = ScopeTable::from_tree(&tree);
        let classes = classify(&tree);
        let err = ControlFlowBuilder::new(&scope, &classes).build().unwrap_err();
        assert!(matches!(err, FlowError::UnknownLabel { .. }));
    }

    #[test]
    fn test_loop_rejected() {
        // 0: LABEL @top
        // 1: X q
        // 2: JUMP @top
        let tree = SyntaxNode::new("program", "", 0)
            .with_child(SyntaxNode::new(rules::LABEL, "@top", 0))
            .with_child(
                SyntaxNode::new(rules::GATE, "X", 1)
                    .with_child(SyntaxNode::new(rules::QUBIT, "q", 1)),
            )
            .with_child(SyntaxNode::new(rules::JUMP, "@top", 2));
        let scope = ScopeTable::from_tree(&tree);
        let classes = classify(&tree);
        let err = ControlFlowBuilder::new(&scope, &classes).build().unwrap_err();
        assert!(matches!(err, FlowError::CyclicControlFlow));
    }

    #[test]
    fn test_empty_scope_links_entry_to_halt() {
        let scope = ScopeTable::default();
        let classes = FxHashMap::default();
        let graph = ControlFlowBuilder::new(&scope, &classes).build().unwrap();
        let entry = graph.entry().unwrap();
        assert_eq!(graph.block(entry).branches, vec![graph.halt().unwrap()]);
    }
}
