//! Linearizing the ranked graph into instruction segments.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use tracing::debug;

use alsvin_ir::{
    ClassicalUsage, ClassicalVariable, InstrId, InstructionList, InstructionNode, IrError,
    LineType, MemoryKind, QuantumUsage, QuantumVariable, Segment, SyntaxNode, rules,
};

use crate::block::{BlockId, ControlFlowGraph};
use crate::error::{FlowError, FlowResult};

/// Builds the segmented instruction list from the ranked graph.
///
/// Blocks are walked from the entry, appending each block's codelines in
/// ascending order to the current segment. A conditional-jump line closes
/// the segment and spawns one new parallel segment per branch target,
/// recording the target indices on the closed segment; each conditional is
/// expanded at most once even when reachable from several predecessors.
/// Within a segment, a last-touch map per variable threads bidirectional
/// previous/next dependency edges.
pub struct InstructionListBuilder<'a> {
    graph: &'a ControlFlowGraph,
    classes: &'a FxHashMap<u32, LineType>,
    tree: &'a SyntaxNode,
}

impl<'a> InstructionListBuilder<'a> {
    /// Create a builder over one ranked graph.
    pub fn new(
        graph: &'a ControlFlowGraph,
        classes: &'a FxHashMap<u32, LineType>,
        tree: &'a SyntaxNode,
    ) -> Self {
        Self {
            graph,
            classes,
            tree,
        }
    }

    /// Produce the instruction list.
    pub fn build(&self) -> FlowResult<InstructionList> {
        let mut syntax_by_line: FxHashMap<u32, &SyntaxNode> = FxHashMap::default();
        index_instructions(self.tree, &mut syntax_by_line);

        let mut list = InstructionList::new();
        let entry = self.graph.entry().ok_or(FlowError::MissingEntry)?;

        let mut worklist: VecDeque<(BlockId, usize)> = VecDeque::new();
        let mut visited: FxHashSet<BlockId> = FxHashSet::default();
        let mut handled_conditionals: FxHashSet<u32> = FxHashSet::default();

        let first = list.push_segment(Segment::default());
        worklist.push_back((entry, first));

        while let Some((block, segment)) = worklist.pop_front() {
            let mut current = block;
            loop {
                if !visited.insert(current) {
                    break;
                }
                let mut lines = self.graph.block(current).codelines.clone();
                lines.sort_unstable();

                let mut closed = false;
                for line in lines {
                    let Some(&class) = self.classes.get(&line) else {
                        continue;
                    };
                    if class == LineType::ControlStructureInfluencedClassical {
                        if handled_conditionals.insert(line) {
                            for &branch in &self.graph.block(current).branches {
                                let next = list.push_segment(Segment::default());
                                list.segments_mut()[segment].targets.push(next);
                                worklist.push_back((branch, next));
                            }
                        }
                        closed = true;
                        break;
                    }
                    if class.is_control() {
                        continue;
                    }
                    let syntax = syntax_by_line.get(&line).ok_or_else(|| {
                        IrError::MalformedInstruction {
                            line,
                            reason: "classified line has no syntax subtree".to_string(),
                        }
                    })?;
                    let node = build_instruction(line, class, (*syntax).clone(), &mut list)?;
                    let id = list.push_node(node);
                    list.segments_mut()[segment].instructions.push(id);
                }

                if closed {
                    break;
                }
                match self.graph.block(current).branches.as_slice() {
                    &[only] => current = only,
                    _ => break,
                }
            }
        }

        link_dependencies(&mut list)?;
        debug!(
            "linearized {} instructions into {} segments",
            list.num_instructions(),
            list.segments().len()
        );
        Ok(list)
    }
}

fn index_instructions<'t>(node: &'t SyntaxNode, map: &mut FxHashMap<u32, &'t SyntaxNode>) {
    if alsvin_ir::line_type_for_rule(&node.rule).is_some() {
        map.insert(node.line, node);
        return;
    }
    for child in &node.children {
        index_instructions(child, map);
    }
}

/// Extract an instruction's parameters from its subtree.
fn build_instruction(
    line: u32,
    line_type: LineType,
    syntax: SyntaxNode,
    list: &mut InstructionList,
) -> FlowResult<InstructionNode> {
    let mut node = InstructionNode::new(line, line_type, syntax);

    match node.syntax.rule.as_str() {
        rules::GATE => {
            let qubits: Vec<String> = node
                .syntax
                .children_with(rules::QUBIT)
                .map(|q| q.label.clone())
                .collect();
            let usage = if qubits.len() == 1 {
                QuantumUsage::SingleGate
            } else {
                QuantumUsage::MultiGate
            };
            for qubit in qubits {
                node.add_quantum(QuantumVariable::new(qubit, usage));
            }
        }
        rules::PARAM_GATE => {
            let param = node
                .syntax
                .child(rules::MEMORY_REF)
                .map(|p| p.label.clone())
                .ok_or_else(|| malformed(line, "parametrized gate without parameter"))?;
            node.add_classical(ClassicalVariable::new(param, ClassicalUsage::Usage));
            let qubits: Vec<String> = node
                .syntax
                .children_with(rules::QUBIT)
                .map(|q| q.label.clone())
                .collect();
            let usage = if qubits.len() == 1 {
                QuantumUsage::SingleGate
            } else {
                QuantumUsage::MultiGate
            };
            for qubit in qubits {
                node.add_quantum(QuantumVariable::new(qubit, usage));
            }
        }
        rules::MEASURE => {
            let qubit = node
                .syntax
                .child(rules::QUBIT)
                .map(|q| q.label.clone())
                .ok_or_else(|| malformed(line, "measurement without qubit"))?;
            let targets: Vec<String> = node
                .syntax
                .children_with(rules::MEMORY_REF)
                .map(|t| t.label.clone())
                .collect();
            if targets.len() != 1 {
                return Err(malformed(line, "measurement needs exactly one classical target").into());
            }
            node.add_quantum(QuantumVariable::new(qubit, QuantumUsage::Measure));
            node.add_classical(ClassicalVariable::new(
                targets.into_iter().next().expect("length checked"),
                ClassicalUsage::Assignment,
            ));
        }
        rules::DECLARE => {
            let target = node
                .syntax
                .child(rules::MEMORY_REF)
                .map(|t| t.label.clone())
                .ok_or_else(|| malformed(line, "declaration without memory reference"))?;
            let kind_tag = node
                .syntax
                .child(rules::MEMORY_KIND)
                .map(|k| k.label.clone())
                .ok_or_else(|| malformed(line, "declaration without memory kind"))?;
            let kind = MemoryKind::from_tag(&kind_tag)
                .ok_or_else(|| malformed(line, "unknown memory kind"))?;
            list.set_memory(target.clone(), kind);
            node.add_classical(ClassicalVariable::new(target, ClassicalUsage::Declare));
        }
        rules::MOVE | rules::BINARY_OP => {
            let dest = node
                .syntax
                .children
                .first()
                .filter(|c| c.rule == rules::MEMORY_REF)
                .map(|c| c.label.clone())
                .ok_or_else(|| malformed(line, "destination must be a memory reference"))?;
            node.add_classical(ClassicalVariable::new(dest, ClassicalUsage::Assignment));
            let source = node
                .syntax
                .children
                .get(1)
                .ok_or_else(|| malformed(line, "missing source operand"))?;
            if source.rule == rules::MEMORY_REF {
                node.add_classical(ClassicalVariable::new(
                    source.label.clone(),
                    ClassicalUsage::Usage,
                ));
            }
        }
        rules::UNARY_OP => {
            let target = node
                .syntax
                .child(rules::MEMORY_REF)
                .map(|t| t.label.clone())
                .ok_or_else(|| malformed(line, "unary operation without target"))?;
            node.add_classical(ClassicalVariable::new(target, ClassicalUsage::Assignment));
        }
        other => {
            return Err(malformed(line, &format!("unexpected instruction rule '{other}'")).into());
        }
    }
    Ok(node)
}

fn malformed(line: u32, reason: &str) -> IrError {
    IrError::MalformedInstruction {
        line,
        reason: reason.to_string(),
    }
}

/// Thread per-variable previous/next chains within each segment.
fn link_dependencies(list: &mut InstructionList) -> FlowResult<()> {
    for segment in 0..list.segments().len() {
        let ids: Vec<InstrId> = list.segments()[segment].instructions.clone();
        let mut last_classical: FxHashMap<String, InstrId> = FxHashMap::default();
        let mut last_quantum: FxHashMap<String, InstrId> = FxHashMap::default();
        for id in ids {
            let classical_names: Vec<String> = list.node(id).classical.keys().cloned().collect();
            for name in classical_names {
                if let Some(&previous) = last_classical.get(&name) {
                    list.link_classical(previous, id, &name)?;
                }
                last_classical.insert(name, id);
            }
            let quantum_names: Vec<String> = list.node(id).quantum.keys().cloned().collect();
            for name in quantum_names {
                if let Some(&previous) = last_quantum.get(&name) {
                    list.link_quantum(previous, id, &name)?;
                }
                last_quantum.insert(name, id);
            }
        }
    }
    Ok(())
}

/// Frontier of a topological traversal over a segment's dependency edges.
///
/// Given the set of already executed instructions, returns the instructions
/// whose full dependency set is executed and which are not themselves
/// executed. Both the scheduler and test harnesses use this.
pub struct ExecutableInstructionsExtractor;

impl ExecutableInstructionsExtractor {
    /// Extract the executable frontier of one segment.
    pub fn extract_segment(
        list: &InstructionList,
        segment: usize,
        executed: &FxHashSet<InstrId>,
    ) -> Vec<InstrId> {
        list.segments()[segment]
            .instructions
            .iter()
            .copied()
            .filter(|id| {
                !executed.contains(id)
                    && list.node(*id).dependencies().iter().all(|d| executed.contains(d))
            })
            .collect()
    }

    /// Extract the frontier of every segment in parallel slices.
    ///
    /// The executed sets must match the segments one to one; a mismatched
    /// count is an argument error.
    pub fn extract(
        list: &InstructionList,
        executed: &[FxHashSet<InstrId>],
    ) -> FlowResult<Vec<Vec<InstrId>>> {
        if executed.len() != list.segments().len() {
            return Err(FlowError::SegmentCountMismatch {
                segments: list.segments().len(),
                executed: executed.len(),
            });
        }
        Ok((0..list.segments().len())
            .map(|i| Self::extract_segment(list, i, &executed[i]))
            .collect())
    }
}
