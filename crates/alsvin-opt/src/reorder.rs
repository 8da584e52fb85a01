//! Hybrid-aware instruction reordering.
//!
//! Hybrid instructions are synchronization points between the quantum and
//! classical execution lanes of a JIT-style executor. Within a segment, the
//! reorderer schedules each hybrid's dependencies (classical first), then
//! greedily pulls additional executable instructions of the lagging domain
//! so the quantum/classical counts between consecutive hybrids approach
//! equality. Best effort: ties and exhaustion leave the imbalance as is.

use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use tracing::debug;

use alsvin_ir::{InstrId, InstructionList, LineType};

use crate::error::OptResult;
use crate::pass::{Pass, PassKind};
use crate::report::ReportSet;

/// Maps each hybrid instruction to the lines it directly depends on.
///
/// Memoized: `analyse` computes once and is safe to call repeatedly.
pub struct HybridDependencyFinder {
    calculated: bool,
    dependencies: Vec<BTreeMap<u32, Vec<u32>>>,
}

impl HybridDependencyFinder {
    /// Create a finder.
    pub fn new() -> Self {
        Self {
            calculated: false,
            dependencies: vec![],
        }
    }

    /// Collect hybrid dependencies per segment.
    pub fn analyse(&mut self, program: &InstructionList) -> OptResult<()> {
        if self.calculated {
            return Ok(());
        }
        self.dependencies = program
            .segments()
            .iter()
            .map(|segment| {
                let mut map = BTreeMap::new();
                for &id in &segment.instructions {
                    let node = program.node(id);
                    if node.line_type.is_hybrid() {
                        let mut lines: Vec<u32> = node
                            .dependencies()
                            .iter()
                            .map(|&dep| program.node(dep).line)
                            .collect();
                        lines.sort_unstable();
                        map.insert(node.line, lines);
                    }
                }
                map
            })
            .collect();
        self.calculated = true;
        Ok(())
    }

    /// Per segment: hybrid line to direct dependency lines.
    pub fn dependencies(&self) -> &[BTreeMap<u32, Vec<u32>>] {
        &self.dependencies
    }
}

impl Default for HybridDependencyFinder {
    fn default() -> Self {
        Self::new()
    }
}

/// Analysis pass wrapping [`HybridDependencyFinder`].
pub struct HybridDependencyAnalysis {
    finder: HybridDependencyFinder,
}

impl HybridDependencyAnalysis {
    /// Create the pass.
    pub fn new() -> Self {
        Self {
            finder: HybridDependencyFinder::new(),
        }
    }
}

impl Default for HybridDependencyAnalysis {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for HybridDependencyAnalysis {
    fn name(&self) -> &'static str {
        "HybridDependencyAnalysis"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&mut self, program: &mut InstructionList, report: &mut ReportSet) -> OptResult<()> {
        self.finder.analyse(program)?;
        report.hybrid_dependencies = self.finder.dependencies().to_vec();
        Ok(())
    }
}

/// Reorders each segment around its hybrid synchronization points.
pub struct HybridReorderer;

impl HybridReorderer {
    /// Reorder every segment in place, respecting dependency edges.
    pub fn reorder(program: &mut InstructionList) -> OptResult<()> {
        for segment in 0..program.segments().len() {
            let order = reorder_segment(program, segment);
            program.segments_mut()[segment].instructions = order;
        }
        Ok(())
    }
}

impl Pass for HybridReorderer {
    fn name(&self) -> &'static str {
        "HybridReorderer"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&mut self, program: &mut InstructionList, _report: &mut ReportSet) -> OptResult<()> {
        Self::reorder(program)
    }
}

fn reorder_segment(program: &InstructionList, segment: usize) -> Vec<InstrId> {
    let original = program.segments()[segment].instructions.clone();
    let hybrids: Vec<InstrId> = original
        .iter()
        .copied()
        .filter(|&id| program.node(id).line_type.is_hybrid())
        .collect();
    if hybrids.is_empty() {
        return original;
    }

    let mut scheduled: Vec<InstrId> = Vec::with_capacity(original.len());
    let mut done: FxHashSet<InstrId> = FxHashSet::default();
    let mut quantum_tally = 0usize;
    let mut classical_tally = 0usize;

    for hybrid in hybrids {
        if done.contains(&hybrid) {
            continue;
        }

        // Schedule the hybrid's unscheduled dependency closure, classical
        // instructions first among whatever is executable.
        let mut closure = FxHashSet::default();
        collect_dependencies(program, hybrid, &done, &mut closure);
        while !closure.is_empty() {
            let mut ready: Vec<InstrId> = original
                .iter()
                .copied()
                .filter(|id| closure.contains(id))
                .filter(|&id| {
                    program
                        .node(id)
                        .dependencies()
                        .iter()
                        .all(|dep| done.contains(dep))
                })
                .collect();
            if ready.is_empty() {
                break;
            }
            let classical: Vec<InstrId> = ready
                .iter()
                .copied()
                .filter(|&id| program.node(id).line_type == LineType::Classical)
                .collect();
            if !classical.is_empty() {
                ready = classical;
            }
            for id in ready {
                closure.remove(&id);
                tally(program, id, &mut quantum_tally, &mut classical_tally);
                scheduled.push(id);
                done.insert(id);
            }
        }

        // Balance the lanes before emitting the synchronization point.
        loop {
            if quantum_tally == classical_tally {
                break;
            }
            let lagging = if quantum_tally < classical_tally {
                LineType::Quantum
            } else {
                LineType::Classical
            };
            let candidate = original.iter().copied().find(|&id| {
                !done.contains(&id)
                    && program.node(id).line_type == lagging
                    && program
                        .node(id)
                        .dependencies()
                        .iter()
                        .all(|dep| done.contains(dep))
            });
            let Some(id) = candidate else { break };
            tally(program, id, &mut quantum_tally, &mut classical_tally);
            scheduled.push(id);
            done.insert(id);
        }

        scheduled.push(hybrid);
        done.insert(hybrid);
        quantum_tally = 0;
        classical_tally = 0;
    }

    // Anything reachable by no hybrid dependency keeps its original order.
    for id in original {
        if !done.contains(&id) {
            scheduled.push(id);
        }
    }
    debug!(
        "reordered segment {segment}: {} instructions",
        scheduled.len()
    );
    scheduled
}

fn tally(program: &InstructionList, id: InstrId, quantum: &mut usize, classical: &mut usize) {
    match program.node(id).line_type {
        LineType::Quantum => *quantum += 1,
        LineType::Classical => *classical += 1,
        _ => {}
    }
}

fn collect_dependencies(
    program: &InstructionList,
    id: InstrId,
    done: &FxHashSet<InstrId>,
    closure: &mut FxHashSet<InstrId>,
) {
    for dep in program.node(id).dependencies() {
        if !done.contains(&dep) && closure.insert(dep) {
            collect_dependencies(program, dep, done, closure);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alsvin_ir::{
        ClassicalUsage, ClassicalVariable, InstructionNode, QuantumUsage, QuantumVariable,
        Segment, SyntaxNode, rules,
    };

    fn move_instr(dest: &str, value: &str, line: u32) -> InstructionNode {
        let syntax = SyntaxNode::new(rules::MOVE, "MOVE", line)
            .with_child(SyntaxNode::new(rules::MEMORY_REF, dest, line))
            .with_child(SyntaxNode::new(rules::LITERAL, value, line));
        let mut node = InstructionNode::new(line, LineType::Classical, syntax);
        node.add_classical(ClassicalVariable::new(dest, ClassicalUsage::Assignment));
        node
    }

    fn gate_instr(name: &str, qubit: &str, line: u32) -> InstructionNode {
        let syntax = SyntaxNode::new(rules::GATE, name, line)
            .with_child(SyntaxNode::new(rules::QUBIT, qubit, line));
        let mut node = InstructionNode::new(line, LineType::Quantum, syntax);
        node.add_quantum(QuantumVariable::new(qubit, QuantumUsage::SingleGate));
        node
    }

    fn param_gate_instr(name: &str, param: &str, qubit: &str, line: u32) -> InstructionNode {
        let syntax = SyntaxNode::new(rules::PARAM_GATE, name, line)
            .with_child(SyntaxNode::new(rules::MEMORY_REF, param, line))
            .with_child(SyntaxNode::new(rules::QUBIT, qubit, line));
        let mut node = InstructionNode::new(line, LineType::ClassicalInfluencesQuantum, syntax);
        node.add_classical(ClassicalVariable::new(param, ClassicalUsage::Usage));
        node.add_quantum(QuantumVariable::new(qubit, QuantumUsage::SingleGate));
        node
    }

    /// Two classical and one quantum predecessor feed the hybrid on line
    /// 10; an unrelated quantum instruction is available for balancing.
    fn balance_fixture() -> (InstructionList, Vec<InstrId>) {
        let mut list = InstructionList::new();
        let c1 = list.push_node(move_instr("a", "1", 0));
        let c2 = list.push_node(move_instr("theta", "2", 1));
        let q1 = list.push_node(gate_instr("H", "q", 2));
        let free_q = list.push_node(gate_instr("X", "p", 3));
        let mut hybrid_node = param_gate_instr("RX", "theta", "q", 10);
        hybrid_node.add_classical(ClassicalVariable::new("a", ClassicalUsage::Usage));
        let hybrid = list.push_node(hybrid_node);
        list.push_segment(Segment {
            instructions: vec![c1, c2, q1, free_q, hybrid],
            targets: vec![],
        });
        // Two classical predecessors and one quantum predecessor.
        list.link_classical(c1, hybrid, "a").unwrap();
        list.link_classical(c2, hybrid, "theta").unwrap();
        list.link_quantum(q1, hybrid, "q").unwrap();
        (list, vec![c1, c2, q1, free_q, hybrid])
    }

    #[test]
    fn test_balance_pulls_lagging_domain() {
        let (mut list, ids) = balance_fixture();
        HybridReorderer::reorder(&mut list).unwrap();

        let order = &list.segments()[0].instructions;
        let hybrid_pos = order.iter().position(|&id| id == ids[4]).unwrap();
        let before: Vec<InstrId> = order[..hybrid_pos].to_vec();
        // The free quantum instruction is pulled ahead of the hybrid to
        // balance two classicals against one quantum dependency.
        assert!(before.contains(&ids[3]), "expected X p before the hybrid");
        // Dependencies stay ahead of the hybrid.
        assert!(before.contains(&ids[1]));
        assert!(before.contains(&ids[2]));
    }

    #[test]
    fn test_dependencies_respected() {
        let (mut list, _) = balance_fixture();
        HybridReorderer::reorder(&mut list).unwrap();
        let order = &list.segments()[0].instructions;
        let mut seen = FxHashSet::default();
        for &id in order {
            for dep in list.node(id).dependencies() {
                assert!(seen.contains(&dep), "dependency scheduled after dependent");
            }
            seen.insert(id);
        }
    }

    #[test]
    fn test_no_hybrids_keeps_order() {
        let mut list = InstructionList::new();
        let a = list.push_node(move_instr("a", "1", 0));
        let b = list.push_node(gate_instr("H", "q", 1));
        list.push_segment(Segment {
            instructions: vec![a, b],
            targets: vec![],
        });
        HybridReorderer::reorder(&mut list).unwrap();
        assert_eq!(list.segments()[0].instructions, vec![a, b]);
    }

    #[test]
    fn test_finder_reports_direct_dependencies() {
        let (list, ids) = balance_fixture();
        let mut finder = HybridDependencyFinder::new();
        finder.analyse(&list).unwrap();
        let deps = &finder.dependencies()[0];
        assert_eq!(deps[&10], vec![0, 1, 2]);
        let _ = ids;
    }
}
