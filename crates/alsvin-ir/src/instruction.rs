//! Instruction nodes and the segmented instruction arena.
//!
//! Instructions live in an arena addressed by stable [`InstrId`] handles;
//! dependency edges are stored as handle sets on each parameter rather than
//! owning references, which keeps bidirectional traversal O(1) without
//! ownership cycles. Segment membership is held separately: an ordered list
//! of instruction handles per execution segment, plus the indices of the
//! segments each segment branches to.

use rustc_hash::FxHashMap;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{IrError, IrResult};
use crate::line::LineType;
use crate::syntax::SyntaxNode;
use crate::variable::{ClassicalUsage, ClassicalVariable, QuantumVariable};

/// Stable handle of an instruction in its [`InstructionList`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstrId(pub u32);

impl InstrId {
    /// Arena slot index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

/// Declared width and kind of a classical memory region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryKind {
    /// Single bit.
    Bit,
    /// Eight-bit integer.
    Octet,
    /// Machine integer.
    Integer,
    /// Real number.
    Real,
}

impl MemoryKind {
    /// Parse a declaration's kind operand.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "BIT" => Some(MemoryKind::Bit),
            "OCTET" => Some(MemoryKind::Octet),
            "INTEGER" => Some(MemoryKind::Integer),
            "REAL" => Some(MemoryKind::Real),
            _ => None,
        }
    }

    /// Bit mask for truncating bitwise results, `None` for real memory.
    pub fn width_mask(self) -> Option<u64> {
        match self {
            MemoryKind::Bit => Some(0x1),
            MemoryKind::Octet => Some(0xFF),
            MemoryKind::Integer => Some(u64::MAX),
            MemoryKind::Real => None,
        }
    }
}

/// One non-control source line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionNode {
    /// Source line number.
    pub line: u32,
    /// Current category; transformations may rewrite it (a resolved
    /// measurement becomes Classical).
    pub line_type: LineType,
    /// Owned syntax subtree for this instruction.
    pub syntax: SyntaxNode,
    /// Current source text, kept in sync with `syntax` by rewrites.
    pub text: String,
    /// Classical parameters by variable name.
    pub classical: FxHashMap<String, ClassicalVariable>,
    /// Quantum parameters by qubit name.
    pub quantum: FxHashMap<String, QuantumVariable>,
}

impl InstructionNode {
    /// Create an instruction owning the given subtree, with no parameters.
    pub fn new(line: u32, line_type: LineType, syntax: SyntaxNode) -> Self {
        let text = syntax.render();
        Self {
            line,
            line_type,
            syntax,
            text,
            classical: FxHashMap::default(),
            quantum: FxHashMap::default(),
        }
    }

    /// Operation mnemonic (`H`, `MOVE`, `ADD`, ...).
    #[inline]
    pub fn operation(&self) -> &str {
        &self.syntax.label
    }

    /// Add a classical parameter. An Assignment entry wins over a Usage
    /// entry for the same name (`ADD a a` assigns `a`).
    pub fn add_classical(&mut self, var: ClassicalVariable) {
        match self.classical.get(&var.name) {
            Some(existing) if existing.usage == ClassicalUsage::Assignment => {}
            _ => {
                self.classical.insert(var.name.clone(), var);
            }
        }
    }

    /// Add a quantum parameter. The first entry for a name wins.
    pub fn add_quantum(&mut self, var: QuantumVariable) {
        self.quantum.entry(var.name.clone()).or_insert(var);
    }

    /// Union of `previous` links across all parameters: the instructions
    /// this one directly depends on.
    pub fn dependencies(&self) -> FxHashSet<InstrId> {
        let mut deps = FxHashSet::default();
        for var in self.classical.values() {
            deps.extend(var.previous.iter().copied());
        }
        for var in self.quantum.values() {
            deps.extend(var.previous.iter().copied());
        }
        deps
    }

    /// The classical parameter this instruction assigns, if any.
    pub fn assignment(&self) -> Option<&ClassicalVariable> {
        self.classical
            .values()
            .find(|v| v.usage == ClassicalUsage::Assignment)
    }

    /// Look up a classical parameter; absence is a programming error.
    pub fn classical_param(&self, name: &str) -> IrResult<&ClassicalVariable> {
        self.classical
            .get(name)
            .ok_or_else(|| IrError::ParameterNotFound {
                name: name.to_string(),
                line: self.line,
            })
    }

    /// Mutable classical parameter lookup.
    pub fn classical_param_mut(&mut self, name: &str) -> IrResult<&mut ClassicalVariable> {
        let line = self.line;
        self.classical
            .get_mut(name)
            .ok_or_else(|| IrError::ParameterNotFound {
                name: name.to_string(),
                line,
            })
    }

    /// Look up a quantum parameter; absence is a programming error.
    pub fn quantum_param(&self, name: &str) -> IrResult<&QuantumVariable> {
        self.quantum
            .get(name)
            .ok_or_else(|| IrError::ParameterNotFound {
                name: name.to_string(),
                line: self.line,
            })
    }

    /// Mutable quantum parameter lookup.
    pub fn quantum_param_mut(&mut self, name: &str) -> IrResult<&mut QuantumVariable> {
        let line = self.line;
        self.quantum
            .get_mut(name)
            .ok_or_else(|| IrError::ParameterNotFound {
                name: name.to_string(),
                line,
            })
    }
}

/// One maximal straight-line run of instructions between branch points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Instruction handles in execution order.
    pub instructions: Vec<InstrId>,
    /// Indices of the segments this segment branches to.
    pub targets: Vec<usize>,
}

/// The segmented program: instruction arena plus segment membership.
///
/// `Clone` is the snapshot primitive: a deep copy of all instructions and
/// their intra-segment links, safe to analyze independently of the original.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstructionList {
    nodes: Vec<InstructionNode>,
    segments: Vec<Segment>,
    memory: FxHashMap<String, MemoryKind>,
}

impl InstructionList {
    /// Create an empty program.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instruction to the arena, returning its handle.
    pub fn push_node(&mut self, node: InstructionNode) -> InstrId {
        let id = InstrId(u32::try_from(self.nodes.len()).expect("instruction arena overflow"));
        self.nodes.push(node);
        id
    }

    /// Borrow an instruction.
    #[inline]
    pub fn node(&self, id: InstrId) -> &InstructionNode {
        &self.nodes[id.index()]
    }

    /// Mutably borrow an instruction.
    #[inline]
    pub fn node_mut(&mut self, id: InstrId) -> &mut InstructionNode {
        &mut self.nodes[id.index()]
    }

    /// All segments in execution order.
    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Mutable segment access (reorderer swaps instruction orders in place).
    #[inline]
    pub fn segments_mut(&mut self) -> &mut [Segment] {
        &mut self.segments
    }

    /// Append a segment, returning its index.
    pub fn push_segment(&mut self, segment: Segment) -> usize {
        self.segments.push(segment);
        self.segments.len() - 1
    }

    /// Total number of instructions across all segments.
    pub fn num_instructions(&self) -> usize {
        self.segments.iter().map(|s| s.instructions.len()).sum()
    }

    /// Find the instruction for a source line, searching all segments.
    pub fn instruction_by_line(&self, line: u32) -> Option<InstrId> {
        self.segments
            .iter()
            .flat_map(|s| s.instructions.iter())
            .copied()
            .find(|&id| self.node(id).line == line)
    }

    /// Record a declared memory region.
    pub fn set_memory(&mut self, name: impl Into<String>, kind: MemoryKind) {
        self.memory.insert(name.into(), kind);
    }

    /// Declared kind of a memory region, if known.
    pub fn memory_kind(&self, name: &str) -> Option<MemoryKind> {
        self.memory.get(name).copied()
    }

    /// Link two instructions through a shared classical variable:
    /// `later`'s touch of `name` immediately follows `earlier`'s.
    pub fn link_classical(&mut self, earlier: InstrId, later: InstrId, name: &str) -> IrResult<()> {
        self.node_mut(earlier)
            .classical_param_mut(name)?
            .next
            .insert(later);
        self.node_mut(later)
            .classical_param_mut(name)?
            .previous
            .insert(earlier);
        Ok(())
    }

    /// Link two instructions through a shared qubit.
    pub fn link_quantum(&mut self, earlier: InstrId, later: InstrId, name: &str) -> IrResult<()> {
        self.node_mut(earlier)
            .quantum_param_mut(name)?
            .next
            .insert(later);
        self.node_mut(later)
            .quantum_param_mut(name)?
            .previous
            .insert(earlier);
        Ok(())
    }

    /// Drop a classical parameter from an instruction, severing its
    /// dependency edges on both sides.
    pub fn sever_classical_param(&mut self, id: InstrId, name: &str) -> IrResult<()> {
        let line = self.node(id).line;
        let var = self
            .node_mut(id)
            .classical
            .remove(name)
            .ok_or_else(|| IrError::ParameterNotFound {
                name: name.to_string(),
                line,
            })?;
        for prev in &var.previous {
            if let Some(p) = self.nodes[prev.index()].classical.get_mut(name) {
                p.next.remove(&id);
            }
        }
        for next in &var.next {
            if let Some(n) = self.nodes[next.index()].classical.get_mut(name) {
                n.previous.remove(&id);
            }
        }
        Ok(())
    }

    /// Drop a quantum parameter from an instruction, severing its
    /// dependency edges on both sides.
    pub fn sever_quantum_param(&mut self, id: InstrId, name: &str) -> IrResult<()> {
        let line = self.node(id).line;
        let var = self
            .node_mut(id)
            .quantum
            .remove(name)
            .ok_or_else(|| IrError::ParameterNotFound {
                name: name.to_string(),
                line,
            })?;
        for prev in &var.previous {
            if let Some(p) = self.nodes[prev.index()].quantum.get_mut(name) {
                p.next.remove(&id);
            }
        }
        for next in &var.next {
            if let Some(n) = self.nodes[next.index()].quantum.get_mut(name) {
                n.previous.remove(&id);
            }
        }
        Ok(())
    }

    /// Remove an instruction from its segment, severing every dependency
    /// edge on both sides so no dangling references survive.
    pub fn remove_instruction(&mut self, id: InstrId) {
        let classical_names: Vec<String> =
            self.node(id).classical.keys().cloned().collect();
        let quantum_names: Vec<String> = self.node(id).quantum.keys().cloned().collect();
        for name in &classical_names {
            // Parameter is known present; sever cannot fail here.
            let _ = self.sever_classical_param(id, name);
        }
        for name in &quantum_names {
            let _ = self.sever_quantum_param(id, name);
        }
        for segment in &mut self.segments {
            segment.instructions.retain(|&i| i != id);
        }
    }

    /// Verify link symmetry across the whole arena.
    ///
    /// For every instruction A with B in A.previous for parameter P, B.next
    /// for P must contain A, and vice versa.
    pub fn verify_links(&self) -> IrResult<()> {
        for segment in &self.segments {
            for &id in &segment.instructions {
                let node = self.node(id);
                for var in node.classical.values() {
                    for &prev in &var.previous {
                        let ok = self.nodes[prev.index()]
                            .classical
                            .get(&var.name)
                            .is_some_and(|p| p.next.contains(&id));
                        if !ok {
                            return Err(IrError::BrokenLink {
                                name: var.name.clone(),
                                line: node.line,
                            });
                        }
                    }
                    for &next in &var.next {
                        let ok = self.nodes[next.index()]
                            .classical
                            .get(&var.name)
                            .is_some_and(|n| n.previous.contains(&id));
                        if !ok {
                            return Err(IrError::BrokenLink {
                                name: var.name.clone(),
                                line: node.line,
                            });
                        }
                    }
                }
                for var in node.quantum.values() {
                    for &prev in &var.previous {
                        let ok = self.nodes[prev.index()]
                            .quantum
                            .get(&var.name)
                            .is_some_and(|p| p.next.contains(&id));
                        if !ok {
                            return Err(IrError::BrokenLink {
                                name: var.name.clone(),
                                line: node.line,
                            });
                        }
                    }
                    for &next in &var.next {
                        let ok = self.nodes[next.index()]
                            .quantum
                            .get(&var.name)
                            .is_some_and(|n| n.previous.contains(&id));
                        if !ok {
                            return Err(IrError::BrokenLink {
                                name: var.name.clone(),
                                line: node.line,
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::rules;
    use crate::variable::QuantumUsage;

    fn gate_node(name: &str, qubit: &str, line: u32) -> InstructionNode {
        let syntax = SyntaxNode::new(rules::GATE, name, line)
            .with_child(SyntaxNode::new(rules::QUBIT, qubit, line));
        let mut node = InstructionNode::new(line, LineType::Quantum, syntax);
        node.add_quantum(QuantumVariable::new(qubit, QuantumUsage::SingleGate));
        node
    }

    fn move_node(dest: &str, value: &str, line: u32) -> InstructionNode {
        let syntax = SyntaxNode::new(rules::MOVE, "MOVE", line)
            .with_child(SyntaxNode::new(rules::MEMORY_REF, dest, line))
            .with_child(SyntaxNode::new(rules::LITERAL, value, line));
        let mut node = InstructionNode::new(line, LineType::Classical, syntax);
        node.add_classical(ClassicalVariable::new(dest, ClassicalUsage::Assignment));
        node
    }

    #[test]
    fn test_instruction_text_from_syntax() {
        let node = move_node("a", "1", 0);
        assert_eq!(node.text, "MOVE a 1");
        assert_eq!(node.operation(), "MOVE");
    }

    #[test]
    fn test_link_symmetry() {
        let mut list = InstructionList::new();
        let a = list.push_node(gate_node("H", "q", 0));
        let b = list.push_node(gate_node("X", "q", 1));
        list.push_segment(Segment {
            instructions: vec![a, b],
            targets: vec![],
        });

        list.link_quantum(a, b, "q").unwrap();
        list.verify_links().unwrap();

        assert!(list.node(b).dependencies().contains(&a));
        assert!(list.node(a).dependencies().is_empty());
    }

    #[test]
    fn test_remove_severs_both_sides() {
        let mut list = InstructionList::new();
        let a = list.push_node(gate_node("H", "q", 0));
        let b = list.push_node(gate_node("X", "q", 1));
        let c = list.push_node(gate_node("Z", "q", 2));
        list.push_segment(Segment {
            instructions: vec![a, b, c],
            targets: vec![],
        });
        list.link_quantum(a, b, "q").unwrap();
        list.link_quantum(b, c, "q").unwrap();

        list.remove_instruction(b);
        list.verify_links().unwrap();

        assert!(!list.node(a).quantum["q"].next.contains(&b));
        assert!(!list.node(c).quantum["q"].previous.contains(&b));
        assert_eq!(list.segments()[0].instructions, vec![a, c]);
    }

    #[test]
    fn test_parameter_not_found_is_error() {
        let node = gate_node("H", "q", 0);
        let err = node.quantum_param("nope").unwrap_err();
        assert!(matches!(err, IrError::ParameterNotFound { .. }));
    }

    #[test]
    fn test_deep_copy_is_independent() {
        let mut list = InstructionList::new();
        let a = list.push_node(gate_node("H", "q", 0));
        let b = list.push_node(gate_node("X", "q", 1));
        list.push_segment(Segment {
            instructions: vec![a, b],
            targets: vec![],
        });
        list.link_quantum(a, b, "q").unwrap();

        let snapshot = list.clone();
        list.remove_instruction(b);

        assert_eq!(snapshot.segments()[0].instructions.len(), 2);
        assert!(snapshot.node(b).dependencies().contains(&a));
        snapshot.verify_links().unwrap();
    }

    #[test]
    fn test_assignment_wins_over_usage() {
        let syntax = SyntaxNode::new(rules::BINARY_OP, "ADD", 0)
            .with_child(SyntaxNode::new(rules::MEMORY_REF, "a", 0))
            .with_child(SyntaxNode::new(rules::MEMORY_REF, "a", 0));
        let mut node = InstructionNode::new(0, LineType::Classical, syntax);
        node.add_classical(ClassicalVariable::new("a", ClassicalUsage::Assignment));
        node.add_classical(ClassicalVariable::new("a", ClassicalUsage::Usage));
        assert_eq!(node.classical.len(), 1);
        assert_eq!(node.classical["a"].usage, ClassicalUsage::Assignment);
    }
}
