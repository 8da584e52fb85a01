//! Line classification.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::syntax::{SyntaxNode, rules};

/// Coarse category of one source line.
///
/// Assigned once per line by [`classify`] from the fixed rule-tag table.
/// Immutable afterwards, except where a transformation rewrites an
/// instruction's effective category (a resolved measurement becomes
/// [`LineType::Classical`], a resolved parametrized gate becomes
/// [`LineType::Quantum`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineType {
    /// Pure gate application.
    Quantum,
    /// Classical arithmetic, moves, and declarations.
    Classical,
    /// Measurement: quantum state drives a classical value.
    QuantumInfluencesClassical,
    /// Parametrized gate: a classical value drives a gate.
    ClassicalInfluencesQuantum,
    /// Labels, unconditional jumps, halt.
    ControlStructure,
    /// Conditional jump on a classical value.
    ControlStructureInfluencedClassical,
}

impl LineType {
    /// Line occupies the quantum execution lane.
    #[inline]
    pub fn is_quantum_domain(self) -> bool {
        matches!(
            self,
            LineType::Quantum
                | LineType::QuantumInfluencesClassical
                | LineType::ClassicalInfluencesQuantum
        )
    }

    /// Line crosses the quantum/classical domain boundary.
    #[inline]
    pub fn is_hybrid(self) -> bool {
        matches!(
            self,
            LineType::QuantumInfluencesClassical | LineType::ClassicalInfluencesQuantum
        )
    }

    /// Line is a control-flow construct rather than an instruction.
    #[inline]
    pub fn is_control(self) -> bool {
        matches!(
            self,
            LineType::ControlStructure | LineType::ControlStructureInfluencedClassical
        )
    }
}

impl fmt::Display for LineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LineType::Quantum => "quantum",
            LineType::Classical => "classical",
            LineType::QuantumInfluencesClassical => "quantum-influences-classical",
            LineType::ClassicalInfluencesQuantum => "classical-influences-quantum",
            LineType::ControlStructure => "control",
            LineType::ControlStructureInfluencedClassical => "control-on-classical",
        };
        write!(f, "{name}")
    }
}

/// The fixed rule-tag to category table.
///
/// Returns `None` for wrapper rules that carry no category of their own.
pub fn line_type_for_rule(rule: &str) -> Option<LineType> {
    match rule {
        rules::GATE => Some(LineType::Quantum),
        rules::PARAM_GATE => Some(LineType::ClassicalInfluencesQuantum),
        rules::MEASURE => Some(LineType::QuantumInfluencesClassical),
        rules::DECLARE | rules::MOVE | rules::UNARY_OP | rules::BINARY_OP => {
            Some(LineType::Classical)
        }
        rules::LABEL | rules::JUMP | rules::HALT => Some(LineType::ControlStructure),
        rules::JUMP_WHEN | rules::JUMP_UNLESS => {
            Some(LineType::ControlStructureInfluencedClassical)
        }
        _ => None,
    }
}

/// Label every line of the program tree with its [`LineType`].
///
/// Traversal stops descending into a subtree once its root line is
/// classified: a composite instruction is one line. Unclassifiable wrapper
/// nodes propagate classification to their children. A malformed tree with
/// no classifiable lines yields an empty map.
pub fn classify(root: &SyntaxNode) -> FxHashMap<u32, LineType> {
    let mut map = FxHashMap::default();
    classify_into(root, &mut map);
    map
}

fn classify_into(node: &SyntaxNode, map: &mut FxHashMap<u32, LineType>) {
    if let Some(line_type) = line_type_for_rule(&node.rule) {
        map.insert(node.line, line_type);
        return;
    }
    for child in &node.children {
        classify_into(child, map);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_table() {
        assert_eq!(line_type_for_rule(rules::GATE), Some(LineType::Quantum));
        assert_eq!(
            line_type_for_rule(rules::MEASURE),
            Some(LineType::QuantumInfluencesClassical)
        );
        assert_eq!(
            line_type_for_rule(rules::PARAM_GATE),
            Some(LineType::ClassicalInfluencesQuantum)
        );
        assert_eq!(
            line_type_for_rule(rules::JUMP_WHEN),
            Some(LineType::ControlStructureInfluencedClassical)
        );
        assert_eq!(line_type_for_rule("program"), None);
    }

    #[test]
    fn test_classify_stops_at_instruction_root() {
        // The qubit child sits on the same line; only the gate root counts.
        let program = SyntaxNode::new("program", "", 0).with_child(
            SyntaxNode::new(rules::GATE, "H", 0)
                .with_child(SyntaxNode::new(rules::QUBIT, "q", 0)),
        );
        let map = classify(&program);
        assert_eq!(map.len(), 1);
        assert_eq!(map[&0], LineType::Quantum);
    }

    #[test]
    fn test_classify_empty_on_malformed() {
        let junk = SyntaxNode::new("mystery", "", 0);
        assert!(classify(&junk).is_empty());
    }

    #[test]
    fn test_classify_mixed_program() {
        let program = SyntaxNode::new("program", "", 0)
            .with_child(
                SyntaxNode::new(rules::DECLARE, "DECLARE", 0)
                    .with_child(SyntaxNode::new(rules::MEMORY_REF, "ro", 0))
                    .with_child(SyntaxNode::new(rules::MEMORY_KIND, "BIT", 0)),
            )
            .with_child(
                SyntaxNode::new(rules::GATE, "H", 1)
                    .with_child(SyntaxNode::new(rules::QUBIT, "q", 1)),
            )
            .with_child(
                SyntaxNode::new(rules::MEASURE, "MEASURE", 2)
                    .with_child(SyntaxNode::new(rules::QUBIT, "q", 2))
                    .with_child(SyntaxNode::new(rules::MEMORY_REF, "ro", 2)),
            )
            .with_child(SyntaxNode::new(rules::HALT, "HALT", 3));

        let map = classify(&program);
        assert_eq!(map[&0], LineType::Classical);
        assert_eq!(map[&1], LineType::Quantum);
        assert_eq!(map[&2], LineType::QuantumInfluencesClassical);
        assert_eq!(map[&3], LineType::ControlStructure);
    }
}
