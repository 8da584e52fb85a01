//! Syntax-tree interface shared with the parser.
//!
//! The parser owns the grammar; the optimizer core only consumes the tree it
//! produces. A [`SyntaxNode`] is a line-numbered, rule-tagged node with a text
//! label and ordered children. One instruction occupies one source line; the
//! node whose rule tag names an instruction category is the root of that
//! instruction's subtree.
//!
//! Instruction shapes, by rule tag (operand children in order):
//!
//! | rule          | label      | children                          |
//! |---------------|------------|-----------------------------------|
//! | `gate`        | gate name  | `qubit`+                          |
//! | `param-gate`  | gate name  | `memory-ref`, `qubit`+            |
//! | `measure`     | `MEASURE`  | `qubit`, `memory-ref`             |
//! | `declare`     | `DECLARE`  | `memory-ref`, `memory-kind`       |
//! | `move`        | `MOVE`     | `memory-ref`, `memory-ref`/`literal` |
//! | `unary-op`    | op name    | `memory-ref`                      |
//! | `binary-op`   | op name    | `memory-ref`, `memory-ref`/`literal` |
//! | `label`       | label text | (none)                            |
//! | `jump`        | target     | (none)                            |
//! | `jump-when`   | target     | `memory-ref`                      |
//! | `jump-unless` | target     | `memory-ref`                      |
//! | `halt`        | `HALT`     | (none)                            |

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Rule-tag vocabulary of the instruction grammar.
pub mod rules {
    /// Pure gate application (`H q`).
    pub const GATE: &str = "gate";
    /// Classically parametrized gate (`RX theta q`).
    pub const PARAM_GATE: &str = "param-gate";
    /// Measurement into classical memory (`MEASURE q ro[0]`).
    pub const MEASURE: &str = "measure";
    /// Memory declaration (`DECLARE a BIT`).
    pub const DECLARE: &str = "declare";
    /// Classical move (`MOVE a 1`).
    pub const MOVE: &str = "move";
    /// Classical unary operation (`NEG`, `NOT`, `TRUE`, `FALSE`).
    pub const UNARY_OP: &str = "unary-op";
    /// Classical binary operation (`AND`, `OR`, `XOR`, `ADD`, `SUB`, `MUL`, `DIV`).
    pub const BINARY_OP: &str = "binary-op";
    /// Jump target definition (`LABEL @top`).
    pub const LABEL: &str = "label";
    /// Unconditional jump (`JUMP @top`).
    pub const JUMP: &str = "jump";
    /// Conditional jump taken when the condition bit is set.
    pub const JUMP_WHEN: &str = "jump-when";
    /// Conditional jump taken when the condition bit is clear.
    pub const JUMP_UNLESS: &str = "jump-unless";
    /// Program termination (`HALT`).
    pub const HALT: &str = "halt";

    /// Qubit operand.
    pub const QUBIT: &str = "qubit";
    /// Classical memory reference operand.
    pub const MEMORY_REF: &str = "memory-ref";
    /// Literal operand.
    pub const LITERAL: &str = "literal";
    /// Declared memory kind operand (`BIT`, `OCTET`, `INTEGER`, `REAL`).
    pub const MEMORY_KIND: &str = "memory-kind";
}

/// A node in the parsed program tree.
///
/// Read-only to the optimizer core, except where constant folding grafts a
/// synthesized replacement subtree over one instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntaxNode {
    /// Source line this node belongs to.
    pub line: u32,
    /// Rule tag assigned by the grammar.
    pub rule: String,
    /// Source text label (gate name, operand text, jump target).
    pub label: String,
    /// Ordered child nodes.
    pub children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    /// Create a node with no children.
    pub fn new(rule: impl Into<String>, label: impl Into<String>, line: u32) -> Self {
        Self {
            line,
            rule: rule.into(),
            label: label.into(),
            children: vec![],
        }
    }

    /// Append a child node, builder style.
    #[must_use]
    pub fn with_child(mut self, child: SyntaxNode) -> Self {
        self.children.push(child);
        self
    }

    /// Append a child node in place.
    pub fn push_child(&mut self, child: SyntaxNode) {
        self.children.push(child);
    }

    /// First child with the given rule tag.
    pub fn child(&self, rule: &str) -> Option<&SyntaxNode> {
        self.children.iter().find(|c| c.rule == rule)
    }

    /// All children with the given rule tag, in order.
    pub fn children_with<'a>(&'a self, rule: &'a str) -> impl Iterator<Item = &'a SyntaxNode> {
        self.children.iter().filter(move |c| c.rule == rule)
    }

    /// Reconstruct the source text of this subtree.
    ///
    /// Instruction labels and operand labels joined by single spaces, in
    /// tree order (`MOVE a 1`, `MEASURE q ro[0]`).
    pub fn render(&self) -> String {
        let mut words = vec![];
        self.collect_words(&mut words);
        words.join(" ")
    }

    fn collect_words(&self, words: &mut Vec<String>) {
        if !self.label.is_empty() {
            words.push(self.label.clone());
        }
        for child in &self.children {
            child.collect_words(words);
        }
    }
}

/// Flat control-flow tables for one lexical scope.
///
/// The parser produces one table per scope (top level and each named
/// sub-routine); the control-flow builder consumes it together with the set
/// of valid code lines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeTable {
    /// Label name to its defining line.
    pub labels: FxHashMap<String, u32>,
    /// Unconditional-jump line to its target label.
    pub jumps: FxHashMap<u32, String>,
    /// Conditional-jump line to its target label.
    pub conditional_jumps: FxHashMap<u32, String>,
    /// All leaf code lines of the scope, in source order.
    pub code_lines: BTreeSet<u32>,
}

impl ScopeTable {
    /// Extract the scope table from a program subtree.
    ///
    /// Walks the tree once; every instruction-rooted node contributes its
    /// line, and label/jump nodes additionally populate the jump tables.
    pub fn from_tree(root: &SyntaxNode) -> Self {
        let mut table = Self::default();
        table.visit(root);
        table
    }

    fn visit(&mut self, node: &SyntaxNode) {
        match node.rule.as_str() {
            rules::LABEL => {
                self.labels.insert(node.label.clone(), node.line);
                self.code_lines.insert(node.line);
            }
            rules::JUMP => {
                self.jumps.insert(node.line, node.label.clone());
                self.code_lines.insert(node.line);
            }
            rules::JUMP_WHEN | rules::JUMP_UNLESS => {
                self.conditional_jumps.insert(node.line, node.label.clone());
                self.code_lines.insert(node.line);
            }
            rules::GATE
            | rules::PARAM_GATE
            | rules::MEASURE
            | rules::DECLARE
            | rules::MOVE
            | rules::UNARY_OP
            | rules::BINARY_OP
            | rules::HALT => {
                self.code_lines.insert(node.line);
            }
            _ => {
                for child in &node.children {
                    self.visit(child);
                }
            }
        }
    }
}
