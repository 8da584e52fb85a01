//! Per-instruction constant-folding handlers.
//!
//! One handler per instruction category, dispatched on [`LineType`] through
//! a single match ([`handler_for`]) so exhaustiveness stays compiler
//! checked. All handlers share one contract: `propagate_constant` returns
//! whether the instruction changed, and a second call on the same handler
//! returns the previously computed result without recomputation.
//!
//! Rewrites replace an instruction's subtree with a newly synthesized one
//! (a `MOVE` of the folded literal) rather than mutating shared structure,
//! and sever the dependency links of any parameter the rewrite eliminates.

use num_complex::Complex64;
use rustc_hash::FxHashMap;

use alsvin_ir::{
    ClassicalUsage, InstrId, InstructionList, LineType, MemoryKind, QuantumUsage, SyntaxNode,
    apply_gate, rules,
};

use crate::error::{OptError, OptResult};

/// Shared state a handler operates against.
pub struct HandlerContext<'a> {
    /// The program being rewritten.
    pub program: &'a mut InstructionList,
    /// Classical values known at this point of the forward walk.
    pub constants: &'a FxHashMap<String, Complex64>,
}

/// A memoizing constant-folding handler for one instruction.
#[derive(Debug)]
pub enum Handler {
    /// Folds classical arithmetic into literal moves.
    Classical {
        /// Instruction handled.
        id: InstrId,
        /// Memoized outcome of the first call.
        result: Option<bool>,
    },
    /// Advances the abstract qubit state through single-qubit Cliffords.
    Quantum {
        /// Instruction handled.
        id: InstrId,
        /// Memoized outcome of the first call.
        result: Option<bool>,
    },
    /// Resolves cross-domain instructions into single-domain ones.
    Hybrid {
        /// Instruction handled.
        id: InstrId,
        /// Memoized outcome of the first call.
        result: Option<bool>,
    },
    /// Control lines: never changes anything.
    Default {
        /// Memoized outcome of the first call.
        result: Option<bool>,
    },
}

/// Select the handler for an instruction by its current category.
pub fn handler_for(id: InstrId, line_type: LineType) -> Handler {
    match line_type {
        LineType::Classical => Handler::Classical { id, result: None },
        LineType::Quantum => Handler::Quantum { id, result: None },
        LineType::QuantumInfluencesClassical | LineType::ClassicalInfluencesQuantum => {
            Handler::Hybrid { id, result: None }
        }
        LineType::ControlStructure | LineType::ControlStructureInfluencedClassical => {
            Handler::Default { result: None }
        }
    }
}

impl Handler {
    /// Apply constant knowledge to the instruction.
    ///
    /// Returns whether anything changed. Idempotent per handler instance:
    /// after the first call the stored result is returned as is.
    pub fn propagate_constant(&mut self, ctx: &mut HandlerContext<'_>) -> OptResult<bool> {
        match self {
            Handler::Classical { id, result } => {
                if let Some(done) = *result {
                    return Ok(done);
                }
                let changed = fold_classical(ctx.program, ctx.constants, *id)?;
                *result = Some(changed);
                Ok(changed)
            }
            Handler::Quantum { id, result } => {
                if let Some(done) = *result {
                    return Ok(done);
                }
                let changed = advance_state(ctx.program, *id)?;
                *result = Some(changed);
                Ok(changed)
            }
            Handler::Hybrid { id, result } => {
                if let Some(done) = *result {
                    return Ok(done);
                }
                let changed = resolve_hybrid(ctx.program, ctx.constants, *id)?;
                *result = Some(changed);
                Ok(changed)
            }
            Handler::Default { result } => {
                *result = Some(false);
                Ok(false)
            }
        }
    }
}

/// Parse a literal operand: decimal, `pi`, or a trailing-`i` imaginary.
pub fn parse_literal(text: &str) -> Option<Complex64> {
    if text == "pi" {
        return Some(Complex64::new(std::f64::consts::PI, 0.0));
    }
    if let Some(imaginary) = text.strip_suffix('i') {
        if imaginary.is_empty() {
            return Some(Complex64::new(0.0, 1.0));
        }
        return imaginary
            .parse::<f64>()
            .ok()
            .map(|v| Complex64::new(0.0, v));
    }
    text.parse::<f64>().ok().map(|v| Complex64::new(v, 0.0))
}

/// Render a value back into literal text.
pub fn format_value(value: Complex64) -> String {
    let fmt_part = |v: f64| {
        if v.fract() == 0.0 && v.abs() < 1e15 {
            format!("{}", v as i64)
        } else {
            format!("{v}")
        }
    };
    if value.im == 0.0 {
        fmt_part(value.re)
    } else if value.re == 0.0 {
        format!("{}i", fmt_part(value.im))
    } else {
        format!("{}+{}i", fmt_part(value.re), fmt_part(value.im))
    }
}

fn as_real(value: Complex64, line: u32) -> OptResult<f64> {
    if value.im != 0.0 {
        return Err(OptError::ComplexUnsupported { line });
    }
    Ok(value.re)
}

/// Integral bit pattern of a real value; non-integral values are a soft
/// miss, complex values an unsupported-feature error.
fn as_bits(value: Complex64, line: u32) -> OptResult<Option<u64>> {
    let real = as_real(value, line)?;
    if real.fract() != 0.0 {
        return Ok(None);
    }
    Ok(Some(real as i64 as u64))
}

fn from_bits(bits: u64, mask: u64) -> Complex64 {
    let masked = bits & mask;
    let value = if mask == u64::MAX {
        masked as i64 as f64
    } else {
        masked as f64
    };
    Complex64::new(value, 0.0)
}

/// Substitute known-constant usage operands into the instruction text and
/// subtree, never touching the instruction's own assignment target.
fn substitute_usages(
    program: &mut InstructionList,
    constants: &FxHashMap<String, Complex64>,
    id: InstrId,
) -> OptResult<bool> {
    let node = program.node(id);
    let target = node.assignment().map(|v| v.name.clone());
    let line = node.line;
    let resolved: Vec<(String, Complex64)> = node
        .classical
        .values()
        .filter(|v| v.usage == ClassicalUsage::Usage)
        .filter(|v| Some(&v.name) != target.as_ref())
        .filter_map(|v| {
            v.constant
                .or_else(|| constants.get(&v.name).copied())
                .map(|value| (v.name.clone(), value))
        })
        .collect();

    let mut changed = false;
    for (name, value) in resolved {
        let node = program.node_mut(id);
        // The destination operand is always the first child; operand
        // substitution only applies past it.
        for child in node.syntax.children.iter_mut().skip(1) {
            if child.rule == rules::MEMORY_REF && child.label == name {
                *child = SyntaxNode::new(rules::LITERAL, format_value(value), line);
            }
        }
        node.text = node.syntax.render();
        program.sever_classical_param(id, &name)?;
        changed = true;
    }
    Ok(changed)
}

/// Value of the second operand after substitution, if statically known.
fn source_value(
    program: &InstructionList,
    constants: &FxHashMap<String, Complex64>,
    id: InstrId,
) -> Option<Complex64> {
    let source = program.node(id).syntax.children.get(1)?;
    match source.rule.as_str() {
        rules::LITERAL => parse_literal(&source.label),
        rules::MEMORY_REF => constants.get(&source.label).copied(),
        _ => None,
    }
}

fn fold_classical(
    program: &mut InstructionList,
    constants: &FxHashMap<String, Complex64>,
    id: InstrId,
) -> OptResult<bool> {
    let mut changed = substitute_usages(program, constants, id)?;

    let node = program.node(id);
    let line = node.line;
    let operation = node.operation().to_string();
    let Some(target) = node.assignment().map(|v| v.name.clone()) else {
        return Ok(changed);
    };

    let result = match operation.as_str() {
        "TRUE" => Some(Complex64::new(1.0, 0.0)),
        "FALSE" => Some(Complex64::new(0.0, 0.0)),
        "NEG" => match constants.get(&target) {
            Some(&prior) => Some(Complex64::new(-as_real(prior, line)?, 0.0)),
            None => None,
        },
        "NOT" => match (constants.get(&target), bit_mask(program, &target)) {
            (Some(&prior), Some(mask)) => {
                as_bits(prior, line)?.map(|bits| from_bits(!bits, mask))
            }
            _ => None,
        },
        "AND" | "OR" | "XOR" => {
            match (
                constants.get(&target),
                source_value(program, constants, id),
                bit_mask(program, &target),
            ) {
                (Some(&prior), Some(source), Some(mask)) => {
                    match (as_bits(prior, line)?, as_bits(source, line)?) {
                        (Some(a), Some(b)) => {
                            let bits = match operation.as_str() {
                                "AND" => a & b,
                                "OR" => a | b,
                                _ => a ^ b,
                            };
                            Some(from_bits(bits, mask))
                        }
                        _ => None,
                    }
                }
                _ => None,
            }
        }
        "ADD" | "SUB" | "MUL" | "DIV" => {
            match (constants.get(&target), source_value(program, constants, id)) {
                (Some(&prior), Some(source)) => {
                    let a = as_real(prior, line)?;
                    let b = as_real(source, line)?;
                    match operation.as_str() {
                        "ADD" => Some(Complex64::new(a + b, 0.0)),
                        "SUB" => Some(Complex64::new(a - b, 0.0)),
                        "MUL" => Some(Complex64::new(a * b, 0.0)),
                        // Division by zero is a soft miss.
                        _ if b == 0.0 => None,
                        _ => Some(Complex64::new(a / b, 0.0)),
                    }
                }
                _ => None,
            }
        }
        _ => None,
    };

    if let Some(value) = result {
        rewrite_to_move(program, id, &target, value)?;
        changed = true;
    }
    Ok(changed)
}

fn bit_mask(program: &InstructionList, target: &str) -> Option<u64> {
    match program.memory_kind(base_name(target)) {
        Some(kind) => MemoryKind::width_mask(kind),
        None => Some(u64::MAX),
    }
}

/// `ro[0]` declares as `ro`.
fn base_name(name: &str) -> &str {
    name.split('[').next().unwrap_or(name)
}

/// Graft a synthesized `MOVE target <literal>` subtree over the
/// instruction, severing any remaining usage parameters.
fn rewrite_to_move(
    program: &mut InstructionList,
    id: InstrId,
    target: &str,
    value: Complex64,
) -> OptResult<()> {
    let leftover: Vec<String> = program
        .node(id)
        .classical
        .values()
        .filter(|v| v.usage == ClassicalUsage::Usage)
        .map(|v| v.name.clone())
        .collect();
    for name in leftover {
        program.sever_classical_param(id, &name)?;
    }

    let line = program.node(id).line;
    let syntax = SyntaxNode::new(rules::MOVE, "MOVE", line)
        .with_child(SyntaxNode::new(rules::MEMORY_REF, target, line))
        .with_child(SyntaxNode::new(rules::LITERAL, format_value(value), line));
    let node = program.node_mut(id);
    node.text = syntax.render();
    node.syntax = syntax;
    node.line_type = LineType::Classical;
    node.classical_param_mut(target)?.constant = Some(value);
    Ok(())
}

/// Quantum handler: advance a known before-state through a single-qubit
/// Clifford gate. Gate lookup failure is a soft miss.
fn advance_state(program: &mut InstructionList, id: InstrId) -> OptResult<bool> {
    let node = program.node(id);
    if node.quantum.len() != 1 {
        return Ok(false);
    }
    let gate = node.operation().to_string();
    let var = node.quantum.values().next().expect("length checked");
    if var.usage != QuantumUsage::SingleGate || var.state_after.is_some() {
        return Ok(false);
    }
    let Some(before) = var.state_before else {
        return Ok(false);
    };
    let name = var.name.clone();
    let Some(after) = apply_gate(&gate, before) else {
        return Ok(false);
    };
    program.node_mut(id).quantum_param_mut(&name)?.state_after = Some(after);
    Ok(true)
}

fn resolve_hybrid(
    program: &mut InstructionList,
    constants: &FxHashMap<String, Complex64>,
    id: InstrId,
) -> OptResult<bool> {
    match program.node(id).line_type {
        LineType::ClassicalInfluencesQuantum => resolve_param_gate(program, constants, id),
        LineType::QuantumInfluencesClassical => resolve_measure(program, id),
        // Already reclassified by an earlier resolution.
        _ => Ok(false),
    }
}

/// Substitute a known classical constant into a gate parameter and
/// reclassify the line as pure quantum.
fn resolve_param_gate(
    program: &mut InstructionList,
    constants: &FxHashMap<String, Complex64>,
    id: InstrId,
) -> OptResult<bool> {
    let node = program.node(id);
    let Some(param) = node
        .classical
        .values()
        .find(|v| v.usage == ClassicalUsage::Usage)
    else {
        return Ok(false);
    };
    let name = param.name.clone();
    let Some(value) = param.constant.or_else(|| constants.get(&name).copied()) else {
        return Ok(false);
    };
    let line = node.line;

    let node = program.node_mut(id);
    for child in node.syntax.children.iter_mut() {
        if child.rule == rules::MEMORY_REF && child.label == name {
            *child = SyntaxNode::new(rules::LITERAL, format_value(value), line);
        }
    }
    node.text = node.syntax.render();
    node.line_type = LineType::Quantum;
    program.sever_classical_param(id, &name)?;
    Ok(true)
}

/// Rewrite a measurement of a Z-basis state into a classical move of the
/// deterministic outcome, dropping the quantum dependency. Any other basis
/// leaves the measurement unresolved.
fn resolve_measure(program: &mut InstructionList, id: InstrId) -> OptResult<bool> {
    let node = program.node(id);
    let Some(qvar) = node
        .quantum
        .values()
        .find(|v| v.usage == QuantumUsage::Measure)
    else {
        return Ok(false);
    };
    let qubit = qvar.name.clone();
    let Some(before) = qvar.state_before else {
        return Ok(false);
    };
    let Some(outcome) = before.measurement_outcome() else {
        return Ok(false);
    };
    let Some(target) = node.assignment().map(|v| v.name.clone()) else {
        return Ok(false);
    };
    let line = node.line;

    program.sever_quantum_param(id, &qubit)?;
    let value = Complex64::new(f64::from(outcome), 0.0);
    let syntax = SyntaxNode::new(rules::MOVE, "MOVE", line)
        .with_child(SyntaxNode::new(rules::MEMORY_REF, &target, line))
        .with_child(SyntaxNode::new(rules::LITERAL, format_value(value), line));
    let node = program.node_mut(id);
    node.text = syntax.render();
    node.syntax = syntax;
    node.line_type = LineType::Classical;
    node.classical_param_mut(&target)?.constant = Some(value);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alsvin_ir::{CliffordState, ClassicalVariable, InstructionNode, QuantumVariable, Segment};

    fn list_with(node: InstructionNode) -> (InstructionList, InstrId) {
        let mut list = InstructionList::new();
        let id = list.push_node(node);
        list.push_segment(Segment {
            instructions: vec![id],
            targets: vec![],
        });
        (list, id)
    }

    fn unary(op: &str, target: &str, line: u32) -> InstructionNode {
        let syntax = SyntaxNode::new(rules::UNARY_OP, op, line)
            .with_child(SyntaxNode::new(rules::MEMORY_REF, target, line));
        let mut node = InstructionNode::new(line, LineType::Classical, syntax);
        node.add_classical(ClassicalVariable::new(target, ClassicalUsage::Assignment));
        node
    }

    #[test]
    fn test_not_folds_to_bit_width() {
        // DECLARE a BIT; a == 1; NOT a folds to MOVE a 0.
        let (mut list, id) = list_with(unary("NOT", "a", 2));
        list.set_memory("a", MemoryKind::Bit);
        let constants: FxHashMap<String, Complex64> =
            [("a".to_string(), Complex64::new(1.0, 0.0))].into_iter().collect();

        let mut handler = handler_for(id, LineType::Classical);
        let mut ctx = HandlerContext {
            program: &mut list,
            constants: &constants,
        };
        assert!(handler.propagate_constant(&mut ctx).unwrap());
        assert_eq!(ctx.program.node(id).text, "MOVE a 0");
        assert_eq!(
            ctx.program.node(id).classical["a"].constant,
            Some(Complex64::new(0.0, 0.0))
        );
    }

    #[test]
    fn test_handler_is_idempotent() {
        let (mut list, id) = list_with(unary("NOT", "a", 2));
        list.set_memory("a", MemoryKind::Bit);
        let constants: FxHashMap<String, Complex64> =
            [("a".to_string(), Complex64::new(1.0, 0.0))].into_iter().collect();

        let mut handler = handler_for(id, LineType::Classical);
        let mut ctx = HandlerContext {
            program: &mut list,
            constants: &constants,
        };
        assert!(handler.propagate_constant(&mut ctx).unwrap());
        let text = ctx.program.node(id).text.clone();
        // Second call returns the memoized result and changes nothing.
        assert!(handler.propagate_constant(&mut ctx).unwrap());
        assert_eq!(ctx.program.node(id).text, text);

        // A fresh handler over the folded instruction reports no change.
        let mut fresh = handler_for(id, LineType::Classical);
        assert!(!fresh.propagate_constant(&mut ctx).unwrap());
        assert_eq!(ctx.program.node(id).text, text);
    }

    #[test]
    fn test_complex_operand_is_unsupported() {
        let (mut list, id) = list_with(unary("NEG", "a", 1));
        let constants: FxHashMap<String, Complex64> =
            [("a".to_string(), Complex64::new(0.0, 2.0))].into_iter().collect();
        let mut handler = handler_for(id, LineType::Classical);
        let mut ctx = HandlerContext {
            program: &mut list,
            constants: &constants,
        };
        let err = handler.propagate_constant(&mut ctx).unwrap_err();
        assert!(matches!(err, OptError::ComplexUnsupported { line: 1 }));
    }

    #[test]
    fn test_binary_substitution_and_fold() {
        // b == 3, ADD b a with a == 2 -> MOVE b 5.
        let syntax = SyntaxNode::new(rules::BINARY_OP, "ADD", 4)
            .with_child(SyntaxNode::new(rules::MEMORY_REF, "b", 4))
            .with_child(SyntaxNode::new(rules::MEMORY_REF, "a", 4));
        let mut node = InstructionNode::new(4, LineType::Classical, syntax);
        node.add_classical(ClassicalVariable::new("b", ClassicalUsage::Assignment));
        node.add_classical(ClassicalVariable::new("a", ClassicalUsage::Usage));
        let (mut list, id) = list_with(node);

        let constants: FxHashMap<String, Complex64> = [
            ("a".to_string(), Complex64::new(2.0, 0.0)),
            ("b".to_string(), Complex64::new(3.0, 0.0)),
        ]
        .into_iter()
        .collect();

        let mut handler = handler_for(id, LineType::Classical);
        let mut ctx = HandlerContext {
            program: &mut list,
            constants: &constants,
        };
        assert!(handler.propagate_constant(&mut ctx).unwrap());
        assert_eq!(ctx.program.node(id).text, "MOVE b 5");
        // The substituted operand is no longer a parameter.
        assert!(!ctx.program.node(id).classical.contains_key("a"));
    }

    #[test]
    fn test_measure_in_z_basis_resolves() {
        let syntax = SyntaxNode::new(rules::MEASURE, "MEASURE", 3)
            .with_child(SyntaxNode::new(rules::QUBIT, "q", 3))
            .with_child(SyntaxNode::new(rules::MEMORY_REF, "ro[0]", 3));
        let mut node = InstructionNode::new(3, LineType::QuantumInfluencesClassical, syntax);
        let mut qvar = QuantumVariable::new("q", QuantumUsage::Measure);
        qvar.state_before = Some(CliffordState::ZMinus);
        node.add_quantum(qvar);
        node.add_classical(ClassicalVariable::new("ro[0]", ClassicalUsage::Assignment));
        let (mut list, id) = list_with(node);

        let constants = FxHashMap::default();
        let mut handler = handler_for(id, LineType::QuantumInfluencesClassical);
        let mut ctx = HandlerContext {
            program: &mut list,
            constants: &constants,
        };
        assert!(handler.propagate_constant(&mut ctx).unwrap());

        let node = ctx.program.node(id);
        assert_eq!(node.text, "MOVE ro[0] 1");
        assert_eq!(node.line_type, LineType::Classical);
        assert!(node.quantum.is_empty());
    }

    #[test]
    fn test_measure_off_basis_unchanged() {
        let syntax = SyntaxNode::new(rules::MEASURE, "MEASURE", 3)
            .with_child(SyntaxNode::new(rules::QUBIT, "q", 3))
            .with_child(SyntaxNode::new(rules::MEMORY_REF, "ro[0]", 3));
        let mut node = InstructionNode::new(3, LineType::QuantumInfluencesClassical, syntax);
        let mut qvar = QuantumVariable::new("q", QuantumUsage::Measure);
        qvar.state_before = Some(CliffordState::YPlus);
        node.add_quantum(qvar);
        node.add_classical(ClassicalVariable::new("ro[0]", ClassicalUsage::Assignment));
        let (mut list, id) = list_with(node);

        let constants = FxHashMap::default();
        let mut handler = handler_for(id, LineType::QuantumInfluencesClassical);
        let mut ctx = HandlerContext {
            program: &mut list,
            constants: &constants,
        };
        assert!(!handler.propagate_constant(&mut ctx).unwrap());
        assert_eq!(
            ctx.program.node(id).line_type,
            LineType::QuantumInfluencesClassical
        );
    }

    #[test]
    fn test_param_gate_resolution() {
        let syntax = SyntaxNode::new(rules::PARAM_GATE, "RX", 2)
            .with_child(SyntaxNode::new(rules::MEMORY_REF, "theta", 2))
            .with_child(SyntaxNode::new(rules::QUBIT, "q", 2));
        let mut node = InstructionNode::new(2, LineType::ClassicalInfluencesQuantum, syntax);
        node.add_classical(ClassicalVariable::new("theta", ClassicalUsage::Usage));
        node.add_quantum(QuantumVariable::new("q", QuantumUsage::SingleGate));
        let (mut list, id) = list_with(node);

        let constants: FxHashMap<String, Complex64> = [(
            "theta".to_string(),
            Complex64::new(std::f64::consts::PI, 0.0),
        )]
        .into_iter()
        .collect();
        let mut handler = handler_for(id, LineType::ClassicalInfluencesQuantum);
        let mut ctx = HandlerContext {
            program: &mut list,
            constants: &constants,
        };
        assert!(handler.propagate_constant(&mut ctx).unwrap());

        let node = ctx.program.node(id);
        assert_eq!(node.line_type, LineType::Quantum);
        assert!(node.classical.is_empty());
        assert!(node.text.starts_with("RX 3.14"));
    }

    #[test]
    fn test_literal_parsing() {
        assert_eq!(parse_literal("2"), Some(Complex64::new(2.0, 0.0)));
        assert_eq!(parse_literal("-1.5"), Some(Complex64::new(-1.5, 0.0)));
        assert_eq!(
            parse_literal("pi"),
            Some(Complex64::new(std::f64::consts::PI, 0.0))
        );
        assert_eq!(parse_literal("2i"), Some(Complex64::new(0.0, 2.0)));
        assert_eq!(parse_literal("q"), None);
    }

    #[test]
    fn test_format_round_trip() {
        for value in [
            Complex64::new(5.0, 0.0),
            Complex64::new(-2.0, 0.0),
            Complex64::new(0.5, 0.0),
            Complex64::new(0.0, 3.0),
        ] {
            assert_eq!(parse_literal(&format_value(value)), Some(value));
        }
    }
}
