//! Constant propagation over classical values and abstract qubit states.
//!
//! One forward walk per segment carries two kinds of knowledge: a
//! name-to-value map for classical variables (fed by `MOVE`s of literals
//! and of already known names) and a name-to-state map for qubits on the
//! six-state Clifford lattice. Each instruction is visited in order and
//! handed to its category handler, which may fold, substitute, or resolve
//! it under the knowledge gathered so far. The walk repeats until a sweep
//! changes nothing, with a bounded iteration guard.
//!
//! Qubit tracking is deliberately narrow: only qubits referenced in exactly
//! one segment are candidates, since a qubit reused across conditional
//! paths is not statically resolvable. A candidate's first use seeds the
//! default `X+` state; one unknown outcome marks the qubit permanently
//! unresolvable.

use num_complex::Complex64;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use alsvin_ir::{CliffordState, ClassicalUsage, InstrId, InstructionList};

use crate::error::{OptError, OptResult};
use crate::handlers::{HandlerContext, handler_for, parse_literal};
use crate::pass::{Pass, PassKind};
use crate::report::{ConstantEvent, ConstantValue, ReportSet};

/// Bound on fixpoint sweeps per segment, against pathological inputs.
const MAX_ITERATIONS: usize = 100;

/// Classical and quantum constant propagation.
///
/// Memoized: `propagate` computes once and is safe to call repeatedly.
pub struct ConstantPropagator {
    calculated: bool,
    events: Vec<Vec<ConstantEvent>>,
}

impl ConstantPropagator {
    /// Create a propagator.
    pub fn new() -> Self {
        Self {
            calculated: false,
            events: vec![],
        }
    }

    /// Run propagation and folding over every segment.
    pub fn propagate(&mut self, program: &mut InstructionList) -> OptResult<()> {
        if self.calculated {
            return Ok(());
        }
        let candidates = single_segment_qubits(program);
        self.events = Vec::with_capacity(program.segments().len());
        for segment in 0..program.segments().len() {
            let events = propagate_segment(program, segment, &candidates)?;
            self.events.push(events);
        }
        debug!(
            "constant propagation resolved {} facts",
            self.events.iter().map(Vec::len).sum::<usize>()
        );
        self.calculated = true;
        Ok(())
    }

    /// Per segment: newly constant values and states.
    pub fn events(&self) -> &[Vec<ConstantEvent>] {
        &self.events
    }
}

impl Default for ConstantPropagator {
    fn default() -> Self {
        Self::new()
    }
}

/// Qubit names referenced in exactly one segment.
fn single_segment_qubits(program: &InstructionList) -> FxHashSet<String> {
    let mut counts: FxHashMap<String, usize> = FxHashMap::default();
    for segment in program.segments() {
        let mut here: FxHashSet<&str> = FxHashSet::default();
        for &id in &segment.instructions {
            for name in program.node(id).quantum.keys() {
                here.insert(name);
            }
        }
        for name in here {
            *counts.entry(name.to_string()).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .filter(|&(_, count)| count == 1)
        .map(|(name, _)| name)
        .collect()
}

fn propagate_segment(
    program: &mut InstructionList,
    segment: usize,
    candidates: &FxHashSet<String>,
) -> OptResult<Vec<ConstantEvent>> {
    let ids: Vec<InstrId> = program.segments()[segment].instructions.clone();
    let mut events = vec![];

    for _ in 0..MAX_ITERATIONS {
        events = Vec::new();
        let mut walk = SegmentWalk {
            constants: FxHashMap::default(),
            states: FxHashMap::default(),
            seen: FxHashSet::default(),
            unresolvable: FxHashSet::default(),
        };
        let mut changed = false;
        for &id in &ids {
            changed |= walk.visit(program, id, candidates, &mut events)?;
        }
        if !changed {
            break;
        }
    }
    Ok(events)
}

/// Knowledge carried through one forward sweep of a segment.
struct SegmentWalk {
    constants: FxHashMap<String, Complex64>,
    states: FxHashMap<String, CliffordState>,
    seen: FxHashSet<String>,
    unresolvable: FxHashSet<String>,
}

impl SegmentWalk {
    fn visit(
        &mut self,
        program: &mut InstructionList,
        id: InstrId,
        candidates: &FxHashSet<String>,
        events: &mut Vec<ConstantEvent>,
    ) -> OptResult<bool> {
        let mut changed = false;
        let line = program.node(id).line;

        // Mark usages of names already known constant.
        let usages: Vec<String> = program
            .node(id)
            .classical
            .values()
            .filter(|v| v.usage == ClassicalUsage::Usage)
            .map(|v| v.name.clone())
            .collect();
        for name in usages {
            if let Some(&value) = self.constants.get(&name) {
                let var = program.node_mut(id).classical_param_mut(&name)?;
                if var.constant != Some(value) {
                    var.constant = Some(value);
                    changed = true;
                }
                events.push(ConstantEvent {
                    variable: name,
                    line,
                    value: ConstantValue::Classical(value),
                    is_assignment: false,
                });
            }
        }

        // Thread qubit before-states; an unknown-state first use seeds X+.
        let qubits: Vec<String> = program.node(id).quantum.keys().cloned().collect();
        for name in &qubits {
            if !candidates.contains(name) || self.unresolvable.contains(name) {
                continue;
            }
            let state = match self.states.get(name) {
                Some(&carried) => carried,
                None if self.seen.contains(name) => continue,
                None => CliffordState::XPlus,
            };
            self.seen.insert(name.clone());
            let var = program.node_mut(id).quantum_param_mut(name)?;
            if var.state_before != Some(state) {
                var.state_before = Some(state);
                changed = true;
            }
            events.push(ConstantEvent {
                variable: name.clone(),
                line,
                value: ConstantValue::Quantum(state),
                is_assignment: false,
            });
        }

        // Hand the instruction to its category handler. Complex operands
        // only mean this instruction cannot fold; the walk continues.
        let mut handler = handler_for(id, program.node(id).line_type);
        let mut ctx = HandlerContext {
            program: &mut *program,
            constants: &self.constants,
        };
        match handler.propagate_constant(&mut ctx) {
            Ok(c) => changed |= c,
            Err(OptError::ComplexUnsupported { .. }) => {}
            Err(e) => return Err(e),
        }

        // Update the classical value map: a MOVE of a known value makes
        // the destination constant; any other assignment clears knowledge.
        let node = program.node(id);
        if let Some(target) = node.assignment().map(|v| v.name.clone()) {
            let source_value = if node.operation() == "MOVE" {
                node.syntax.children.get(1).and_then(|c| {
                    if c.rule == alsvin_ir::rules::LITERAL {
                        parse_literal(&c.label)
                    } else {
                        self.constants.get(&c.label).copied()
                    }
                })
            } else {
                None
            };
            match source_value {
                Some(value) => {
                    self.constants.insert(target.clone(), value);
                    let var = program.node_mut(id).classical_param_mut(&target)?;
                    if var.constant != Some(value) {
                        var.constant = Some(value);
                        changed = true;
                    }
                    events.push(ConstantEvent {
                        variable: target,
                        line,
                        value: ConstantValue::Classical(value),
                        is_assignment: true,
                    });
                }
                None => {
                    self.constants.remove(&target);
                }
            }
        }

        // Carry definite after-states to the next use; anything that left
        // the outcome unknown makes the qubit permanently unresolvable.
        for name in &qubits {
            if !candidates.contains(name) || self.unresolvable.contains(name) {
                continue;
            }
            // A resolved measurement has dropped its quantum parameter;
            // the carried state survives it unchanged.
            let Some(var) = program.node(id).quantum.get(name) else {
                continue;
            };
            match var.state_after {
                Some(after) => {
                    self.states.insert(name.clone(), after);
                    events.push(ConstantEvent {
                        variable: name.clone(),
                        line,
                        value: ConstantValue::Quantum(after),
                        is_assignment: true,
                    });
                }
                None => {
                    self.unresolvable.insert(name.clone());
                    self.states.remove(name);
                }
            }
        }

        Ok(changed)
    }
}

/// Transformation pass wrapping [`ConstantPropagator`].
pub struct ConstantPropagation {
    propagator: ConstantPropagator,
}

impl ConstantPropagation {
    /// Create the pass.
    pub fn new() -> Self {
        Self {
            propagator: ConstantPropagator::new(),
        }
    }
}

impl Default for ConstantPropagation {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for ConstantPropagation {
    fn name(&self) -> &'static str {
        "ConstantPropagation"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&mut self, program: &mut InstructionList, report: &mut ReportSet) -> OptResult<()> {
        self.propagator.propagate(program)?;
        report.new_constants = self.propagator.events().to_vec();
        Ok(())
    }
}
