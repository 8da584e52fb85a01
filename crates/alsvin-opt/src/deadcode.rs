//! Dead-code analysis and elimination.
//!
//! Two independent results: segment reachability (a segment is dead when no
//! retained branch-target list names its index) and variable liveness (a
//! backward walk over exit segments seeded with the readout variables).
//! Inter-segment liveness would require the execution path, so the backward
//! walk runs only over segments with no outgoing branches.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use alsvin_ir::{ClassicalUsage, InstrId, InstructionList, LineType};

use crate::error::OptResult;
use crate::pass::{Pass, PassKind};
use crate::report::{DeadVariableEvent, ReportSet};

/// Demand mark carried by the backward liveness walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    /// Externally observed at program end.
    Readout,
    /// Read by a later live instruction.
    Used,
    /// Measured by a later live measurement.
    Measured,
}

/// Liveness and reachability analysis.
///
/// Memoized: `analyse` computes once and is safe to call repeatedly.
pub struct DeadCodeAnalyser {
    readout: Vec<String>,
    calculated: bool,
    dead_lines: Vec<Vec<u32>>,
    dead_segments: Vec<usize>,
    dead_variables: Vec<Vec<DeadVariableEvent>>,
}

impl DeadCodeAnalyser {
    /// Create an analyser seeded with the externally observed variable
    /// names. An indexed reference (`ro[0]`) matches its base name (`ro`).
    pub fn new<I, S>(readout: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            readout: readout.into_iter().map(Into::into).collect(),
            calculated: false,
            dead_lines: vec![],
            dead_segments: vec![],
            dead_variables: vec![],
        }
    }

    /// Run the analysis, setting dead flags on variables.
    pub fn analyse(&mut self, program: &mut InstructionList) -> OptResult<()> {
        if self.calculated {
            return Ok(());
        }
        let segment_count = program.segments().len();
        self.dead_segments = unreachable_segments(program);
        self.dead_lines = vec![vec![]; segment_count];
        self.dead_variables = vec![vec![]; segment_count];

        for segment in 0..segment_count {
            if program.segments()[segment].targets.is_empty() {
                self.analyse_segment(program, segment);
            }
        }
        for lines in &mut self.dead_lines {
            lines.sort_unstable();
        }
        debug!(
            "dead-code analysis: {} dead segments, {} dead lines",
            self.dead_segments.len(),
            self.dead_lines.iter().map(Vec::len).sum::<usize>()
        );
        self.calculated = true;
        Ok(())
    }

    /// Per segment: lines proven dead, sorted.
    pub fn dead_lines(&self) -> &[Vec<u32>] {
        &self.dead_lines
    }

    /// Segment indices proven unreachable, sorted.
    pub fn dead_segments(&self) -> &[usize] {
        &self.dead_segments
    }

    /// Per segment: dead variable touches.
    pub fn dead_variables(&self) -> &[Vec<DeadVariableEvent>] {
        &self.dead_variables
    }

    fn analyse_segment(&mut self, program: &mut InstructionList, segment: usize) {
        let ids: Vec<InstrId> = program.segments()[segment].instructions.clone();
        let mut classical_marks: FxHashMap<String, Option<Mark>> = FxHashMap::default();
        let mut qubit_marks: FxHashMap<String, Mark> = FxHashMap::default();

        for &id in ids.iter().rev() {
            match program.node(id).line_type {
                LineType::Quantum | LineType::ClassicalInfluencesQuantum => {
                    self.visit_gate(program, segment, id, &mut classical_marks, &mut qubit_marks);
                }
                LineType::QuantumInfluencesClassical => {
                    self.visit_measure(program, segment, id, &mut classical_marks, &mut qubit_marks);
                }
                LineType::Classical => {
                    self.visit_classical(program, segment, id, &mut classical_marks);
                }
                _ => {}
            }
        }
    }

    fn visit_gate(
        &mut self,
        program: &mut InstructionList,
        segment: usize,
        id: InstrId,
        classical_marks: &mut FxHashMap<String, Option<Mark>>,
        qubit_marks: &mut FxHashMap<String, Mark>,
    ) {
        let node = program.node(id);
        let line = node.line;
        let qubits: Vec<String> = node.quantum.keys().cloned().collect();
        let usages: Vec<String> = node
            .classical
            .values()
            .filter(|v| v.usage == ClassicalUsage::Usage)
            .map(|v| v.name.clone())
            .collect();

        // Jointly dead iff no operand qubit is measured or used later;
        // liveness of one qubit in a multi-qubit gate keeps all co-operands.
        let live = qubits.iter().any(|q| qubit_marks.contains_key(q));
        if live {
            for qubit in &qubits {
                qubit_marks.insert(qubit.clone(), Mark::Used);
            }
        } else {
            self.dead_lines[segment].push(line);
            for qubit in &qubits {
                if let Ok(var) = program.node_mut(id).quantum_param_mut(qubit) {
                    var.dead = true;
                }
                self.dead_variables[segment].push(DeadVariableEvent {
                    variable: qubit.clone(),
                    line,
                    is_quantum: true,
                });
            }
        }
        for usage in usages {
            classical_marks.insert(usage, Some(Mark::Used));
        }
    }

    fn visit_measure(
        &mut self,
        program: &mut InstructionList,
        segment: usize,
        id: InstrId,
        classical_marks: &mut FxHashMap<String, Option<Mark>>,
        qubit_marks: &mut FxHashMap<String, Mark>,
    ) {
        let node = program.node(id);
        let line = node.line;
        let Some(target) = node.assignment().map(|v| v.name.clone()) else {
            return;
        };
        let qubits: Vec<String> = node.quantum.keys().cloned().collect();

        if self.mark_of(classical_marks, &target).is_some() {
            // The measurement satisfies and removes the demand.
            classical_marks.insert(target, None);
            for qubit in &qubits {
                qubit_marks.insert(qubit.clone(), Mark::Measured);
            }
        } else {
            self.dead_lines[segment].push(line);
            if let Ok(var) = program.node_mut(id).classical_param_mut(&target) {
                var.dead = true;
            }
            self.dead_variables[segment].push(DeadVariableEvent {
                variable: target,
                line,
                is_quantum: false,
            });
            for qubit in &qubits {
                if let Ok(var) = program.node_mut(id).quantum_param_mut(qubit) {
                    var.dead = true;
                }
                self.dead_variables[segment].push(DeadVariableEvent {
                    variable: qubit.clone(),
                    line,
                    is_quantum: true,
                });
            }
        }
    }

    fn visit_classical(
        &mut self,
        program: &mut InstructionList,
        segment: usize,
        id: InstrId,
        classical_marks: &mut FxHashMap<String, Option<Mark>>,
    ) {
        let node = program.node(id);
        let line = node.line;
        // Declarations have global lifetime; never dead here.
        if node
            .classical
            .values()
            .any(|v| v.usage == ClassicalUsage::Declare)
        {
            return;
        }
        let Some(target) = node.assignment().map(|v| v.name.clone()) else {
            return;
        };
        let usages: Vec<String> = node
            .classical
            .values()
            .filter(|v| v.usage == ClassicalUsage::Usage)
            .map(|v| v.name.clone())
            .collect();

        if self.mark_of(classical_marks, &target).is_some() {
            classical_marks.insert(target, None);
        } else {
            self.dead_lines[segment].push(line);
            if let Ok(var) = program.node_mut(id).classical_param_mut(&target) {
                var.dead = true;
            }
            self.dead_variables[segment].push(DeadVariableEvent {
                variable: target,
                line,
                is_quantum: false,
            });
        }
        // A usage that is not itself dead keeps its name in demand, even
        // when the instruction's own assignment is dead.
        for usage in usages {
            let dead = program
                .node(id)
                .classical
                .get(&usage)
                .is_some_and(|v| v.dead);
            if !dead {
                classical_marks.insert(usage, Some(Mark::Used));
            }
        }
    }

    fn mark_of(
        &self,
        classical_marks: &FxHashMap<String, Option<Mark>>,
        name: &str,
    ) -> Option<Mark> {
        match classical_marks.get(name) {
            Some(mark) => *mark,
            None if self.is_readout(name) => Some(Mark::Readout),
            None => None,
        }
    }

    fn is_readout(&self, name: &str) -> bool {
        self.readout.iter().any(|r| {
            name == r || (name.starts_with(r.as_str()) && name[r.len()..].starts_with('['))
        })
    }
}

/// Segment indices named by no retained branch-target list, entry excluded.
fn unreachable_segments(program: &InstructionList) -> Vec<usize> {
    let reachable: FxHashSet<usize> = program
        .segments()
        .iter()
        .flat_map(|s| s.targets.iter().copied())
        .collect();
    (1..program.segments().len())
        .filter(|i| !reachable.contains(i))
        .collect()
}

/// Analysis pass wrapping [`DeadCodeAnalyser`].
pub struct DeadCodeAnalysis {
    analyser: DeadCodeAnalyser,
}

impl DeadCodeAnalysis {
    /// Create the pass with the given readout names.
    pub fn new<I, S>(readout: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            analyser: DeadCodeAnalyser::new(readout),
        }
    }
}

impl Pass for DeadCodeAnalysis {
    fn name(&self) -> &'static str {
        "DeadCodeAnalysis"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&mut self, program: &mut InstructionList, report: &mut ReportSet) -> OptResult<()> {
        self.analyser.analyse(program)?;
        report.dead_lines = self.analyser.dead_lines().to_vec();
        report.dead_blocks = self.analyser.dead_segments().to_vec();
        report.dead_variables = self.analyser.dead_variables().to_vec();
        Ok(())
    }
}

/// Removes what [`DeadCodeAnalysis`] proved dead.
///
/// Empties unreachable segments and removes dead-line instructions from the
/// rest, severing dependency links on both sides before removal so no
/// dangling edges survive.
pub struct DeadCodeEliminator;

impl Pass for DeadCodeEliminator {
    fn name(&self) -> &'static str {
        "DeadCodeEliminator"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&mut self, program: &mut InstructionList, report: &mut ReportSet) -> OptResult<()> {
        let mut removed: Vec<u32> = vec![];

        for &segment in &report.dead_blocks {
            let ids: Vec<InstrId> = program.segments()[segment].instructions.clone();
            for id in ids {
                removed.push(program.node(id).line);
                program.remove_instruction(id);
            }
        }

        for (segment, lines) in report.dead_lines.clone().into_iter().enumerate() {
            for line in lines {
                let found = program.segments()[segment]
                    .instructions
                    .iter()
                    .copied()
                    .find(|&id| program.node(id).line == line);
                if let Some(id) = found {
                    removed.push(line);
                    program.remove_instruction(id);
                }
            }
        }

        removed.sort_unstable();
        removed.dedup();
        report.removed_dead_lines = removed;
        Ok(())
    }
}
