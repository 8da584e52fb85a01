//! Structured result records shared between passes and report consumers.

use num_complex::Complex64;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

use alsvin_ir::CliffordState;

/// A variable touch proven dead by liveness analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadVariableEvent {
    /// Variable name.
    pub variable: String,
    /// Line of the dead touch.
    pub line: u32,
    /// Whether the variable is a qubit.
    pub is_quantum: bool,
}

/// A statically resolved value: a classical constant or a qubit state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstantValue {
    /// Classical constant.
    Classical(Complex64),
    /// Abstract qubit state.
    Quantum(CliffordState),
}

impl Serialize for ConstantValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            // Complex64 serializes as {re, im}.
            ConstantValue::Classical(value) => value.serialize(serializer),
            // States serialize by display name ("X+", "Z-").
            ConstantValue::Quantum(state) => serializer.serialize_str(&state.to_string()),
        }
    }
}

/// A variable newly proven constant at some line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstantEvent {
    /// Variable name.
    pub variable: String,
    /// Line where the value is known.
    pub line: u32,
    /// The resolved value or state.
    pub value: ConstantValue,
    /// Whether the line assigns (or produces) the value, as opposed to
    /// merely using a value already known.
    pub is_assignment: bool,
}

/// Accumulated pass results, serializable for the report generator.
///
/// Analysis passes write here; transformation passes read from here and
/// record what they changed. Field names are the stable report keys.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportSet {
    /// Per segment: lines proven dead, sorted.
    #[serde(rename = "DeadLines")]
    pub dead_lines: Vec<Vec<u32>>,
    /// Segment indices proven unreachable, sorted.
    #[serde(rename = "DeadInstructionBlocks")]
    pub dead_blocks: Vec<usize>,
    /// Per segment: dead variable touches.
    #[serde(rename = "DeadVariables")]
    pub dead_variables: Vec<Vec<DeadVariableEvent>>,
    /// Lines actually removed by the eliminator, sorted.
    #[serde(rename = "RemovedDeadLines")]
    pub removed_dead_lines: Vec<u32>,
    /// Per segment: newly constant variables and qubit states.
    #[serde(rename = "NewConstants")]
    pub new_constants: Vec<Vec<ConstantEvent>>,
    /// Per segment: hybrid line to the lines it directly depends on.
    #[serde(rename = "HybridDependencies")]
    pub hybrid_dependencies: Vec<BTreeMap<u32, Vec<u32>>>,
}

impl ReportSet {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize to a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("report serialization cannot fail")
    }
}
