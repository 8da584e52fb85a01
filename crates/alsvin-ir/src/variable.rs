//! Instruction parameters: classical and quantum variables.

use num_complex::Complex64;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::instruction::InstrId;
use crate::state::CliffordState;

/// How an instruction touches a classical variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassicalUsage {
    /// Memory declaration.
    Declare,
    /// The instruction writes the variable (read-modify-write included).
    Assignment,
    /// The instruction only reads the variable.
    Usage,
}

/// How an instruction touches a qubit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuantumUsage {
    /// Operand of a single-qubit gate.
    SingleGate,
    /// Operand of a multi-qubit gate.
    MultiGate,
    /// Measured qubit.
    Measure,
}

/// One classical parameter of an instruction.
///
/// `previous`/`next` hold the per-variable dependency chain: the immediately
/// preceding and following instructions touching the same name within the
/// segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassicalVariable {
    /// Variable name as written in the source (`a`, `ro[0]`).
    pub name: String,
    /// Role of this parameter on its instruction.
    pub usage: ClassicalUsage,
    /// Set by liveness analysis when no later use depends on this touch.
    pub dead: bool,
    /// Statically known value, when constant propagation resolved one.
    pub constant: Option<Complex64>,
    /// Instructions whose touch of this name immediately precedes ours.
    pub previous: FxHashSet<InstrId>,
    /// Instructions whose touch of this name immediately follows ours.
    pub next: FxHashSet<InstrId>,
}

impl ClassicalVariable {
    /// Create a fresh, unlinked parameter.
    pub fn new(name: impl Into<String>, usage: ClassicalUsage) -> Self {
        Self {
            name: name.into(),
            usage,
            dead: false,
            constant: None,
            previous: FxHashSet::default(),
            next: FxHashSet::default(),
        }
    }
}

/// One quantum parameter of an instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantumVariable {
    /// Qubit name as written in the source.
    pub name: String,
    /// Role of this parameter on its instruction.
    pub usage: QuantumUsage,
    /// Set by liveness analysis when no later use depends on this touch.
    pub dead: bool,
    /// Abstract state entering the instruction, when known.
    pub state_before: Option<CliffordState>,
    /// Abstract state leaving the instruction, when known.
    pub state_after: Option<CliffordState>,
    /// Instructions whose touch of this qubit immediately precedes ours.
    pub previous: FxHashSet<InstrId>,
    /// Instructions whose touch of this qubit immediately follows ours.
    pub next: FxHashSet<InstrId>,
}

impl QuantumVariable {
    /// Create a fresh, unlinked parameter.
    pub fn new(name: impl Into<String>, usage: QuantumUsage) -> Self {
        Self {
            name: name.into(),
            usage,
            dead: false,
            state_before: None,
            state_after: None,
            previous: FxHashSet::default(),
            next: FxHashSet::default(),
        }
    }
}
