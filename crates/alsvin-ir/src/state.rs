//! Abstract single-qubit state lattice.
//!
//! Constant propagation over qubits tracks each qubit through the six
//! stabilizer basis states. Clifford gates permute these states, so a qubit
//! whose history consists of known Clifford gates has a statically known
//! basis state, and a measurement of a Z-basis state has a deterministic
//! outcome.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the six single-qubit stabilizer basis states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CliffordState {
    /// +1 eigenstate of X.
    XPlus,
    /// -1 eigenstate of X.
    XMinus,
    /// +1 eigenstate of Y.
    YPlus,
    /// -1 eigenstate of Y.
    YMinus,
    /// +1 eigenstate of Z.
    ZPlus,
    /// -1 eigenstate of Z.
    ZMinus,
}

impl CliffordState {
    /// Deterministic measurement outcome, if the state is in the Z basis.
    #[inline]
    pub fn measurement_outcome(self) -> Option<u8> {
        match self {
            CliffordState::ZPlus => Some(0),
            CliffordState::ZMinus => Some(1),
            _ => None,
        }
    }
}

impl fmt::Display for CliffordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CliffordState::XPlus => "X+",
            CliffordState::XMinus => "X-",
            CliffordState::YPlus => "Y+",
            CliffordState::YMinus => "Y-",
            CliffordState::ZPlus => "Z+",
            CliffordState::ZMinus => "Z-",
        };
        write!(f, "{name}")
    }
}

/// Apply a named single-qubit Clifford gate to a basis state.
///
/// Implements the stabilizer-group action for {I, X, Y, Z, H, S}. An unknown
/// gate name returns `None`: constant propagation is best effort, and a
/// failed lookup means "no change", not an error.
pub fn apply_gate(gate: &str, state: CliffordState) -> Option<CliffordState> {
    use CliffordState::*;
    let result = match gate {
        "I" => state,
        "X" => match state {
            XPlus => XPlus,
            XMinus => XMinus,
            YPlus => YMinus,
            YMinus => YPlus,
            ZPlus => ZMinus,
            ZMinus => ZPlus,
        },
        "Y" => match state {
            XPlus => XMinus,
            XMinus => XPlus,
            YPlus => YPlus,
            YMinus => YMinus,
            ZPlus => ZMinus,
            ZMinus => ZPlus,
        },
        "Z" => match state {
            XPlus => XMinus,
            XMinus => XPlus,
            YPlus => YMinus,
            YMinus => YPlus,
            ZPlus => ZPlus,
            ZMinus => ZMinus,
        },
        "H" => match state {
            XPlus => ZPlus,
            XMinus => ZMinus,
            YPlus => YMinus,
            YMinus => YPlus,
            ZPlus => XPlus,
            ZMinus => XMinus,
        },
        "S" => match state {
            XPlus => YPlus,
            XMinus => YMinus,
            YPlus => XMinus,
            YMinus => XPlus,
            ZPlus => ZPlus,
            ZMinus => ZMinus,
        },
        _ => return None,
    };
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL_STATES: [CliffordState; 6] = [
        CliffordState::XPlus,
        CliffordState::XMinus,
        CliffordState::YPlus,
        CliffordState::YMinus,
        CliffordState::ZPlus,
        CliffordState::ZMinus,
    ];

    fn any_state() -> impl Strategy<Value = CliffordState> {
        prop::sample::select(ALL_STATES.to_vec())
    }

    proptest! {
        #[test]
        fn prop_pauli_and_hadamard_are_involutions(state in any_state()) {
            for gate in ["X", "Y", "Z", "H"] {
                let twice = apply_gate(gate, apply_gate(gate, state).unwrap()).unwrap();
                prop_assert_eq!(twice, state, "{} applied twice", gate);
            }
        }

        #[test]
        fn prop_s_has_order_four(state in any_state()) {
            let mut current = state;
            for _ in 0..4 {
                current = apply_gate("S", current).unwrap();
            }
            prop_assert_eq!(current, state);
        }

        #[test]
        fn prop_gates_are_permutations(state in any_state()) {
            // No two distinct states may map to the same image.
            for gate in ["I", "X", "Y", "Z", "H", "S"] {
                let image = apply_gate(gate, state).unwrap();
                for other in ALL_STATES {
                    if other != state {
                        prop_assert_ne!(apply_gate(gate, other).unwrap(), image);
                    }
                }
            }
        }
    }

    #[test]
    fn test_hadamard_maps_x_to_z() {
        assert_eq!(
            apply_gate("H", CliffordState::XPlus),
            Some(CliffordState::ZPlus)
        );
        assert_eq!(
            apply_gate("H", CliffordState::XMinus),
            Some(CliffordState::ZMinus)
        );
    }

    #[test]
    fn test_unknown_gate_is_soft_miss() {
        assert_eq!(apply_gate("T", CliffordState::ZPlus), None);
        assert_eq!(apply_gate("CX", CliffordState::ZPlus), None);
    }

    #[test]
    fn test_measurement_outcome() {
        assert_eq!(CliffordState::ZPlus.measurement_outcome(), Some(0));
        assert_eq!(CliffordState::ZMinus.measurement_outcome(), Some(1));
        assert_eq!(CliffordState::XPlus.measurement_outcome(), None);
        assert_eq!(CliffordState::YMinus.measurement_outcome(), None);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(CliffordState::XPlus.to_string(), "X+");
        assert_eq!(CliffordState::ZMinus.to_string(), "Z-");
    }
}
