//! Splitting mixed blocks into homogeneous sub-blocks.

use rustc_hash::FxHashMap;

use alsvin_ir::LineType;

use crate::block::{BlockId, ControlFlowGraph};
use crate::error::FlowResult;

/// Partition every block into maximal quantum-only / classical-only /
/// control sub-blocks.
///
/// Walks each block's codelines in order, accumulating quantum-domain lines
/// (gates, measurements, parametrized gates) and classical lines into two
/// running accumulators. A control line flushes both accumulators as new
/// successor blocks (quantum first, then classical, when non-empty) and
/// becomes a sub-block of its own; trailing accumulators flush at block
/// end. The rebuilt graph preserves predecessor and successor wiring: the
/// first sub-block keeps the original block's name, the last inherits its
/// branches.
pub fn split(
    graph: &ControlFlowGraph,
    classes: &FxHashMap<u32, LineType>,
) -> FlowResult<ControlFlowGraph> {
    let mut out = ControlFlowGraph::new();
    // Old block id -> (first, last) sub-block of its chain.
    let mut chains: Vec<(BlockId, BlockId)> = Vec::with_capacity(graph.len());

    for (_, block) in graph.iter() {
        let mut chain: Vec<BlockId> = vec![];
        let mut quantum_acc: Vec<u32> = vec![];
        let mut classical_acc: Vec<u32> = vec![];
        let mut counters = SplitCounters::default();

        for &line in &block.codelines {
            let Some(&class) = classes.get(&line) else {
                continue;
            };
            if class.is_control() {
                flush(&mut out, &mut chain, block, &mut quantum_acc, &mut classical_acc, &mut counters);
                let id = out.ensure_block(&sub_name(block, &mut counters, "control", chain.is_empty()));
                out.block_mut(id).codelines.push(line);
                out.block_mut(id).line_type = Some(class);
                chain.push(id);
            } else if class.is_quantum_domain() {
                quantum_acc.push(line);
            } else {
                classical_acc.push(line);
            }
        }
        flush(&mut out, &mut chain, block, &mut quantum_acc, &mut classical_acc, &mut counters);

        // Blocks with no classified lines survive as a single empty block.
        if chain.is_empty() {
            chain.push(out.ensure_block(&block.name));
        }
        for pair in chain.windows(2) {
            out.add_branch(pair[0], pair[1]);
        }
        chains.push((chain[0], *chain.last().expect("chain is non-empty")));
    }

    // Re-wire original edges between chain endpoints.
    for (id, block) in graph.iter() {
        let (_, last) = chains[id.index()];
        for &succ in &block.branches {
            let (succ_first, _) = chains[succ.index()];
            out.add_branch(last, succ_first);
        }
    }

    Ok(out)
}

#[derive(Default)]
struct SplitCounters {
    quantum: usize,
    classical: usize,
    control: usize,
}

fn sub_name(
    block: &crate::block::ControlFlowBlock,
    counters: &mut SplitCounters,
    kind: &str,
    first: bool,
) -> String {
    let counter = match kind {
        "quantum" => &mut counters.quantum,
        "classical" => &mut counters.classical,
        _ => &mut counters.control,
    };
    let n = *counter;
    *counter += 1;
    if first {
        block.name.clone()
    } else {
        format!("{}-{kind}{n}", block.name)
    }
}

fn flush(
    out: &mut ControlFlowGraph,
    chain: &mut Vec<BlockId>,
    block: &crate::block::ControlFlowBlock,
    quantum_acc: &mut Vec<u32>,
    classical_acc: &mut Vec<u32>,
    counters: &mut SplitCounters,
) {
    if !quantum_acc.is_empty() {
        let id = out.ensure_block(&sub_name(block, counters, "quantum", chain.is_empty()));
        out.block_mut(id).codelines = std::mem::take(quantum_acc);
        out.block_mut(id).line_type = Some(LineType::Quantum);
        chain.push(id);
    }
    if !classical_acc.is_empty() {
        let id = out.ensure_block(&sub_name(block, counters, "classical", chain.is_empty()));
        out.block_mut(id).codelines = std::mem::take(classical_acc);
        out.block_mut(id).line_type = Some(LineType::Classical);
        chain.push(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::HALT_BLOCK;

    fn classes_of(pairs: &[(u32, LineType)]) -> FxHashMap<u32, LineType> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_mixed_block_splits_quantum_then_classical() {
        let mut graph = ControlFlowGraph::new();
        let start = graph.ensure_block("start");
        let halt = graph.ensure_block(HALT_BLOCK);
        graph.block_mut(start).codelines = vec![0, 1, 2, 3];
        graph.add_branch(start, halt);

        let classes = classes_of(&[
            (0, LineType::Classical),
            (1, LineType::Quantum),
            (2, LineType::Quantum),
            (3, LineType::Classical),
        ]);
        let out = split(&graph, &classes).unwrap();

        // Quantum accumulator flushes first and keeps the block name.
        let first = out.block_by_name("start").unwrap();
        assert_eq!(out.block(first).codelines, vec![1, 2]);
        assert_eq!(out.block(first).line_type, Some(LineType::Quantum));

        let second = out.block(first).branches[0];
        assert_eq!(out.block(second).codelines, vec![0, 3]);
        assert_eq!(out.block(second).line_type, Some(LineType::Classical));

        // Last sub-block inherits the original branches.
        assert_eq!(out.block(second).branches, vec![out.halt().unwrap()]);
    }

    #[test]
    fn test_control_line_flushes_accumulators() {
        let mut graph = ControlFlowGraph::new();
        let start = graph.ensure_block("start");
        let other = graph.ensure_block("@next");
        graph.block_mut(start).codelines = vec![0, 1];
        graph.block_mut(other).codelines = vec![2];
        graph.add_branch(start, other);

        let classes = classes_of(&[
            (0, LineType::Quantum),
            (1, LineType::ControlStructureInfluencedClassical),
            (2, LineType::Classical),
        ]);
        let out = split(&graph, &classes).unwrap();

        let first = out.block_by_name("start").unwrap();
        assert_eq!(out.block(first).line_type, Some(LineType::Quantum));
        let ctrl = out.block(first).branches[0];
        assert_eq!(out.block(ctrl).codelines, vec![1]);
        assert_eq!(
            out.block(ctrl).line_type,
            Some(LineType::ControlStructureInfluencedClassical)
        );
        // Control sub-block wires to the next original block.
        let next = out.block(ctrl).branches[0];
        assert_eq!(out.block(next).name, "@next");
    }

    #[test]
    fn test_homogeneous_output() {
        let mut graph = ControlFlowGraph::new();
        let start = graph.ensure_block("start");
        graph.block_mut(start).codelines = vec![0, 1, 2];
        let classes = classes_of(&[
            (0, LineType::Quantum),
            (1, LineType::Classical),
            (2, LineType::QuantumInfluencesClassical),
        ]);
        let out = split(&graph, &classes).unwrap();
        for (_, block) in out.iter() {
            if block.codelines.is_empty() {
                continue;
            }
            let kinds: Vec<_> = block
                .codelines
                .iter()
                .map(|l| classes[l].is_quantum_domain())
                .collect();
            assert!(kinds.iter().all(|&k| k == kinds[0]));
        }
    }
}
