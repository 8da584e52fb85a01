//! Dominance propagation and block ranking.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;

use crate::block::{BlockId, ControlFlowGraph};
use crate::error::{FlowError, FlowResult};

/// Compute dominating sets and assign a dominance-respecting total order.
///
/// Dominance is propagated breadth-first from the entry block: every
/// successor's dominating set grows by its predecessor plus the
/// predecessor's own dominating set. This is a dominance superset, not a
/// minimal-dominator computation; at merge points a block ends up
/// "dominated" by blocks on either incoming path. The only consumer is the
/// ranking below, which needs exactly the superset property: every block
/// ranks strictly after everything in its dominating set.
///
/// Ranking is a worklist: a block whose dominating blocks are all ranked
/// receives the next rank and enqueues its successors; otherwise it is
/// requeued. The builder rejects cyclic graphs, so this terminates; a
/// stall guard turns any remaining non-progress into an error instead of
/// spinning.
pub fn rank(graph: &mut ControlFlowGraph) -> FlowResult<()> {
    let entry = graph.entry().ok_or(FlowError::MissingEntry)?;

    propagate_dominance(graph, entry);

    let mut next_rank = 0u32;
    let mut queue: VecDeque<BlockId> = VecDeque::new();
    queue.push_back(entry);
    let mut stalled = 0usize;

    while let Some(id) = queue.pop_front() {
        if graph.block(id).rank.is_some() {
            continue;
        }
        let ready = graph
            .block(id)
            .dominating
            .iter()
            .all(|&dom| graph.block(dom).rank.is_some());
        if ready {
            graph.block_mut(id).rank = Some(next_rank);
            next_rank += 1;
            stalled = 0;
            for &succ in &graph.block(id).branches.clone() {
                if graph.block(succ).rank.is_none() {
                    queue.push_back(succ);
                }
            }
        } else {
            stalled += 1;
            if stalled > queue.len() {
                return Err(FlowError::RankingStalled);
            }
            queue.push_back(id);
        }
    }
    Ok(())
}

fn propagate_dominance(graph: &mut ControlFlowGraph, entry: BlockId) {
    let mut queue: VecDeque<BlockId> = VecDeque::new();
    queue.push_back(entry);
    while let Some(pred) = queue.pop_front() {
        for succ in graph.block(pred).branches.clone() {
            let mut grown: FxHashSet<BlockId> = graph.block(succ).dominating.clone();
            grown.insert(pred);
            grown.extend(graph.block(pred).dominating.iter().copied());
            if grown.len() != graph.block(succ).dominating.len() {
                graph.block_mut(succ).dominating = grown;
                queue.push_back(succ);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Diamond: start -> (left, right) -> merge -> halt.
    fn diamond() -> ControlFlowGraph {
        let mut graph = ControlFlowGraph::new();
        let start = graph.ensure_block("start");
        let left = graph.ensure_block("left");
        let right = graph.ensure_block("right");
        let merge = graph.ensure_block("merge");
        let halt = graph.ensure_block("halt");
        graph.add_branch(start, left);
        graph.add_branch(start, right);
        graph.add_branch(left, merge);
        graph.add_branch(right, merge);
        graph.add_branch(merge, halt);
        graph
    }

    #[test]
    fn test_rank_strictly_exceeds_dominators() {
        let mut graph = diamond();
        rank(&mut graph).unwrap();
        for (id, block) in graph.iter() {
            let Some(r) = block.rank else { continue };
            for &dom in &block.dominating {
                assert!(
                    r > graph.block(dom).rank.unwrap(),
                    "block {id} ranks below a dominator"
                );
            }
        }
    }

    #[test]
    fn test_merge_dominated_by_both_paths() {
        // The documented over-approximation: both diamond arms land in the
        // merge block's dominating set.
        let mut graph = diamond();
        rank(&mut graph).unwrap();
        let merge = graph.block_by_name("merge").unwrap();
        let left = graph.block_by_name("left").unwrap();
        let right = graph.block_by_name("right").unwrap();
        assert!(graph.block(merge).dominating.contains(&left));
        assert!(graph.block(merge).dominating.contains(&right));
    }

    #[test]
    fn test_entry_ranked_first() {
        let mut graph = diamond();
        rank(&mut graph).unwrap();
        let start = graph.entry().unwrap();
        assert_eq!(graph.block(start).rank, Some(0));
        assert!(graph.block(start).dominating.is_empty());
    }

    #[test]
    fn test_missing_entry_is_error() {
        let mut graph = ControlFlowGraph::new();
        graph.ensure_block("lonely");
        assert!(matches!(rank(&mut graph), Err(FlowError::MissingEntry)));
    }
}
