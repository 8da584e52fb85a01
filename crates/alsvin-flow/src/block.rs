//! Basic blocks and the control-flow graph arena.

use petgraph::graph::DiGraph;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::fmt;

use alsvin_ir::LineType;

/// Name of the synthetic entry block.
pub const ENTRY_BLOCK: &str = "start";
/// Name of the synthetic terminal block.
pub const HALT_BLOCK: &str = "halt";

/// Stable handle of a block in its [`ControlFlowGraph`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

impl BlockId {
    /// Arena slot index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// One basic block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlFlowBlock {
    /// Deterministic block name: label text, `start`, `halt`, `line<N>`
    /// for synthetic fallthroughs, or a split suffix.
    pub name: String,
    /// Source lines belonging to this block, in insertion order.
    pub codelines: Vec<u32>,
    /// Successor blocks, in branch order (conditional jumps list the jump
    /// target first, the fallthrough second).
    pub branches: Vec<BlockId>,
    /// Homogeneous category after splitting; `None` for mixed blocks.
    pub line_type: Option<LineType>,
    /// Blocks that transitively dominate this one (over-approximation:
    /// union along the breadth-first order, not minimal dominators).
    pub dominating: FxHashSet<BlockId>,
    /// Position in the dominance-respecting total order, once ranked.
    pub rank: Option<u32>,
}

impl ControlFlowBlock {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            codelines: vec![],
            branches: vec![],
            line_type: None,
            dominating: FxHashSet::default(),
            rank: None,
        }
    }
}

/// Arena of blocks addressed by [`BlockId`] handles.
///
/// Edges are stored as handle lists on each block, avoiding ownership
/// cycles while keeping successor traversal O(1). Identical input produces
/// an identical graph: block creation order and names are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlFlowGraph {
    blocks: Vec<ControlFlowBlock>,
    by_name: FxHashMap<String, BlockId>,
}

impl ControlFlowGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the block with the given name.
    pub fn ensure_block(&mut self, name: &str) -> BlockId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = BlockId(u32::try_from(self.blocks.len()).expect("block arena overflow"));
        self.blocks.push(ControlFlowBlock::new(name));
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Borrow a block.
    #[inline]
    pub fn block(&self, id: BlockId) -> &ControlFlowBlock {
        &self.blocks[id.index()]
    }

    /// Mutably borrow a block.
    #[inline]
    pub fn block_mut(&mut self, id: BlockId) -> &mut ControlFlowBlock {
        &mut self.blocks[id.index()]
    }

    /// Look up a block by name.
    pub fn block_by_name(&self, name: &str) -> Option<BlockId> {
        self.by_name.get(name).copied()
    }

    /// The entry block, if the graph has one.
    pub fn entry(&self) -> Option<BlockId> {
        self.block_by_name(ENTRY_BLOCK)
    }

    /// The terminal block, if the graph has one.
    pub fn halt(&self) -> Option<BlockId> {
        self.block_by_name(HALT_BLOCK)
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the graph has no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Iterate over all blocks with their handles, in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (BlockId, &ControlFlowBlock)> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (BlockId(i as u32), b))
    }

    /// Add a successor edge, keeping branch order and skipping duplicates.
    pub fn add_branch(&mut self, from: BlockId, to: BlockId) {
        let block = self.block_mut(from);
        if !block.branches.contains(&to) {
            block.branches.push(to);
        }
    }

    /// Predecessors of a block (scan; the graph is small).
    pub fn predecessors(&self, id: BlockId) -> Vec<BlockId> {
        self.iter()
            .filter(|(_, b)| b.branches.contains(&id))
            .map(|(i, _)| i)
            .collect()
    }

    /// Export the block graph for graph algorithms and renderers.
    ///
    /// Node weights are block handles; edge order follows branch order.
    pub fn to_petgraph(&self) -> DiGraph<BlockId, ()> {
        let mut graph = DiGraph::new();
        let indices: Vec<_> = self.iter().map(|(id, _)| graph.add_node(id)).collect();
        for (id, block) in self.iter() {
            for &succ in &block.branches {
                graph.add_edge(indices[id.index()], indices[succ.index()], ());
            }
        }
        graph
    }

    /// Whether the jump graph contains a loop.
    pub fn is_cyclic(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.to_petgraph())
    }
}
