mod build;

pub use build::build_cfg;

use crate::ast::Node;
use petgraph::prelude::*;
use petgraph::visit::EdgeRef;
use std::collections::HashSet;
use tracing::debug;

/// Blocks live in the graph's node arena; edges store ids, never references.
pub type BlockId = NodeIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Normal,    // fall-through
    True,      // `cond == true` branch
    False,     // `cond == false` branch
    Exception, // throw / implicit raise into a handler
    Return,
    Break,
    Continue,
    Loop, // back-edge that closes a loop
}

/// The terminator that cut a lexical block short, orphaning what follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminatorKind {
    Return,
    Throw,
    Break,
    Continue,
}

/// A basic block: an ordered run of statement references plus the
/// side-counters the detectors need.
#[derive(Debug, Default)]
pub struct Block<'a> {
    pub stmts: Vec<&'a Node>,
    /// `&&` / `||` / `??` operators lowered inside this block.
    pub short_circuits: u32,
    /// Created while lowering an already-reported unreachable run; the
    /// dead-code detector must not report it a second time.
    pub suppressed: bool,
    /// Catch-clause entry; its incoming `Exception` edges are decision edges.
    pub is_handler: bool,
    pub reachable: bool,
}

/// A contiguous run of statements cut off by a terminator in the same
/// lexical block. The statements are still lowered (their decision edges
/// count toward complexity); the run itself is what pass 1 reports.
#[derive(Debug)]
pub struct OrphanRun<'a> {
    pub kind: TerminatorKind,
    pub stmts: Vec<&'a Node>,
}

pub struct Cfg<'a> {
    pub graph: Graph<Block<'a>, EdgeKind>,
    pub entry: BlockId,
    pub exit: BlockId,
    /// Unreachable blocks holding at least one statement, in creation order.
    pub unreachable: Vec<BlockId>,
    /// Statement runs orphaned by a terminator, in source order.
    pub orphan_runs: Vec<OrphanRun<'a>>,
    /// break/continue statements whose label never resolved.
    pub invalid_jumps: Vec<&'a Node>,
}

impl<'a> Cfg<'a> {
    pub fn new() -> Self {
        let mut graph = Graph::with_capacity(16, 24);
        let entry = graph.add_node(Block::default());
        let exit = graph.add_node(Block::default());
        Cfg {
            graph,
            entry,
            exit,
            unreachable: Vec::new(),
            orphan_runs: Vec::new(),
            invalid_jumps: Vec::new(),
        }
    }

    pub fn add_block(&mut self) -> BlockId {
        self.graph.add_node(Block::default())
    }

    pub fn add_edge(&mut self, from: BlockId, to: BlockId, kind: EdgeKind) {
        debug!(target: "cfg", "edge {} → {} ({:?})", from.index(), to.index(), kind);
        self.graph.add_edge(from, to, kind);
    }

    /// Forward reachability from entry. Unreached blocks are retained and
    /// recorded for the dead-code detector when they carry statements.
    pub fn prune(&mut self) {
        let mut reached: HashSet<BlockId> = HashSet::new();
        let mut bfs = Bfs::new(&self.graph, self.entry);
        while let Some(b) = bfs.next(&self.graph) {
            reached.insert(b);
        }
        for id in self.graph.node_indices() {
            let hit = reached.contains(&id);
            self.graph[id].reachable = hit;
            if !hit && !self.graph[id].stmts.is_empty() {
                self.unreachable.push(id);
            }
        }
        debug!(
            target: "cfg",
            "prune: {}/{} blocks reachable",
            reached.len(),
            self.graph.node_count()
        );
    }

    /// Cyclomatic complexity: 1 + decision edges. Decision edges are the
    /// outgoing `True` edges, each `Exception` edge entering a catch clause,
    /// and the short-circuit counters accumulated during lowering.
    pub fn cyclomatic(&self) -> u32 {
        let mut decisions = 0u32;
        for e in self.graph.edge_references() {
            match e.weight() {
                EdgeKind::True => decisions += 1,
                EdgeKind::Exception if self.graph[e.target()].is_handler => decisions += 1,
                _ => {}
            }
        }
        let shorts: u32 = self
            .graph
            .node_indices()
            .map(|id| self.graph[id].short_circuits)
            .sum();
        1 + decisions + shorts
    }

    pub fn block_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Entry has no predecessors, exit no successors, one exit total.
    pub fn is_well_formed(&self) -> bool {
        self.graph
            .edges_directed(self.entry, Direction::Incoming)
            .next()
            .is_none()
            && self
                .graph
                .edges_directed(self.exit, Direction::Outgoing)
                .next()
                .is_none()
    }

    pub fn dump(&self) {
        debug!(
            target: "cfg",
            "CFG: blocks = {}, edges = {}",
            self.graph.node_count(),
            self.graph.edge_count()
        );
        for id in self.graph.node_indices() {
            let b = &self.graph[id];
            debug!(
                target: "cfg",
                "  block {:>3}: stmts={} sc={} suppressed={} handler={} reachable={}",
                id.index(),
                b.stmts.len(),
                b.short_circuits,
                b.suppressed,
                b.is_handler,
                b.reachable
            );
        }
        for e in self.graph.edge_references() {
            debug!(
                target: "cfg",
                "  edge {:>3} → {:<3} ({:?})",
                e.source().index(),
                e.target().index(),
                e.weight()
            );
        }
    }
}

impl Default for Cfg<'_> {
    fn default() -> Self {
        Self::new()
    }
}
