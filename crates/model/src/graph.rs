use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef};
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap};

use crate::error::{ModelError, Result};
use crate::types::{Edge, EdgeKind, ProcedureKind, ProgramModel};

/// Resolved control flow of one unit as a petgraph.
///
/// `PERFORM a THRU b` adds an edge to every procedure from `a` to `b` in source order.
pub struct CallGraph {
    graph: DiGraph<String, EdgeKind>,
    index: HashMap<String, NodeIndex>,
}

impl CallGraph {
    pub fn build(model: &ProgramModel) -> Self {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        for node in &model.procedures {
            let idx = graph.add_node(node.key.clone());
            index.insert(node.key.clone(), idx);
        }

        for edge in &model.edges {
            let Some(&from) = index.get(&edge.from) else {
                continue;
            };
            for target in expand_targets(model, edge) {
                if let Some(&to) = index.get(target) {
                    graph.add_edge(from, to, edge.kind);
                }
            }
        }

        Self { graph, index }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn node(&self, key: &str) -> Result<NodeIndex> {
        self.index
            .get(key)
            .copied()
            .ok_or_else(|| ModelError::ProcedureNotFound(key.to_string()))
    }

    /// Direct successors (PERFORM, GO TO and containment), sorted
    pub fn callees(&self, key: &str) -> Result<Vec<&str>> {
        self.neighbors(key, Direction::Outgoing)
    }

    /// Direct predecessors, sorted
    pub fn callers(&self, key: &str) -> Result<Vec<&str>> {
        self.neighbors(key, Direction::Incoming)
    }

    fn neighbors(&self, key: &str, direction: Direction) -> Result<Vec<&str>> {
        let node = self.node(key)?;
        let found: BTreeSet<&str> = self
            .graph
            .neighbors_directed(node, direction)
            .map(|idx| self.graph[idx].as_str())
            .collect();
        Ok(found.into_iter().collect())
    }

    /// Strongly connected groups of procedures that PERFORM each other (self-PERFORM
    /// included), each sorted, the list sorted
    pub fn perform_cycles(&self) -> Vec<Vec<String>> {
        let mut performs: DiGraph<(), ()> = DiGraph::with_capacity(self.graph.node_count(), 0);
        for _ in self.graph.node_indices() {
            performs.add_node(());
        }
        for edge in self.graph.edge_references() {
            if *edge.weight() == EdgeKind::Perform {
                performs.add_edge(edge.source(), edge.target(), ());
            }
        }

        let mut cycles: Vec<Vec<String>> = tarjan_scc(&performs)
            .into_iter()
            .filter(|component| match component.as_slice() {
                [single] => performs.find_edge(*single, *single).is_some(),
                _ => true,
            })
            .map(|component| {
                let mut keys: Vec<String> = component
                    .into_iter()
                    .map(|idx| self.graph[idx].clone())
                    .collect();
                keys.sort();
                keys
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Every procedure reachable over one or more edges; `key` itself only when it
    /// sits on a cycle
    pub fn reachable_from(&self, key: &str) -> Result<BTreeSet<String>> {
        let start = self.node(key)?;
        let mut reached = BTreeSet::new();
        let mut on_cycle = false;

        let mut dfs = Dfs::empty(&self.graph);
        dfs.stack.extend(self.graph.neighbors(start));
        while let Some(idx) = dfs.next(&self.graph) {
            if idx == start {
                on_cycle = true;
            }
            reached.insert(self.graph[idx].clone());
        }
        if !on_cycle {
            reached.remove(key);
        }
        Ok(reached)
    }
}

/// Keys an edge reaches: its target, or the whole `a THRU b` run in source order
fn expand_targets<'m>(model: &'m ProgramModel, edge: &'m Edge) -> Vec<&'m str> {
    let Some(first) = edge.target.resolved_key() else {
        return Vec::new();
    };
    let last = edge.thru.as_ref().and_then(|thru| thru.resolved_key());
    let (Some(last), Some(from), Some(to)) = (
        last,
        model.procedure(first),
        last.and_then(|key| model.procedure(key)),
    ) else {
        return vec![first];
    };
    if to.position < from.position {
        return vec![first, last];
    }

    model
        .procedures
        .iter()
        .filter(|node| node.kind != ProcedureKind::InlinePerform)
        .filter(|node| node.position >= from.position && node.position <= to.position)
        .map(|node| node.key.as_str())
        .collect()
}
