use lens_indexer::UnitEntry;
use lens_model::{EdgeTarget, ProcedureNode};
use lens_protocol::{EdgeView, GraphDirection, GraphView, NodeView};
use std::collections::{BTreeMap, VecDeque};

use crate::views;

/// Breadth-first closure over control edges, at most `depth` hops from any root.
///
/// Each procedure is visited once, so PERFORM cycles terminate; every edge between
/// visited procedures (or leaving them) is reported once.
pub(crate) fn neighborhood(
    roots: &[(&UnitEntry, &ProcedureNode)],
    depth: u32,
    direction: GraphDirection,
) -> GraphView {
    let mut nodes: BTreeMap<String, NodeView> = BTreeMap::new();
    let mut edges: BTreeMap<(String, usize), EdgeView> = BTreeMap::new();
    let mut queue: VecDeque<(&UnitEntry, String, u32)> = VecDeque::new();

    for (entry, node) in roots {
        visit(&mut nodes, &mut queue, entry, &node.key, 0);
    }
    let root_ids: Vec<String> = nodes.keys().cloned().collect();

    let forward = matches!(direction, GraphDirection::Forward | GraphDirection::Both);
    let backward = matches!(direction, GraphDirection::Backward | GraphDirection::Both);

    while let Some((entry, key, distance)) = queue.pop_front() {
        if distance >= depth {
            continue;
        }
        let unit = entry.unit_id().to_string();

        if forward {
            for &position in entry.index.outgoing(&key) {
                let Some(edge) = entry.model.edges.get(position) else {
                    continue;
                };
                edges
                    .entry((unit.clone(), position))
                    .or_insert_with(|| views::edge(entry, edge));
                let targets = std::iter::once(&edge.target).chain(edge.thru.iter());
                for target in targets.filter_map(EdgeTarget::resolved_key) {
                    visit(&mut nodes, &mut queue, entry, target, distance + 1);
                }
            }
        }

        if backward {
            for &position in entry.index.incoming(&key) {
                let Some(edge) = entry.model.edges.get(position) else {
                    continue;
                };
                edges
                    .entry((unit.clone(), position))
                    .or_insert_with(|| views::edge(entry, edge));
                visit(&mut nodes, &mut queue, entry, &edge.from, distance + 1);
            }
        }
    }

    let mut nodes: Vec<NodeView> = nodes.into_values().collect();
    nodes.sort_by(|a, b| (a.distance, &a.id).cmp(&(b.distance, &b.id)));
    let mut edges: Vec<EdgeView> = edges.into_values().collect();
    edges.sort_by(|a, b| (&a.from, &a.to, &a.location).cmp(&(&b.from, &b.to, &b.location)));

    GraphView {
        roots: root_ids,
        depth,
        direction,
        nodes,
        edges,
    }
}

fn visit<'e>(
    nodes: &mut BTreeMap<String, NodeView>,
    queue: &mut VecDeque<(&'e UnitEntry, String, u32)>,
    entry: &'e UnitEntry,
    key: &str,
    distance: u32,
) {
    let id = views::node_id(entry.unit_id(), key);
    if nodes.contains_key(&id) {
        return;
    }
    let Some(node) = entry.model.procedure(key) else {
        return;
    };
    nodes.insert(
        id.clone(),
        NodeView {
            id,
            unit: entry.unit_id().to_string(),
            key: node.key.clone(),
            label: views::procedure_label(node),
            kind: views::procedure_kind(node.kind),
            location: views::range_key(node.definition_range()),
            distance,
        },
    );
    queue.push_back((entry, node.key.clone(), distance));
}
