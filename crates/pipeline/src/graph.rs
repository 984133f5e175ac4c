//! Operator graph validation
//!
//! Three-color depth-first search over (id, output ids) pairs: verifies
//! the graph is a DAG with resolvable edges and produces a topological
//! order with sources before their downstreams.

use std::collections::HashMap;

use crate::error::{PipelineError, Result};

#[cfg(test)]
#[path = "graph_test.rs"]
mod tests;

#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Compute a topological order over the operator graph
///
/// `nodes` pairs each operator id with its output ids, in declaration
/// order. Returns indices into `nodes` such that every operator comes
/// before all of its outputs. Duplicate ids, unknown targets,
/// self-loops, and cycles are rejected.
pub fn topological_order(nodes: &[(String, Vec<String>)]) -> Result<Vec<usize>> {
    let mut index_of: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
    for (i, (id, _)) in nodes.iter().enumerate() {
        if index_of.insert(id.as_str(), i).is_some() {
            return Err(PipelineError::DuplicateId(id.clone()));
        }
    }

    // Resolve edges up front so unknown targets fail before traversal.
    let mut edges: Vec<Vec<usize>> = Vec::with_capacity(nodes.len());
    for (id, outputs) in nodes {
        let mut resolved = Vec::with_capacity(outputs.len());
        for output in outputs {
            if output == id {
                return Err(PipelineError::SelfLoop(id.clone()));
            }
            let target = *index_of
                .get(output.as_str())
                .ok_or_else(|| PipelineError::UnknownTarget {
                    from: id.clone(),
                    to: output.clone(),
                })?;
            resolved.push(target);
        }
        edges.push(resolved);
    }

    let mut colors = vec![Color::White; nodes.len()];
    let mut order = Vec::with_capacity(nodes.len());
    for start in 0..nodes.len() {
        if colors[start] == Color::White {
            visit(start, nodes, &edges, &mut colors, &mut order)?;
        }
    }

    // Post-order DFS finishes downstreams first; reverse for
    // sources-first topological order.
    order.reverse();
    Ok(order)
}

fn visit(
    node: usize,
    nodes: &[(String, Vec<String>)],
    edges: &[Vec<usize>],
    colors: &mut [Color],
    order: &mut Vec<usize>,
) -> Result<()> {
    colors[node] = Color::Gray;
    for &next in &edges[node] {
        match colors[next] {
            Color::Gray => return Err(PipelineError::Cycle(nodes[next].0.clone())),
            Color::White => visit(next, nodes, edges, colors, order)?,
            Color::Black => {}
        }
    }
    colors[node] = Color::Black;
    order.push(node);
    Ok(())
}
