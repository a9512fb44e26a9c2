//! Apply planner - cycle detection and deterministic ordering

use crate::error::{GraphError, Result};
use crate::graph::ResourceGraph;
use log::debug;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;

/// Validated order in which resources will be applied
///
/// Every resource appears after all resources it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyPlan {
    order: Vec<String>,
    layers: Vec<Vec<String>>,
}

impl ApplyPlan {
    /// Resource names in apply order
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Iterate names in apply order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Resources grouped by dependency depth
    ///
    /// Everything in a layer depends only on earlier layers, so a layer can be
    /// applied concurrently. Each layer keeps declaration order.
    pub fn layers(&self) -> &[Vec<String>] {
        &self.layers
    }

    /// Position of a resource in the plan
    pub fn position(&self, name: &str) -> Option<usize> {
        self.order.iter().position(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl fmt::Display for ApplyPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, name) in self.order.iter().enumerate() {
            writeln!(f, "{:>3}. {name}", i + 1)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

/// Compute the apply plan for a graph
///
/// Fails with [`GraphError::Cycle`] if any resource transitively references
/// itself. Among resources whose dependencies are all placed, the one
/// declared first goes next, so the same input always yields the same plan.
pub fn plan(graph: &ResourceGraph) -> Result<ApplyPlan> {
    detect_cycle(graph)?;

    let n = graph.len();
    let mut remaining: Vec<usize> = (0..n).map(|i| graph.deps_at(i).len()).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for i in 0..n {
        for &d in graph.deps_at(i) {
            dependents[d].push(i);
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
        .filter(|&i| remaining[i] == 0)
        .map(Reverse)
        .collect();
    let mut order = Vec::with_capacity(n);
    while let Some(Reverse(i)) = ready.pop() {
        order.push(i);
        for &dependent in &dependents[i] {
            remaining[dependent] -= 1;
            if remaining[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    // Depth of each node; dependencies always precede dependents in `order`
    let mut depth = vec![0usize; n];
    for &i in &order {
        depth[i] = graph
            .deps_at(i)
            .iter()
            .map(|&d| depth[d] + 1)
            .max()
            .unwrap_or(0);
    }
    let layer_count = depth.iter().max().map_or(0, |d| d + 1);
    let mut layers: Vec<Vec<String>> = vec![Vec::new(); layer_count];
    for (i, spec) in graph.specs().iter().enumerate() {
        layers[depth[i]].push(spec.name.clone());
    }

    let order: Vec<String> = order
        .into_iter()
        .map(|i| graph.specs()[i].name.clone())
        .collect();
    debug!(
        "planned {} resource(s) in {} layer(s)",
        order.len(),
        layers.len()
    );

    Ok(ApplyPlan { order, layers })
}

fn detect_cycle(graph: &ResourceGraph) -> Result<()> {
    let mut marks = vec![Mark::Unvisited; graph.len()];
    let mut path = Vec::new();

    for start in 0..graph.len() {
        if marks[start] == Mark::Unvisited
            && let Some(cycle) = visit(graph, start, &mut marks, &mut path)
        {
            let members = cycle
                .into_iter()
                .map(|i| graph.specs()[i].name.clone())
                .collect();
            return Err(GraphError::Cycle { members });
        }
    }
    Ok(())
}

fn visit(
    graph: &ResourceGraph,
    node: usize,
    marks: &mut [Mark],
    path: &mut Vec<usize>,
) -> Option<Vec<usize>> {
    marks[node] = Mark::Visiting;
    path.push(node);

    for &dep in graph.deps_at(node) {
        match marks[dep] {
            Mark::Unvisited => {
                if let Some(cycle) = visit(graph, dep, marks, path) {
                    return Some(cycle);
                }
            }
            Mark::Visiting => {
                let start = path.iter().position(|&p| p == dep).unwrap_or(0);
                return Some(path[start..].to_vec());
            }
            Mark::Done => {}
        }
    }

    path.pop();
    marks[node] = Mark::Done;
    None
}
