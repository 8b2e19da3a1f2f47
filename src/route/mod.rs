use log::{debug, info};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::model::{RoadGraph, VertexId};
use crate::{MapError, StatusOr};

/// Limits applied to a single search
#[derive(Clone, Debug, Default)]
pub struct RouteConfig {
    /// Give up after expanding this many vertices
    pub max_expansions: Option<usize>,
}

/// A shortest path, listed from source to destination inclusive
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Route {
    pub vertices: Vec<VertexId>,
    /// Sum of the edge distances along the path
    pub cost: f64,
}

impl Route {
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

/// A vertex reached during one search. `parent` indexes the search arena.
#[derive(Clone, Copy, Debug)]
struct SearchNode {
    id: VertexId,
    g: f64,
    h: f64,
    parent: Option<usize>,
}

impl SearchNode {
    fn f(&self) -> f64 {
        self.g + self.h
    }
}

/// Heap entry. Orders by ascending f, then ascending h, then insertion order,
/// reversed so `BinaryHeap` pops the best entry first.
#[derive(Clone, Copy, Debug)]
struct Frontier {
    f: f64,
    h: f64,
    node: usize,
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.h.total_cmp(&self.h))
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

/// A* search over a road graph.
///
/// Edge costs and the heuristic are both straight-line distances, so the
/// heuristic never overestimates and the returned path is optimal.
pub struct PathFinder<'a> {
    graph: &'a RoadGraph,
    config: RouteConfig,
}

impl<'a> PathFinder<'a> {
    pub fn new(graph: &'a RoadGraph) -> Self {
        Self::with_config(graph, RouteConfig::default())
    }

    pub fn with_config(graph: &'a RoadGraph, config: RouteConfig) -> Self {
        Self { graph, config }
    }

    /// Shortest path between the vertices closest to the two points
    pub fn shortest_path(
        &self,
        start_lon: f64,
        start_lat: f64,
        dest_lon: f64,
        dest_lat: f64,
    ) -> StatusOr<Route> {
        let start = self.graph.closest_vertex(start_lon, start_lat)?;
        let dest = self.graph.closest_vertex(dest_lon, dest_lat)?;
        info!(
            "Routing ({}, {}) -> ({}, {}) as vertex {} -> {}",
            start_lon, start_lat, dest_lon, dest_lat, start, dest
        );
        self.find_shortest_path(start, dest)
    }

    pub fn find_shortest_path(&self, start: VertexId, dest: VertexId) -> StatusOr<Route> {
        self.graph.vertex(start)?;
        self.graph.vertex(dest)?;
        if start == dest {
            return Ok(Route { vertices: vec![start], cost: 0.0 });
        }

        let root = SearchNode {
            id: start,
            g: 0.0,
            h: self.graph.distance(start, dest)?,
            parent: None,
        };
        let mut arena = vec![root];
        let mut heap = BinaryHeap::new();
        heap.push(Frontier { f: root.f(), h: root.h, node: 0 });

        // Best known f per vertex, waiting or finalized
        let mut open: HashMap<VertexId, f64> = HashMap::from([(start, root.f())]);
        let mut closed: HashMap<VertexId, f64> = HashMap::new();
        let mut best: Option<usize> = None;
        let mut expansions = 0;

        while let Some(Frontier { f, node, .. }) = heap.pop() {
            let current = arena[node];

            // Superseded by a cheaper entry for the same vertex
            if open.get(&current.id) != Some(&f) {
                continue;
            }
            open.remove(&current.id);
            closed.insert(current.id, f);

            if best.is_some_and(|b| f >= arena[b].g) {
                continue;
            }

            expansions += 1;
            if let Some(limit) = self.config.max_expansions {
                if expansions > limit {
                    return Err(MapError::SearchLimitExceeded(limit));
                }
            }

            for neighbour in self.graph.adjacent(current.id)? {
                let next = SearchNode {
                    id: neighbour,
                    g: current.g + self.graph.distance(current.id, neighbour)?,
                    h: self.graph.distance(neighbour, dest)?,
                    parent: Some(node),
                };

                if neighbour == dest {
                    if best.is_none_or(|b| next.g < arena[b].g) {
                        arena.push(next);
                        best = Some(arena.len() - 1);
                    }
                    continue;
                }

                let next_f = next.f();
                let dominated = |seen: &HashMap<VertexId, f64>| {
                    seen.get(&neighbour).is_some_and(|&known| known <= next_f)
                };
                if dominated(&open) || dominated(&closed) {
                    continue;
                }
                if best.is_some_and(|b| next_f >= arena[b].g) {
                    continue;
                }

                arena.push(next);
                open.insert(neighbour, next_f);
                heap.push(Frontier { f: next_f, h: next.h, node: arena.len() - 1 });
            }
        }

        debug!("Search expanded {} of {} reached vertices", expansions, arena.len());

        match best {
            Some(terminal) => Ok(Self::reconstruct_path(&arena, terminal)),
            None => Err(MapError::NoPathFound { from: start, to: dest }),
        }
    }

    fn reconstruct_path(arena: &[SearchNode], terminal: usize) -> Route {
        let mut vertices = Vec::new();
        let mut cursor = Some(terminal);
        while let Some(idx) = cursor {
            vertices.push(arena[idx].id);
            cursor = arena[idx].parent;
        }
        vertices.reverse();

        Route { vertices, cost: arena[terminal].g }
    }
}
