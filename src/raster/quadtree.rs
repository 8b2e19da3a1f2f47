use log::info;

use super::tile::{BoundingBox, Tile};

const ROOT: usize = 0;

/// A single node in the tile quadtree
#[derive(Debug, Clone)]
struct QuadtreeNode {
    tile: Tile,
    /// Arena indices of the NW, NE, SW, SE children, if subdivided
    children: Option<[usize; 4]>,
}

/// Complete quadtree of tiles, built once down to a fixed depth.
///
/// Nodes live in a flat arena with the root at index 0; children are stored
/// by index rather than boxed.
#[derive(Debug, Clone)]
pub struct TileQuadtree {
    nodes: Vec<QuadtreeNode>,
    max_depth: u32,
}

impl TileQuadtree {
    pub fn new(root: Tile, max_depth: u32) -> Self {
        let mut nodes = vec![QuadtreeNode { tile: root, children: None }];
        let mut stack = vec![ROOT];

        while let Some(idx) = stack.pop() {
            if nodes[idx].tile.depth >= max_depth {
                continue;
            }
            let first = nodes.len();
            for tile in nodes[idx].tile.children() {
                nodes.push(QuadtreeNode { tile, children: None });
            }
            let children = [first, first + 1, first + 2, first + 3];
            nodes[idx].children = Some(children);
            stack.extend(children);
        }

        info!("Built tile quadtree with {} nodes, max depth {}", nodes.len(), max_depth);
        Self { nodes, max_depth }
    }

    pub fn root(&self) -> &Tile {
        &self.nodes[ROOT].tile
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every tile intersecting `query` at the shallowest level whose resolution
    /// is at most `londpp_bound`, or at the leaf level if none is fine enough.
    ///
    /// The tree is complete, so all nodes on one level share their resolution
    /// and leaf status. Walking level by level therefore stops on the whole
    /// frontier at once and never mixes depths.
    pub fn select(&self, query: &BoundingBox, londpp_bound: f64) -> Vec<&Tile> {
        let mut frontier = Vec::new();
        if self.root().bounds.intersects(query) {
            frontier.push(ROOT);
        }

        while let Some(&first) = frontier.first() {
            let node = &self.nodes[first];
            if node.tile.londpp <= londpp_bound || node.children.is_none() {
                break;
            }
            frontier = frontier
                .iter()
                .filter_map(|&idx| self.nodes[idx].children)
                .flatten()
                .filter(|&idx| self.nodes[idx].tile.bounds.intersects(query))
                .collect();
        }

        frontier.into_iter().map(|idx| &self.nodes[idx].tile).collect()
    }
}
