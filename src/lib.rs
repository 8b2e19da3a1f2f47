//! Road-network queries over map data: quadtree tile selection for raster
//! views and A* shortest paths between geographic points.

use thiserror::Error;

pub mod model;
pub mod raster;
pub mod route;

pub use model::{RoadGraph, Vertex, VertexId};
pub use raster::{RasterConfig, RasterRequest, RasterResult, Rasterer};
pub use route::{PathFinder, Route, RouteConfig};

#[derive(Error, Debug)]
pub enum MapError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("OSM error: {0}")]
    OsmError(String),

    #[error("Unknown vertex: {0}")]
    UnknownVertex(VertexId),

    #[error("Graph has no vertices")]
    EmptyGraph,

    #[error("Invalid coordinate: ({lon}, {lat})")]
    InvalidCoordinate { lon: f64, lat: f64 },

    #[error("Invalid query box: {0}")]
    InvalidQueryBox(String),

    #[error("No path from vertex {from} to vertex {to}")]
    NoPathFound { from: VertexId, to: VertexId },

    #[error("Search exceeded {0} expansions")]
    SearchLimitExceeded(usize),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

pub type StatusOr<T> = Result<T, MapError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_shared_structures_are_thread_safe() {
        assert_send_sync::<RoadGraph>();
        assert_send_sync::<Rasterer>();
        assert_send_sync::<PathFinder<'static>>();
    }
}
