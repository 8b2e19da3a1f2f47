use log::{info, warn};
use osmpbf::{Element, ElementReader};
use std::collections::HashMap;
use std::path::Path;

use crate::model::{RoadGraph, VertexId};
use crate::{MapError, StatusOr};

/// Highway values that take part in routing
const ROUTABLE_HIGHWAYS: &[&str] = &[
    "motorway",
    "trunk",
    "primary",
    "secondary",
    "tertiary",
    "unclassified",
    "residential",
    "living_street",
    "service",
    "motorway_link",
    "trunk_link",
    "primary_link",
    "secondary_link",
    "tertiary_link",
];

/// Helper struct to store OSM node data
#[derive(Debug, Clone)]
pub struct OsmNode {
    pub id: VertexId,
    pub lat: f64,
    pub lon: f64,
    pub name: Option<String>,
}

/// Helper struct to store OSM way data
#[derive(Debug, Clone)]
pub struct OsmWay {
    pub id: i64,
    pub node_ids: Vec<VertexId>,
    pub tags: HashMap<String, String>,
}

/// Read an OpenStreetMap PBF file into a cleaned-up road graph
pub fn load_osm_file<P: AsRef<Path>>(file_path: P) -> StatusOr<RoadGraph> {
    let path = file_path.as_ref();
    info!("Processing OSM file: {}", path.display());

    if !path.exists() {
        return Err(MapError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        )));
    }

    let reader = ElementReader::from_path(path)
        .map_err(|e| MapError::OsmError(e.to_string()))?;

    let mut osm_nodes = Vec::new();
    let mut osm_ways = Vec::new();

    reader
        .for_each(|element| match element {
            Element::Node(node) => {
                osm_nodes.push(OsmNode {
                    id: node.id(),
                    lat: node.lat(),
                    lon: node.lon(),
                    name: tag_value(node.tags(), "name"),
                });
            }
            Element::DenseNode(node) => {
                osm_nodes.push(OsmNode {
                    id: node.id(),
                    lat: node.lat(),
                    lon: node.lon(),
                    name: tag_value(node.tags(), "name"),
                });
            }
            Element::Way(way) => {
                // Keep only highways, the rest is decided in build_graph
                if way.tags().any(|(k, _)| k == "highway") {
                    osm_ways.push(OsmWay {
                        id: way.id(),
                        node_ids: way.refs().collect(),
                        tags: way.tags().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
                    });
                }
            }
            Element::Relation(_) => {}
        })
        .map_err(|e| MapError::OsmError(e.to_string()))?;

    info!("Collected {} nodes and {} highways", osm_nodes.len(), osm_ways.len());

    Ok(build_graph(&osm_nodes, &osm_ways))
}

/// Build the road graph from parsed nodes and ways, then drop isolated vertices
pub fn build_graph(nodes: &[OsmNode], ways: &[OsmWay]) -> RoadGraph {
    let mut graph = RoadGraph::new();

    for node in nodes {
        graph.add_vertex(node.id, node.lat, node.lon);
        if let Some(name) = &node.name {
            // The vertex was just inserted so this cannot fail
            let _ = graph.set_name(node.id, name);
        }
    }

    let mut edge_count = 0;
    let mut skipped = 0;
    for way in ways.iter().filter(|way| is_routable_way(&way.tags)) {
        for pair in way.node_ids.windows(2) {
            match graph.add_edge(pair[0], pair[1]) {
                Ok(()) => edge_count += 1,
                Err(e) => {
                    warn!("Skipping segment of way {}: {}", way.id, e);
                    skipped += 1;
                }
            }
        }
        if let Some(name) = way.tags.get("name") {
            graph.add_way(name, way.node_ids.clone());
        }
    }

    info!("Added {} edges, skipped {} segments", edge_count, skipped);
    graph.cleanup();
    graph
}

/// Determine if a way is routable (road, not an area)
fn is_routable_way(tags: &HashMap<String, String>) -> bool {
    let is_area = tags.get("area").is_some_and(|v| v == "yes");
    let is_road = tags
        .get("highway")
        .is_some_and(|v| ROUTABLE_HIGHWAYS.contains(&v.as_str()));

    is_road && !is_area
}

fn tag_value<'a>(mut tags: impl Iterator<Item = (&'a str, &'a str)>, key: &str) -> Option<String> {
    tags.find(|(k, _)| *k == key).map(|(_, v)| v.to_string())
}
