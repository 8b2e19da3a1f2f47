use log::{debug, info};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::{MapError, StatusOr};

pub mod processor;

/// OpenStreetMap node identifier
pub type VertexId = i64;

/// A vertex represents a point on the road network
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    /// Unique identifier for the vertex
    pub id: VertexId,

    /// Longitude and latitude in signed degrees
    pub lon: f64,
    pub lat: f64,

    /// Display name, empty when unnamed
    pub name: String,

    /// Identifiers of directly connected vertices
    adjacent: BTreeSet<VertexId>,
}

impl Vertex {
    pub fn new(id: VertexId, lat: f64, lon: f64) -> Self {
        Self {
            id,
            lon,
            lat,
            name: String::new(),
            adjacent: BTreeSet::new(),
        }
    }

    pub fn adjacent(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.adjacent.iter().copied()
    }

    pub fn degree(&self) -> usize {
        self.adjacent.len()
    }
}

/// A named vertex returned by location search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub id: VertexId,
    pub lon: f64,
    pub lat: f64,
    pub name: String,
}

/// Undirected road graph.
///
/// Edges are stored only as reciprocal adjacency entries and weighted on demand
/// by the planar Euclidean distance between their endpoints. The graph is
/// populated through `add_vertex`/`add_edge`/`set_name`/`add_way`, finalized with
/// a single `cleanup` call and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct RoadGraph {
    vertices: BTreeMap<VertexId, Vertex>,
    ways: HashMap<String, Vec<VertexId>>,
    /// Normalized name -> vertices carrying it
    name_index: BTreeMap<String, BTreeSet<VertexId>>,
}

impl RoadGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a vertex with no neighbours, replacing any vertex with the same id.
    pub fn add_vertex(&mut self, id: VertexId, lat: f64, lon: f64) {
        if let Some(old) = self.vertices.insert(id, Vertex::new(id, lat, lon)) {
            debug!("Replacing vertex {}", id);
            self.unindex_name(id, &old.name);
            for neighbour in old.adjacent {
                if let Some(vertex) = self.vertices.get_mut(&neighbour) {
                    vertex.adjacent.remove(&id);
                }
            }
        }
    }

    /// Connect `u` and `v` in both directions. Repeated calls are no-ops.
    pub fn add_edge(&mut self, u: VertexId, v: VertexId) -> StatusOr<()> {
        for id in [u, v] {
            if !self.vertices.contains_key(&id) {
                return Err(MapError::UnknownVertex(id));
            }
        }
        if let Some(vertex) = self.vertices.get_mut(&u) {
            vertex.adjacent.insert(v);
        }
        if let Some(vertex) = self.vertices.get_mut(&v) {
            vertex.adjacent.insert(u);
        }
        Ok(())
    }

    pub fn set_name(&mut self, v: VertexId, name: &str) -> StatusOr<()> {
        let vertex = self.vertices.get_mut(&v).ok_or(MapError::UnknownVertex(v))?;
        let old = std::mem::replace(&mut vertex.name, name.to_string());
        self.unindex_name(v, &old);

        let key = clean_name(name);
        if !key.is_empty() {
            self.name_index.entry(key).or_default().insert(v);
        }
        Ok(())
    }

    pub fn name(&self, v: VertexId) -> StatusOr<&str> {
        Ok(self.vertex(v)?.name.as_str())
    }

    /// Record a named road. Later ways with the same name replace earlier ones.
    pub fn add_way(&mut self, name: &str, vertex_ids: Vec<VertexId>) {
        self.ways.insert(name.to_string(), vertex_ids);
    }

    pub fn way(&self, name: &str) -> Option<&[VertexId]> {
        self.ways.get(name).map(Vec::as_slice)
    }

    pub fn way_count(&self) -> usize {
        self.ways.len()
    }

    pub fn vertex(&self, v: VertexId) -> StatusOr<&Vertex> {
        self.vertices.get(&v).ok_or(MapError::UnknownVertex(v))
    }

    /// All vertex ids in ascending order
    pub fn vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn adjacent(&self, v: VertexId) -> StatusOr<impl Iterator<Item = VertexId> + '_> {
        Ok(self.vertex(v)?.adjacent())
    }

    pub fn lon(&self, v: VertexId) -> StatusOr<f64> {
        Ok(self.vertex(v)?.lon)
    }

    pub fn lat(&self, v: VertexId) -> StatusOr<f64> {
        Ok(self.vertex(v)?.lat)
    }

    /// Planar distance between two vertices in degrees.
    ///
    /// This ignores the earth's curvature, which is acceptable at city scale.
    pub fn distance(&self, u: VertexId, v: VertexId) -> StatusOr<f64> {
        let a = self.vertex(u)?;
        let b = self.vertex(v)?;
        Ok(euclidean(a.lon, a.lat, b.lon, b.lat))
    }

    /// Closest vertex to a point by linear scan.
    ///
    /// Ties go to the lowest id.
    pub fn closest_vertex(&self, lon: f64, lat: f64) -> StatusOr<VertexId> {
        if self.vertices.is_empty() {
            return Err(MapError::EmptyGraph);
        }
        if !lon.is_finite() || !lat.is_finite() {
            return Err(MapError::InvalidCoordinate { lon, lat });
        }

        let mut closest = None;
        let mut min_distance = f64::INFINITY;
        for vertex in self.vertices.values() {
            let distance = euclidean(vertex.lon, vertex.lat, lon, lat);
            if distance < min_distance {
                min_distance = distance;
                closest = Some(vertex.id);
            }
        }

        closest.ok_or(MapError::InvalidCoordinate { lon, lat })
    }

    /// Remove vertices with no connections.
    ///
    /// The remaining graph is not guaranteed to be connected, but roads
    /// usually are. Returns the number of vertices removed.
    pub fn cleanup(&mut self) -> usize {
        let before = self.vertices.len();
        self.vertices.retain(|_, vertex| vertex.degree() > 0);

        let vertices = &self.vertices;
        self.name_index.retain(|_, ids| {
            ids.retain(|id| vertices.contains_key(id));
            !ids.is_empty()
        });

        let removed = before - self.vertices.len();
        info!("Removed {} isolated vertices, {} remain", removed, self.vertices.len());
        removed
    }

    /// Distinct names whose normalized form starts with the normalized prefix
    pub fn names_with_prefix(&self, prefix: &str) -> Vec<String> {
        let prefix = clean_name(prefix);
        let mut names = BTreeSet::new();
        for (key, ids) in self.name_index.range(prefix.clone()..) {
            if !key.starts_with(&prefix) {
                break;
            }
            for id in ids {
                if let Some(vertex) = self.vertices.get(id) {
                    names.insert(vertex.name.clone());
                }
            }
        }
        names.into_iter().collect()
    }

    /// Vertices whose normalized name equals the normalized query
    pub fn locations(&self, name: &str) -> Vec<Location> {
        let Some(ids) = self.name_index.get(&clean_name(name)) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| self.vertices.get(id))
            .map(|vertex| Location {
                id: vertex.id,
                lon: vertex.lon,
                lat: vertex.lat,
                name: vertex.name.clone(),
            })
            .collect()
    }

    fn unindex_name(&mut self, v: VertexId, name: &str) {
        let key = clean_name(name);
        if let Some(ids) = self.name_index.get_mut(&key) {
            ids.remove(&v);
            if ids.is_empty() {
                self.name_index.remove(&key);
            }
        }
    }
}

/// Lowercase a name and drop everything but ASCII letters and spaces
pub fn clean_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphabetic() || *c == ' ')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

pub(crate) fn euclidean(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    ((lon1 - lon2).powi(2) + (lat1 - lat2).powi(2)).sqrt()
}
