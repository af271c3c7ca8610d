use crate::graph::edge::Edge;
use serde::Deserialize;
use std::collections::HashMap;

/// Static node metadata the graph provider serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct NodeInfo {
    /// Full 360 degree capture.
    pub pano: bool,
    /// Reconstruction finished, a mesh exists for this node.
    pub merged: bool,
}

/// Source of node metadata and edge topology. The viewer core only consumes
/// this; computing edges is somebody else's problem.
pub trait GraphDataProvider: Send + Sync {
    fn node_info(&self, key: &str) -> Option<NodeInfo>;
    fn sequence_edges(&self, key: &str) -> Vec<Edge>;
    fn spatial_edges(&self, key: &str) -> Vec<Edge>;
}

/// Fixture-file implementation, deserialized from JSON. Used by the CLI and
/// the tests; keys absent from the maps simply have no edges.
#[derive(Debug, Default, Deserialize)]
pub struct StaticGraphSource {
    #[serde(default)]
    nodes: HashMap<String, NodeInfo>,
    #[serde(default)]
    sequence_edges: HashMap<String, Vec<Edge>>,
    #[serde(default)]
    spatial_edges: HashMap<String, Vec<Edge>>,
}

impl StaticGraphSource {
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, serde_json::Error> {
        serde_json::from_reader(reader)
    }

    pub fn insert_node(&mut self, key: &str, info: NodeInfo) {
        self.nodes.insert(key.to_string(), info);
    }

    pub fn insert_sequence_edge(&mut self, edge: Edge) {
        self.sequence_edges
            .entry(edge.from.clone())
            .or_default()
            .push(edge);
    }

    pub fn insert_spatial_edge(&mut self, edge: Edge) {
        self.spatial_edges
            .entry(edge.from.clone())
            .or_default()
            .push(edge);
    }
}

impl GraphDataProvider for StaticGraphSource {
    fn node_info(&self, key: &str) -> Option<NodeInfo> {
        self.nodes.get(key).copied()
    }

    fn sequence_edges(&self, key: &str) -> Vec<Edge> {
        self.sequence_edges.get(key).cloned().unwrap_or_default()
    }

    fn spatial_edges(&self, key: &str) -> Vec<Edge> {
        self.spatial_edges.get(key).cloned().unwrap_or_default()
    }
}
