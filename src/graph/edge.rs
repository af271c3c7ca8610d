use serde::{Deserialize, Serialize};

/// Navigation directions between nodes. `Next`/`Prev` form the sequence
/// universe, everything else the spatial one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeDirection {
    Next,
    Prev,
    StepLeft,
    StepRight,
    StepForward,
    StepBackward,
    TurnLeft,
    TurnRight,
    TurnU,
    RotateLeft,
    RotateRight,
    Pano,
    Similar,
}

impl EdgeDirection {
    pub fn is_sequence(&self) -> bool {
        matches!(self, EdgeDirection::Next | EdgeDirection::Prev)
    }

    pub fn label(&self) -> &'static str {
        match self {
            EdgeDirection::Next => "next",
            EdgeDirection::Prev => "prev",
            EdgeDirection::StepLeft => "step-left",
            EdgeDirection::StepRight => "step-right",
            EdgeDirection::StepForward => "step-forward",
            EdgeDirection::StepBackward => "step-backward",
            EdgeDirection::TurnLeft => "turn-left",
            EdgeDirection::TurnRight => "turn-right",
            EdgeDirection::TurnU => "turn-u",
            EdgeDirection::RotateLeft => "rotate-left",
            EdgeDirection::RotateRight => "rotate-right",
            EdgeDirection::Pano => "pano",
            EdgeDirection::Similar => "similar",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    pub direction: EdgeDirection,
    /// Motion direction in world coordinates, radians.
    pub world_motion_azimuth: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub data: EdgeData,
}

/// Lookup state of one edge universe of a node. The fields stay private so
/// an uncached status can never carry edges; `cached` flips exactly when the
/// edges are set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeStatus {
    cached: bool,
    edges: Vec<Edge>,
}

impl EdgeStatus {
    pub fn uncached() -> Self {
        Self::default()
    }

    pub fn cached(edges: Vec<Edge>) -> Self {
        Self { cached: true, edges }
    }

    pub fn is_cached(&self) -> bool {
        self.cached
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }
}
