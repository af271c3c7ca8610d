use crate::component::{ActivationContext, Component, ComponentConfig};
use crate::graph::GraphService;
use crate::graph::edge::EdgeDirection;
use crate::graph::node_cache::CachingProgress;
use crate::viewer::Services;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::watch;

/// Remaining traversal budget per direction class. Following an edge spends
/// one step of its class; a class at zero is not followed at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheDepth {
    pub sequence: u32,
    pub step: u32,
    pub turn: u32,
    pub pano: u32,
}

impl Default for CacheDepth {
    fn default() -> Self {
        Self {
            sequence: 2,
            step: 1,
            turn: 0,
            pano: 1,
        }
    }
}

impl CacheDepth {
    pub fn uniform(depth: u32) -> Self {
        Self {
            sequence: depth,
            step: depth,
            turn: depth,
            pano: depth,
        }
    }

    fn budget(&self, direction: EdgeDirection) -> u32 {
        match direction {
            EdgeDirection::Next | EdgeDirection::Prev => self.sequence,
            EdgeDirection::StepLeft
            | EdgeDirection::StepRight
            | EdgeDirection::StepForward
            | EdgeDirection::StepBackward => self.step,
            EdgeDirection::TurnLeft
            | EdgeDirection::TurnRight
            | EdgeDirection::TurnU
            | EdgeDirection::RotateLeft
            | EdgeDirection::RotateRight => self.turn,
            EdgeDirection::Pano | EdgeDirection::Similar => self.pano,
        }
    }

    fn descend(&self, direction: EdgeDirection) -> Self {
        let mut next = *self;
        match direction {
            EdgeDirection::Next | EdgeDirection::Prev => next.sequence -= 1,
            EdgeDirection::StepLeft
            | EdgeDirection::StepRight
            | EdgeDirection::StepForward
            | EdgeDirection::StepBackward => next.step -= 1,
            EdgeDirection::TurnLeft
            | EdgeDirection::TurnRight
            | EdgeDirection::TurnU
            | EdgeDirection::RotateLeft
            | EdgeDirection::RotateRight => next.turn -= 1,
            EdgeDirection::Pano | EdgeDirection::Similar => next.pano -= 1,
        }
        next
    }

    fn exhausted(&self) -> bool {
        self == &Self::uniform(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheConfig {
    pub depth: CacheDepth,
}

#[derive(Debug, Default)]
pub struct CacheConfigPatch {
    pub depth: Option<CacheDepth>,
}

impl ComponentConfig for CacheConfig {
    type Patch = CacheConfigPatch;

    fn merge(&self, patch: Self::Patch) -> Self {
        Self {
            depth: patch.depth.unwrap_or(self.depth),
        }
    }
}

/// One started caching operation of a prefetch pass. Dropping the receiver
/// does not cancel the transfer, the owning cache keeps loading.
pub struct PrefetchRequest {
    pub key: String,
    pub progress: watch::Receiver<CachingProgress>,
}

/// Breadth-first prefetch around `start`, spending the depth budget class by
/// class. Edges are pulled through the graph service, so every visited
/// node's edge statuses flip to cached along the way. Nodes the provider
/// does not know are skipped.
pub fn prefetch_from(graph: &GraphService, start: &str, depth: CacheDepth) -> Vec<PrefetchRequest> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut frontier = VecDeque::from([(start.to_string(), depth)]);
    let mut requests = Vec::new();

    while let Some((key, remaining)) = frontier.pop_front() {
        if !visited.insert(key.clone()) {
            continue;
        }
        match graph.cache_node_assets(&key) {
            Ok(progress) => requests.push(PrefetchRequest {
                key: key.clone(),
                progress,
            }),
            Err(err) => {
                log::debug!("Skipping prefetch of {}: {}", key, err);
                continue;
            }
        }
        if remaining.exhausted() {
            continue;
        }

        graph.cache_sequence_edges(&key);
        graph.cache_spatial_edges(&key);
        let cache = graph.node_cache(&key);
        for status in [cache.sequence_edge_status(), cache.spatial_edge_status()] {
            for edge in status.edges() {
                if remaining.budget(edge.data.direction) > 0 {
                    frontier.push_back((edge.to.clone(), remaining.descend(edge.data.direction)));
                }
            }
        }
    }
    requests
}

/// Prefetches the neighborhood of the current node. No render output; this
/// component only exists to keep adjacent nodes warm.
pub struct CacheComponent;

impl Component for CacheComponent {
    const NAME: &'static str = "cache";
    type Config = CacheConfig;

    fn activate(&mut self, ctx: &ActivationContext<CacheConfig>) {
        let services = Arc::clone(&ctx.services);
        let config = ctx.config.clone();
        ctx.subscriptions.spawn(run(services, config));
    }

    fn deactivate(&mut self) {}
}

async fn run(services: Arc<Services>, mut config_rx: watch::Receiver<CacheConfig>) {
    let mut node_rx = services.state.current_node_stream();

    loop {
        if let Some(key) = node_rx.borrow_and_update().clone() {
            let depth = config_rx.borrow().depth;
            let requests = prefetch_from(&services.graph, &key, depth);
            log::debug!("Prefetching {} nodes around {}", requests.len(), key);
            // receivers are dropped, the caches keep loading on their own
        }

        tokio::select! {
            changed = node_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            changed = config_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}
