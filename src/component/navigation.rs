use crate::component::{ActivationContext, Component, ComponentConfig};
use crate::graph::edge::EdgeStatus;
use crate::render::contribution::DomContribution;
use crate::render::vnode::VirtualNode;
use crate::viewer::Services;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationConfig {
    /// Show arrows for the sequence universe (next/prev).
    pub sequence: bool,
    /// Show arrows for the spatial universe (steps, turns, pano).
    pub spatial: bool,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            sequence: true,
            spatial: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct NavigationConfigPatch {
    pub sequence: Option<bool>,
    pub spatial: Option<bool>,
}

impl ComponentConfig for NavigationConfig {
    type Patch = NavigationConfigPatch;

    fn merge(&self, patch: Self::Patch) -> Self {
        Self {
            sequence: patch.sequence.unwrap_or(self.sequence),
            spatial: patch.spatial.unwrap_or(self.spatial),
        }
    }
}

/// Renders one arrow per cached edge of the current node into the fixed DOM
/// channel. The two universes are consumed independently: whichever resolves
/// first shows first, and an uncached universe simply contributes nothing
/// yet.
pub struct NavigationComponent;

impl Component for NavigationComponent {
    const NAME: &'static str = "navigation";
    type Config = NavigationConfig;

    fn activate(&mut self, ctx: &ActivationContext<NavigationConfig>) {
        let services = Arc::clone(&ctx.services);
        let config = ctx.config.clone();
        ctx.subscriptions.spawn(run(services, config));
    }

    fn deactivate(&mut self) {}
}

type EdgeStreams = (watch::Receiver<EdgeStatus>, watch::Receiver<EdgeStatus>);

async fn run(services: Arc<Services>, mut config_rx: watch::Receiver<NavigationConfig>) {
    let mut node_rx = services.state.current_node_stream();
    let mut streams = edge_streams(&services, node_rx.borrow_and_update().as_deref());

    loop {
        submit(&services, &config_rx.borrow().clone(), streams.as_ref());

        tokio::select! {
            changed = config_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            changed = node_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                streams = edge_streams(&services, node_rx.borrow_and_update().as_deref());
            }
            alive = edges_changed(&mut streams) => {
                if !alive {
                    streams = None;
                }
            }
        }
    }
}

fn edge_streams(services: &Services, key: Option<&str>) -> Option<EdgeStreams> {
    key.map(|key| {
        let cache = services.graph.node_cache(key);
        (cache.sequence_edge_stream(), cache.spatial_edge_stream())
    })
}

async fn edges_changed(streams: &mut Option<EdgeStreams>) -> bool {
    match streams {
        Some((sequence, spatial)) => tokio::select! {
            changed = sequence.changed() => changed.is_ok(),
            changed = spatial.changed() => changed.is_ok(),
        },
        None => std::future::pending().await,
    }
}

fn submit(services: &Services, config: &NavigationConfig, streams: Option<&EdgeStreams>) {
    let vnode = streams.map(|(sequence, spatial)| {
        let mut container = VirtualNode::new("div").class("navigation");
        if config.sequence {
            container = append_arrows(container, &sequence.borrow());
        }
        if config.spatial {
            container = append_arrows(container, &spatial.borrow());
        }
        container
    });
    services.render.publish_dom_fixed(DomContribution {
        name: NavigationComponent::NAME,
        vnode,
    });
}

fn append_arrows(container: VirtualNode, status: &EdgeStatus) -> VirtualNode {
    if !status.is_cached() {
        return container;
    }
    status.edges().iter().fold(container, |parent, edge| {
        parent.child(
            VirtualNode::new("span")
                .class("arrow")
                .class(edge.data.direction.label())
                .attribute("data-to", &edge.to),
        )
    })
}
