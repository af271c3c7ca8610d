//! Shared fixtures for component and frame-driver tests.

use crate::api::ApiOptions;
use crate::graph::GraphService;
use crate::graph::provider::StaticGraphSource;
use crate::io::http::Transport;
use crate::io::loader::ResourceLoader;
use crate::io::testing::FakeTransport;
use crate::io::texture_store::TextureStore;
use crate::render::ContributionQueues;
use crate::render::dom_composer::DomBackend;
use crate::render::gl_composer::{GlBackend, MeshDraw};
use crate::render::vnode::VirtualNode;
use crate::settings::ViewerSettings;
use crate::viewer::{Services, Viewer};
use std::sync::Arc;

pub fn test_api() -> ApiOptions {
    ApiOptions {
        image_host: "img.test".to_string(),
        mesh_host: "mesh.test".to_string(),
        origin: "test".to_string(),
    }
}

pub fn test_graph(source: StaticGraphSource) -> (Arc<GraphService>, Arc<FakeTransport>, ApiOptions) {
    let api = test_api();
    let transport = Arc::new(FakeTransport::default());
    let loader = Arc::new(ResourceLoader::new(
        Arc::clone(&transport) as Arc<dyn Transport>,
        api.clone(),
    ));
    let textures = Arc::new(TextureStore::default());
    let graph = Arc::new(GraphService::new(
        Arc::new(source),
        loader,
        textures,
        &ViewerSettings::default(),
    ));
    (graph, transport, api)
}

pub fn test_services() -> (Arc<Services>, ContributionQueues) {
    let (services, queues, _, _) = test_services_with(StaticGraphSource::default());
    (services, queues)
}

pub fn test_services_with(
    source: StaticGraphSource,
) -> (Arc<Services>, ContributionQueues, Arc<FakeTransport>, ApiOptions) {
    let (graph, transport, api) = test_graph(source);
    let (services, queues) = Services::new(graph, ViewerSettings::default());
    (services, queues, transport, api)
}

pub fn test_viewer() -> (Viewer, Arc<FakeTransport>, ApiOptions) {
    test_viewer_with(StaticGraphSource::default())
}

pub fn test_viewer_with(source: StaticGraphSource) -> (Viewer, Arc<FakeTransport>, ApiOptions) {
    let (graph, transport, api) = test_graph(source);
    (Viewer::new(graph, ViewerSettings::default()), transport, api)
}

/// Lets spawned component tasks run on the current-thread test runtime.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

#[derive(Default)]
pub struct RecordingDom {
    pub patches: Vec<VirtualNode>,
}

impl DomBackend for RecordingDom {
    fn patch(&mut self, _previous: &VirtualNode, next: &VirtualNode) {
        self.patches.push(next.clone());
    }
}

#[derive(Default)]
pub struct RecordingGl {
    pub ops: Vec<String>,
}

impl GlBackend for RecordingGl {
    fn clear_color(&mut self) {
        self.ops.push("clear-color".to_string());
    }

    fn clear_depth(&mut self) {
        self.ops.push("clear-depth".to_string());
    }

    fn draw_mesh(&mut self, draw: &MeshDraw) {
        self.ops.push(format!("draw:{}", draw.label));
    }
}
