use crate::api::ImageSize;
use crate::graph::node_cache::{CachingProgress, NodeCache};
use crate::graph::provider::GraphDataProvider;
use crate::io::loader::ResourceLoader;
use crate::io::texture_store::TextureStore;
use crate::settings::ViewerSettings;
use dashmap::DashMap;
use itertools::Itertools;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

pub mod edge;
pub mod node_cache;
pub mod provider;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Node {key} is not part of the graph")]
    UnknownNode { key: String },
}

/// Owns one `NodeCache` per node key, created on first use. The node caches
/// do the heavy lifting; this service wires them to the provider.
pub struct GraphService {
    caches: DashMap<String, Arc<NodeCache>>,
    provider: Arc<dyn GraphDataProvider>,
    loader: Arc<ResourceLoader>,
    textures: Arc<TextureStore>,
    base_size: ImageSize,
    pano_size: ImageSize,
}

impl GraphService {
    pub fn new(
        provider: Arc<dyn GraphDataProvider>,
        loader: Arc<ResourceLoader>,
        textures: Arc<TextureStore>,
        settings: &ViewerSettings,
    ) -> Self {
        Self {
            caches: DashMap::with_capacity(100),
            provider,
            loader,
            textures,
            base_size: settings.base_image_size,
            pano_size: settings.base_panorama_size,
        }
    }

    /// Get-or-create. A node's cache comes into existence the moment anything
    /// needs it.
    pub fn node_cache(&self, key: &str) -> Arc<NodeCache> {
        // Easy path without locking the insertion shard.
        if let Some(cache) = self.caches.get(key) {
            return Arc::clone(cache.value());
        }

        // entry() re-checks under the shard lock, racing creators collapse here
        let entry = self.caches.entry(key.to_string()).or_insert_with(|| {
            Arc::new(NodeCache::new(
                key.to_string(),
                Arc::clone(&self.loader),
                Arc::clone(&self.textures),
                self.base_size,
                self.pano_size,
            ))
        });
        Arc::clone(entry.value())
    }

    /// Only looks, never creates. Render paths use this to avoid resurrecting
    /// caches for nodes that are already gone.
    pub fn peek(&self, key: &str) -> Option<Arc<NodeCache>> {
        self.caches.get(key).map(|cache| Arc::clone(cache.value()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.caches.contains_key(key)
    }

    pub fn cached_keys(&self) -> Vec<String> {
        self.caches.iter().map(|entry| entry.key().clone()).collect_vec()
    }

    /// Resolves the node's metadata and starts (or joins) its combined
    /// caching operation.
    pub fn cache_node_assets(&self, key: &str) -> Result<watch::Receiver<CachingProgress>, GraphError> {
        let info = self
            .provider
            .node_info(key)
            .ok_or_else(|| GraphError::UnknownNode { key: key.to_string() })?;
        Ok(self.node_cache(key).cache_assets(info.pano, info.merged))
    }

    /// Pulls the sequence edges from the provider into the node's cache,
    /// flipping its sequence status to cached.
    pub fn cache_sequence_edges(&self, key: &str) {
        let edges = self.provider.sequence_edges(key);
        self.node_cache(key).cache_sequence_edges(edges);
    }

    pub fn cache_spatial_edges(&self, key: &str) {
        let edges = self.provider.spatial_edges(key);
        self.node_cache(key).cache_spatial_edges(edges);
    }

    /// Graph invalidation: both universes back to uncached.
    pub fn reset_edges(&self, key: &str) {
        if let Some(cache) = self.peek(key) {
            cache.reset_sequence_edges();
            cache.reset_spatial_edges();
        }
    }

    /// Disposes the node's cache and forgets it.
    pub fn uncache(&self, key: &str) {
        if let Some((_, cache)) = self.caches.remove(key) {
            cache.dispose();
        }
    }

    pub fn uncache_all(&self) {
        let keys = self.cached_keys();
        for key in keys {
            self.uncache(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiOptions;
    use crate::graph::edge::{Edge, EdgeData, EdgeDirection};
    use crate::graph::provider::{NodeInfo, StaticGraphSource};
    use crate::io::testing::{FakeTransport, ScriptedResponse, jpeg_fixture};

    fn service_with(source: StaticGraphSource) -> (GraphService, Arc<FakeTransport>, ApiOptions) {
        let api = ApiOptions {
            image_host: "img.test".to_string(),
            mesh_host: "mesh.test".to_string(),
            origin: "test".to_string(),
        };
        let transport = Arc::new(FakeTransport::default());
        let loader = Arc::new(ResourceLoader::new(
            Arc::clone(&transport) as Arc<dyn crate::io::http::Transport>,
            api.clone(),
        ));
        let textures = Arc::new(TextureStore::default());
        let service = GraphService::new(
            Arc::new(source),
            loader,
            textures,
            &ViewerSettings::default(),
        );
        (service, transport, api)
    }

    fn next_edge(from: &str, to: &str) -> Edge {
        Edge {
            from: from.to_string(),
            to: to.to_string(),
            data: EdgeData {
                direction: EdgeDirection::Next,
                world_motion_azimuth: 0.0,
            },
        }
    }

    #[test]
    fn node_caches_are_created_once_and_shared() {
        let (service, _, _) = service_with(StaticGraphSource::default());

        let first = service.node_cache("k0");
        let second = service.node_cache("k0");
        assert!(Arc::ptr_eq(&first, &second));
        assert!(service.contains("k0"));
        assert!(!service.contains("k1"));
        assert_eq!(service.cached_keys(), vec!["k0".to_string()]);
    }

    #[test]
    fn unknown_nodes_are_rejected_before_any_traffic() {
        let (service, transport, _) = service_with(StaticGraphSource::default());

        let result = service.cache_node_assets("missing");
        assert!(matches!(result, Err(GraphError::UnknownNode { .. })));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn caches_assets_using_provider_metadata() {
        let mut source = StaticGraphSource::default();
        source.insert_node("k0", NodeInfo { pano: false, merged: false });
        let (service, transport, api) = service_with(source);
        transport.script(
            &api.image_url("k0", ImageSize::Size640),
            ScriptedResponse::ok(jpeg_fixture(640, 480)),
        );

        let mut progress = service.cache_node_assets("k0").unwrap();
        progress
            .wait_for(|progress| progress.is_terminal())
            .await
            .unwrap();

        assert!(service.node_cache("k0").image().is_some());
    }

    #[test]
    fn provider_edges_flow_into_the_cache() {
        let mut source = StaticGraphSource::default();
        source.insert_sequence_edge(next_edge("k0", "k1"));
        let (service, _, _) = service_with(source);

        service.cache_sequence_edges("k0");
        let status = service.node_cache("k0").sequence_edge_status();
        assert!(status.is_cached());
        assert_eq!(status.edges()[0].to, "k1");

        service.reset_edges("k0");
        assert!(!service.node_cache("k0").sequence_edge_status().is_cached());
    }

    #[test]
    fn uncache_disposes_and_forgets() {
        let (service, _, _) = service_with(StaticGraphSource::default());

        let cache = service.node_cache("k0");
        service.uncache("k0");

        assert!(!service.contains("k0"));
        assert!(cache.is_disposed());

        // a fresh cache can be created afterwards
        let fresh = service.node_cache("k0");
        assert!(!fresh.is_disposed());
    }
}
