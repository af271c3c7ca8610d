use crate::api::ImageSize;
use crate::graph::edge::{Edge, EdgeStatus};
use crate::io::loader::ResourceLoader;
use crate::io::texture_store::{TextureId, TextureStore};
use crate::io::{FetchError, LoadStatus};
use arc_swap::ArcSwapOption;
use glam::Vec3;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use streetscope_mesh::mesh::types::MeshAsset;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Reconstruction mesh in viewer coordinates. Immutable once installed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vec3>,
    pub faces: Vec<[u32; 3]>,
}

impl Mesh {
    pub fn from_wire(asset: MeshAsset) -> Self {
        let vertices = asset
            .vertices
            .chunks_exact(3)
            .map(|triplet| Vec3::new(triplet[0], triplet[1], triplet[2]))
            .collect();
        let faces = asset
            .faces
            .chunks_exact(3)
            .map(|triplet| [triplet[0], triplet[1], triplet[2]])
            .collect();
        Self { vertices, faces }
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

/// Installed image of a node. Replaced wholesale on resolution upgrades, the
/// pixel data lives in the texture store behind `texture`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedImage {
    pub key: String,
    pub size: ImageSize,
    pub width: u32,
    pub height: u32,
    pub texture: TextureId,
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Node cache for {key} is disposed")]
    Disposed { key: String },

    #[error("Caching operation for {key} was aborted")]
    Aborted { key: String },
}

/// State of a combined caching operation as seen by subscribers. Exactly one
/// terminal value is published per operation.
#[derive(Debug, Clone)]
pub enum CachingProgress {
    Loading(LoadStatus),
    Done(LoadStatus),
    Failed(Arc<CacheError>),
}

impl CachingProgress {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CachingProgress::Done(_) | CachingProgress::Failed(_))
    }
}

type ImageFetchResult = Result<(), Arc<CacheError>>;

struct AssetsInFlight {
    receiver: watch::Receiver<CachingProgress>,
    task: JoinHandle<()>,
}

struct ImageFetch {
    task: Option<JoinHandle<()>>,
    done: watch::Receiver<Option<ImageFetchResult>>,
}

enum ImageSlot {
    Join(watch::Receiver<Option<ImageFetchResult>>),
    Claim {
        done_tx: watch::Sender<Option<ImageFetchResult>>,
        done_rx: watch::Receiver<Option<ImageFetchResult>>,
    },
}

/// Per-node asset cache: image, mesh, cumulative load status and the edge
/// statuses of both universes, each behind a replay-one stream.
///
/// At most one combined caching operation runs at a time; re-requesting while
/// one is running (or after success) joins the existing channel. Image
/// fetches are additionally de-duplicated per size class.
pub struct NodeCache {
    key: String,
    loader: Arc<ResourceLoader>,
    textures: Arc<TextureStore>,
    base_size: ImageSize,
    pano_size: ImageSize,

    image: ArcSwapOption<CachedImage>,
    mesh: ArcSwapOption<Mesh>,
    load_status: RwLock<LoadStatus>,

    image_changes: watch::Sender<Option<Arc<CachedImage>>>,
    sequence_edges: watch::Sender<EdgeStatus>,
    spatial_edges: watch::Sender<EdgeStatus>,

    assets_in_flight: Mutex<Option<AssetsInFlight>>,
    image_fetches: Mutex<HashMap<ImageSize, ImageFetch>>,
    disposed: AtomicBool,
}

impl NodeCache {
    pub fn new(
        key: String,
        loader: Arc<ResourceLoader>,
        textures: Arc<TextureStore>,
        base_size: ImageSize,
        pano_size: ImageSize,
    ) -> Self {
        let (image_changes, _) = watch::channel(None);
        let (sequence_edges, _) = watch::channel(EdgeStatus::uncached());
        let (spatial_edges, _) = watch::channel(EdgeStatus::uncached());

        Self {
            key,
            loader,
            textures,
            base_size,
            pano_size,
            image: ArcSwapOption::empty(),
            mesh: ArcSwapOption::empty(),
            load_status: RwLock::new(LoadStatus::default()),
            image_changes,
            sequence_edges,
            spatial_edges,
            assets_in_flight: Mutex::new(None),
            image_fetches: Mutex::new(HashMap::new()),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn image(&self) -> Option<Arc<CachedImage>> {
        self.image.load_full()
    }

    pub fn mesh(&self) -> Option<Arc<Mesh>> {
        self.mesh.load_full()
    }

    pub fn load_status(&self) -> LoadStatus {
        *self.load_status.read().expect("load status poisoned")
    }

    pub fn sequence_edge_status(&self) -> EdgeStatus {
        self.sequence_edges.borrow().clone()
    }

    pub fn spatial_edge_status(&self) -> EdgeStatus {
        self.spatial_edges.borrow().clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Replay-one stream of the installed image. A new subscriber reads the
    /// current value immediately via `borrow`.
    pub fn image_stream(&self) -> watch::Receiver<Option<Arc<CachedImage>>> {
        self.image_changes.subscribe()
    }

    pub fn sequence_edge_stream(&self) -> watch::Receiver<EdgeStatus> {
        self.sequence_edges.subscribe()
    }

    pub fn spatial_edge_stream(&self) -> watch::Receiver<EdgeStatus> {
        self.spatial_edges.subscribe()
    }

    /// Starts (or joins) the combined image-plus-mesh caching operation.
    ///
    /// `pano` picks the panorama resolution target, `merged` controls whether
    /// a reconstruction mesh exists; without one the empty mesh is installed
    /// at zero load cost. The returned receiver replays the current progress
    /// and ends on exactly one terminal value. A failed operation clears the
    /// slot so callers may retry; a successful one keeps replaying `Done`.
    pub fn cache_assets(self: &Arc<Self>, pano: bool, merged: bool) -> watch::Receiver<CachingProgress> {
        let mut slot = self.assets_in_flight.lock().expect("assets slot poisoned");
        if let Some(flight) = slot.as_ref() {
            return flight.receiver.clone();
        }

        if self.is_disposed() {
            let failure = CachingProgress::Failed(Arc::new(CacheError::Disposed {
                key: self.key.clone(),
            }));
            let (_tx, rx) = watch::channel(failure);
            return rx;
        }

        let (tx, rx) = watch::channel(CachingProgress::Loading(LoadStatus::default()));
        let sender = Arc::new(tx);
        let size = if pano { self.pano_size } else { self.base_size };
        log::debug!("Caching assets for {} at {} px (merged: {})", self.key, size.pixels(), merged);

        let cache = Arc::clone(self);
        let task_sender = Arc::clone(&sender);
        let task = tokio::spawn(async move {
            Self::run_assets_operation(cache, task_sender, size, merged).await;
        });

        *slot = Some(AssetsInFlight {
            receiver: rx.clone(),
            task,
        });
        rx
    }

    /// Ensures an image whose larger dimension meets `target`. Returns
    /// without any network traffic when the cached image already does;
    /// otherwise fetches, revokes the superseded texture and publishes the
    /// replacement on the image stream. Concurrent requests for the same
    /// size class share one fetch.
    pub async fn cache_image(self: &Arc<Self>, target: ImageSize) -> Result<(), Arc<CacheError>> {
        if self.is_disposed() {
            return Err(Arc::new(CacheError::Disposed {
                key: self.key.clone(),
            }));
        }

        if self.meets_target(target) {
            return Ok(());
        }

        match self.claim_image_slot(target) {
            ImageSlot::Join(done) => Self::settle_image_watch(&self.key, done).await,
            ImageSlot::Claim { done_tx, done_rx } => {
                let cache = Arc::clone(self);
                let task = tokio::spawn(async move {
                    let (progress_tx, _keepalive) = watch::channel(LoadStatus::default());
                    let result = cache.fetch_and_install_image(target, &progress_tx).await;
                    if let Err(err) = &result {
                        log::debug!("Image fetch for {} at {} px failed: {}", cache.key, target.pixels(), err);
                    }
                    done_tx.send_replace(Some(result));
                });
                self.register_image_task(target, task);
                Self::settle_image_watch(&self.key, done_rx).await
            }
        }
    }

    /// Atomically sets the sequence edges and marks them cached, notifying
    /// the stream.
    pub fn cache_sequence_edges(&self, edges: Vec<Edge>) {
        if self.is_disposed() {
            log::warn!("Ignoring sequence edges for disposed node {}", self.key);
            return;
        }
        self.sequence_edges.send_replace(EdgeStatus::cached(edges));
    }

    pub fn cache_spatial_edges(&self, edges: Vec<Edge>) {
        if self.is_disposed() {
            log::warn!("Ignoring spatial edges for disposed node {}", self.key);
            return;
        }
        self.spatial_edges.send_replace(EdgeStatus::cached(edges));
    }

    pub fn reset_sequence_edges(&self) {
        if self.is_disposed() {
            return;
        }
        self.sequence_edges.send_replace(EdgeStatus::uncached());
    }

    pub fn reset_spatial_edges(&self) {
        if self.is_disposed() {
            return;
        }
        self.spatial_edges.send_replace(EdgeStatus::uncached());
    }

    /// Tears the cache down: aborts in-flight work, revokes the texture,
    /// resets every field to its initial value and notifies each stream one
    /// final time. Later caching calls fail with `Disposed`, later edge
    /// setters no-op.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        log::debug!("Disposing node cache {}", self.key);

        if let Some(flight) = self.assets_in_flight.lock().expect("assets slot poisoned").take() {
            flight.task.abort();
        }
        for (_, fetch) in self.image_fetches.lock().expect("image fetch slot poisoned").drain() {
            if let Some(task) = fetch.task {
                task.abort();
            }
        }

        if let Some(image) = self.image.swap(None) {
            self.textures.revoke(image.texture);
        }
        self.mesh.store(None);
        *self.load_status.write().expect("load status poisoned") = LoadStatus::default();

        self.image_changes.send_replace(None);
        self.sequence_edges.send_replace(EdgeStatus::uncached());
        self.spatial_edges.send_replace(EdgeStatus::uncached());
    }

    fn meets_target(&self, target: ImageSize) -> bool {
        match self.image.load_full() {
            Some(current) => current.width.max(current.height) >= target.pixels(),
            None => false,
        }
    }

    fn claim_image_slot(&self, size: ImageSize) -> ImageSlot {
        let mut fetches = self.image_fetches.lock().expect("image fetch slot poisoned");
        if let Some(flight) = fetches.get(&size) {
            if flight.done.borrow().is_none() {
                return ImageSlot::Join(flight.done.clone());
            }
            // settled fetches stay registered until the next claim replaces them
        }

        let (done_tx, done_rx) = watch::channel(None);
        fetches.insert(
            size,
            ImageFetch {
                task: None,
                done: done_rx.clone(),
            },
        );
        ImageSlot::Claim { done_tx, done_rx }
    }

    fn register_image_task(&self, size: ImageSize, task: JoinHandle<()>) {
        if let Some(flight) = self
            .image_fetches
            .lock()
            .expect("image fetch slot poisoned")
            .get_mut(&size)
        {
            flight.task = Some(task);
        }
    }

    async fn settle_image_watch(
        key: &str,
        mut done: watch::Receiver<Option<ImageFetchResult>>,
    ) -> ImageFetchResult {
        let aborted = || {
            Err(Arc::new(CacheError::Aborted {
                key: key.to_string(),
            }))
        };
        match done.wait_for(|result| result.is_some()).await {
            Ok(settled) => settled.clone().unwrap_or_else(aborted),
            Err(_) => aborted(),
        }
    }

    async fn run_assets_operation(
        cache: Arc<NodeCache>,
        sender: Arc<watch::Sender<CachingProgress>>,
        size: ImageSize,
        merged: bool,
    ) {
        *cache.load_status.write().expect("load status poisoned") = LoadStatus::default();
        if !merged {
            // nothing was ever reconstructed for this node
            cache.install_mesh(Mesh::default());
        }

        let (image_progress_tx, image_progress_rx) = watch::channel(LoadStatus::default());
        let (mesh_progress_tx, mesh_progress_rx) = watch::channel(LoadStatus::default());
        let forwarder = tokio::spawn(Self::forward_progress(
            Arc::clone(&cache),
            Arc::clone(&sender),
            image_progress_rx,
            mesh_progress_rx,
        ));

        let image_cache = Arc::clone(&cache);
        let image_leg = async move {
            let progress = image_progress_tx;
            if image_cache.meets_target(size) {
                return Ok(());
            }
            match image_cache.claim_image_slot(size) {
                ImageSlot::Join(done) => Self::settle_image_watch(&image_cache.key, done).await,
                ImageSlot::Claim { done_tx, .. } => {
                    let result = image_cache.fetch_and_install_image(size, &progress).await;
                    done_tx.send_replace(Some(result.clone()));
                    result
                }
            }
        };

        let mesh_cache = Arc::clone(&cache);
        let mesh_leg = async move {
            if !merged {
                return;
            }
            let progress = mesh_progress_tx;
            match mesh_cache.loader.fetch_mesh(&mesh_cache.key, &progress).await {
                Ok(asset) => mesh_cache.install_mesh(Mesh::from_wire(asset)),
                Err(err) => {
                    log::warn!(
                        "Mesh for {} failed to load, degrading to the empty mesh: {}",
                        mesh_cache.key,
                        err
                    );
                    mesh_cache.install_mesh(Mesh::default());
                }
            }
        };

        let (image_result, ()) = tokio::join!(image_leg, mesh_leg);

        // both progress senders are gone now, so the forwarder drains and exits
        let _ = forwarder.await;

        let status = cache.load_status();
        match image_result {
            Ok(()) => {
                log::debug!("Cached assets for {} ({} bytes)", cache.key, status.loaded);
                sender.send_replace(CachingProgress::Done(status));
            }
            Err(err) => {
                cache.clear_assets_flight();
                sender.send_replace(CachingProgress::Failed(err));
            }
        }
    }

    async fn forward_progress(
        cache: Arc<NodeCache>,
        sender: Arc<watch::Sender<CachingProgress>>,
        mut image_rx: watch::Receiver<LoadStatus>,
        mut mesh_rx: watch::Receiver<LoadStatus>,
    ) {
        let mut image_open = true;
        let mut mesh_open = true;
        while image_open || mesh_open {
            tokio::select! {
                changed = image_rx.changed(), if image_open => {
                    if changed.is_err() {
                        image_open = false;
                        continue;
                    }
                }
                changed = mesh_rx.changed(), if mesh_open => {
                    if changed.is_err() {
                        mesh_open = false;
                        continue;
                    }
                }
            }

            let status = *image_rx.borrow_and_update() + *mesh_rx.borrow_and_update();
            *cache.load_status.write().expect("load status poisoned") = status;
            sender.send_replace(CachingProgress::Loading(status));
        }
    }

    async fn fetch_and_install_image(
        self: &Arc<Self>,
        size: ImageSize,
        progress: &watch::Sender<LoadStatus>,
    ) -> ImageFetchResult {
        let bitmap = self
            .loader
            .fetch_image(&self.key, size, progress)
            .await
            .map_err(|err| Arc::new(CacheError::from(err)))?;

        if self.is_disposed() {
            return Err(Arc::new(CacheError::Disposed {
                key: self.key.clone(),
            }));
        }

        // the superseded texture goes first, then the replacement takes the slot
        if let Some(previous) = self.image.load_full() {
            self.textures.revoke(previous.texture);
        }

        let (width, height) = (bitmap.width, bitmap.height);
        let texture = self.textures.install(Arc::new(bitmap));
        let cached = Arc::new(CachedImage {
            key: self.key.clone(),
            size,
            width,
            height,
            texture,
        });
        self.image.store(Some(Arc::clone(&cached)));

        if self.is_disposed() {
            // disposal raced the install, withdraw it again
            if let Some(raced) = self.image.swap(None) {
                self.textures.revoke(raced.texture);
            }
            return Err(Arc::new(CacheError::Disposed {
                key: self.key.clone(),
            }));
        }

        self.image_changes.send_replace(Some(cached));
        Ok(())
    }

    fn install_mesh(&self, mesh: Mesh) {
        if self.is_disposed() {
            return;
        }
        self.mesh.store(Some(Arc::new(mesh)));
    }

    fn clear_assets_flight(&self) {
        *self.assets_in_flight.lock().expect("assets slot poisoned") = None;
    }
}
