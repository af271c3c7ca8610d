use crate::io::loader::ImageBitmap;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Handle to an installed bitmap, the counterpart of a platform object URL.
/// Stays resolvable until revoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(u64);

/// Registry of decoded bitmaps keyed by handle. Owners revoke superseded
/// handles themselves; `len` makes leaks visible.
#[derive(Default)]
pub struct TextureStore {
    textures: DashMap<u64, Arc<ImageBitmap>>,
    next_id: AtomicU64,
}

impl TextureStore {
    pub fn install(&self, bitmap: Arc<ImageBitmap>) -> TextureId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.textures.insert(id, bitmap);
        TextureId(id)
    }

    pub fn revoke(&self, id: TextureId) {
        if self.textures.remove(&id.0).is_none() {
            log::warn!("Revoking unknown texture handle {:?}", id);
        }
    }

    pub fn resolve(&self, id: TextureId) -> Option<Arc<ImageBitmap>> {
        self.textures.get(&id.0).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, id: TextureId) -> bool {
        self.textures.contains_key(&id.0)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}
