use crate::api::{ApiOptions, ImageSize};
use crate::io::http::Transport;
use crate::io::{FetchError, LoadStatus};
use futures_util::TryStreamExt;
use std::io::Cursor;
use std::sync::Arc;
use streetscope_mesh::mesh::reader::MeshReader;
use streetscope_mesh::mesh::types::MeshAsset;
use tokio::sync::watch;

/// Decoded RGBA8 image, ready for texture installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBitmap {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Fetches thumbs and meshes through the transport, reporting per-chunk
/// progress on the given watch channel. Cancellation happens by dropping the
/// future; nothing is installed anywhere from here.
pub struct ResourceLoader {
    transport: Arc<dyn Transport>,
    api: ApiOptions,
}

impl ResourceLoader {
    pub fn new(transport: Arc<dyn Transport>, api: ApiOptions) -> Self {
        Self { transport, api }
    }

    pub fn api(&self) -> &ApiOptions {
        &self.api
    }

    pub async fn fetch_image(
        &self,
        key: &str,
        size: ImageSize,
        progress: &watch::Sender<LoadStatus>,
    ) -> Result<ImageBitmap, FetchError> {
        let url = self.api.image_url(key, size);
        let buf = self.fetch_bytes(&url, progress).await?;

        let decoded = image::load_from_memory(&buf).map_err(|err| FetchError::Decode {
            key: key.to_string(),
            source: err,
        })?;
        let rgba = decoded.to_rgba8();
        log::trace!("Decoded image for {} at {}x{}", key, rgba.width(), rgba.height());

        Ok(ImageBitmap {
            width: rgba.width(),
            height: rgba.height(),
            data: rgba.into_raw(),
        })
    }

    pub async fn fetch_mesh(
        &self,
        key: &str,
        progress: &watch::Sender<LoadStatus>,
    ) -> Result<MeshAsset, FetchError> {
        let url = self.api.mesh_url(key);
        let buf = self.fetch_bytes(&url, progress).await?;

        let asset = MeshReader::parse_asset(&mut Cursor::new(buf)).map_err(|err| FetchError::Mesh {
            key: key.to_string(),
            source: err,
        })?;
        log::trace!("Decoded mesh for {} with {} faces", key, asset.face_count());
        Ok(asset)
    }

    async fn fetch_bytes(
        &self,
        url: &str,
        progress: &watch::Sender<LoadStatus>,
    ) -> Result<Vec<u8>, FetchError> {
        let response = self.transport.get(url).await?;
        if response.status != 200 {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status,
            });
        }

        let total = response.content_length.unwrap_or(0);
        progress.send_replace(LoadStatus { loaded: 0, total });

        let mut body = response.body;
        let mut buf: Vec<u8> = Vec::new();
        while let Some(chunk) = body.try_next().await? {
            buf.extend_from_slice(&chunk);
            let loaded = buf.len() as u64;
            // servers occasionally under-report the length, never shrink it
            progress.send_replace(LoadStatus {
                loaded,
                total: total.max(loaded),
            });
        }

        let loaded = buf.len() as u64;
        progress.send_replace(LoadStatus { loaded, total: loaded });
        Ok(buf)
    }
}
