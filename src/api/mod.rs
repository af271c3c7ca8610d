use serde::{Deserialize, Serialize};

/// Size classes the thumb endpoint serves. The derived ordering follows the
/// pixel count, so "meets or exceeds" comparisons work directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ImageSize {
    Size320,
    Size640,
    Size1024,
    Size2048,
}

impl ImageSize {
    pub fn pixels(&self) -> u32 {
        match self {
            ImageSize::Size320 => 320,
            ImageSize::Size640 => 640,
            ImageSize::Size1024 => 1024,
            ImageSize::Size2048 => 2048,
        }
    }
}

/// Endpoint configuration for thumb and mesh downloads. `origin` tags every
/// image request so the backend can attribute traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiOptions {
    pub image_host: String,
    pub mesh_host: String,
    pub origin: String,
}

impl Default for ApiOptions {
    fn default() -> Self {
        Self {
            image_host: "images.streetscope.net".to_string(),
            mesh_host: "meshes.streetscope.net".to_string(),
            origin: "streetscope.viewer".to_string(),
        }
    }
}

impl ApiOptions {
    pub fn image_url(&self, key: &str, size: ImageSize) -> String {
        format!(
            "https://{}/{}/thumb-{}.jpg?origin={}",
            self.image_host,
            key,
            size.pixels(),
            self.origin
        )
    }

    pub fn mesh_url(&self, key: &str) -> String {
        format!("https://{}/v2/mesh/{}", self.mesh_host, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_sizes_order_by_pixels() {
        assert!(ImageSize::Size320 < ImageSize::Size640);
        assert!(ImageSize::Size1024 < ImageSize::Size2048);
        assert_eq!(ImageSize::Size1024.pixels(), 1024);
    }

    #[test]
    fn builds_thumb_and_mesh_urls() {
        let api = ApiOptions {
            image_host: "img.example.com".to_string(),
            mesh_host: "mesh.example.com".to_string(),
            origin: "test".to_string(),
        };

        assert_eq!(
            api.image_url("abc123", ImageSize::Size640),
            "https://img.example.com/abc123/thumb-640.jpg?origin=test"
        );
        assert_eq!(api.mesh_url("abc123"), "https://mesh.example.com/v2/mesh/abc123");
    }
}
