use thiserror::Error;

pub mod http;
pub mod loader;
pub mod texture_store;

#[cfg(test)]
pub mod testing;

/// Transfer progress in bytes. `total` mirrors the advertised payload length
/// and stays 0 until the server sends one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStatus {
    pub loaded: u64,
    pub total: u64,
}

impl std::ops::Add for LoadStatus {
    type Output = LoadStatus;

    fn add(self, rhs: Self) -> Self {
        LoadStatus {
            loaded: self.loaded + rhs.loaded,
            total: self.total + rhs.total,
        }
    }
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request for {url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("Request for {url} timed out")]
    Timeout { url: String },

    #[error("Transport failure for {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("Transport client could not be constructed: {reason}")]
    ClientSetup { reason: String },

    #[error("Image payload for {key} could not be decoded: {source}")]
    Decode {
        key: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Mesh payload for {key} could not be decoded: {source}")]
    Mesh {
        key: String,
        #[source]
        source: streetscope_mesh::ParserError,
    },
}
