//! Test doubles for the transport seam, shared across the crate's tests.

use crate::io::FetchError;
use crate::io::http::{Transport, TransportResponse};
use byteorder::{LittleEndian, WriteBytesExt};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::stream;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Scripted reply for one URL. `release` gates the body: the stream yields
/// nothing until the test notifies it, which is how in-flight overlap is
/// arranged deterministically.
#[derive(Clone, Default)]
pub struct ScriptedResponse {
    pub status: u16,
    pub content_length: Option<u64>,
    pub chunks: Vec<Bytes>,
    pub release: Option<Arc<Notify>>,
}

impl ScriptedResponse {
    pub fn ok(payload: Bytes) -> Self {
        Self {
            status: 200,
            content_length: Some(payload.len() as u64),
            chunks: vec![payload],
            release: None,
        }
    }

    pub fn ok_chunked(payload: Bytes, chunk_count: usize) -> Self {
        let chunk_size = (payload.len() / chunk_count).max(1);
        let chunks = payload
            .chunks(chunk_size)
            .map(Bytes::copy_from_slice)
            .collect();
        Self {
            status: 200,
            content_length: Some(payload.len() as u64),
            chunks,
            release: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            content_length: Some(0),
            chunks: Vec::new(),
            release: None,
        }
    }

    pub fn gated(mut self, release: Arc<Notify>) -> Self {
        self.release = Some(release);
        self
    }
}

/// Transport returning scripted responses and recording every request.
/// Unknown URLs answer 404.
#[derive(Default)]
pub struct FakeTransport {
    scripts: Mutex<HashMap<String, ScriptedResponse>>,
    requests: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn script(&self, url: &str, response: ScriptedResponse) {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|requested| requested.as_str() == url)
            .count()
    }
}

impl Transport for FakeTransport {
    fn get(&self, url: &str) -> BoxFuture<'static, Result<TransportResponse, FetchError>> {
        self.requests.lock().unwrap().push(url.to_string());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| ScriptedResponse::status(404));

        Box::pin(async move {
            let body = stream::unfold(
                (script.chunks, script.release, 0usize),
                |(chunks, release, index)| async move {
                    if index == 0 {
                        if let Some(release) = &release {
                            release.notified().await;
                        }
                    }
                    if index < chunks.len() {
                        let chunk = chunks[index].clone();
                        Some((Ok(chunk), (chunks, release, index + 1)))
                    } else {
                        None
                    }
                },
            );

            Ok(TransportResponse {
                status: script.status,
                content_length: script.content_length,
                body: Box::pin(body),
            })
        })
    }
}

/// Minimal JPEG of the requested dimensions, grey all over.
pub fn jpeg_fixture(width: u32, height: u32) -> Bytes {
    let pixels = image::RgbImage::from_pixel(width, height, image::Rgb([127, 127, 127]));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(pixels)
        .write_to(&mut buf, image::ImageFormat::Jpeg)
        .unwrap();
    Bytes::from(buf.into_inner())
}

/// One-triangle mesh payload in the wire format.
pub fn mesh_fixture() -> Bytes {
    let mut buf = Vec::new();
    buf.write_u32::<LittleEndian>(streetscope_mesh::mesh::types::FOURCC_MESH)
        .unwrap();
    buf.write_u32::<LittleEndian>(streetscope_mesh::mesh::types::MESH_VERSION)
        .unwrap();
    buf.write_u32::<LittleEndian>(3).unwrap();
    buf.write_u32::<LittleEndian>(1).unwrap();
    for value in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
        buf.write_f32::<LittleEndian>(value).unwrap();
    }
    for index in [0u32, 1, 2] {
        buf.write_u32::<LittleEndian>(index).unwrap();
    }
    Bytes::from(buf)
}
