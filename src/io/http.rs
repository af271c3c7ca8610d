use crate::io::FetchError;
use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use std::time::Duration;

/// Hard cap on any single transfer, connect and body included.
pub const TRANSFER_TIMEOUT: Duration = Duration::from_secs(15);

pub struct TransportResponse {
    pub status: u16,
    pub content_length: Option<u64>,
    pub body: BoxStream<'static, Result<Bytes, FetchError>>,
}

/// Seam between the loaders and the wire. Implementations must deliver the
/// body as it arrives so progress can be reported per chunk.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str) -> BoxFuture<'static, Result<TransportResponse, FetchError>>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(TRANSFER_TIMEOUT)
            .build()
            .map_err(|err| FetchError::ClientSetup { reason: err.to_string() })?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> BoxFuture<'static, Result<TransportResponse, FetchError>> {
        let client = self.client.clone();
        let url = url.to_string();
        Box::pin(async move {
            let response = client
                .get(&url)
                .send()
                .await
                .map_err(|err| classify(&url, err))?;

            let status = response.status().as_u16();
            let content_length = response.content_length();
            let body_url = url.clone();
            let body = response
                .bytes_stream()
                .map_err(move |err| classify(&body_url, err))
                .boxed();

            Ok(TransportResponse {
                status,
                content_length,
                body,
            })
        })
    }
}

fn classify(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout { url: url.to_string() }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}
