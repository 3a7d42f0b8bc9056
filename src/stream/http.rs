use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use reqwest::{Client, Response, StatusCode};

use crate::error::DownloadError;
use crate::utils::retry::retry_with_backoff;
use crate::yt_dlp_interface::formats::FormatDescriptor;

const SEND_ATTEMPTS: u32 = 3;

/// A piece of a media stream plus the stream's total size (0 while unknown).
#[derive(Debug, Clone, PartialEq)]
pub struct StreamChunk {
    pub bytes: Bytes,
    pub total: u64,
}

pub type MediaStream = BoxStream<'static, Result<StreamChunk, DownloadError>>;

/// Fetches format URLs in `Range` windows of `chunk_size` bytes; the media
/// hosts throttle single long responses.
#[derive(Clone)]
pub struct StreamDownloader {
    client: Client,
    chunk_size: u64,
}

impl StreamDownloader {
    pub fn new(chunk_size: u64, read_timeout: Option<Duration>) -> Result<Self, DownloadError> {
        let mut builder = Client::builder().connect_timeout(Duration::from_secs(30));
        if let Some(timeout) = read_timeout {
            builder = builder.read_timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| DownloadError::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, chunk_size))
    }

    pub fn with_client(client: Client, chunk_size: u64) -> Self {
        Self {
            client,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn open(&self, format: &FormatDescriptor) -> MediaStream {
        log::debug!("Opening format {} ({}) at {}", format.id, format.container, format.url);
        let state = RangedBody {
            client: self.client.clone(),
            url: format.url.clone(),
            headers: header_map(format),
            chunk_size: self.chunk_size,
            offset: 0,
            total: 0,
            response: None,
            last_range: false,
            received_in_range: 0,
        };
        stream::try_unfold(state, RangedBody::next_chunk).boxed()
    }
}

fn header_map(format: &FormatDescriptor) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in &format.http_headers {
        match (HeaderName::try_from(name.as_str()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => log::warn!("Skipping unusable header {:?} for format {}", name, format.id),
        }
    }
    headers
}

/// `bytes 0-1023/5000` → 5000. `*` totals are unknown.
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.trim().rsplit_once('/')?;
    total.trim().parse().ok()
}

struct RangedBody {
    client: Client,
    url: String,
    headers: HeaderMap,
    chunk_size: u64,
    offset: u64,
    total: u64,
    response: Option<Response>,
    /// The current response runs to the end of the resource.
    last_range: bool,
    received_in_range: u64,
}

impl RangedBody {
    async fn next_chunk(mut self) -> Result<Option<(StreamChunk, Self)>, DownloadError> {
        loop {
            if let Some(response) = self.response.as_mut() {
                let chunk = response
                    .chunk()
                    .await
                    .map_err(|e| DownloadError::Stream(format!("read failed at byte {}: {}", self.offset, e)))?;
                match chunk {
                    Some(bytes) if bytes.is_empty() => continue,
                    Some(bytes) => {
                        self.offset += bytes.len() as u64;
                        self.received_in_range += bytes.len() as u64;
                        let chunk = StreamChunk { bytes, total: self.total };
                        return Ok(Some((chunk, self)));
                    }
                    None => {
                        self.response = None;
                        let short_range = self.received_in_range < self.chunk_size;
                        if self.last_range || self.received_in_range == 0 || (self.total == 0 && short_range) {
                            return Ok(None);
                        }
                    }
                }
            }

            if self.total > 0 && self.offset >= self.total {
                return Ok(None);
            }
            if !self.request_next_range().await? {
                return Ok(None);
            }
        }
    }

    /// Returns false when the server says there is nothing left.
    async fn request_next_range(&mut self) -> Result<bool, DownloadError> {
        let range = format!("bytes={}-{}", self.offset, self.offset + self.chunk_size - 1);
        let response = retry_with_backoff(SEND_ATTEMPTS, || {
            self.client
                .get(&self.url)
                .headers(self.headers.clone())
                .header(RANGE, range.as_str())
                .send()
        })
        .await
        .map_err(|e| DownloadError::Stream(format!("request for {} failed: {}", range, e)))?;

        match response.status() {
            StatusCode::PARTIAL_CONTENT => {
                if let Some(total) = header_str(&response, CONTENT_RANGE).and_then(parse_content_range_total) {
                    self.total = total;
                }
            }
            StatusCode::OK if self.offset == 0 => {
                log::debug!("Server ignored the range request, streaming the whole body");
                self.total = header_str(&response, CONTENT_LENGTH)
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(0);
                self.last_range = true;
            }
            StatusCode::RANGE_NOT_SATISFIABLE => return Ok(false),
            status => {
                return Err(DownloadError::Stream(format!(
                    "unexpected HTTP status {} for {}",
                    status, range
                )))
            }
        }

        self.received_in_range = 0;
        self.response = Some(response);
        Ok(true)
    }
}

fn header_str(response: &Response, name: HeaderName) -> Option<&str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}
