//! Wire side of the change feed: frame format and the streaming transport.

use crate::backend::{BackendClient, BackendError};
use crate::model::{Bookmark, BookmarkId, OwnerId};
use futures::stream::{self, BoxStream, StreamExt};
use serde::Deserialize;
use std::collections::VecDeque;
use std::future::Future;
use thiserror::Error;

/// Longest accepted frame line.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024; // 1MB

const STREAM_PATH: &str = "/realtime/v1/stream";

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Feed connection failed: {0}")]
    Connect(#[from] BackendError),
    #[error("Feed stream error: {0}")]
    Stream(reqwest::Error),
    #[error("Feed frame exceeds {0} bytes")]
    FrameTooLarge(usize),
}

/// Key of a deleted row. The owner is present when the backend replicates
/// full old rows.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeletedRecord {
    pub id: BookmarkId,
    #[serde(rename = "user_id", default)]
    pub owner_id: Option<OwnerId>,
}

/// One newline-delimited JSON frame of the change stream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum FeedFrame {
    Insert { record: Bookmark },
    Update { record: Bookmark },
    Delete { old_record: DeletedRecord },
    Heartbeat,
}

pub type FrameStream = BoxStream<'static, Result<FeedFrame, FeedError>>;

/// Opens owner-scoped change streams.
///
/// A stream that ends or yields an error is treated as a dropped connection;
/// the caller decides when to open a new one.
pub trait FeedTransport: Send + Sync + 'static {
    fn open(&self, owner: &OwnerId) -> impl Future<Output = Result<FrameStream, FeedError>> + Send;
}

/// Change stream served over a long-lived HTTP response.
#[derive(Debug, Clone)]
pub struct HttpFeedTransport {
    backend: BackendClient,
}

impl HttpFeedTransport {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }
}

impl FeedTransport for HttpFeedTransport {
    async fn open(&self, owner: &OwnerId) -> Result<FrameStream, FeedError> {
        let url = self.backend.endpoint(STREAM_PATH)?;
        let filter = format!("user_id=eq.{}", owner);
        let request = self
            .backend
            .get(url)
            .header("Accept", "application/x-ndjson")
            .query(&[("table", "bookmarks"), ("filter", filter.as_str())]);

        let response = self.backend.send(request).await?;
        tracing::debug!(owner = %owner, "Change stream opened");

        let bytes = response.bytes_stream().boxed();
        let state = (bytes, LineDecoder::new(MAX_FRAME_SIZE), VecDeque::new());

        let frames = stream::unfold(Some(state), |state| async move {
            let (mut bytes, mut decoder, mut ready) = state?;
            loop {
                if let Some(frame) = ready.pop_front() {
                    return Some((Ok(frame), Some((bytes, decoder, ready))));
                }
                match bytes.next().await {
                    Some(Ok(chunk)) => match decoder.push(&chunk) {
                        Ok(lines) => ready.extend(lines.iter().filter_map(|l| parse_frame(l))),
                        Err(e) => return Some((Err(e), None)),
                    },
                    Some(Err(e)) => return Some((Err(FeedError::Stream(e)), None)),
                    None => return None,
                }
            }
        });

        Ok(frames.boxed())
    }
}

/// Decode one line. Malformed frames are logged and skipped.
pub fn parse_frame(line: &str) -> Option<FeedFrame> {
    match serde_json::from_str::<FeedFrame>(line) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::warn!(error = %e, len = line.len(), "Skipping malformed feed frame");
            None
        }
    }
}

/// Splits a byte stream into lines, bounding the unterminated remainder.
#[derive(Debug)]
pub(crate) struct LineDecoder {
    buf: Vec<u8>,
    limit: usize,
}

impl LineDecoder {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            limit,
        }
    }

    /// Append a chunk and return every complete, non-blank line.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, FeedError> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            if line.len() > self.limit {
                return Err(FeedError::FrameTooLarge(self.limit));
            }
            let text = String::from_utf8_lossy(&line);
            let text = text.trim();
            if !text.is_empty() {
                lines.push(text.to_string());
            }
        }

        if self.buf.len() > self.limit {
            return Err(FeedError::FrameTooLarge(self.limit));
        }
        Ok(lines)
    }
}
