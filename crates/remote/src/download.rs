//! Resumable product downloads over an in-process pipe.

use crate::client::RemoteArchive;
use crate::error::RemoteError;
use bytes::Bytes;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::io::StreamReader;
use uuid::Uuid;

/// Pipe depth in chunks; bounds memory when the reader is slower than the
/// network.
const PIPE_DEPTH: usize = 16;

/// Ranged, resumable fetch of one product, exposed to the consumer as an
/// `AsyncRead`.
///
/// On a transient failure the task resumes from `skip` plus the bytes
/// already transferred, for up to `max_attempts` attempts. A short (or
/// overlong) transfer, or exhausted attempts, pushes an I/O error through
/// the pipe so a blocked reader fails immediately instead of hanging on a
/// silent EOF.
pub struct ProductDownloadTask {
    archive: Arc<dyn RemoteArchive>,
    uuid: Uuid,
    /// Offset of the first wanted byte.
    skip: u64,
    /// Total product length per the catalog.
    expected_len: u64,
    max_attempts: u32,
}

impl ProductDownloadTask {
    pub fn new(
        archive: Arc<dyn RemoteArchive>,
        uuid: Uuid,
        skip: u64,
        expected_len: u64,
        max_attempts: u32,
    ) -> Self {
        Self {
            archive,
            uuid,
            skip,
            expected_len,
            max_attempts,
        }
    }

    /// Spawn the fetch and hand back the read half of the pipe.
    pub fn start(self) -> impl tokio::io::AsyncRead + Send + Unpin {
        let (tx, mut rx) = mpsc::channel::<std::io::Result<Bytes>>(PIPE_DEPTH);
        tokio::spawn(self.run(tx));

        let stream = async_stream::stream! {
            while let Some(item) = rx.recv().await {
                yield item;
            }
        };
        StreamReader::new(Box::pin(stream))
    }

    async fn run(self, tx: mpsc::Sender<std::io::Result<Bytes>>) {
        let expected = self.expected_len.saturating_sub(self.skip);
        let mut transferred = 0u64;
        let mut attempts = 0u32;
        let mut etag: Option<String> = None;

        while transferred < expected {
            if attempts >= self.max_attempts {
                let _ = tx
                    .send(Err(std::io::Error::other(RemoteError::IncompleteDownload {
                        expected,
                        received: transferred,
                    })))
                    .await;
                return;
            }
            attempts += 1;

            let offset = self.skip + transferred;
            let response = match self.archive.fetch(self.uuid, offset, etag.as_deref()).await {
                Ok(response) => response,
                Err(err) => {
                    tracing::warn!(
                        product = %self.uuid,
                        attempt = attempts,
                        offset,
                        error = %err,
                        "download attempt failed, will resume"
                    );
                    continue;
                }
            };
            if response.etag.is_some() {
                etag = response.etag.clone();
            }

            let mut stream = response.stream;
            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(chunk) => {
                        transferred += chunk.len() as u64;
                        if transferred > expected {
                            let _ = tx
                                .send(Err(std::io::Error::other(
                                    RemoteError::IncompleteDownload {
                                        expected,
                                        received: transferred,
                                    },
                                )))
                                .await;
                            return;
                        }
                        if tx.send(Ok(chunk)).await.is_err() {
                            // Reader hung up; nothing left to do.
                            return;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(
                            product = %self.uuid,
                            attempt = attempts,
                            transferred,
                            error = %err,
                            "download stream interrupted, will resume"
                        );
                        break;
                    }
                }
            }
        }
        // Dropping tx closes the pipe; the reader observes clean EOF only
        // after the full expected range arrived.
    }
}
