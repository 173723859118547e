use bytes::{Buf, Bytes};
use reqwest::{Client, Response, StatusCode};
use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{info, warn};

use super::{ByteSource, ByteStream};
use crate::error::{Error, Result};
use crate::id::ArchiveId;

/// HTTP source streaming whole archives with a single GET
///
/// Requests run on the tokio runtime behind `handle`, while the body is
/// exposed as a blocking [`Read`]. Both `open` and reads of the returned
/// stream block the calling thread, so they must not run on an async worker
/// thread; use `spawn_blocking` or a plain thread.
pub struct HttpSource {
    client: Client,
    handle: Handle,
    transferred_bytes: Arc<AtomicU64>,
    max_retry: u32,
}

impl HttpSource {
    pub fn new(handle: Handle) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            handle,
            transferred_bytes: Arc::new(AtomicU64::new(0)),
            max_retry: 10,
        })
    }

    /// Give up on connection errors and timeouts after `max_retry` attempts
    pub fn with_max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry.max(1);
        self
    }

    /// Get total bytes transferred from network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    fn send(&self, url: &str) -> Result<Response> {
        let mut retry_count = 0;

        loop {
            match self.handle.block_on(self.client.get(url).send()) {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_timeout() || e.is_connect() => {
                    retry_count += 1;
                    if retry_count >= self.max_retry {
                        return Err(e.into());
                    }
                    warn!(
                        url,
                        retry = retry_count,
                        max_retry = self.max_retry,
                        error = %e,
                        "connection error, retrying"
                    );
                    std::thread::sleep(Duration::from_millis(500 * retry_count as u64));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl ByteSource for HttpSource {
    fn open(&self, archive: &ArchiveId) -> Result<Option<ByteStream>> {
        let url = archive.as_str();
        let resp = self.send(url)?;
        let status = resp.status();

        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            info!(url, %status, "remote archive unavailable");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        info!(url, content_length = ?resp.content_length(), "streaming remote archive");

        Ok(Some(Box::new(HttpBodyReader {
            response: resp,
            handle: self.handle.clone(),
            chunk: Bytes::new(),
            finished: false,
            transferred_bytes: self.transferred_bytes.clone(),
        })))
    }
}

/// Blocking [`Read`] over a streaming response body.
pub struct HttpBodyReader {
    response: Response,
    handle: Handle,
    chunk: Bytes,
    finished: bool,
    transferred_bytes: Arc<AtomicU64>,
}

impl Read for HttpBodyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.chunk.is_empty() {
            if self.finished {
                return Ok(0);
            }
            match self.handle.block_on(self.response.chunk()) {
                Ok(Some(chunk)) => {
                    self.transferred_bytes
                        .fetch_add(chunk.len() as u64, Ordering::Relaxed);
                    self.chunk = chunk;
                }
                Ok(None) => self.finished = true,
                Err(e) => return Err(io::Error::other(e)),
            }
        }

        let n = buf.len().min(self.chunk.len());
        buf[..n].copy_from_slice(&self.chunk[..n]);
        self.chunk.advance(n);
        Ok(n)
    }
}
