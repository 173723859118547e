#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::time::Duration;

use streamzip::{ArchiveId, ByteSource, ByteStream, MemorySource, Result};

/// Deflated archive with the given entries, in order.
pub fn zip_of(files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ::zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        ::zip::write::FileOptions::default().compression_method(::zip::CompressionMethod::Deflated);
    for (name, data) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// In-memory archives that count opens and bytes read, optionally slowing
/// down every open.
#[derive(Default)]
pub struct InstrumentedSource {
    pub inner: MemorySource,
    pub opens: AtomicUsize,
    pub bytes_read: Arc<AtomicU64>,
    pub open_delay: Option<Duration>,
    gated: Mutex<HashMap<ArchiveId, ByteStream>>,
}

impl InstrumentedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    pub fn insert(&self, archive: &str, data: Vec<u8>) {
        self.inner.insert(archive, data);
    }

    /// Serve `archive` from `stream` the first time it is opened.
    pub fn insert_stream(&self, archive: &str, stream: ByteStream) {
        self.gated.lock().insert(ArchiveId::new(archive), stream);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::SeqCst)
    }
}

impl ByteSource for InstrumentedSource {
    fn open(&self, archive: &ArchiveId) -> Result<Option<ByteStream>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.open_delay {
            std::thread::sleep(delay);
        }
        if let Some(stream) = self.gated.lock().remove(archive) {
            return Ok(Some(stream));
        }
        Ok(self.inner.open(archive)?.map(|inner| {
            Box::new(CountingReader {
                inner,
                count: self.bytes_read.clone(),
            }) as ByteStream
        }))
    }
}

struct CountingReader {
    inner: ByteStream,
    count: Arc<AtomicU64>,
}

impl Read for CountingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count.fetch_add(n as u64, Ordering::SeqCst);
        Ok(n)
    }
}

/// Stream that announces its first read and then blocks until released.
pub struct GatedReader {
    inner: Cursor<Vec<u8>>,
    started: Option<Sender<()>>,
    release: Receiver<()>,
}

impl GatedReader {
    pub fn new(data: Vec<u8>, started: Sender<()>, release: Receiver<()>) -> Self {
        Self {
            inner: Cursor::new(data),
            started: Some(started),
            release,
        }
    }
}

impl Read for GatedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(started) = self.started.take() {
            let _ = started.send(());
            self.release
                .recv_timeout(Duration::from_secs(10))
                .map_err(io::Error::other)?;
        }
        self.inner.read(buf)
    }
}
