//! Byte sources consumed by the raster-oxide decoders.
//!
//! Decoders pull bytes through the [`Stream`] trait, which extends plain
//! reading with non-destructive lookahead ([`peek`][Stream::peek], used by
//! format sniffing) and an idempotent [`close`][Stream::close]. Partially
//! decoded animations keep their source open across calls, possibly moving
//! between threads in the meantime; [`SharedStream`] is the cloneable handle
//! that makes this work while a codec owns the reading end.
use std::io::prelude::*;
use std::sync::{Arc, Mutex};

/// A readable byte source with lookahead.
///
/// `read` may return fewer bytes than requested only at end of data. `peek`
/// must leave the read position untouched. `mark`/`reset` are an optional
/// bounded-rewind pair; sources that cannot rewind report
/// [`std::io::ErrorKind::Unsupported`] from `reset`.
pub trait Stream: Send {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Fills `buf` with upcoming bytes without consuming them.
    fn peek(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Remembers the current position; `limit` is the maximum number of bytes
    /// that may be read before `reset` is called.
    fn mark(&mut self, _limit: usize) {}

    /// Rewinds to the last marked position.
    fn reset(&mut self) -> std::io::Result<()> {
        tracing::error!("stream does not support rewinding");
        Err(std::io::ErrorKind::Unsupported.into())
    }

    /// Releases the underlying resource. Safe to call more than once.
    fn close(&mut self);

    /// Reads until `buf` is full or the source is exhausted.
    fn read_full(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut filled = 0usize;
        while filled < buf.len() {
            let count = self.read(&mut buf[filled..])?;
            if count == 0 {
                break;
            }
            filled += count;
        }
        Ok(filled)
    }
}

/// Drains a stream into memory.
pub fn read_all(stream: &mut dyn Stream) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let count = stream.read(&mut buf)?;
        if count == 0 {
            break;
        }
        out.extend_from_slice(&buf[..count]);
    }
    Ok(out)
}

/// In-memory byte source. Supports the full `mark`/`reset` contract.
pub struct MemoryStream {
    data: Vec<u8>,
    pos: usize,
    mark: usize,
    closed: bool,
}

impl MemoryStream {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            pos: 0,
            mark: 0,
            closed: false,
        }
    }
}

impl Stream for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.closed {
            return Ok(0);
        }
        let available = &self.data[self.pos..];
        let count = available.len().min(buf.len());
        buf[..count].copy_from_slice(&available[..count]);
        self.pos += count;
        Ok(count)
    }

    fn peek(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.closed {
            return Ok(0);
        }
        let available = &self.data[self.pos..];
        let count = available.len().min(buf.len());
        buf[..count].copy_from_slice(&available[..count]);
        Ok(count)
    }

    fn mark(&mut self, _limit: usize) {
        self.mark = self.pos;
    }

    fn reset(&mut self) -> std::io::Result<()> {
        self.pos = self.mark;
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
        self.data = Vec::new();
        self.pos = 0;
    }
}

impl From<Vec<u8>> for MemoryStream {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&[u8]> for MemoryStream {
    fn from(data: &[u8]) -> Self {
        Self::new(data.to_vec())
    }
}

/// Adapts any [`std::io::Read`] into a [`Stream`].
///
/// Lookahead is served from an internal pushback buffer; `mark`/`reset` are
/// unsupported.
pub struct ReaderStream<R> {
    inner: Option<R>,
    pushback: Vec<u8>,
}

impl<R: Read + Send> ReaderStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: Some(reader),
            pushback: Vec::new(),
        }
    }
}

impl<R: Read + Send> Stream for ReaderStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if !self.pushback.is_empty() {
            let count = self.pushback.len().min(buf.len());
            buf[..count].copy_from_slice(&self.pushback[..count]);
            self.pushback.drain(..count);
            return Ok(count);
        }
        match &mut self.inner {
            Some(reader) => reader.read(buf),
            None => Ok(0),
        }
    }

    fn peek(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        while self.pushback.len() < buf.len() {
            let Some(reader) = &mut self.inner else {
                break;
            };
            let mut chunk = [0u8; 256];
            let want = (buf.len() - self.pushback.len()).min(chunk.len());
            let count = reader.read(&mut chunk[..want])?;
            if count == 0 {
                break;
            }
            self.pushback.extend_from_slice(&chunk[..count]);
        }
        let count = self.pushback.len().min(buf.len());
        buf[..count].copy_from_slice(&self.pushback[..count]);
        Ok(count)
    }

    fn close(&mut self) {
        self.inner = None;
        self.pushback = Vec::new();
    }
}

/// Cloneable handle to a stream.
///
/// A format adapter hands one clone to the codec-side reader and keeps
/// another so the stream can still be identified and closed after the codec
/// has taken ownership of the reading end. The mutex is never contended under
/// the single-caller model; it exists so the handle may move between threads
/// between calls.
#[derive(Clone)]
pub struct SharedStream {
    inner: Arc<Mutex<Option<Box<dyn Stream>>>>,
}

impl SharedStream {
    pub fn new(stream: impl Stream + 'static) -> Self {
        Self::from_boxed(Box::new(stream))
    }

    pub fn from_boxed(stream: Box<dyn Stream>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(stream))),
        }
    }

    /// Closes and drops the underlying stream. Subsequent reads see end of
    /// data; closing again is a no-op.
    pub fn close(&self) {
        let mut guard = self.inner.lock().unwrap();
        if let Some(stream) = guard.as_mut() {
            stream.close();
        }
        *guard = None;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().is_none()
    }

    /// Whether two handles refer to the same underlying stream.
    pub fn same_source(&self, other: &SharedStream) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Stream for SharedStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.inner.lock().unwrap().as_mut() {
            Some(stream) => stream.read(buf),
            None => Ok(0),
        }
    }

    fn peek(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.inner.lock().unwrap().as_mut() {
            Some(stream) => stream.peek(buf),
            None => Ok(0),
        }
    }

    fn mark(&mut self, limit: usize) {
        if let Some(stream) = self.inner.lock().unwrap().as_mut() {
            stream.mark(limit);
        }
    }

    fn reset(&mut self) -> std::io::Result<()> {
        match self.inner.lock().unwrap().as_mut() {
            Some(stream) => stream.reset(),
            None => Err(std::io::ErrorKind::Unsupported.into()),
        }
    }

    fn close(&mut self) {
        let mut guard = self.inner.lock().unwrap();
        if let Some(stream) = guard.as_mut() {
            stream.close();
        }
        *guard = None;
    }
}

/// [`std::io::Read`] view of a [`SharedStream`], for codec crates that
/// consume plain readers.
pub struct StreamReader {
    stream: SharedStream,
}

impl StreamReader {
    pub fn new(stream: SharedStream) -> Self {
        Self { stream }
    }
}

impl Read for StreamReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Stream::read(&mut self.stream, buf)
    }
}
