//! Streaming unpacker over an async byte source.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::decode::{decode_document, Source};
use crate::error::Error;
use crate::options::UnpackOptions;
use crate::value::Value;

/// Observer invoked with every chunk the streaming unpacker reads.
///
/// After a document completes the observer is called once with an empty
/// chunk. Chunks are advisory (CRC accumulation, tracing, mirroring); the
/// observer never gets to mutate them.
pub trait ChunkObserver: Send {
    fn on_chunk(&mut self, chunk: &[u8]);
}

/// Adapts a closure into a [`ChunkObserver`].
pub fn observer_fn<F: FnMut(&[u8]) + Send>(f: F) -> impl ChunkObserver {
    struct FnObserver<F>(F);

    impl<F: FnMut(&[u8]) + Send> ChunkObserver for FnObserver<F> {
        fn on_chunk(&mut self, chunk: &[u8]) {
            (self.0)(chunk)
        }
    }

    FnObserver(f)
}

/// Decodes a stream of MessagePack documents from an `AsyncRead`.
///
/// The stream is an ordered concatenation of documents with no framing in
/// between. Each [`next`](Self::next) call suspends until the source has
/// delivered one full document and yields the decoded value; memory is
/// bounded by the largest single document. A decode error is surfaced to
/// the caller and the partially decoded document is discarded; the reader
/// itself is left open.
pub struct StreamUnpacker<R> {
    reader: R,
    options: UnpackOptions,
    observer: Option<Box<dyn ChunkObserver>>,
    pos: u64,
    /// Byte read by the end-of-stream probe, consumed by the next
    /// `read_exact`.
    pending: Option<u8>,
}

impl<R: AsyncRead + Unpin + Send> StreamUnpacker<R> {
    pub fn new(reader: R, options: UnpackOptions) -> Self {
        Self {
            reader,
            options,
            observer: None,
            pos: 0,
            pending: None,
        }
    }

    /// Installs an observer for every chunk read from the source.
    pub fn with_observer(mut self, observer: impl ChunkObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Decodes the next document, or returns `None` when the source ends
    /// cleanly on a document boundary.
    ///
    /// Exhaustion mid-document is an error (`InsufficientData`), as is any
    /// failure of the underlying reader.
    pub async fn next(&mut self) -> Option<Result<Value, Error>> {
        debug_assert!(self.pending.is_none(), "probe byte left unconsumed");
        let start = self.pos;

        // Probe one byte so end-of-stream between documents is not an
        // error.
        let mut first = [0u8; 1];
        match self.reader.read(&mut first).await {
            Ok(0) => return None,
            Ok(_) => self.pending = Some(first[0]),
            Err(e) => return Some(Err(Error::Io(e))),
        }

        let options = self.options;
        let result = decode_document(&mut *self, &options).await;
        if result.is_ok() {
            if let Some(observer) = self.observer.as_mut() {
                // End-of-document signal.
                observer.on_chunk(&[]);
            }
            tracing::trace!(bytes = self.pos - start, "document decoded");
        }
        Some(result)
    }

    /// Consumes the unpacker and returns the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: AsyncRead + Unpin + Send> Source for StreamUnpacker<R> {
    async fn read_exact(&mut self, out: &mut [u8]) -> Result<(), Error> {
        if out.is_empty() {
            return Ok(());
        }
        let mut filled = 0;
        if let Some(b) = self.pending.take() {
            out[0] = b;
            filled = 1;
            self.pos += 1;
        }
        while filled < out.len() {
            match self.reader.read(&mut out[filled..]).await {
                Ok(0) => {
                    return Err(Error::InsufficientData {
                        offset: self.pos,
                        needed: out.len() - filled,
                    });
                }
                Ok(n) => {
                    filled += n;
                    self.pos += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }
        if let Some(observer) = self.observer.as_mut() {
            observer.on_chunk(out);
        }
        Ok(())
    }

    fn pos(&self) -> u64 {
        self.pos
    }
}
