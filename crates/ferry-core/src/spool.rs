//! Hybrid memory/disk buffer between download and upload.
//!
//! Small payloads stay in memory. Once the written size would exceed the
//! threshold, the buffer spills to an anonymous temporary file, which the OS
//! reclaims when the buffer is dropped.

use std::io::{self, Cursor, SeekFrom};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt, AsyncWriteExt, ReadBuf};

enum Storage {
    Memory(Cursor<Vec<u8>>),
    Disk(File),
}

/// Write-then-read buffer used to stage one object.
///
/// Usage is append with [`write_chunk`](Self::write_chunk), then
/// [`rewind`](Self::rewind), then read it as an upload body.
pub struct SpooledBuffer {
    storage: Storage,
    threshold: usize,
    len: u64,
}

impl SpooledBuffer {
    pub fn new(threshold: usize) -> Self {
        Self {
            storage: Storage::Memory(Cursor::new(Vec::new())),
            threshold,
            len: 0,
        }
    }

    /// Append a chunk, spilling to disk first if it would cross the threshold.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        let spill = match &self.storage {
            Storage::Memory(cursor) => cursor.get_ref().len() + chunk.len() > self.threshold,
            Storage::Disk(_) => false,
        };
        if spill {
            self.spill().await?;
        }

        match &mut self.storage {
            Storage::Memory(cursor) => cursor.get_mut().extend_from_slice(chunk),
            Storage::Disk(file) => file.write_all(chunk).await?,
        }
        self.len += chunk.len() as u64;
        Ok(())
    }

    /// Position the buffer at its start for reading.
    pub async fn rewind(&mut self) -> io::Result<()> {
        match &mut self.storage {
            Storage::Memory(cursor) => cursor.set_position(0),
            Storage::Disk(file) => {
                file.flush().await?;
                file.seek(SeekFrom::Start(0)).await?;
            }
        }
        Ok(())
    }

    /// Total bytes written.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the content now lives in a temporary file.
    pub fn is_spilled(&self) -> bool {
        matches!(self.storage, Storage::Disk(_))
    }

    async fn spill(&mut self) -> io::Result<()> {
        let mut file = File::from_std(tempfile::tempfile()?);
        if let Storage::Memory(cursor) = &self.storage {
            file.write_all(cursor.get_ref()).await?;
        }
        tracing::debug!(bytes = self.len, threshold = self.threshold, "spool spilled to disk");
        self.storage = Storage::Disk(file);
        Ok(())
    }
}

impl std::fmt::Debug for SpooledBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpooledBuffer")
            .field("len", &self.len)
            .field("threshold", &self.threshold)
            .field("spilled", &self.is_spilled())
            .finish()
    }
}

impl AsyncRead for SpooledBuffer {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut self.get_mut().storage {
            Storage::Memory(cursor) => Pin::new(cursor).poll_read(cx, buf),
            Storage::Disk(file) => Pin::new(file).poll_read(cx, buf),
        }
    }
}

impl AsyncSeek for SpooledBuffer {
    fn start_seek(self: Pin<&mut Self>, position: SeekFrom) -> io::Result<()> {
        match &mut self.get_mut().storage {
            Storage::Memory(cursor) => Pin::new(cursor).start_seek(position),
            Storage::Disk(file) => Pin::new(file).start_seek(position),
        }
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        match &mut self.get_mut().storage {
            Storage::Memory(cursor) => Pin::new(cursor).poll_complete(cx),
            Storage::Disk(file) => Pin::new(file).poll_complete(cx),
        }
    }
}
