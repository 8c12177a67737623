// Content sources: where file bytes come from. The layout engine only needs
// the length up front and a way to stream the bytes to a medium later.

use crate::{MkfatError, OutputMedium};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Mutex;

/// Chunk size used when streaming file and reader sources.
pub const COPY_CHUNK_SIZE: usize = 64 * 1024;

#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Byte length; must be known before geometry is computed.
    async fn len(&self) -> Result<u64, MkfatError>;

    /// Copy exactly `expected` bytes to `medium`, starting at `offset`.
    ///
    /// Chunks are written in order at cumulative offsets. A source that
    /// yields fewer or more bytes than `expected` fails with
    /// [`MkfatError::SourceLengthMismatch`].
    async fn copy_to(
        &self,
        medium: &dyn OutputMedium,
        offset: u64,
        expected: u64,
    ) -> Result<(), MkfatError>;
}

async fn copy_bytes(
    bytes: &[u8],
    medium: &dyn OutputMedium,
    offset: u64,
    expected: u64,
) -> Result<(), MkfatError> {
    let actual = bytes.len() as u64;
    if actual != expected {
        return Err(MkfatError::SourceLengthMismatch { expected, actual });
    }
    if bytes.is_empty() {
        return Ok(());
    }
    medium.write_at(offset, bytes).await
}

async fn stream_into<R>(
    mut reader: R,
    medium: &dyn OutputMedium,
    offset: u64,
    expected: u64,
) -> Result<(), MkfatError>
where
    R: AsyncRead + Unpin + Send,
{
    let mut buf = vec![0u8; COPY_CHUNK_SIZE];
    let mut copied = 0u64;

    while copied < expected {
        let want = (expected - copied).min(buf.len() as u64) as usize;
        let n = reader.read(&mut buf[..want]).await?;
        if n == 0 {
            return Err(MkfatError::SourceLengthMismatch { expected, actual: copied });
        }
        medium.write_at(offset + copied, &buf[..n]).await?;
        copied += n as u64;
    }

    // Trailing bytes would spill into the next cluster chain.
    let mut probe = [0u8; 1];
    if reader.read(&mut probe).await? != 0 {
        return Err(MkfatError::SourceLengthMismatch { expected, actual: copied + 1 });
    }
    Ok(())
}

#[async_trait]
impl ContentSource for Vec<u8> {
    async fn len(&self) -> Result<u64, MkfatError> {
        Ok(self.as_slice().len() as u64)
    }

    async fn copy_to(
        &self,
        medium: &dyn OutputMedium,
        offset: u64,
        expected: u64,
    ) -> Result<(), MkfatError> {
        copy_bytes(self, medium, offset, expected).await
    }
}

#[async_trait]
impl ContentSource for &'static [u8] {
    async fn len(&self) -> Result<u64, MkfatError> {
        Ok(<[u8]>::len(self) as u64)
    }

    async fn copy_to(
        &self,
        medium: &dyn OutputMedium,
        offset: u64,
        expected: u64,
    ) -> Result<(), MkfatError> {
        copy_bytes(self, medium, offset, expected).await
    }
}

#[async_trait]
impl ContentSource for String {
    async fn len(&self) -> Result<u64, MkfatError> {
        Ok(self.as_bytes().len() as u64)
    }

    async fn copy_to(
        &self,
        medium: &dyn OutputMedium,
        offset: u64,
        expected: u64,
    ) -> Result<(), MkfatError> {
        copy_bytes(self.as_bytes(), medium, offset, expected).await
    }
}

/// A file on the host filesystem, opened lazily when copied.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ContentSource for FileSource {
    async fn len(&self) -> Result<u64, MkfatError> {
        Ok(tokio::fs::metadata(&self.path).await?.len())
    }

    async fn copy_to(
        &self,
        medium: &dyn OutputMedium,
        offset: u64,
        expected: u64,
    ) -> Result<(), MkfatError> {
        let file = tokio::fs::File::open(&self.path).await?;
        stream_into(file, medium, offset, expected).await
    }
}

/// A one-shot stream with a length declared by the caller.
pub struct ReaderSource<R> {
    reader: Mutex<Option<R>>,
    len: u64,
}

impl<R> ReaderSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(reader: R, len: u64) -> Self {
        Self { reader: Mutex::new(Some(reader)), len }
    }
}

#[async_trait]
impl<R> ContentSource for ReaderSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn len(&self) -> Result<u64, MkfatError> {
        Ok(self.len)
    }

    async fn copy_to(
        &self,
        medium: &dyn OutputMedium,
        offset: u64,
        expected: u64,
    ) -> Result<(), MkfatError> {
        let reader = self.reader.lock().await.take().ok_or_else(|| {
            MkfatError::SourceConsumed(format!("stream of {} bytes", self.len))
        })?;
        stream_into(reader, medium, offset, expected).await
    }
}
