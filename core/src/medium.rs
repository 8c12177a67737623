// Output media: anything that accepts "write N bytes at offset O".
// Writes may arrive out of order and concurrently, but never overlap.

use crate::MkfatError;
use async_trait::async_trait;
use log::trace;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[async_trait]
pub trait OutputMedium: Send + Sync {
    /// Write all of `buf` at `offset`, extending the medium if needed.
    async fn write_at(&self, offset: u64, buf: &[u8]) -> Result<(), MkfatError>;
}

/// Growable in-memory image. Unwritten gaps read back as zeros.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    data: Mutex<Vec<u8>>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl OutputMedium for MemoryMedium {
    async fn write_at(&self, offset: u64, buf: &[u8]) -> Result<(), MkfatError> {
        let start = usize::try_from(offset).map_err(|_| {
            MkfatError::write_failure(
                offset,
                buf.len(),
                io::Error::new(io::ErrorKind::InvalidInput, "offset does not fit in memory"),
            )
        })?;
        let end = start + buf.len();

        let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);
        Ok(())
    }
}

/// A regular file or block device written with positional I/O on the
/// blocking thread pool.
#[derive(Debug, Clone)]
pub struct FileMedium {
    file: Arc<File>,
    path: PathBuf,
}

impl FileMedium {
    /// Create (or truncate) an image file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, MkfatError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self { file: Arc::new(file), path })
    }

    /// Open an existing file or device without truncating it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, MkfatError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        Ok(Self { file: Arc::new(file), path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush file data and metadata to the device.
    pub async fn sync(&self) -> Result<(), MkfatError> {
        let file = Arc::clone(&self.file);
        tokio::task::spawn_blocking(move || file.sync_all())
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))??;
        Ok(())
    }
}

#[async_trait]
impl OutputMedium for FileMedium {
    async fn write_at(&self, offset: u64, buf: &[u8]) -> Result<(), MkfatError> {
        let file = Arc::clone(&self.file);
        let data = buf.to_vec();
        let len = data.len();
        trace!("{}: writing {} bytes at {:#x}", self.path.display(), len, offset);

        tokio::task::spawn_blocking(move || write_all_at(&file, &data, offset))
            .await
            .map_err(|e| {
                MkfatError::write_failure(offset, len, io::Error::new(io::ErrorKind::Other, e))
            })?
            .map_err(|e| MkfatError::write_failure(offset, len, e))
    }
}

#[cfg(unix)]
fn write_all_at(file: &File, buf: &[u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, offset)
}

#[cfg(windows)]
fn write_all_at(file: &File, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_write(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "failed to write whole buffer"))
            }
            Ok(n) => {
                buf = &buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
