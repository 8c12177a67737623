/// Test utilities and mock media for exercising image writers without disks
use crate::{MemoryMedium, MkfatError, OutputMedium};
use std::io;
use std::sync::{Arc, Mutex};

/// One write observed by a [`RecordingMedium`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedWrite {
    pub offset: u64,
    pub len: usize,
}

/// Medium that keeps the image in memory and records every write call.
#[derive(Debug, Default)]
pub struct RecordingMedium {
    inner: MemoryMedium,
    writes: Arc<Mutex<Vec<RecordedWrite>>>,
}

impl RecordingMedium {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().unwrap().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    pub fn data(&self) -> Vec<u8> {
        self.inner.snapshot()
    }

    /// True when no two recorded writes touch the same byte.
    pub fn writes_are_disjoint(&self) -> bool {
        let mut ranges: Vec<(u64, u64)> = self
            .writes()
            .iter()
            .filter(|w| w.len > 0)
            .map(|w| (w.offset, w.offset + w.len as u64))
            .collect();
        ranges.sort();
        ranges.windows(2).all(|pair| pair[0].1 <= pair[1].0)
    }
}

#[async_trait::async_trait]
impl OutputMedium for RecordingMedium {
    async fn write_at(&self, offset: u64, buf: &[u8]) -> Result<(), MkfatError> {
        self.writes.lock().unwrap().push(RecordedWrite { offset, len: buf.len() });
        self.inner.write_at(offset, buf).await
    }
}

/// Medium that rejects any write touching `fail_offset`.
#[derive(Debug)]
pub struct FailingMedium {
    inner: MemoryMedium,
    fail_offset: u64,
    attempts: Arc<Mutex<usize>>,
}

impl FailingMedium {
    pub fn new(fail_offset: u64) -> Self {
        Self {
            inner: MemoryMedium::new(),
            fail_offset,
            attempts: Arc::new(Mutex::new(0)),
        }
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl OutputMedium for FailingMedium {
    async fn write_at(&self, offset: u64, buf: &[u8]) -> Result<(), MkfatError> {
        *self.attempts.lock().unwrap() += 1;
        let end = offset + buf.len() as u64;
        if offset <= self.fail_offset && self.fail_offset < end {
            return Err(MkfatError::write_failure(
                offset,
                buf.len(),
                io::Error::new(io::ErrorKind::Other, "simulated medium failure"),
            ));
        }
        self.inner.write_at(offset, buf).await
    }
}
