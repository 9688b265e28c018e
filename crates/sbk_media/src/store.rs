//! Allocation of payload buffers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Specialised memory (e.g. audio DSP RAM) that some platforms require for
/// device-memory media.
pub trait DeviceMemoryPool: Send + Sync {
    /// Allocate `len` bytes, or `None` when the pool is exhausted.
    fn allocate(&self, len: usize) -> Option<Box<[u8]>>;

    fn free(&self, bytes: Box<[u8]>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferOrigin {
    Host,
    Device,
}

/// An owned payload buffer. Must be returned to the [`PayloadStore`] that
/// allocated it.
#[derive(Debug)]
pub struct PayloadBuffer {
    bytes: Box<[u8]>,
    origin: BufferOrigin,
}

impl PayloadBuffer {
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn origin(&self) -> BufferOrigin {
        self.origin
    }
}

/// Owns allocation and deallocation of payload buffers and tracks how many
/// are outstanding.
#[derive(Default)]
pub struct PayloadStore {
    device_pool: Option<Arc<dyn DeviceMemoryPool>>,
    outstanding: AtomicUsize,
    outstanding_bytes: AtomicUsize,
}

impl PayloadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device_pool(pool: Arc<dyn DeviceMemoryPool>) -> Self {
        Self {
            device_pool: Some(pool),
            ..Default::default()
        }
    }

    /// Allocate a zeroed buffer of `len` bytes.
    ///
    /// Device memory is used when requested and available; otherwise the
    /// buffer falls back to host memory.
    pub fn allocate(&self, len: usize, use_device_memory: bool) -> PayloadBuffer {
        let device = if use_device_memory {
            self.device_pool.as_ref().and_then(|pool| pool.allocate(len))
        } else {
            None
        };

        let buffer = match device {
            Some(bytes) => PayloadBuffer {
                bytes,
                origin: BufferOrigin::Device,
            },
            None => {
                if use_device_memory {
                    tracing::debug!(
                        "Device memory unavailable for {} bytes, using host memory",
                        len
                    );
                }
                PayloadBuffer {
                    bytes: vec![0u8; len].into_boxed_slice(),
                    origin: BufferOrigin::Host,
                }
            }
        };

        self.outstanding.fetch_add(1, Ordering::AcqRel);
        self.outstanding_bytes.fetch_add(buffer.len(), Ordering::AcqRel);
        buffer
    }

    pub fn free(&self, buffer: PayloadBuffer) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
        self.outstanding_bytes.fetch_sub(buffer.len(), Ordering::AcqRel);

        match (buffer.origin, &self.device_pool) {
            (BufferOrigin::Device, Some(pool)) => pool.free(buffer.bytes),
            _ => drop(buffer.bytes),
        }
    }

    /// Number of buffers allocated and not yet freed.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    pub fn outstanding_bytes(&self) -> usize {
        self.outstanding_bytes.load(Ordering::Acquire)
    }
}
