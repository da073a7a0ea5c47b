//! Simulated flash array

use std::sync::{Arc, Mutex, MutexGuard};

use sdflash_hal::{MappedFlash, ERASED_BYTE};

/// Shared in-memory flash array
///
/// Clones share the same storage, so the controller side and the
/// memory-mapped side see each other's changes.
#[derive(Debug, Clone)]
pub struct SimMemory {
    storage: Arc<Mutex<Vec<u8>>>,
}

impl SimMemory {
    /// Create a fully erased flash array of `size` bytes at address 0
    pub fn new(size: usize) -> Self {
        Self {
            storage: Arc::new(Mutex::new(vec![ERASED_BYTE; size])),
        }
    }

    /// Size of the array in bytes
    pub fn size(&self) -> usize {
        self.lock().len()
    }

    /// Get a copy of flash contents (for test verification)
    pub fn contents(&self, address: u32, len: usize) -> Vec<u8> {
        let start = address as usize;
        self.lock()[start..start + len].to_vec()
    }

    /// Overwrite bytes directly, bypassing NOR rules (for test setup)
    pub fn fill(&self, address: u32, data: &[u8]) {
        let start = address as usize;
        self.lock()[start..start + data.len()].copy_from_slice(data);
    }

    /// Check if `len` bytes at `address` are inside the array
    pub fn in_range(&self, address: u32, len: usize) -> bool {
        (address as usize)
            .checked_add(len)
            .is_some_and(|end| end <= self.size())
    }

    /// Set every byte of the range to the erased value
    pub(crate) fn erase(&self, address: u32, len: usize) {
        let start = address as usize;
        self.lock()[start..start + len].fill(ERASED_BYTE);
    }

    /// Program bytes: bits can only go from 1 to 0
    pub(crate) fn program(&self, address: u32, data: &[u8]) {
        let start = address as usize;
        let mut storage = self.lock();
        for (cell, byte) in storage[start..start + data.len()].iter_mut().zip(data) {
            *cell &= *byte;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        // A panicking test thread must not hide the array from the others
        self.storage.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MappedFlash for SimMemory {
    fn read(&self, address: u32, buf: &mut [u8]) {
        let start = address as usize;
        buf.copy_from_slice(&self.lock()[start..start + buf.len()]);
    }
}
