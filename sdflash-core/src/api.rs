//! Application-facing flash API
//!
//! Thin layer over [`FlashCache`]: writes are buffered per page, reads see
//! buffered data, and an optional [`WritableRegion`] keeps the stack image
//! and bootloader out of reach.

use crate::cache::FlashCache;
use crate::config::WritableRegion;
use crate::error::FlashError;
use crate::primitives::FlashPrimitives;

/// Internal flash as seen by application and bootloader code
pub struct InternalFlash<P, const PAGE: usize> {
    cache: FlashCache<P, PAGE>,
    region: Option<WritableRegion>,
}

impl<P: FlashPrimitives, const PAGE: usize> InternalFlash<P, PAGE> {
    /// Create a new instance with no write restrictions
    pub fn new(flash: P) -> Self {
        Self {
            cache: FlashCache::new(flash),
            region: None,
        }
    }

    /// Restrict writes and erases to `region`
    pub fn with_region(self, region: WritableRegion) -> Self {
        Self {
            region: Some(region),
            ..self
        }
    }

    /// Get the writable region, if restricted
    pub fn region(&self) -> Option<WritableRegion> {
        self.region
    }

    /// Commit any buffered writes
    pub fn flush(&mut self) -> Result<(), FlashError> {
        self.cache.flush()
    }

    /// Write `data` at `address` through the page cache
    ///
    /// Data reaches flash when the cache moves to another page or on
    /// [`flush`](Self::flush). Returns the number of bytes accepted.
    pub fn write(&mut self, address: u32, data: &[u8]) -> Result<usize, FlashError> {
        self.check_region(address, data.len())?;
        self.cache.write(address, data)
    }

    /// Read `buf.len()` bytes at `address`, including buffered writes
    pub fn read(&mut self, address: u32, buf: &mut [u8]) -> usize {
        self.cache.read(address, buf)
    }

    /// Erase the page at `address` immediately
    ///
    /// Buffered writes to the same page are dropped.
    pub fn erase(&mut self, address: u32) -> Result<(), FlashError> {
        self.check_region(address, PAGE)?;
        if self.cache.discard(address) {
            debug!("erase of {:#x} dropped buffered writes", address);
        }
        self.cache.flash().erase(address)
    }

    /// Get the underlying primitives
    pub fn flash(&mut self) -> &mut P {
        self.cache.flash()
    }

    fn check_region(&self, address: u32, len: usize) -> Result<(), FlashError> {
        match self.region {
            Some(region) if !region.contains(address, len) => {
                warn!("rejected access {:#x}+{} outside writable region", address, len);
                Err(FlashError::Protected)
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlashConfig;
    use crate::flash::SyncFlash;
    use crate::signal::CompletionSignal;
    use sdflash_hal_sim::{SimController, SimDelay, SimMemory};
    use std::sync::Arc;

    const PAGE: usize = 4096;

    fn sync_flash(stack: bool, memory: &SimMemory) -> SyncFlash<'static, SimController, SimDelay, SimMemory> {
        let signal: &'static CompletionSignal = Box::leak(Box::new(CompletionSignal::new()));
        let mut controller = SimController::new(memory.clone(), PAGE as u32);
        if stack {
            controller = controller.with_stack(Arc::new(move |event| {
                signal.notify(event);
            }));
        }
        SyncFlash::new(controller, SimDelay::new(), memory.clone(), signal, FlashConfig::split_write())
    }

    #[test]
    fn test_write_flush_read_through_stack() {
        let memory = SimMemory::new(8 * PAGE);
        let driver = sync_flash(true, &memory);
        let mut flash: InternalFlash<_, PAGE> = InternalFlash::new(&driver);

        assert_eq!(flash.write(0x1010, b"hello flash"), Ok(11));
        // Still buffered
        assert_eq!(memory.contents(0x1010, 11), vec![0xFF; 11]);

        let mut buf = [0u8; 11];
        assert_eq!(flash.read(0x1010, &mut buf), 11);
        assert_eq!(&buf, b"hello flash");

        flash.flush().unwrap();
        assert_eq!(memory.contents(0x1010, 11), b"hello flash".to_vec());
    }

    #[test]
    fn test_region_guard() {
        let memory = SimMemory::new(8 * PAGE);
        let driver = sync_flash(false, &memory);
        let mut flash: InternalFlash<_, PAGE> =
            InternalFlash::new(&driver).with_region(WritableRegion::new(0x2000, 0x6000));

        assert_eq!(flash.write(0x1FFC, &[0; 8]), Err(FlashError::Protected));
        assert_eq!(flash.erase(0x6000), Err(FlashError::Protected));
        assert_eq!(flash.write(0x2000, &[0; 8]), Ok(8));
        assert_eq!(flash.erase(0x5000), Ok(()));
    }

    #[test]
    fn test_erase_drops_buffered_page() {
        let memory = SimMemory::new(4 * PAGE);
        memory.fill(0x1000, &[0x00; 4]);
        let driver = sync_flash(true, &memory);
        let mut flash: InternalFlash<_, PAGE> = InternalFlash::new(&driver);

        flash.write(0x1004, &[0x12, 0x34]).unwrap();
        flash.erase(0x1000).unwrap();
        flash.flush().unwrap();

        assert_eq!(memory.contents(0x1000, 8), vec![0xFF; 8]);
    }

    #[test]
    fn test_flush_without_writes_is_noop() {
        let memory = SimMemory::new(PAGE);
        let driver = sync_flash(false, &memory);
        let mut flash: InternalFlash<_, PAGE> = InternalFlash::new(&driver);

        assert_eq!(flash.flush(), Ok(()));
    }
}
