//! Write-combining page cache
//!
//! Collects writes to one flash page in RAM and commits the page with a
//! single erase + program when a write moves to another page or the cache
//! is flushed. A page whose flash content already matches the buffer is not
//! touched at all.
//!
//! ```text
//! write(0x1010, ..) ──► load page 0x1000 ──► patch buffer
//! write(0x1020, ..) ──────────────────────► patch buffer
//! write(0x2000, ..) ──► flush 0x1000 (erase + program) ──► load 0x2000 ...
//! ```

use crate::error::FlashError;
use crate::primitives::FlashPrimitives;

/// Page buffer, word-aligned as controllers read the write source as words
#[repr(C, align(4))]
struct PageBuffer<const PAGE: usize>([u8; PAGE]);

/// Single-page write cache over a set of flash primitives
///
/// `PAGE` must equal the primitives' page size.
pub struct FlashCache<P, const PAGE: usize> {
    flash: P,
    /// Base address of the cached page
    page: Option<u32>,
    buffer: PageBuffer<PAGE>,
}

impl<P: FlashPrimitives, const PAGE: usize> FlashCache<P, PAGE> {
    /// Create an empty cache
    pub fn new(flash: P) -> Self {
        debug_assert_eq!(flash.page_size() as usize, PAGE);
        Self {
            flash,
            page: None,
            buffer: PageBuffer([0u8; PAGE]),
        }
    }

    /// Base address of the page currently held, if any
    pub fn cached_page(&self) -> Option<u32> {
        self.page
    }

    /// Get the underlying primitives
    pub fn flash(&mut self) -> &mut P {
        &mut self.flash
    }

    /// Buffer `data` for `address`
    ///
    /// Moving to another page commits the previously cached one first.
    /// Returns the number of bytes accepted.
    pub fn write(&mut self, address: u32, data: &[u8]) -> Result<usize, FlashError> {
        let mut done = 0usize;

        while done < data.len() {
            let target = address + done as u32;
            let page = page_base::<PAGE>(target);
            let offset = (target - page) as usize;
            let count = (PAGE - offset).min(data.len() - done);

            if self.page != Some(page) {
                self.flush()?;
                self.flash.read(page, &mut self.buffer.0);
                self.page = Some(page);
            }

            self.buffer.0[offset..offset + count].copy_from_slice(&data[done..done + count]);
            done += count;
        }

        Ok(done)
    }

    /// Commit the cached page to flash
    ///
    /// Skips erase and program when flash already holds the buffered
    /// content. On failure the page stays cached so the flush can be
    /// repeated.
    pub fn flush(&mut self) -> Result<(), FlashError> {
        let Some(page) = self.page else {
            return Ok(());
        };

        if self.flash.verify(page, &self.buffer.0) {
            trace!("page {:#x} unchanged, skipping commit", page);
        } else {
            debug!("committing page {:#x}", page);
            self.flash.erase(page)?;
            self.flash.program(page, &self.buffer.0)?;
        }

        self.page = None;
        Ok(())
    }

    /// Read `buf.len()` bytes at `address`
    ///
    /// Bytes inside the cached page come from the buffer, everything else
    /// from flash. Returns the number of bytes read.
    pub fn read(&mut self, address: u32, buf: &mut [u8]) -> usize {
        let Some(page) = self.page else {
            return self.flash.read(address, buf);
        };

        let start = address as u64;
        let end = start + buf.len() as u64;
        let cache_start = page as u64;
        let cache_end = cache_start + PAGE as u64;

        if end <= cache_start || start >= cache_end {
            return self.flash.read(address, buf);
        }

        let overlap_start = start.max(cache_start);
        let overlap_end = end.min(cache_end);

        let head = (overlap_start - start) as usize;
        let tail = (overlap_end - start) as usize;

        if head > 0 {
            self.flash.read(address, &mut buf[..head]);
        }

        let from = (overlap_start - cache_start) as usize;
        buf[head..tail].copy_from_slice(&self.buffer.0[from..from + (tail - head)]);

        if tail < buf.len() {
            self.flash.read(overlap_end as u32, &mut buf[tail..]);
        }

        buf.len()
    }

    /// Drop the cached page without committing it, if it is `page`
    ///
    /// Returns true if something was dropped.
    pub fn discard(&mut self, page: u32) -> bool {
        if self.page == Some(page_base::<PAGE>(page)) {
            self.page = None;
            true
        } else {
            false
        }
    }
}

/// Base address of the page containing `address`
fn page_base<const PAGE: usize>(address: u32) -> u32 {
    address - address % PAGE as u32
}
