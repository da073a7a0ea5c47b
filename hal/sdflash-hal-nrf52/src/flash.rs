//! SoftDevice flash driver
//!
//! While the SoftDevice is enabled, the NVMC belongs to it: requests go
//! through `sd_flash_*` calls that return at once and finish later with an
//! `NRF_EVT_FLASH_OPERATION_*` SoC event. With the SoftDevice disabled the
//! same calls run synchronously.

#[cfg(feature = "s132")]
use nrf_softdevice_s132 as raw;
#[cfg(feature = "s140")]
use nrf_softdevice_s140 as raw;

use embassy_time::Delay;
use sdflash_core::{FlashConfig, InternalFlash, SyncFlash};
use sdflash_hal::{check_write, FlashController, MappedFlash, Outcome, WriteFault, WORD_SIZE};

use crate::events::FLASH_SIGNAL;

/// nRF52 flash page size
pub const PAGE_SIZE: usize = 4096;

/// Driver configuration for the selected SoftDevice
///
/// S140 v6.1.0 asserts when a single `sd_flash_write` covers a whole page,
/// so every write is issued as two halves.
#[cfg(feature = "s140")]
pub const FLASH_CONFIG: FlashConfig = FlashConfig::split_write();
#[cfg(not(feature = "s140"))]
pub const FLASH_CONFIG: FlashConfig = FlashConfig::unaffected();

/// Blocking flash driver over the SoftDevice
pub type Flash = SyncFlash<'static, SoftdeviceFlash, Delay, MemoryMapped>;

/// Create the blocking driver, notified through [`FLASH_SIGNAL`]
pub fn sync_flash() -> Flash {
    SyncFlash::new(SoftdeviceFlash::new(), Delay, MemoryMapped, &FLASH_SIGNAL, FLASH_CONFIG)
}

/// Create the cached application API over a driver
pub fn internal_flash(flash: &'static Flash) -> InternalFlash<&'static Flash, PAGE_SIZE> {
    InternalFlash::new(flash)
}

/// Map a SoftDevice return code onto a primitive outcome
fn outcome(code: u32) -> Outcome {
    match code {
        raw::NRF_SUCCESS => Outcome::Success,
        raw::NRF_ERROR_BUSY => Outcome::Busy,
        code => Outcome::Error(code),
    }
}

/// Flash controller primitives through the SoftDevice
pub struct SoftdeviceFlash {
    _private: (),
}

impl Default for SoftdeviceFlash {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftdeviceFlash {
    /// Create a new controller handle
    pub const fn new() -> Self {
        Self { _private: () }
    }
}

impl FlashController for SoftdeviceFlash {
    fn page_size(&self) -> u32 {
        PAGE_SIZE as u32
    }

    fn erase_page(&mut self, page: u32) -> Outcome {
        outcome(unsafe { raw::sd_flash_page_erase(page) })
    }

    fn write_words(&mut self, address: u32, data: &[u8]) -> Outcome {
        // sd_flash_write takes a word count; a trailing partial word would be lost
        match check_write(address, data) {
            Err(WriteFault::Length) => return Outcome::Error(raw::NRF_ERROR_INVALID_LENGTH),
            Err(WriteFault::Address) => return Outcome::Error(raw::NRF_ERROR_INVALID_ADDR),
            Ok(()) => {}
        }

        // The SoftDevice reads the source as words
        if data.as_ptr() as usize % WORD_SIZE != 0 {
            return Outcome::Error(raw::NRF_ERROR_INVALID_ADDR);
        }

        let words = (data.len() / WORD_SIZE) as u32;
        outcome(unsafe { raw::sd_flash_write(address as *mut u32, data.as_ptr() as *const u32, words) })
    }

    fn stack_enabled(&self) -> bool {
        let mut enabled: u8 = 0;
        // Only fails for a bad pointer
        let _ = unsafe { raw::sd_softdevice_is_enabled(&mut enabled) };
        enabled != 0
    }
}

/// Program flash read directly from the address space
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryMapped;

impl MappedFlash for MemoryMapped {
    fn read(&self, address: u32, buf: &mut [u8]) {
        unsafe { core::ptr::copy_nonoverlapping(address as *const u8, buf.as_mut_ptr(), buf.len()) }
    }
}
