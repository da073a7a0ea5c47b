//! SoC event hook
//!
//! Firmware forwards SoftDevice SoC events here. Flash completions release
//! [`FLASH_SIGNAL`].
//!
//! The flash driver waits by spinning in `block_on`, which never yields to
//! the executor it runs on. [`on_soc_event`] must therefore be called from
//! the SoC event interrupt (SWI2 / `SD_EVT_IRQn`) or from a task on a
//! different, higher-priority executor. Calling it from a task on the same
//! executor as the flash caller deadlocks.

use sdflash_core::CompletionSignal;
use sdflash_hal::ControllerEvent;

/// `NRF_EVT_FLASH_OPERATION_SUCCESS` from `nrf_soc.h`
pub const NRF_EVT_FLASH_OPERATION_SUCCESS: u32 = 2;

/// `NRF_EVT_FLASH_OPERATION_ERROR` from `nrf_soc.h`
pub const NRF_EVT_FLASH_OPERATION_ERROR: u32 = 3;

/// Completion signal shared by the SoC event hook and the flash driver
pub static FLASH_SIGNAL: CompletionSignal = CompletionSignal::new();

/// Translate a raw SoC event id
pub fn controller_event(evt_id: u32) -> ControllerEvent {
    match evt_id {
        NRF_EVT_FLASH_OPERATION_SUCCESS => ControllerEvent::FlashOperationSuccess,
        NRF_EVT_FLASH_OPERATION_ERROR => ControllerEvent::FlashOperationError,
        other => ControllerEvent::Other(other),
    }
}

/// SoC event handler entry point
///
/// Safe to call from interrupt context: never blocks or allocates.
pub fn on_soc_event(evt_id: u32) {
    #[cfg(feature = "defmt")]
    if evt_id == NRF_EVT_FLASH_OPERATION_ERROR {
        defmt::warn!("flash operation failed");
    }

    FLASH_SIGNAL.notify(controller_event(evt_id));
}
