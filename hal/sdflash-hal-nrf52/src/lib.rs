//! nRF52 SoftDevice backend for sdflash
//!
//! This crate implements the `sdflash-hal` traits on top of the SoftDevice
//! flash API and provides the pieces firmware needs to wire it up:
//!
//! - [`flash::SoftdeviceFlash`] - `sd_flash_page_erase` / `sd_flash_write`
//! - [`flash::MemoryMapped`] - direct reads of program flash
//! - [`events::FLASH_SIGNAL`] and [`events::on_soc_event`] - completion hook
//!   for the SoC event dispatcher
//!
//! # Features
//!
//! - `s132` - nRF52832 with S132 (whole-buffer writes)
//! - `s140` - nRF52840 with S140 (split writes, see [`flash::FLASH_CONFIG`])
//! - `defmt` - Enable debug formatting support

#![no_std]

#[cfg(not(any(feature = "s132", feature = "s140")))]
compile_error!("select a SoftDevice: enable feature `s132` or `s140`");

#[cfg(all(feature = "s132", feature = "s140"))]
compile_error!("features `s132` and `s140` are mutually exclusive");

pub mod events;
pub mod flash;

pub use events::{on_soc_event, FLASH_SIGNAL};
pub use flash::{internal_flash, sync_flash, Flash, MemoryMapped, SoftdeviceFlash, FLASH_CONFIG, PAGE_SIZE};
